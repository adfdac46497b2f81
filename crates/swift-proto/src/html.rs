//! User-interface model carried inside operations and results.
//!
//! Five NUL-terminated strings followed by one byte of behaviour flags.
//! The strings feed whatever template layer the hosting service plugs in;
//! the flags steer the operation state machine.

use swift_core::codec::{CodecError, Reader, Writer};

const FLAG_DISPLAY_USER_INTERFACE: u8 = 1 << 0;
const FLAG_POST_MESSAGE_ON_COMPLETE: u8 = 1 << 1;
const FLAG_USE_HOME_NODE: u8 = 1 << 2;
const FLAG_JAVA_SCRIPT: u8 = 1 << 3;

/// Display parameters and behaviour flags for a storage operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Html {
    /// Window title.
    pub title: String,
    /// Message shown while the operation progresses.
    pub message: String,
    /// Page background colour.
    pub background_color: String,
    /// Message text colour.
    pub message_color: String,
    /// Progress indicator colour.
    pub progress_color: String,
    /// Show the progress user interface during the bounce.
    pub display_user_interface: bool,
    /// Finish with `window.postMessage` instead of a redirect.
    pub post_message_on_complete: bool,
    /// Allow the home node to answer alone when its cookies are fresh.
    pub use_home_node: bool,
    /// Drive the bounce with JavaScript includes instead of navigation.
    pub java_script: bool,
}

impl Html {
    /// Writes the five strings and the flags byte.
    pub fn write_to(&self, w: &mut Writer) -> Result<(), CodecError> {
        w.write_string(&self.title)?;
        w.write_string(&self.message)?;
        w.write_string(&self.background_color)?;
        w.write_string(&self.message_color)?;
        w.write_string(&self.progress_color)?;
        let mut flags = 0u8;
        if self.display_user_interface {
            flags |= FLAG_DISPLAY_USER_INTERFACE;
        }
        if self.post_message_on_complete {
            flags |= FLAG_POST_MESSAGE_ON_COMPLETE;
        }
        if self.use_home_node {
            flags |= FLAG_USE_HOME_NODE;
        }
        if self.java_script {
            flags |= FLAG_JAVA_SCRIPT;
        }
        w.write_byte(flags);
        Ok(())
    }

    /// Reads the five strings and the flags byte.
    pub fn read_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let title = r.read_string()?;
        let message = r.read_string()?;
        let background_color = r.read_string()?;
        let message_color = r.read_string()?;
        let progress_color = r.read_string()?;
        let flags = r.read_byte()?;
        Ok(Self {
            title,
            message,
            background_color,
            message_color,
            progress_color,
            display_user_interface: flags & FLAG_DISPLAY_USER_INTERFACE != 0,
            post_message_on_complete: flags & FLAG_POST_MESSAGE_ON_COMPLETE != 0,
            use_home_node: flags & FLAG_USE_HOME_NODE != 0,
            java_script: flags & FLAG_JAVA_SCRIPT != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_with_flags() {
        let h = Html {
            title: "Preferences".to_owned(),
            message: "Saving...".to_owned(),
            background_color: "#fff".to_owned(),
            message_color: "black".to_owned(),
            progress_color: "blue".to_owned(),
            display_user_interface: true,
            post_message_on_complete: false,
            use_home_node: true,
            java_script: true,
        };
        let mut w = Writer::new();
        h.write_to(&mut w).unwrap();

        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        assert_eq!(Html::read_from(&mut r).unwrap(), h);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn default_has_no_flags() {
        let mut w = Writer::new();
        Html::default().write_to(&mut w).unwrap();
        let bytes = w.into_vec();
        // Five empty strings then a zero flags byte.
        assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0]);
    }
}

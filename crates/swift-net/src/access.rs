//! Access-key authorisation capability.
//!
//! The core only asks whether a key is allowed; how keys are issued and
//! rotated is the hosting service's concern.

/// Decides whether a caller-supplied access key may use the protected
/// endpoints.
pub trait Access: Send + Sync {
    /// True when the key is authorised.
    fn allowed(&self, key: &str) -> bool;
}

/// A fixed list of valid keys. An empty list denies everything.
pub struct AccessFixed {
    keys: Vec<String>,
}

impl AccessFixed {
    /// Creates the capability from the valid keys.
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }
}

impl Access for AccessFixed {
    fn allowed(&self, key: &str) -> bool {
        !key.is_empty() && self.keys.iter().any(|k| k == key)
    }
}

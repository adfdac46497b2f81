//! Persisted operation state.
//!
//! The operation is the bounce's mutable state, sealed by the next node's
//! secret and carried in the final URL segment. Field order is
//! load-bearing:
//!
//! ```text
//! time   timeStamp
//! string returnURL
//! string accessNode
//! html   title/message/colours + flags
//! byte   nodesVisited
//! byte   nodeCount
//! string prevNode
//! string homeNode
//! string state elements joined by CR
//! byte   pairCount
//! pair   pairs[pairCount]
//! ```
//!
//! Trailing bytes after the last pair mean a corrupt payload.

use std::time::Duration;

use swift_core::codec::{CodecError, Reader, Writer};
use swift_core::STATE_SEPARATOR;
use thiserror::Error;
use time::OffsetDateTime;

use crate::html::Html;
use crate::pair::{Pair, PairError};

/// Errors raised while encoding or decoding operations.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Underlying codec failure.
    #[error("operation codec failure")]
    Codec(#[from] CodecError),

    /// A pair inside the operation failed to decode.
    #[error("operation pair failure")]
    Pair(#[from] PairError),

    /// More pairs than the single count byte can express.
    #[error("{0} pairs exceed the 255 pair limit")]
    TooManyPairs(usize),

    /// Bytes remained after the final pair.
    #[error("{0} bytes remaining after the final pair")]
    TrailingBytes(usize),
}

/// The persisted fields of a storage operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Creation time; the operation lives for the storage operation
    /// timeout from this instant.
    pub time_stamp: OffsetDateTime,
    /// Absolute URL the final hop returns to.
    pub return_url: String,
    /// Domain of the access node that seals the final results.
    pub access_node: String,
    /// User-interface model and behaviour flags.
    pub html: Html,
    /// Hops completed, including the current one.
    pub nodes_visited: u8,
    /// Target hop count, capped at the ring size.
    pub node_count: u8,
    /// Domain of the previous hop, used for passive liveness.
    pub prev_node: String,
    /// Domain of the deterministic home node.
    pub home_node: String,
    /// Opaque caller state elements.
    pub state: Vec<String>,
    /// The operation's pairs, possibly value-less for reads.
    pub pairs: Vec<Pair>,
}

impl Operation {
    /// Creates an operation stamped now with everything else empty.
    pub fn new() -> Self {
        Self {
            time_stamp: OffsetDateTime::now_utc(),
            return_url: String::new(),
            access_node: String::new(),
            html: Html::default(),
            nodes_visited: 0,
            node_count: 0,
            prev_node: String::new(),
            home_node: String::new(),
            state: Vec::new(),
            pairs: Vec::new(),
        }
    }

    /// True while the operation is inside its lifetime window.
    pub fn is_time_stamp_valid(&self, timeout: Duration) -> bool {
        OffsetDateTime::now_utc() < self.time_stamp + timeout
    }

    /// Progress through the bounce as a whole percentage.
    pub fn percentage_complete(&self) -> u8 {
        if self.node_count == 0 {
            return 0;
        }
        let p = (f64::from(self.nodes_visited) / f64::from(self.node_count)) * 100.0;
        p.min(100.0) as u8
    }

    /// Serialises the operation's persisted fields.
    pub fn to_bytes(&self) -> Result<Vec<u8>, OperationError> {
        if self.pairs.len() > u8::MAX as usize {
            return Err(OperationError::TooManyPairs(self.pairs.len()));
        }
        let mut w = Writer::new();
        w.write_time(self.time_stamp)?;
        w.write_string(&self.return_url)?;
        w.write_string(&self.access_node)?;
        self.html.write_to(&mut w)?;
        w.write_byte(self.nodes_visited);
        w.write_byte(self.node_count);
        w.write_string(&self.prev_node)?;
        w.write_string(&self.home_node)?;
        w.write_string(&self.state.join(STATE_SEPARATOR))?;
        w.write_byte(self.pairs.len() as u8);
        for p in &self.pairs {
            p.write_to(&mut w)?;
        }
        Ok(w.into_vec())
    }

    /// Rebuilds an operation, rejecting any trailing bytes.
    pub fn from_bytes(d: &[u8]) -> Result<Self, OperationError> {
        let mut r = Reader::new(d);
        let time_stamp = r.read_time()?;
        let return_url = r.read_string()?;
        let access_node = r.read_string()?;
        let html = Html::read_from(&mut r)?;
        let nodes_visited = r.read_byte()?;
        let node_count = r.read_byte()?;
        let prev_node = r.read_string()?;
        let home_node = r.read_string()?;
        let state = split_state(&r.read_string()?);
        let count = r.read_byte()?;
        let mut pairs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            pairs.push(Pair::read_from(&mut r)?);
        }
        if r.remaining() != 0 {
            return Err(OperationError::TrailingBytes(r.remaining()));
        }
        Ok(Self {
            time_stamp,
            return_url,
            access_node,
            html,
            nodes_visited,
            node_count,
            prev_node,
            home_node,
            state,
            pairs,
        })
    }
}

impl Default for Operation {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits a joined state string, mapping the empty string back to no
/// elements so the join round-trips.
pub(crate) fn split_state(s: &str) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }
    s.split(STATE_SEPARATOR).map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pair::Conflict;
    use time::macros::{date, datetime};

    fn sample() -> Operation {
        Operation {
            time_stamp: datetime!(2023-09-01 08:00:00.000001 UTC),
            return_url: "https://pub.example.com/return?d=".to_owned(),
            access_node: "access.example.com".to_owned(),
            html: Html {
                title: "t".to_owned(),
                message: "m".to_owned(),
                background_color: "#000".to_owned(),
                message_color: "#111".to_owned(),
                progress_color: "#222".to_owned(),
                display_user_interface: true,
                use_home_node: true,
                ..Html::default()
            },
            nodes_visited: 2,
            node_count: 5,
            prev_node: "s1.example.com".to_owned(),
            home_node: "s2.example.com".to_owned(),
            state: vec!["a".to_owned(), "b".to_owned()],
            pairs: vec![Pair {
                key: "x".to_owned(),
                conflict: Conflict::Newest,
                created: datetime!(2023-09-01 08:00:00 UTC),
                expires: date!(2099 - 12 - 31),
                values: vec![b"hello".to_vec()],
                cookie_write_time: OffsetDateTime::UNIX_EPOCH,
            }],
        }
    }

    #[test]
    fn roundtrip() {
        let o = sample();
        let bytes = o.to_bytes().unwrap();
        assert_eq!(Operation::from_bytes(&bytes).unwrap(), o);
    }

    #[test]
    fn empty_state_roundtrips() {
        let mut o = sample();
        o.state = Vec::new();
        let bytes = o.to_bytes().unwrap();
        assert_eq!(Operation::from_bytes(&bytes).unwrap().state, Vec::<String>::new());
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes.push(0xFF);
        assert!(matches!(
            Operation::from_bytes(&bytes),
            Err(OperationError::TrailingBytes(1))
        ));
    }

    #[test]
    fn truncated_payload_rejected() {
        let bytes = sample().to_bytes().unwrap();
        assert!(Operation::from_bytes(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn time_stamp_window() {
        let mut o = sample();
        o.time_stamp = OffsetDateTime::now_utc();
        assert!(o.is_time_stamp_valid(Duration::from_secs(60)));
        o.time_stamp = OffsetDateTime::now_utc() - Duration::from_secs(120);
        assert!(!o.is_time_stamp_valid(Duration::from_secs(60)));
    }

    #[test]
    fn percentage_complete_clamped() {
        let mut o = sample();
        o.nodes_visited = 2;
        o.node_count = 4;
        assert_eq!(o.percentage_complete(), 50);
        o.node_count = 0;
        assert_eq!(o.percentage_complete(), 0);
    }
}

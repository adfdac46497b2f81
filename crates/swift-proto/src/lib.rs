//! Swift Proto - wire types carried between SWIFT nodes.
//!
//! Defines the framed payloads that travel in URL segments, cookie values
//! and sealed results:
//! - Key/value pairs with conflict resolution
//! - The HTML user-interface model
//! - The persisted operation state
//! - Results returned to the calling application
//! - Share-roster JSON records

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod html;
pub mod operation;
pub mod pair;
pub mod results;
pub mod share;

pub use html::Html;
pub use operation::{Operation, OperationError};
pub use pair::{merge_values, resolve_conflict, Conflict, Pair, PairError};
pub use results::{ResultPair, Results, ResultsError};
pub use share::{NodeShare, SecretShare};

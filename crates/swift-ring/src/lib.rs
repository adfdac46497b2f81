//! Swift Ring - nodes, networks and home-node placement.
//!
//! This crate provides:
//! - The node type: role, activation window, secret history, scrambler
//! - Domain and client-address hashing
//! - Per-network collections and the hash-ordered storage ring

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod hash;
pub mod node;
pub mod ring;

pub use hash::{client_address, client_hash, hash_value};
pub use node::{Node, NodeError, Role};
pub use ring::{Nodes, RingError};

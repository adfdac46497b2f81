//! Swift Store - node roster persistence and aggregation.
//!
//! This crate provides:
//! - The `Store` capability consumed by the core (back-ends live outside)
//! - An in-memory volatile store for tests and ingested share rosters
//! - The storage manager that merges stores and discovers peers
//! - The background service that rebuilds the manager on a ticker

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod manager;
pub mod service;
pub mod volatile;

pub use manager::StorageManager;
pub use service::StorageService;
pub use volatile::Volatile;

use std::sync::Arc;

use swift_ring::{Node, Nodes};
use thiserror::Error;

/// Errors raised by stores and the storage manager.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write hit a read-only store.
    #[error("store '{0}' is read only")]
    ReadOnly(String),

    /// No writable store matched the request. The field holds the
    /// requested store name, or `(any)` when none was given.
    #[error("no writable store '{0}' found")]
    NoWritableStore(String),

    /// More than one writable store matched an unnamed write.
    #[error("multiple writable stores available, select one of: {0}")]
    MultipleWritableStores(String),

    /// More stores were configured than the manager allows.
    #[error("too many stores configured, the maximum is {0}")]
    TooManyStores(usize),

    /// A node failed to build while ingesting a roster.
    #[error("node failure in store")]
    Node(#[from] swift_ring::NodeError),

    /// A back-end was unreachable or returned bad data.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Capability consumed by the core to read and write node records.
///
/// Back-ends implement this and nothing else; the manager is
/// variant-agnostic. Read-only back-ends reject `set_node`.
pub trait Store: Send + Sync {
    /// The store's name, used to address writes.
    fn name(&self) -> &str;

    /// True when the store rejects writes.
    fn read_only(&self) -> bool;

    /// The node for a domain, if the store knows it.
    fn get_node(&self, domain: &str) -> Option<Arc<Node>>;

    /// The network collection, if the store holds any of its nodes.
    fn get_nodes(&self, network: &str) -> Option<Arc<Nodes>>;

    /// Visits every node in the store.
    fn iterate_nodes(&self, visitor: &mut dyn FnMut(&Arc<Node>));

    /// Inserts or updates a node.
    fn set_node(&self, node: Node) -> Result<(), StoreError>;
}

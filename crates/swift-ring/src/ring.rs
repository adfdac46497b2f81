//! Per-network node collections and home-node placement.
//!
//! The collections are rebuilt whole on every store refresh; there is no
//! incremental update. The `hash` view is the ring: active storage nodes
//! ordered by hash value.

use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::thread_rng;
use thiserror::Error;

use crate::hash::{client_address, client_hash};
use crate::node::{Node, Role};

/// Errors raised by ring lookups.
#[derive(Debug, Error)]
pub enum RingError {
    /// The ring held no node for the client address.
    #[error("none of the {available} nodes could be a home node for remote address '{address}'")]
    NoHomeNode {
        /// Ring size at lookup time.
        available: usize,
        /// The address that failed to place.
        address: String,
    },
}

/// The nodes of one network.
#[derive(Debug, Default)]
pub struct Nodes {
    /// Every node, insertion order.
    all: Vec<Arc<Node>>,
    /// Active nodes ordered by creation time.
    active: Vec<Arc<Node>>,
    /// Active storage nodes ordered by hash: the ring.
    hash: Vec<Arc<Node>>,
    /// Domain to node.
    dict: HashMap<String, Arc<Node>>,
}

impl Nodes {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node. Call [`Nodes::order`] once the set is complete.
    pub fn insert(&mut self, n: Arc<Node>) {
        self.dict.insert(n.domain().to_owned(), n.clone());
        self.all.push(n);
    }

    /// Rebuilds the active and ring views from the full set.
    pub fn order(&mut self) {
        let mut active: Vec<Arc<Node>> = self.all.iter().filter(|n| n.is_active()).cloned().collect();
        active.sort_by_key(|n| n.created());
        let mut ring: Vec<Arc<Node>> = active
            .iter()
            .filter(|n| n.role() == Role::Storage)
            .cloned()
            .collect();
        ring.sort_by_key(|n| n.hash());
        self.active = active;
        self.hash = ring;
    }

    /// Returns the node for a domain.
    pub fn get(&self, domain: &str) -> Option<&Arc<Node>> {
        self.dict.get(domain)
    }

    /// Every node in the network.
    pub fn all(&self) -> &[Arc<Node>] {
        &self.all
    }

    /// Active nodes ordered by creation time.
    pub fn active(&self) -> &[Arc<Node>] {
        &self.active
    }

    /// The ring: active storage nodes ordered by hash.
    pub fn ring(&self) -> &[Arc<Node>] {
        &self.hash
    }

    /// A random active node satisfying the predicate, or `None`.
    pub fn get_random_node<F>(&self, condition: F) -> Option<&Arc<Node>>
    where
        F: Fn(&Node) -> bool,
    {
        let mut indexes: Vec<usize> = (0..self.active.len()).collect();
        indexes.shuffle(&mut thread_rng());
        for i in indexes {
            let n = &self.active[i];
            if condition(n) {
                return Some(n);
            }
        }
        None
    }

    /// The deterministic home node for a client address.
    ///
    /// The client hash is placed on the ring at the first node whose hash
    /// is greater than or equal to it, wrapping to the first node when no
    /// such node exists. Identical node sets therefore agree on the home
    /// node for every address.
    pub fn get_home_node(&self, xff: &str, remote_addr: &str) -> Result<&Arc<Node>, RingError> {
        let no_home = || RingError::NoHomeNode {
            available: self.hash.len(),
            address: client_address(xff, remote_addr).unwrap_or("").to_owned(),
        };
        let h = client_hash(xff, remote_addr).ok_or_else(no_home)?;
        let i = self.node_index_by_hash(h).ok_or_else(no_home)?;
        Ok(&self.hash[i])
    }

    /// Ring index for a hash value, or `None` when the ring is empty.
    fn node_index_by_hash(&self, h: u64) -> Option<usize> {
        if self.hash.is_empty() {
            return None;
        }
        let i = self.hash.partition_point(|n| n.hash() < h);
        Some(if i == self.hash.len() { 0 } else { i })
    }
}

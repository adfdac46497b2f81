//! In-memory node store.
//!
//! Backs tests, ingested share rosters and the daemon's bootstrap roster.
//! Writes rebuild the affected network collection and swap it whole, so
//! readers always see either the old or the new snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use swift_ring::{Node, Nodes};

use crate::{Store, StoreError};

#[derive(Default)]
struct Inner {
    nodes: HashMap<String, Arc<Node>>,
    networks: HashMap<String, Arc<Nodes>>,
}

/// A volatile in-memory store.
pub struct Volatile {
    name: String,
    read_only: bool,
    inner: RwLock<Inner>,
}

impl Volatile {
    /// Creates an empty store.
    pub fn new(name: &str, read_only: bool) -> Self {
        Self {
            name: name.to_owned(),
            read_only,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Creates a store pre-populated with nodes. Used for share rosters,
    /// which arrive complete and stay read only.
    pub fn with_nodes(name: &str, read_only: bool, nodes: Vec<Node>) -> Self {
        let mut inner = Inner::default();
        for node in nodes {
            insert(&mut inner, Arc::new(node));
        }
        Self {
            name: name.to_owned(),
            read_only,
            inner: RwLock::new(inner),
        }
    }
}

fn insert(inner: &mut Inner, node: Arc<Node>) {
    let network = node.network().to_owned();
    inner.nodes.insert(node.domain().to_owned(), node.clone());

    // Rebuild the network collection from every node now in it.
    let mut ns = Nodes::new();
    for n in inner.nodes.values() {
        if n.network() == network {
            ns.insert(n.clone());
        }
    }
    ns.order();
    inner.networks.insert(network, Arc::new(ns));
}

impl Store for Volatile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn get_node(&self, domain: &str) -> Option<Arc<Node>> {
        self.inner.read().nodes.get(domain).cloned()
    }

    fn get_nodes(&self, network: &str) -> Option<Arc<Nodes>> {
        self.inner.read().networks.get(network).cloned()
    }

    fn iterate_nodes(&self, visitor: &mut dyn FnMut(&Arc<Node>)) {
        for node in self.inner.read().nodes.values() {
            visitor(node);
        }
    }

    fn set_node(&self, node: Node) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly(self.name.clone()));
        }
        insert(&mut self.inner.write(), Arc::new(node));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swift_core::Secret;
    use swift_ring::Role;
    use time::{Duration, OffsetDateTime};

    fn node(network: &str, domain: &str, role: Role) -> Node {
        let now = OffsetDateTime::now_utc();
        let mut n = Node::new(
            network,
            domain,
            now,
            now - Duration::hours(1),
            now + Duration::days(30),
            role,
            "",
            "",
        )
        .unwrap();
        n.add_secret(Secret::new_random().unwrap());
        n
    }

    #[test]
    fn set_and_get() {
        let store = Volatile::new("main", false);
        store.set_node(node("net", "a.test", Role::Storage)).unwrap();
        store.set_node(node("net", "b.test", Role::Access)).unwrap();

        assert!(store.get_node("a.test").is_some());
        assert!(store.get_node("missing.test").is_none());

        let ns = store.get_nodes("net").unwrap();
        assert_eq!(ns.all().len(), 2);
        assert_eq!(ns.ring().len(), 1);
        assert!(store.get_nodes("other").is_none());
    }

    #[test]
    fn update_replaces_node() {
        let store = Volatile::new("main", false);
        store.set_node(node("net", "a.test", Role::Storage)).unwrap();
        store.set_node(node("net", "a.test", Role::Share)).unwrap();

        assert_eq!(store.get_node("a.test").unwrap().role(), Role::Share);
        assert_eq!(store.get_nodes("net").unwrap().all().len(), 1);
    }

    #[test]
    fn read_only_rejects_writes() {
        let store = Volatile::with_nodes("v-0", true, vec![node("net", "a.test", Role::Storage)]);
        assert!(store.get_node("a.test").is_some());
        assert!(matches!(
            store.set_node(node("net", "b.test", Role::Storage)),
            Err(StoreError::ReadOnly(_))
        ));
    }

    #[test]
    fn iterate_visits_every_node() {
        let store = Volatile::new("main", false);
        store.set_node(node("net", "a.test", Role::Storage)).unwrap();
        store.set_node(node("net2", "b.test", Role::Storage)).unwrap();

        let mut seen = Vec::new();
        store.iterate_nodes(&mut |n| seen.push(n.domain().to_owned()));
        seen.sort();
        assert_eq!(seen, vec!["a.test", "b.test"]);
    }
}

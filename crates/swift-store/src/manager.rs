//! The storage manager: one logical view over many stores.
//!
//! Construction walks the configured stores for share-role nodes, polls
//! each one's share endpoint, and registers any returned roster as a new
//! read-only volatile store. Once built, the manager is immutable; the
//! refresh service replaces it wholesale.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use swift_core::Configuration;
use swift_proto::share::NodeShare;
use swift_ring::{Node, Nodes, Role};
use tracing::{debug, warn};

use crate::volatile::Volatile;
use crate::{Store, StoreError};

/// Timeout for share endpoint calls.
const SHARE_TIMEOUT: Duration = Duration::from_secs(15);

/// An immutable aggregation of node stores.
pub struct StorageManager {
    stores: Vec<Arc<dyn Store>>,
    nodes: HashMap<String, Arc<Node>>,
}

impl StorageManager {
    /// Builds a manager from the configured stores, expanding the roster
    /// through any share nodes they reference.
    pub async fn new(
        config: &Configuration,
        stores: Vec<Arc<dyn Store>>,
    ) -> Result<Self, StoreError> {
        if stores.len() > config.max_stores {
            return Err(StoreError::TooManyStores(config.max_stores));
        }

        let mut all = stores;
        let mut nodes: HashMap<String, Arc<Node>> = HashMap::new();
        let mut checked: HashSet<String> = HashSet::new();
        let mut manager_stores: Vec<Arc<dyn Store>> = Vec::new();

        let mut i = 0;
        while i < all.len() {
            let store = all[i].clone();

            // Follow every share node this store knows about that has not
            // been polled yet.
            for share_node in sharing_nodes(store.as_ref()) {
                if !checked.insert(share_node.domain().to_owned()) {
                    continue;
                }
                if all.len() >= config.max_stores {
                    warn!(
                        max = config.max_stores,
                        "store limit reached, skipping further share rosters"
                    );
                    break;
                }
                let shared = match call_share(&share_node, &config.scheme).await {
                    Ok(body) => match decode_share_payload(&share_node, &body) {
                        Ok(ns) => ns,
                        Err(e) => {
                            if config.debug {
                                warn!(domain = %share_node.domain(), error = %e, "bad share payload");
                            }
                            continue;
                        }
                    },
                    Err(e) => {
                        if config.debug {
                            warn!(domain = %share_node.domain(), error = %e, "share call failed");
                        }
                        continue;
                    }
                };

                // Only rosters that add storage capacity become stores.
                if shared.iter().any(|n| n.role() == Role::Storage) {
                    debug!(
                        domain = %share_node.domain(),
                        count = shared.len(),
                        "ingested shared roster"
                    );
                    all.push(Arc::new(Volatile::with_nodes(
                        &format!("v-{i}"),
                        true,
                        shared,
                    )));
                }
            }

            store.iterate_nodes(&mut |n| {
                nodes.insert(n.domain().to_owned(), n.clone());
            });
            manager_stores.push(store);
            i += 1;
        }

        Ok(Self {
            stores: manager_stores,
            nodes,
        })
    }

    /// The node for a domain, from any store.
    pub fn get_node(&self, domain: &str) -> Option<Arc<Node>> {
        self.nodes.get(domain).cloned()
    }

    /// The network collection from the first store that knows it.
    pub fn get_nodes(&self, network: &str) -> Option<Arc<Nodes>> {
        self.stores.iter().find_map(|s| s.get_nodes(network))
    }

    /// Every node from every store.
    pub fn get_all_nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.values().cloned().collect()
    }

    /// Every node that is alive and whose start time has passed.
    pub fn get_all_active_nodes(&self) -> Vec<Arc<Node>> {
        self.nodes
            .values()
            .filter(|n| n.alive() && n.has_started())
            .cloned()
            .collect()
    }

    /// A random active access node for the network.
    pub fn get_access_node(&self, network: &str) -> Option<String> {
        self.get_nodes(network)?
            .get_random_node(|n| n.role() == Role::Access)
            .map(|n| n.domain().to_owned())
    }

    /// Names of the writable stores.
    pub fn store_names(&self) -> Vec<String> {
        self.stores
            .iter()
            .filter(|s| !s.read_only())
            .map(|s| s.name().to_owned())
            .collect()
    }

    /// Writes nodes to the named store, or to the single writable store
    /// when `store_name` is empty.
    pub fn set_nodes(&self, store_name: &str, nodes: Vec<Node>) -> Result<(), StoreError> {
        let writable: Vec<&Arc<dyn Store>> = self
            .stores
            .iter()
            .filter(|s| !s.read_only() && (store_name.is_empty() || s.name() == store_name))
            .collect();

        match writable.as_slice() {
            [] => Err(StoreError::NoWritableStore(if store_name.is_empty() {
                "(any)".to_owned()
            } else {
                store_name.to_owned()
            })),
            [store] => {
                for n in nodes {
                    store.set_node(n)?;
                }
                Ok(())
            }
            many => Err(StoreError::MultipleWritableStores(
                many.iter()
                    .map(|s| s.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }
}

/// Every share-role node a store knows about.
fn sharing_nodes(store: &dyn Store) -> Vec<Arc<Node>> {
    let mut out = Vec::new();
    store.iterate_nodes(&mut |n| {
        if n.role() == Role::Share {
            out.push(n.clone());
        }
    });
    out
}

/// Fetches a share node's encoded roster.
async fn call_share(node: &Node, scheme: &str) -> Result<Vec<u8>, StoreError> {
    let url = format!("{scheme}://{}/swift/api/v1/share", node.domain());
    let client = reqwest::Client::builder()
        .timeout(SHARE_TIMEOUT)
        .build()
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    if !response.status().is_success() {
        return Err(StoreError::Unavailable(format!(
            "'{url}' returned {}",
            response.status()
        )));
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    Ok(body.to_vec())
}

/// Decodes a share response body into nodes, dropping records that have
/// no usable secret.
pub fn decode_share_payload(share_node: &Node, body: &[u8]) -> Result<Vec<Node>, StoreError> {
    let plain = share_node.decode(body)?;
    let records: Vec<NodeShare> =
        serde_json::from_slice(&plain).map_err(|e| StoreError::Unavailable(e.to_string()))?;

    let mut nodes = Vec::with_capacity(records.len());
    for record in &records {
        let node = Node::from_share(record)?;
        if !node.supports_crypto() {
            warn!(domain = %record.domain, "shared node has no usable secrets, skipping");
            continue;
        }
        nodes.push(node);
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swift_core::Secret;
    use time::{Duration as TimeDuration, OffsetDateTime};

    fn node(network: &str, domain: &str, role: Role) -> Node {
        let now = OffsetDateTime::now_utc();
        let mut n = Node::new(
            network,
            domain,
            now,
            now - TimeDuration::hours(1),
            now + TimeDuration::days(30),
            role,
            "",
            "",
        )
        .unwrap();
        n.add_secret(Secret::new_random().unwrap());
        n
    }

    fn store_with(name: &str, nodes: Vec<Node>) -> Arc<dyn Store> {
        Arc::new(Volatile::with_nodes(name, false, nodes))
    }

    async fn manager(stores: Vec<Arc<dyn Store>>) -> StorageManager {
        StorageManager::new(&Configuration::default(), stores)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn aggregates_nodes_across_stores() {
        let m = manager(vec![
            store_with("one", vec![node("net", "a.test", Role::Storage)]),
            store_with("two", vec![node("net2", "b.test", Role::Access)]),
        ])
        .await;

        assert!(m.get_node("a.test").is_some());
        assert!(m.get_node("b.test").is_some());
        assert_eq!(m.get_all_nodes().len(), 2);
        assert!(m.get_nodes("net").is_some());
        assert!(m.get_nodes("net2").is_some());
        assert!(m.get_nodes("net3").is_none());
    }

    #[tokio::test]
    async fn active_nodes_require_alive_and_started() {
        let m = manager(vec![store_with(
            "one",
            vec![node("net", "a.test", Role::Storage)],
        )])
        .await;
        assert!(m.get_all_active_nodes().is_empty());
        m.get_node("a.test").unwrap().mark_accessed();
        assert_eq!(m.get_all_active_nodes().len(), 1);
    }

    #[tokio::test]
    async fn set_nodes_targets_the_single_writable_store() {
        let m = manager(vec![store_with("one", vec![])]).await;
        m.set_nodes("", vec![node("net", "new.test", Role::Storage)])
            .unwrap();
        assert!(m.get_nodes("net").unwrap().get("new.test").is_some());
    }

    #[tokio::test]
    async fn set_nodes_requires_a_name_with_multiple_writable_stores() {
        let m = manager(vec![store_with("one", vec![]), store_with("two", vec![])]).await;
        assert!(matches!(
            m.set_nodes("", vec![node("net", "n.test", Role::Storage)]),
            Err(StoreError::MultipleWritableStores(_))
        ));
        m.set_nodes("two", vec![node("net", "n.test", Role::Storage)])
            .unwrap();
    }

    #[tokio::test]
    async fn set_nodes_rejects_unknown_store() {
        let m = manager(vec![store_with("one", vec![])]).await;
        assert!(matches!(
            m.set_nodes("nope", vec![node("net", "n.test", Role::Storage)]),
            Err(StoreError::NoWritableStore(_))
        ));
    }

    #[tokio::test]
    async fn too_many_stores_rejected() {
        let config = Configuration {
            max_stores: 1,
            ..Default::default()
        };
        let stores = vec![store_with("one", vec![]), store_with("two", vec![])];
        assert!(matches!(
            StorageManager::new(&config, stores).await,
            Err(StoreError::TooManyStores(1))
        ));
    }

    #[tokio::test]
    async fn access_node_lookup() {
        let m = manager(vec![store_with(
            "one",
            vec![
                node("net", "access.test", Role::Access),
                node("net", "store.test", Role::Storage),
            ],
        )])
        .await;
        assert_eq!(m.get_access_node("net").unwrap(), "access.test");
        assert!(m.get_access_node("other").is_none());
    }

    #[test]
    fn share_payload_roundtrip() {
        let share = node("net", "share.test", Role::Share);
        let roster = vec![
            node("net", "s1.test", Role::Storage),
            node("net", "s2.test", Role::Storage),
        ];
        let records: Vec<NodeShare> = roster.iter().map(|n| n.to_share()).collect();
        let body = share
            .encode(&serde_json::to_vec(&records).unwrap())
            .unwrap();

        let decoded = decode_share_payload(&share, &body).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].network(), "net");
        assert!(decoded.iter().all(|n| n.supports_crypto()));
    }

    #[test]
    fn share_payload_drops_secretless_records() {
        let share = node("net", "share.test", Role::Share);
        let mut record = node("net", "s1.test", Role::Storage).to_share();
        record.secrets.clear();
        let body = share
            .encode(&serde_json::to_vec(&vec![record]).unwrap())
            .unwrap();
        assert!(decode_share_payload(&share, &body).unwrap().is_empty());
    }

    #[test]
    fn share_payload_rejects_garbage() {
        let share = node("net", "share.test", Role::Share);
        assert!(decode_share_payload(&share, b"not sealed").is_err());
    }
}

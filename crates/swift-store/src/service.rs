//! Background refresh of the storage manager.
//!
//! The service holds the originally configured stores and periodically
//! builds a fresh manager from them. The live manager is an `Arc` behind a
//! lock taken only for the pointer swap; in-flight requests keep whatever
//! snapshot they started with.

use std::sync::Arc;

use parking_lot::RwLock;
use swift_core::Configuration;
use swift_ring::{Node, Nodes};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::manager::StorageManager;
use crate::{Store, StoreError};

/// Storage manager holder with periodic rebuild.
pub struct StorageService {
    config: Configuration,
    stores: Vec<Arc<dyn Store>>,
    manager: RwLock<Arc<StorageManager>>,
}

impl StorageService {
    /// Builds the initial manager and wraps it for refresh.
    pub async fn new(
        config: Configuration,
        stores: Vec<Arc<dyn Store>>,
    ) -> Result<Arc<Self>, StoreError> {
        let manager = StorageManager::new(&config, stores.clone()).await?;
        Ok(Arc::new(Self {
            config,
            stores,
            manager: RwLock::new(Arc::new(manager)),
        }))
    }

    /// The current manager snapshot.
    pub fn manager(&self) -> Arc<StorageManager> {
        self.manager.read().clone()
    }

    /// The configuration the service was built with.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Rebuilds the manager from the configured stores and swaps it in.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        let fresh = StorageManager::new(&self.config, self.stores.clone()).await?;
        *self.manager.write() = Arc::new(fresh);
        Ok(())
    }

    /// Spawns the refresh ticker. Dropping the handle leaves the task
    /// running; abort it to stop refreshing.
    pub fn spawn_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.config.refresh_interval());
            // The first tick fires immediately and the initial manager
            // already exists.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match service.refresh().await {
                    Ok(()) => info!("storage manager refreshed"),
                    Err(e) => warn!(error = %e, "storage manager refresh failed"),
                }
            }
        })
    }

    /// The node for a domain.
    pub fn get_node(&self, domain: &str) -> Option<Arc<Node>> {
        self.manager().get_node(domain)
    }

    /// The network collection for a network name.
    pub fn get_nodes(&self, network: &str) -> Option<Arc<Nodes>> {
        self.manager().get_nodes(network)
    }

    /// Every known node.
    pub fn get_all_nodes(&self) -> Vec<Arc<Node>> {
        self.manager().get_all_nodes()
    }

    /// Every alive node whose start time has passed.
    pub fn get_all_active_nodes(&self) -> Vec<Arc<Node>> {
        self.manager().get_all_active_nodes()
    }

    /// A random active access node for the network.
    pub fn get_access_node(&self, network: &str) -> Option<String> {
        self.manager().get_access_node(network)
    }

    /// Names of the writable stores.
    pub fn store_names(&self) -> Vec<String> {
        self.manager().store_names()
    }

    /// Writes nodes through to the matching writable store.
    pub fn set_nodes(&self, store_name: &str, nodes: Vec<Node>) -> Result<(), StoreError> {
        self.manager().set_nodes(store_name, nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volatile::Volatile;
    use swift_core::Secret;
    use swift_ring::Role;
    use time::{Duration, OffsetDateTime};

    fn node(domain: &str) -> Node {
        let now = OffsetDateTime::now_utc();
        let mut n = Node::new(
            "net",
            domain,
            now,
            now - Duration::hours(1),
            now + Duration::days(30),
            Role::Storage,
            "",
            "",
        )
        .unwrap();
        n.add_secret(Secret::new_random().unwrap());
        n
    }

    #[tokio::test]
    async fn snapshot_survives_refresh() {
        let store: Arc<dyn Store> =
            Arc::new(Volatile::with_nodes("main", false, vec![node("a.test")]));
        let service = StorageService::new(Configuration::default(), vec![store])
            .await
            .unwrap();

        let before = service.manager();
        // Writes land in the backing store; the old snapshot is untouched
        // until a refresh builds a new manager.
        service.set_nodes("", vec![node("b.test")]).unwrap();
        assert!(before.get_node("b.test").is_none());

        let fresh = StorageManager::new(service.config(), service.stores.clone())
            .await
            .unwrap();
        assert!(fresh.get_node("b.test").is_some());
    }
}

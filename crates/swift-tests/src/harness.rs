//! In-process network construction.

use std::sync::Arc;

use swift_core::{Configuration, Secret};
use swift_net::{AccessFixed, DefaultPages, Services};
use swift_ring::{Node, Role};
use swift_store::{StorageService, Store, Volatile};
use time::{Duration, OffsetDateTime};

/// The access key the harness authorises.
pub const TEST_ACCESS_KEY: &str = "test-access-key";

/// A complete in-process network: storage nodes, one access node and one
/// share node, all in a single volatile store.
pub struct TestNetwork {
    /// The services bundle every handler receives.
    pub services: Arc<Services>,
    /// The backing storage service.
    pub store: Arc<StorageService>,
    /// Network name the nodes share.
    pub network: String,
}

impl TestNetwork {
    /// Builds a network with the given number of storage nodes, named
    /// `s1.test` .. `sN.test`, plus `access.test` and `share.test`.
    pub async fn with_storage_nodes(count: usize) -> Self {
        Self::build(count, Configuration {
            scheme: "http".to_owned(),
            debug: true,
            ..Default::default()
        })
        .await
    }

    /// Builds a network with a custom configuration.
    pub async fn build(count: usize, config: Configuration) -> Self {
        let network = "testnet".to_owned();
        let store = Volatile::new("main", false);
        for i in 1..=count {
            store
                .set_node(make_node(&network, &format!("s{i}.test"), Role::Storage))
                .expect("writable store");
        }
        store
            .set_node(make_node(&network, "access.test", Role::Access))
            .expect("writable store");
        store
            .set_node(make_node(&network, "share.test", Role::Share))
            .expect("writable store");

        let stores: Vec<Arc<dyn Store>> = vec![Arc::new(store)];
        let storage = StorageService::new(config.clone(), stores)
            .await
            .expect("storage service");
        let services = Services::new(
            config,
            storage.clone(),
            Arc::new(AccessFixed::new(vec![TEST_ACCESS_KEY.to_owned()])),
            Arc::new(DefaultPages),
        );

        Self {
            services,
            store: storage,
            network,
        }
    }

    /// The node registered for a domain.
    pub fn node(&self, domain: &str) -> Arc<Node> {
        self.store.get_node(domain).expect("node registered")
    }

    /// Domains of the storage nodes, in name order.
    pub fn storage_domains(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .store
            .get_all_nodes()
            .iter()
            .filter(|n| n.role() == Role::Storage)
            .map(|n| n.domain().to_owned())
            .collect();
        out.sort();
        out
    }

    /// The home node the network assigns to a client address.
    pub fn home_domain(&self, client_ip: &str) -> String {
        self.store
            .get_nodes(&self.network)
            .expect("network known")
            .get_home_node(client_ip, "")
            .expect("home node")
            .domain()
            .to_owned()
    }
}

/// A node with an open window, a scrambler and one secret.
pub fn make_node(network: &str, domain: &str, role: Role) -> Node {
    let now = OffsetDateTime::now_utc();
    let scrambler = Secret::new_random().expect("scrambler");
    let mut node = Node::new(
        network,
        domain,
        now,
        now - Duration::hours(1),
        now + Duration::days(30),
        role,
        &scrambler.key,
        "",
    )
    .expect("node");
    node.add_secret(Secret::new_random().expect("secret"));
    node
}

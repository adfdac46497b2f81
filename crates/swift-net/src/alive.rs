//! Background liveness polling.
//!
//! Every polling interval, each node that has not proved reachable within
//! the interval gets a sealed random nonce posted to its alive endpoint.
//! Echoing the plaintext marks it alive. The client keeps no connections
//! warm: polls are rare, tiny, and must not exhaust the host's sockets.

use std::sync::Arc;
use std::time::Duration;

use swift_core::random_bytes;
use swift_ring::Node;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::Services;

/// Size of the liveness nonce.
const NONCE_SIZE: usize = 32;

/// Spawns the alive poller. Abort the handle to stop polling.
pub fn spawn_alive(services: Arc<Services>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = services.config.alive_polling_interval();
        let client = match poll_client(interval) {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "alive poller could not build a client");
                return;
            }
        };
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            for node in services.store.get_all_nodes() {
                poll_node(&services, &client, &node, interval).await;
            }
        }
    })
}

/// Keep-alives off, no compression, one connection per host, short
/// per-phase timeouts. An alive node answers quickly.
fn poll_client(interval: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_gzip()
        .http1_only()
        .connect_timeout(Duration::from_secs(1))
        .timeout(interval)
        .build()
}

/// Polls one node when it has gone unobserved for a full interval.
async fn poll_node(
    services: &Arc<Services>,
    client: &reqwest::Client,
    node: &Arc<Node>,
    interval: Duration,
) {
    let idle = time::OffsetDateTime::now_utc() - node.accessed();
    if idle < interval {
        return;
    }

    let nonce = random_bytes(NONCE_SIZE);
    let sealed = match node.encode(&nonce) {
        Ok(b) => b,
        Err(e) => {
            if services.config.debug {
                debug!(domain = %node.domain(), error = %e, "could not seal alive nonce");
            }
            node.set_alive(false);
            return;
        }
    };

    match call_alive(services, client, node, sealed).await {
        Ok(echoed) if echoed == nonce => node.mark_accessed(),
        Ok(_) => {
            if services.config.debug {
                debug!(domain = %node.domain(), "alive echo mismatch");
            }
            node.set_alive(false);
        }
        Err(e) => {
            if services.config.debug {
                debug!(domain = %node.domain(), error = %e, "alive check failed");
            }
            node.set_alive(false);
        }
    }
}

async fn call_alive(
    services: &Arc<Services>,
    client: &reqwest::Client,
    node: &Arc<Node>,
    body: Vec<u8>,
) -> Result<Vec<u8>, reqwest::Error> {
    let url = format!(
        "{}://{}/swift/api/v1/alive",
        services.config.scheme,
        node.domain()
    );
    let response = client.post(&url).body(body).send().await?;
    Ok(response.bytes().await?.to_vec())
}

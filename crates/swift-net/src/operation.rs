//! Per-request operation state.
//!
//! Wraps the persisted [`Operation`] payload with everything a single hop
//! needs: the current node, the network snapshot, harvested cookie pairs
//! and the conflict-resolved values. Strictly ordered per hop: harvest,
//! resolve, select the next node, write cookies, respond.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use swift_proto::pair::{resolve_conflict, Pair, PairError};
use swift_proto::results::{ResultPair, Results, ResultsError};
use swift_proto::{Operation, OperationError};
use swift_ring::{Node, NodeError, Role};
use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time, UtcOffset};
use tracing::debug;

use crate::request::RequestInfo;
use crate::Services;

/// Attempts at a random intermediate node before settling for the home
/// node.
const NEXT_NODE_ATTEMPTS: usize = 10;

/// Lifetime of the `t` probe cookie.
const PROBE_COOKIE_SECONDS: u64 = 60;

/// Errors raised while binding an operation to a request and steering it.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The request host is not a registered node.
    #[error("'{0}' is not a registered node")]
    UnknownHost(String),

    /// The URL path did not carry the table and operation segments.
    #[error("path '{0}' contains insufficient segments")]
    BadPath(String),

    /// The node's network is not in the store.
    #[error("network '{0}' unknown")]
    NoNetwork(String),

    /// The operation blob failed base64 decoding.
    #[error("operation segment base64 failure")]
    Base64(#[from] base64::DecodeError),

    /// Node-level sealing or scrambling failure.
    #[error("operation node failure")]
    Node(#[from] NodeError),

    /// The operation payload failed to decode.
    #[error("operation payload failure")]
    Operation(#[from] OperationError),

    /// Conflict resolution failed.
    #[error("operation pair failure")]
    Pair(#[from] PairError),

    /// No node could serve as the home node.
    #[error("no home node available")]
    NoHomeNode,

    /// No node could be selected as the next hop.
    #[error("no next node available")]
    NoNextNode,

    /// The operation carried no usable access node for sealing results.
    #[error("no access node provided for '{0}'")]
    NoAccessNode(String),

    /// The results payload failed to encode.
    #[error("operation results failure")]
    Results(#[from] ResultsError),
}

/// A storage operation bound to the request being served.
pub struct OperationContext {
    /// The persisted operation state.
    pub op: Operation,
    /// The logical key space, unscrambled for this node.
    pub table: String,
    /// The node serving the request.
    pub this_node: Arc<Node>,
    /// The selected next hop, when one exists.
    pub next_node: Option<Arc<Node>>,
    /// Pairs recovered from this node's cookies.
    pub cookie_pairs: Vec<Pair>,
    /// The pairs after conflict resolution, one per operation pair.
    pub resolved: Vec<Pair>,
    /// The request fields the hop consumed.
    pub request: RequestInfo,
    services: Arc<Services>,
    network: Arc<swift_ring::Nodes>,
    home_node: Option<Arc<Node>>,
}

impl OperationContext {
    /// Binds an inbound hop request: resolves the node by host, decodes
    /// the operation from the last path segment, unscrambles the table
    /// from the one before it, counts the hop and harvests cookies.
    pub fn from_request(
        services: Arc<Services>,
        request: RequestInfo,
    ) -> Result<Self, ContextError> {
        let this_node = services
            .store
            .get_node(&request.host)
            .ok_or_else(|| ContextError::UnknownHost(request.host.clone()))?;

        let segments: Vec<&str> = request.path.split('/').collect();
        if segments.len() < 2 {
            return Err(ContextError::BadPath(request.path.clone()));
        }
        let blob = URL_SAFE_NO_PAD.decode(segments[segments.len() - 1])?;
        let bytes = this_node.decode(&blob)?;
        let op = Operation::from_bytes(&bytes)?;
        let table = this_node.unscramble(segments[segments.len() - 2])?;

        Self::bind(services, this_node, op, table, request)
    }

    /// Binds an already-decoded operation to a node, for the share path
    /// and tests.
    pub fn from_byte_array(
        services: Arc<Services>,
        this_node: Arc<Node>,
        table: String,
        bytes: &[u8],
        request: RequestInfo,
    ) -> Result<Self, ContextError> {
        let op = Operation::from_bytes(bytes)?;
        Self::bind(services, this_node, op, table, request)
    }

    fn bind(
        services: Arc<Services>,
        this_node: Arc<Node>,
        mut op: Operation,
        table: String,
        request: RequestInfo,
    ) -> Result<Self, ContextError> {
        let network = services
            .store
            .get_nodes(this_node.network())
            .ok_or_else(|| ContextError::NoNetwork(this_node.network().to_owned()))?;

        op.nodes_visited = op.nodes_visited.saturating_add(1);

        // Harvest this node's cookie copy of each pair and resolve any
        // conflict with the operation's copy. A corrupt cookie is dropped,
        // never fatal.
        let mut cookie_pairs = Vec::with_capacity(op.pairs.len());
        let mut resolved = Vec::with_capacity(op.pairs.len());
        for p in &op.pairs {
            let name = this_node.scramble(&p.key)?;
            let mut r = p.clone();
            if let Some(value) = request.cookie(&name) {
                if !value.is_empty() {
                    match this_node.decode_cookie_value(value) {
                        Ok(cookie_pair) => {
                            r = resolve_conflict(Some(p), Some(&cookie_pair))?;
                            cookie_pairs.push(cookie_pair);
                        }
                        Err(e) => {
                            if services.config.debug {
                                debug!(key = %p.key, error = %e, "ignoring corrupt cookie");
                            }
                        }
                    }
                }
            }
            resolved.push(r);
        }

        Ok(Self {
            op,
            table,
            this_node,
            next_node: None,
            cookie_pairs,
            resolved,
            request,
            services,
            network,
            home_node: None,
        })
    }

    /// True while the operation is inside its lifetime window.
    pub fn is_time_stamp_valid(&self) -> bool {
        self.op
            .is_time_stamp_valid(self.services.config.storage_operation_timeout())
    }

    /// The home node for the browser: the persisted domain when it
    /// resolves, otherwise the network's first active node as a stable
    /// default.
    pub fn home_node(&mut self) -> Result<Arc<Node>, ContextError> {
        if self.home_node.is_none() {
            if !self.op.home_node.is_empty() {
                self.home_node = self.services.store.get_node(&self.op.home_node);
            }
            if self.home_node.is_none() {
                self.home_node = self.network.active().first().cloned();
            }
        }
        self.home_node.clone().ok_or(ContextError::NoHomeNode)
    }

    /// Selects the next hop when more nodes remain and the operation is
    /// still alive. The penultimate hop always returns to the home node so
    /// it finishes with the most current copy.
    pub fn select_next_node(&mut self) -> Result<(), ContextError> {
        if self.op.nodes_visited >= self.op.node_count || !self.is_time_stamp_valid() {
            return Ok(());
        }

        if self.op.nodes_visited == self.op.node_count - 1 {
            self.next_node = Some(self.home_node()?);
        }

        if self.next_node.is_none() {
            let home = self.home_node()?;
            for _ in 0..NEXT_NODE_ATTEMPTS {
                let candidate = self
                    .network
                    .get_random_node(|n| n.role() == Role::Storage)
                    .cloned();
                match candidate {
                    Some(n)
                        if n.domain() != self.this_node.domain()
                            && n.domain() != home.domain()
                            && n.has_started() =>
                    {
                        self.next_node = Some(n);
                        break;
                    }
                    Some(_) => continue,
                    None => break,
                }
            }
        }

        if self.next_node.is_none() {
            self.next_node = Some(self.home_node()?);
        }

        match self.next_node {
            Some(_) => Ok(()),
            None => Err(ContextError::NoNextNode),
        }
    }

    /// True when the bounce ends at this node: it bounced back to itself
    /// after at least two hops, or the hop budget is spent.
    pub fn done(&self) -> bool {
        match &self.next_node {
            Some(next) => {
                (next.domain() == self.this_node.domain() && self.op.nodes_visited >= 2)
                    || self.op.node_count == self.op.nodes_visited
            }
            None => true,
        }
    }

    /// The cookie pair harvested for a key, if any.
    pub fn cookie_pair(&self, key: &str) -> Option<&Pair> {
        self.cookie_pairs.iter().find(|c| c.key == key)
    }

    /// True when this node's cookies are complete and fresh enough that
    /// the rest of the network need not be consulted. A missing cookie
    /// only disqualifies when its resolved pair actually holds values.
    pub fn cookies_valid(&self) -> bool {
        let now = OffsetDateTime::now_utc();
        let mut earliest = now;
        for p in &self.resolved {
            match self.cookie_pair(&p.key) {
                Some(c) => {
                    if c.cookie_write_time != OffsetDateTime::UNIX_EPOCH
                        && c.cookie_write_time < earliest
                    {
                        earliest = c.cookie_write_time;
                    }
                }
                None => {
                    if !p.is_empty() {
                        return false;
                    }
                }
            }
        }
        if self.resolved.iter().all(Pair::is_empty) {
            return false;
        }
        now - earliest < self.services.config.home_node_timeout()
    }

    /// Builds the `Set-Cookie` values for this hop: one cookie per
    /// resolved non-empty pair, or the one-minute `t` probe when nothing
    /// was written and the request carried no cookies at all.
    pub fn cookie_headers(&mut self) -> Result<Vec<String>, ContextError> {
        let now = OffsetDateTime::now_utc();
        let secure = self.services.config.scheme == "https";
        let path = format!("/{}", self.this_node.scramble(&self.table)?);
        let domain = if self.this_node.cookie_domain().is_empty() {
            self.request.host_without_port().to_owned()
        } else {
            self.this_node.cookie_domain().to_owned()
        };

        let mut headers = Vec::new();
        for p in &mut self.resolved {
            if p.is_empty() {
                continue;
            }
            let name = self.this_node.scramble(&p.key)?;
            let value = self.this_node.encode_cookie_value(p, now)?;
            p.cookie_write_time = now;
            headers.push(cookie_header(
                &name,
                &value,
                &domain,
                &path,
                date_to_instant(p.expires),
                secure,
            ));
        }

        if headers.is_empty() && !self.request.has_cookies() {
            headers.push(cookie_header(
                "t",
                "",
                &domain,
                "/",
                now + std::time::Duration::from_secs(PROBE_COOKIE_SECONDS),
                secure,
            ));
        }
        Ok(headers)
    }

    /// The URL of the next hop:
    /// `scheme://next/<scramble(table)>/<base64url(next.encode(operation))>`.
    /// The resolved pairs and this node's domain travel in the payload.
    pub fn next_url(&mut self) -> Result<String, ContextError> {
        let next = self.next_node.clone().ok_or(ContextError::NoNextNode)?;
        let mut out = self.op.clone();
        out.pairs = self.resolved.clone();
        out.prev_node = self.this_node.domain().to_owned();
        let sealed = next.encode(&out.to_bytes()?)?;
        let table = next.scramble(&self.table)?;
        Ok(format!(
            "{}://{}/{}/{}",
            self.services.config.scheme,
            next.domain(),
            table,
            URL_SAFE_NO_PAD.encode(sealed)
        ))
    }

    /// The sealed results blob: resolved pairs packed, sealed by the
    /// access node and base64url encoded for appending to the return URL.
    pub fn results(&self) -> Result<String, ContextError> {
        if self.op.access_node.is_empty() {
            return Err(ContextError::NoAccessNode(String::new()));
        }
        let access = self
            .services
            .store
            .get_node(&self.op.access_node)
            .ok_or_else(|| ContextError::NoAccessNode(self.op.access_node.clone()))?;

        let results = Results {
            expires: OffsetDateTime::now_utc()
                + self.services.config.storage_operation_timeout(),
            state: self.op.state.clone(),
            html: self.op.html.clone(),
            pairs: self
                .resolved
                .iter()
                .map(|p| ResultPair {
                    key: p.key.clone(),
                    created: p.created.date(),
                    expires: p.expires,
                    values: p.values.clone(),
                })
                .collect(),
        };
        let sealed = access.encode(&results.to_bytes()?)?;
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// The return URL with the sealed results appended.
    pub fn return_url_with_results(&self) -> Result<String, ContextError> {
        Ok(format!("{}{}", self.op.return_url, self.results()?))
    }

    /// Restarts the bounce at the home node after a cookie warning: hop
    /// counter reset, timestamp refreshed, next node forced home.
    pub fn reset_for_warning(&mut self) -> Result<(), ContextError> {
        self.next_node = Some(self.home_node()?);
        self.op.nodes_visited = 0;
        self.op.time_stamp = OffsetDateTime::now_utc();
        Ok(())
    }

    /// The network snapshot the hop is using.
    pub fn network(&self) -> &Arc<swift_ring::Nodes> {
        &self.network
    }
}

/// Cookie `Expires` attribute format.
const COOKIE_DATE: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

fn date_to_instant(d: Date) -> OffsetDateTime {
    OffsetDateTime::new_in_offset(d, Time::MIDNIGHT, UtcOffset::UTC)
}

fn cookie_header(
    name: &str,
    value: &str,
    domain: &str,
    path: &str,
    expires: OffsetDateTime,
    secure: bool,
) -> String {
    let expires = expires
        .to_offset(UtcOffset::UTC)
        .format(COOKIE_DATE)
        .unwrap_or_default();
    let mut header = format!(
        "{name}={value}; Domain={domain}; Path={path}; Expires={expires}; HttpOnly"
    );
    if secure {
        header.push_str("; Secure; SameSite=None");
    } else {
        header.push_str("; SameSite=Lax");
    }
    header
}

#[cfg(test)]
mod context_tests {
    use super::*;
    use crate::access::AccessFixed;
    use crate::pages::DefaultPages;
    use crate::Services;
    use swift_core::{Configuration, Secret};
    use swift_proto::pair::Conflict;
    use swift_store::{StorageService, Store, Volatile};
    use time::macros::date;

    fn make_node(domain: &str, role: Role) -> Node {
        let now = OffsetDateTime::now_utc();
        let scrambler = Secret::new_random().unwrap();
        let mut n = Node::new(
            "testnet",
            domain,
            now,
            now - time::Duration::hours(1),
            now + time::Duration::days(30),
            role,
            &scrambler.key,
            "",
        )
        .unwrap();
        n.add_secret(Secret::new_random().unwrap());
        n
    }

    async fn services(storage: usize) -> Arc<Services> {
        let store = Volatile::new("main", false);
        for i in 1..=storage {
            store
                .set_node(make_node(&format!("s{i}.test"), Role::Storage))
                .unwrap();
        }
        store
            .set_node(make_node("access.test", Role::Access))
            .unwrap();
        let stores: Vec<Arc<dyn Store>> = vec![Arc::new(store)];
        let config = Configuration {
            scheme: "http".to_owned(),
            ..Default::default()
        };
        let storage = StorageService::new(config.clone(), stores).await.unwrap();
        Services::new(
            config,
            storage,
            Arc::new(AccessFixed::new(Vec::new())),
            Arc::new(DefaultPages),
        )
    }

    fn make_operation(node_count: u8, values: &[&[u8]]) -> Operation {
        let mut op = Operation::new();
        op.access_node = "access.test".to_owned();
        op.return_url = "http://caller.test/done?d=".to_owned();
        op.node_count = node_count;
        op.home_node = "s1.test".to_owned();
        op.pairs.push(Pair {
            key: "x".to_owned(),
            conflict: Conflict::Newest,
            created: OffsetDateTime::now_utc(),
            expires: date!(2099 - 12 - 31),
            values: values.iter().map(|v| v.to_vec()).collect(),
            cookie_write_time: OffsetDateTime::UNIX_EPOCH,
        });
        op
    }

    fn hop_request(services: &Arc<Services>, host: &str, table: &str, op: &Operation) -> RequestInfo {
        let node = services.store.get_node(host).unwrap();
        let sealed = node.encode(&op.to_bytes().unwrap()).unwrap();
        RequestInfo {
            host: host.to_owned(),
            path: format!(
                "/{}/{}",
                node.scramble(table).unwrap(),
                URL_SAFE_NO_PAD.encode(sealed)
            ),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn binds_request_and_counts_the_hop() {
        let services = services(2).await;
        let op = make_operation(3, &[b"hello"]);
        let info = hop_request(&services, "s1.test", "prefs", &op);

        let ctx = OperationContext::from_request(services.clone(), info).unwrap();
        assert_eq!(ctx.op.nodes_visited, 1);
        assert_eq!(ctx.table, "prefs");
        assert_eq!(ctx.this_node.domain(), "s1.test");
        assert_eq!(ctx.resolved.len(), 1);
        assert_eq!(ctx.resolved[0].values, vec![b"hello".to_vec()]);
        assert!(ctx.cookie_pairs.is_empty());
    }

    #[tokio::test]
    async fn unknown_host_rejected() {
        let services = services(1).await;
        let info = RequestInfo {
            host: "stranger.test".to_owned(),
            path: "/t/blob".to_owned(),
            ..Default::default()
        };
        assert!(matches!(
            OperationContext::from_request(services, info),
            Err(ContextError::UnknownHost(_))
        ));
    }

    #[tokio::test]
    async fn cookie_harvest_resolves_against_operation() {
        let services = services(1).await;
        let node = services.store.get_node("s1.test").unwrap();

        let op = make_operation(1, &[b"hello"]);
        let newer = Pair {
            key: "x".to_owned(),
            conflict: Conflict::Newest,
            created: OffsetDateTime::now_utc() + time::Duration::seconds(30),
            expires: date!(2099 - 12 - 31),
            values: vec![b"world".to_vec()],
            cookie_write_time: OffsetDateTime::UNIX_EPOCH,
        };
        let cookie_value = node
            .encode_cookie_value(&newer, OffsetDateTime::now_utc())
            .unwrap();

        let mut info = hop_request(&services, "s1.test", "prefs", &op);
        info.cookies = vec![(node.scramble("x").unwrap(), cookie_value)];

        let ctx = OperationContext::from_request(services, info).unwrap();
        assert_eq!(ctx.cookie_pairs.len(), 1);
        assert_eq!(ctx.resolved[0].values, vec![b"world".to_vec()]);
    }

    #[tokio::test]
    async fn corrupt_cookie_is_dropped() {
        let services = services(1).await;
        let node = services.store.get_node("s1.test").unwrap();
        let op = make_operation(1, &[b"hello"]);

        let mut info = hop_request(&services, "s1.test", "prefs", &op);
        info.cookies = vec![(node.scramble("x").unwrap(), "corrupt!".to_owned())];

        let ctx = OperationContext::from_request(services, info).unwrap();
        assert!(ctx.cookie_pairs.is_empty());
        assert_eq!(ctx.resolved[0].values, vec![b"hello".to_vec()]);
    }

    #[tokio::test]
    async fn penultimate_hop_returns_home() {
        let services = services(3).await;
        let mut op = make_operation(3, &[b"hello"]);
        op.nodes_visited = 1; // bind makes it 2, the penultimate hop
        let info = hop_request(&services, "s2.test", "prefs", &op);

        let mut ctx = OperationContext::from_request(services, info).unwrap();
        ctx.select_next_node().unwrap();
        assert_eq!(
            ctx.next_node.as_ref().map(|n| n.domain().to_owned()),
            Some("s1.test".to_owned())
        );
        assert!(!ctx.done());
    }

    #[tokio::test]
    async fn exhausted_hop_budget_is_done() {
        let services = services(2).await;
        let mut op = make_operation(2, &[b"hello"]);
        op.nodes_visited = 1;
        let info = hop_request(&services, "s1.test", "prefs", &op);

        let mut ctx = OperationContext::from_request(services, info).unwrap();
        ctx.select_next_node().unwrap();
        assert!(ctx.next_node.is_none());
        assert!(ctx.done());
    }

    #[tokio::test]
    async fn intermediate_hop_avoids_this_and_home() {
        let services = services(5).await;
        let op = make_operation(4, &[b"hello"]);
        let info = hop_request(&services, "s2.test", "prefs", &op);

        let mut ctx = OperationContext::from_request(services, info).unwrap();
        ctx.select_next_node().unwrap();
        let next = ctx.next_node.as_ref().unwrap().domain().to_owned();
        assert_ne!(next, "s2.test");
        assert_ne!(next, "s1.test");
    }

    #[tokio::test]
    async fn next_url_round_trips_through_the_next_node() {
        let services = services(3).await;
        let op = make_operation(3, &[b"hello"]);
        let info = hop_request(&services, "s2.test", "prefs", &op);

        let mut ctx = OperationContext::from_request(services.clone(), info).unwrap();
        ctx.select_next_node().unwrap();
        let url = ctx.next_url().unwrap();

        let next = ctx.next_node.as_ref().unwrap();
        let rest = url.strip_prefix("http://").unwrap();
        let (host, path) = rest.split_once('/').unwrap();
        assert_eq!(host, next.domain());

        let segments: Vec<&str> = path.split('/').collect();
        let blob = URL_SAFE_NO_PAD.decode(segments[segments.len() - 1]).unwrap();
        let bytes = next.decode(&blob).unwrap();
        let carried = Operation::from_bytes(&bytes).unwrap();
        assert_eq!(carried.nodes_visited, 2);
        assert_eq!(carried.prev_node, "s2.test");
        assert_eq!(carried.pairs[0].values, vec![b"hello".to_vec()]);
        assert_eq!(
            next.unscramble(segments[segments.len() - 2]).unwrap(),
            "prefs"
        );
    }

    #[tokio::test]
    async fn cookies_valid_requires_fresh_complete_cookies() {
        let services = services(1).await;
        let node = services.store.get_node("s1.test").unwrap();
        let op = make_operation(1, &[b"hello"]);

        // No cookie at all for a non-empty pair: invalid.
        let info = hop_request(&services, "s1.test", "prefs", &op);
        let ctx = OperationContext::from_request(services.clone(), info).unwrap();
        assert!(!ctx.cookies_valid());

        // A fresh cookie makes the hop valid.
        let stored = Pair {
            key: "x".to_owned(),
            conflict: Conflict::Newest,
            created: OffsetDateTime::now_utc(),
            expires: date!(2099 - 12 - 31),
            values: vec![b"hello".to_vec()],
            cookie_write_time: OffsetDateTime::UNIX_EPOCH,
        };
        let fresh = node
            .encode_cookie_value(&stored, OffsetDateTime::now_utc())
            .unwrap();
        let mut info = hop_request(&services, "s1.test", "prefs", &op);
        info.cookies = vec![(node.scramble("x").unwrap(), fresh)];
        let ctx = OperationContext::from_request(services.clone(), info).unwrap();
        assert!(ctx.cookies_valid());

        // A stale cookie write time invalidates the fast path.
        let stale = node
            .encode_cookie_value(
                &stored,
                OffsetDateTime::now_utc() - time::Duration::days(30),
            )
            .unwrap();
        let mut info = hop_request(&services, "s1.test", "prefs", &op);
        info.cookies = vec![(node.scramble("x").unwrap(), stale)];
        let ctx = OperationContext::from_request(services, info).unwrap();
        assert!(!ctx.cookies_valid());
    }

    #[tokio::test]
    async fn cookie_headers_skip_empty_pairs_and_probe_when_bare() {
        let services = services(1).await;

        // Empty pair, no request cookies: only the probe is written.
        let op = make_operation(1, &[]);
        let info = hop_request(&services, "s1.test", "prefs", &op);
        let mut ctx = OperationContext::from_request(services.clone(), info).unwrap();
        let headers = ctx.cookie_headers().unwrap();
        assert_eq!(headers.len(), 1);
        assert!(headers[0].starts_with("t=;"));
        assert!(headers[0].contains("Path=/;"));

        // A valued pair writes its cookie and no probe.
        let op = make_operation(1, &[b"hello"]);
        let info = hop_request(&services, "s1.test", "prefs", &op);
        let mut ctx = OperationContext::from_request(services, info).unwrap();
        let headers = ctx.cookie_headers().unwrap();
        assert_eq!(headers.len(), 1);
        assert!(!headers[0].starts_with("t=;"));
        assert!(headers[0].contains("HttpOnly"));
    }

    #[tokio::test]
    async fn results_seal_for_the_access_node() {
        let services = services(1).await;
        let op = make_operation(1, &[b"hello"]);
        let info = hop_request(&services, "s1.test", "prefs", &op);
        let ctx = OperationContext::from_request(services.clone(), info).unwrap();

        let url = ctx.return_url_with_results().unwrap();
        let blob = url.strip_prefix("http://caller.test/done?d=").unwrap();
        let sealed = URL_SAFE_NO_PAD.decode(blob).unwrap();
        let access = services.store.get_node("access.test").unwrap();
        let results = access.decode_as_results(&sealed).unwrap();
        assert!(results.is_time_stamp_valid());
        assert_eq!(results.pairs[0].key, "x");
        assert_eq!(results.pairs[0].values, vec![b"hello".to_vec()]);
    }
}

//! End-to-end bounce scenarios over an in-process network.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use swift_net::handler_create::create;
use swift_proto::pair::{Conflict, Pair};
use swift_proto::Operation;
use swift_tests::harness::{TestNetwork, TEST_ACCESS_KEY};
use swift_tests::{Browser, HopOutcome};
use time::macros::date;
use time::{Duration, OffsetDateTime};

const CLIENT_IP: &str = "203.0.113.5";
const RETURN_URL: &str = "http://caller.test/done?d=";

fn form(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut out = vec![
        ("accessKey".to_owned(), TEST_ACCESS_KEY.to_owned()),
        ("table".to_owned(), "prefs".to_owned()),
        ("returnUrl".to_owned(), RETURN_URL.to_owned()),
    ];
    out.extend(
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned())),
    );
    out
}

fn start_url(net: &TestNetwork, extra: &[(&str, &str)]) -> String {
    create(&net.services, "access.test", &form(extra), CLIENT_IP, "").expect("create URL")
}

fn decode_results(net: &TestNetwork, destination: &str) -> swift_proto::Results {
    let blob = destination.strip_prefix(RETURN_URL).expect("return prefix");
    let sealed = URL_SAFE_NO_PAD.decode(blob).expect("results base64");
    net.node("access.test")
        .decode_as_results(&sealed)
        .expect("results decode")
}

/// Plants a pair cookie on every storage node, as if an earlier bounce
/// had stored it there.
fn seed_cookie(net: &TestNetwork, browser: &mut Browser, pair: &Pair, write_time: OffsetDateTime) {
    for domain in net.storage_domains() {
        let node = net.node(&domain);
        let name = node.scramble(&pair.key).expect("scramble key");
        let value = node.encode_cookie_value(pair, write_time).expect("cookie value");
        let path = format!("/{}", node.scramble("prefs").expect("scramble table"));
        browser.set_cookie(&domain, &name, &value, &path);
    }
}

// S1: a network of one node answers a read probe in a single hop, writes
// no value cookie, and sets the probe cookie.
#[tokio::test]
async fn single_node_read_through() {
    let net = TestNetwork::with_storage_nodes(1).await;
    let url = start_url(&net, &[("x+", "")]);
    let home = net.home_domain(CLIENT_IP);

    let mut browser = Browser::new();
    let (hops, outcome) = browser.run_bounce(&net.services, &url, 5).await;

    assert_eq!(hops, 1);
    let HopOutcome::Complete { destination } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    let results = decode_results(&net, &destination);
    assert_eq!(results.pairs.len(), 1);
    assert_eq!(results.pairs[0].key, "x");
    assert!(results.pairs[0].values.is_empty());
    assert!(results.is_time_stamp_valid());

    // No value cookie, just the probe.
    assert_eq!(browser.cookie_names(&home), vec!["t".to_owned()]);
}

// S2: a three-hop write leaves a decodable cookie on the home node and
// returns the stored value in the sealed results.
#[tokio::test]
async fn three_hop_write() {
    let net = TestNetwork::with_storage_nodes(4).await;
    let url = start_url(&net, &[("nodeCount", "3"), ("x>2099-12-31", "hello")]);
    let home = net.home_domain(CLIENT_IP);

    let mut browser = Browser::new();
    let started = OffsetDateTime::now_utc();
    let (hops, outcome) = browser.run_bounce(&net.services, &url, 5).await;

    assert_eq!(hops, 3, "a nodeCount=3 bounce issues exactly three GETs");
    let HopOutcome::Complete { destination } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    let results = decode_results(&net, &destination);
    assert_eq!(results.pairs[0].values, vec![b"hello".to_vec()]);

    // The home node's cookie decodes back to the pair with a fresh write
    // time.
    let home_node = net.node(&home);
    let name = home_node.scramble("x").expect("scramble");
    let value = browser.cookie(&home, &name).expect("home cookie");
    let pair = home_node.decode_cookie_value(value).expect("cookie decode");
    assert_eq!(pair.key, "x");
    assert_eq!(pair.values, vec![b"hello".to_vec()]);
    assert_eq!(pair.conflict, Conflict::Newest);
    assert!(pair.cookie_write_time >= started - Duration::seconds(1));
}

// S3: a newer cookie value beats the operation's older value under
// newest-wins, and the winner is carried to the results.
#[tokio::test]
async fn conflict_newest_wins() {
    let net = TestNetwork::with_storage_nodes(3).await;
    let mut browser = Browser::new();

    let newer = Pair {
        key: "x".to_owned(),
        conflict: Conflict::Newest,
        created: OffsetDateTime::now_utc() + Duration::seconds(5),
        expires: date!(2099 - 12 - 31),
        values: vec![b"world".to_vec()],
        cookie_write_time: OffsetDateTime::UNIX_EPOCH,
    };
    seed_cookie(&net, &mut browser, &newer, OffsetDateTime::now_utc());

    let url = start_url(
        &net,
        &[
            ("nodeCount", "3"),
            ("useHomeNode", "false"),
            ("x>2099-12-31", "hello"),
        ],
    );
    let (_, outcome) = browser.run_bounce(&net.services, &url, 5).await;
    let HopOutcome::Complete { destination } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    let results = decode_results(&net, &destination);
    assert_eq!(results.pairs[0].values, vec![b"world".to_vec()]);
}

// S4: add-merge unions the operation's and the cookies' values, keeping
// the operation's values first.
#[tokio::test]
async fn conflict_add_merges_distinct_values() {
    let net = TestNetwork::with_storage_nodes(3).await;
    let mut browser = Browser::new();

    let stored = Pair {
        key: "x".to_owned(),
        conflict: Conflict::Add,
        created: OffsetDateTime::now_utc() - Duration::hours(1),
        expires: date!(2098 - 06 - 30),
        values: vec![b"b".to_vec()],
        cookie_write_time: OffsetDateTime::UNIX_EPOCH,
    };
    seed_cookie(&net, &mut browser, &stored, OffsetDateTime::now_utc());

    let url = start_url(
        &net,
        &[
            ("nodeCount", "3"),
            ("useHomeNode", "false"),
            ("x+2099-12-31", "a"),
        ],
    );
    let (_, outcome) = browser.run_bounce(&net.services, &url, 5).await;
    let HopOutcome::Complete { destination } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    let results = decode_results(&net, &destination);
    assert_eq!(
        results.pairs[0].values,
        vec![b"a".to_vec(), b"b".to_vec()],
        "distinct union, operation values first"
    );
    // Merged pairs keep the later expiry.
    assert_eq!(results.pairs[0].expires, date!(2099 - 12 - 31));
}

// S5: a browser that blocks cookies reaches the final hop empty handed
// and gets the warning page whose retry link restarts the bounce at the
// home node.
#[tokio::test]
async fn cookie_warning_restarts_at_home() {
    let net = TestNetwork::with_storage_nodes(3).await;
    let url = start_url(&net, &[("nodeCount", "2"), ("x>2099-12-31", "hello")]);
    let home = net.home_domain(CLIENT_IP);

    let mut browser = Browser::rejecting_cookies();
    let (hops, outcome) = browser.run_bounce(&net.services, &url, 5).await;

    assert_eq!(hops, 2);
    let HopOutcome::Warning { retry_url } = outcome else {
        panic!("expected the warning page, got {outcome:?}");
    };

    // The retry link targets the home node with a reset hop counter.
    let rest = retry_url.strip_prefix("http://").expect("scheme");
    let (host, path) = rest.split_once('/').expect("path");
    assert_eq!(host, home);

    let segments: Vec<&str> = path.split('/').collect();
    let blob = URL_SAFE_NO_PAD
        .decode(segments[segments.len() - 1])
        .expect("blob base64");
    let bytes = net.node(&home).decode(&blob).expect("node decode");
    let op = Operation::from_bytes(&bytes).expect("operation decode");
    assert_eq!(op.nodes_visited, 0);
    assert!(op.is_time_stamp_valid(std::time::Duration::from_secs(60)));
}

// S9 (property 9): with fresh home cookies and useHomeNode set, a second
// operation is answered by the home node alone.
#[tokio::test]
async fn home_node_answers_alone_when_cookies_fresh() {
    let net = TestNetwork::with_storage_nodes(3).await;

    let mut browser = Browser::new();
    let write_url = start_url(&net, &[("nodeCount", "3"), ("x>2099-12-31", "hello")]);
    let (_, outcome) = browser.run_bounce(&net.services, &write_url, 5).await;
    assert!(matches!(outcome, HopOutcome::Complete { .. }));

    // Read probe with the same browser: one hop, value answered from the
    // home node's cookie.
    let read_url = start_url(&net, &[("nodeCount", "3"), ("x>", "")]);
    let (hops, outcome) = browser.run_bounce(&net.services, &read_url, 5).await;
    assert_eq!(hops, 1, "home node must answer alone");
    let HopOutcome::Complete { destination } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    let results = decode_results(&net, &destination);
    assert_eq!(results.pairs[0].values, vec![b"hello".to_vec()]);
}

// A corrupted operation blob gets the styled bad-request page, not a bare
// error.
#[tokio::test]
async fn corrupt_operation_blob_renders_malformed_page() {
    let net = TestNetwork::with_storage_nodes(2).await;
    let home = net.home_domain(CLIENT_IP);

    let mut browser = Browser::new();
    let url = format!("http://{home}/sometable/not-a-real-blob");
    let (status, outcome) = browser.get(&net.services, &url).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(outcome, HopOutcome::Malformed);
}

// Passive liveness: the hop after the first proves the previous node
// served its page.
#[tokio::test]
async fn bounce_marks_previous_node_alive() {
    let net = TestNetwork::with_storage_nodes(4).await;
    let home = net.home_domain(CLIENT_IP);
    assert!(!net.node(&home).alive());

    let url = start_url(&net, &[("nodeCount", "3"), ("x>2099-12-31", "hello")]);
    let mut browser = Browser::new();
    browser.run_bounce(&net.services, &url, 5).await;

    // The second hop carried prevNode=home and marked it alive.
    assert!(net.node(&home).alive());
}

// Independently constructed networks with the same domains agree on the
// home node for every client (property 5 at network level; the hash
// depends only on the domain names).
#[tokio::test]
async fn independent_networks_agree_on_home_node() {
    let a = TestNetwork::with_storage_nodes(5).await;
    let b = TestNetwork::with_storage_nodes(5).await;
    for ip in ["203.0.113.1", "198.51.100.9", "192.0.2.33", CLIENT_IP] {
        assert_eq!(a.home_domain(ip), b.home_domain(ip), "disagreement for {ip}");
    }
}

//! A scripted browser for driving bounces in process.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use flate2::read::GzDecoder;
use swift_net::handler_store::handle_store;
use swift_net::Services;

/// What one hop answered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HopOutcome {
    /// A bounce page pointing at the next node.
    Continue {
        /// URL of the next hop.
        next_url: String,
    },
    /// The bounce finished; the browser is sent to the return URL with
    /// the sealed results appended.
    Complete {
        /// The full destination URL.
        destination: String,
    },
    /// The cookies-disabled warning with its retry link.
    Warning {
        /// URL that restarts the bounce.
        retry_url: String,
    },
    /// The styled bad-request page.
    Malformed,
}

#[derive(Debug, Clone)]
struct StoredCookie {
    name: String,
    value: String,
    path: String,
}

/// A cookie-keeping browser that requests hop pages directly against the
/// store handler.
pub struct Browser {
    cookies: HashMap<String, Vec<StoredCookie>>,
    accept_cookies: bool,
}

impl Default for Browser {
    fn default() -> Self {
        Self::new()
    }
}

impl Browser {
    /// A browser that accepts cookies.
    pub fn new() -> Self {
        Self {
            cookies: HashMap::new(),
            accept_cookies: true,
        }
    }

    /// A browser with cookies disabled.
    pub fn rejecting_cookies() -> Self {
        Self {
            cookies: HashMap::new(),
            accept_cookies: false,
        }
    }

    /// Plants a cookie as if a previous visit had set it.
    pub fn set_cookie(&mut self, domain: &str, name: &str, value: &str, path: &str) {
        self.store_cookie(
            domain,
            StoredCookie {
                name: name.to_owned(),
                value: value.to_owned(),
                path: path.to_owned(),
            },
        );
    }

    /// The stored cookie value for a domain and name, if any.
    pub fn cookie(&self, domain: &str, name: &str) -> Option<&str> {
        self.cookies
            .get(domain)?
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// Cookie names stored for a domain.
    pub fn cookie_names(&self, domain: &str) -> Vec<String> {
        self.cookies
            .get(domain)
            .map(|v| v.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Performs one hop GET and classifies the response.
    pub async fn get(&mut self, services: &Arc<Services>, url: &str) -> (StatusCode, HopOutcome) {
        let (host, path) = split_url(url);

        let mut builder = Request::builder()
            .method("GET")
            .uri(path.clone())
            .header(header::HOST, host.clone());
        let cookie_header = self.cookie_header(&host, &path);
        if !cookie_header.is_empty() {
            builder = builder.header(header::COOKIE, cookie_header);
        }
        let request = builder.body(Body::empty()).expect("request");

        let response = handle_store(State(services.clone()), request).await;
        let status = response.status();
        self.absorb_cookies(&host, &response);

        let body = read_body(response).await;
        (status, classify(services, &body))
    }

    /// Follows continue pages until the bounce completes, warns or dies.
    pub async fn run_bounce(
        &mut self,
        services: &Arc<Services>,
        start_url: &str,
        max_hops: usize,
    ) -> (usize, HopOutcome) {
        let mut url = start_url.to_owned();
        for hop in 1..=max_hops {
            let (status, outcome) = self.get(services, &url).await;
            assert_eq!(status, StatusCode::OK, "hop {hop} to {url} failed");
            match outcome {
                HopOutcome::Continue { next_url } => url = next_url,
                other => return (hop, other),
            }
        }
        panic!("bounce did not finish within {max_hops} hops");
    }

    fn cookie_header(&self, domain: &str, path: &str) -> String {
        let Some(cookies) = self.cookies.get(domain) else {
            return String::new();
        };
        cookies
            .iter()
            .filter(|c| path.starts_with(&c.path) || c.path == "/")
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn absorb_cookies(&mut self, domain: &str, response: &Response) {
        if !self.accept_cookies {
            return;
        }
        for value in response.headers().get_all(header::SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let mut parts = raw.split(';');
            let Some((name, value)) = parts.next().and_then(|p| p.trim().split_once('=')) else {
                continue;
            };
            let mut path = "/".to_owned();
            for attr in parts {
                if let Some((k, v)) = attr.trim().split_once('=') {
                    if k.eq_ignore_ascii_case("path") {
                        path = v.to_owned();
                    }
                }
            }
            self.store_cookie(
                domain,
                StoredCookie {
                    name: name.to_owned(),
                    value: value.to_owned(),
                    path,
                },
            );
        }
    }

    fn store_cookie(&mut self, domain: &str, cookie: StoredCookie) {
        let jar = self.cookies.entry(domain.to_owned()).or_default();
        jar.retain(|c| !(c.name == cookie.name && c.path == cookie.path));
        jar.push(cookie);
    }
}

/// Splits `scheme://host/path` into host and `/path`.
fn split_url(url: &str) -> (String, String) {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url);
    match rest.split_once('/') {
        Some((host, path)) => (host.to_owned(), format!("/{path}")),
        None => (rest.to_owned(), "/".to_owned()),
    }
}

async fn read_body(response: Response) -> String {
    let gzipped = response
        .headers()
        .get(header::CONTENT_ENCODING)
        .map(|v| v == "gzip")
        .unwrap_or(false);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    if gzipped {
        let mut out = String::new();
        GzDecoder::new(bytes.as_ref())
            .read_to_string(&mut out)
            .expect("gunzip");
        out
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn classify(services: &Arc<Services>, body: &str) -> HopOutcome {
    if body.contains("Bad Request") {
        return HopOutcome::Malformed;
    }
    if body.contains("cookies which your browser is blocking") {
        let retry_url = extract(body, "href=\"", "\"").map(unescape).unwrap_or_default();
        return HopOutcome::Warning { retry_url };
    }
    let url = extract(body, "0;URL=", "\"")
        .map(unescape)
        .or_else(|| extract(body, "s.src='", "'").map(str::to_owned))
        .or_else(|| extract(body, "Complete('", "'").map(str::to_owned));
    match url {
        Some(url) => {
            let (host, _) = split_url(&url);
            if services.store.get_node(&host).is_some() {
                HopOutcome::Continue { next_url: url }
            } else {
                HopOutcome::Complete { destination: url }
            }
        }
        None => HopOutcome::Complete {
            destination: String::new(),
        },
    }
}

fn extract<'a>(body: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = body.find(start)? + start.len();
    let len = body[from..].find(end)?;
    Some(&body[from..from + len])
}

fn unescape(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

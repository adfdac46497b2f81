//! Request parsing helpers shared by the handlers.

use axum::extract::Request;
use axum::http::header;

use crate::error::HandlerError;

/// The request fields the operation state machine consumes.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    /// Host header value, including any port.
    pub host: String,
    /// URL path.
    pub path: String,
    /// Cookies as received, name to value.
    pub cookies: Vec<(String, String)>,
    /// First language tag of `Accept-Language`, possibly empty.
    pub language: String,
    /// `X-Forwarded-For` header value, possibly empty.
    pub forwarded_for: String,
}

impl RequestInfo {
    /// Extracts the fields from a request without consuming it.
    pub fn from_request(req: &Request) -> Self {
        let host = header_value(req, header::HOST)
            .map(str::to_owned)
            .or_else(|| req.uri().authority().map(|a| a.to_string()))
            .unwrap_or_default();
        Self {
            host,
            path: req.uri().path().to_owned(),
            cookies: parse_cookies(header_value(req, header::COOKIE).unwrap_or("")),
            language: first_language(header_value(req, header::ACCEPT_LANGUAGE).unwrap_or("")),
            forwarded_for: header_value(req, "x-forwarded-for")
                .unwrap_or("")
                .to_owned(),
        }
    }

    /// The cookie value for a name, if the request carried it.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// True when the request carried any cookie at all.
    pub fn has_cookies(&self) -> bool {
        !self.cookies.is_empty()
    }

    /// The host with any port stripped, for cookie domains.
    pub fn host_without_port(&self) -> &str {
        self.host.split(':').next().unwrap_or("")
    }
}

fn header_value<'a, K>(req: &'a Request, name: K) -> Option<&'a str>
where
    K: axum::http::header::AsHeaderName,
{
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Splits a `Cookie` header into name/value pairs. Values keep any `=`
/// they contain, which base64 cookie values do.
fn parse_cookies(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|part| {
            let part = part.trim();
            let (name, value) = part.split_once('=')?;
            if name.is_empty() {
                return None;
            }
            Some((name.to_owned(), value.to_owned()))
        })
        .collect()
}

/// The first language tag of an `Accept-Language` value.
fn first_language(header: &str) -> String {
    header
        .split([';', ','])
        .next()
        .unwrap_or("")
        .trim()
        .to_owned()
}

/// Decodes URL-encoded form pairs from the query string and, for POST
/// bodies, the body bytes. Mirrors the usual server behaviour of merging
/// both sources.
pub async fn form_pairs(req: Request) -> Result<Vec<(String, String)>, HandlerError> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    if let Some(q) = req.uri().query() {
        pairs.extend(decode_pairs(q.as_bytes())?);
    }
    let body = axum::body::to_bytes(req.into_body(), 1024 * 1024)
        .await
        .map_err(|e| HandlerError::Validation(e.to_string()))?;
    if !body.is_empty() {
        pairs.extend(decode_pairs(&body)?);
    }
    Ok(pairs)
}

fn decode_pairs(raw: &[u8]) -> Result<Vec<(String, String)>, HandlerError> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(raw)
        .map_err(|e| HandlerError::Validation(format!("form decode failed: {e}")))
}

/// The first value for a form key.
pub fn form_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Every value for a form key, in order.
pub fn form_values<'a>(pairs: &'a [(String, String)], key: &str) -> Vec<&'a str> {
    pairs
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_parsing_keeps_equals_in_values() {
        let cookies = parse_cookies("a=one; b=QUJD=; t=");
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies[1], ("b".to_owned(), "QUJD=".to_owned()));
        assert_eq!(cookies[2], ("t".to_owned(), "".to_owned()));
    }

    #[test]
    fn language_takes_first_tag() {
        assert_eq!(first_language("en-GB,en;q=0.9"), "en-GB");
        assert_eq!(first_language(""), "");
    }

    #[test]
    fn form_value_lookup() {
        let pairs = vec![
            ("state".to_owned(), "one".to_owned()),
            ("state".to_owned(), "two".to_owned()),
            ("table".to_owned(), "t".to_owned()),
        ];
        assert_eq!(form_value(&pairs, "table"), Some("t"));
        assert_eq!(form_values(&pairs, "state"), vec!["one", "two"]);
        assert_eq!(form_value(&pairs, "missing"), None);
    }
}

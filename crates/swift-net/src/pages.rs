//! Response pages and shared response plumbing.
//!
//! The real user-interface templates live outside the core; handlers only
//! decide which page class is sent and what model it receives. The
//! [`PageRenderer`] capability carries that boundary, and [`DefaultPages`]
//! renders minimal, valid markup for each class.
//!
//! Every HTML body goes out gzip-compressed with `Cache-Control: no-cache`,
//! exactly as the hop pages require.

use std::io::Write;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::HandlerError;

/// Model handed to the bounce page templates.
#[derive(Debug, Clone, Default)]
pub struct PageModel {
    /// Window title.
    pub title: String,
    /// Message to display.
    pub message: String,
    /// Page background colour.
    pub background_color: String,
    /// Message text colour.
    pub message_color: String,
    /// Progress indicator colour.
    pub progress_color: String,
    /// Bounce progress, 0 to 100.
    pub percentage: u8,
    /// Where the page sends the browser next. Empty when the page does
    /// not navigate.
    pub next_url: String,
    /// Origin for `postMessage` completion.
    pub return_url: String,
    /// Sealed results for `postMessage` completion.
    pub results: String,
    /// Language tag from the request, possibly empty.
    pub language: String,
}

/// Model handed to the registration template.
#[derive(Debug, Clone, Default)]
pub struct RegisterModel {
    /// Store the node will be written to.
    pub store: String,
    /// Names of the writable stores on offer.
    pub store_names: Vec<String>,
    /// The enrolling domain.
    pub domain: String,
    /// Chosen network name.
    pub network: String,
    /// Start date as `YYYY-MM-DD`.
    pub starts: String,
    /// Expiry date as `YYYY-MM-DD`.
    pub expires: String,
    /// Numeric role.
    pub role: u8,
    /// Cookie domain for the node.
    pub cookie_domain: String,
    /// Whether a first secret will be created.
    pub secret: bool,
    /// Whether a scrambler will be created.
    pub scramble: bool,
    /// Field errors keyed by field name.
    pub errors: Vec<(String, String)>,
    /// True once the registration is stored.
    pub read_only: bool,
    /// Page background colour.
    pub background_color: String,
    /// Message text colour.
    pub message_color: String,
}

/// Capability that renders the page classes the protocol sends.
pub trait PageRenderer: Send + Sync {
    /// Progress page shown between hops.
    fn progress(&self, m: &PageModel) -> String;
    /// Invisible page that immediately navigates on.
    fn blank(&self, m: &PageModel) -> String;
    /// Cookies-disabled warning with a retry link.
    fn warning(&self, m: &PageModel) -> String;
    /// Page that posts the sealed results to the opener.
    fn post_message(&self, m: &PageModel) -> String;
    /// Styled page for a corrupted operation.
    fn malformed(&self, m: &PageModel) -> String;
    /// Node enrolment form.
    fn register(&self, m: &RegisterModel) -> String;
}

/// Minimal renderer used when the hosting service brings no templates.
#[derive(Debug, Default)]
pub struct DefaultPages;

fn head(m: &PageModel, extra: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"{}\"><head><meta charset=\"utf-8\"><title>{}</title>{extra}</head>",
        escape(&m.language),
        escape(&m.title),
    )
}

fn refresh(url: &str) -> String {
    if url.is_empty() {
        String::new()
    } else {
        format!(
            "<meta http-equiv=\"refresh\" content=\"0;URL={}\">",
            escape(url)
        )
    }
}

impl PageRenderer for DefaultPages {
    fn progress(&self, m: &PageModel) -> String {
        format!(
            "{}<body style=\"background-color:{}\"><p style=\"color:{}\">{} {}%</p></body></html>",
            head(m, &refresh(&m.next_url)),
            escape(&m.background_color),
            escape(&m.message_color),
            escape(&m.message),
            m.percentage,
        )
    }

    fn blank(&self, m: &PageModel) -> String {
        format!(
            "{}<body style=\"background-color:{}\"></body></html>",
            head(m, &refresh(&m.next_url)),
            escape(&m.background_color),
        )
    }

    fn warning(&self, m: &PageModel) -> String {
        format!(
            "{}<body style=\"background-color:{}\"><p style=\"color:{}\">This site relies on \
             cookies which your browser is blocking. Enable cookies, then retry.</p>\
             <a href=\"{}\">Retry</a></body></html>",
            head(m, ""),
            escape(&m.background_color),
            escape(&m.message_color),
            escape(&m.next_url),
        )
    }

    fn post_message(&self, m: &PageModel) -> String {
        format!(
            "{}<body><script>window.opener.postMessage('{}','{}');window.close();</script></body></html>",
            head(m, ""),
            js_escape(&m.results),
            js_escape(&m.return_url),
        )
    }

    fn malformed(&self, m: &PageModel) -> String {
        format!(
            "{}<body style=\"background-color:{}\"><p style=\"color:{}\">Bad Request</p></body></html>",
            head(m, ""),
            escape(&m.background_color),
            escape(&m.message_color),
        )
    }

    fn register(&self, m: &RegisterModel) -> String {
        let mut fields = String::new();
        for (field, error) in &m.errors {
            fields.push_str(&format!(
                "<p class=\"error\">{}: {}</p>",
                escape(field),
                escape(error)
            ));
        }
        if m.read_only {
            fields.push_str("<p>Domain registered.</p>");
        }
        format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Register {}</title></head>\
             <body style=\"background-color:{}\">{fields}\
             <form method=\"POST\">\
             <input name=\"network\" value=\"{}\">\
             <input name=\"store\" value=\"{}\">\
             <input name=\"starts\" value=\"{}\">\
             <input name=\"expires\" value=\"{}\">\
             <input name=\"role\" value=\"{}\">\
             <input name=\"cookieDomain\" value=\"{}\">\
             <input name=\"secret\" value=\"{}\">\
             <input name=\"scramble\" value=\"{}\">\
             <button type=\"submit\">Register</button></form></body></html>",
            escape(&m.domain),
            escape(&m.background_color),
            escape(&m.network),
            escape(&m.store),
            escape(&m.starts),
            escape(&m.expires),
            m.role,
            escape(&m.cookie_domain),
            m.secret,
            m.scramble,
        )
    }
}

/// Escapes text for interpolation into HTML.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes text for interpolation into a single-quoted JS string.
fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Compresses a response body with gzip.
pub fn gzip(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut z = GzEncoder::new(Vec::new(), Compression::default());
    z.write_all(body)?;
    z.finish()
}

/// Builds a gzip HTML response with the hop page headers and cookies.
pub fn html_response(
    status: StatusCode,
    body: &str,
    cookies: &[String],
    extra_headers: &[(&'static str, String)],
) -> Result<Response, HandlerError> {
    body_response(
        status,
        "text/html; charset=utf-8",
        body.as_bytes(),
        cookies,
        extra_headers,
    )
}

/// Builds a gzip JavaScript response.
pub fn js_response(
    status: StatusCode,
    body: &str,
    cookies: &[String],
    extra_headers: &[(&'static str, String)],
) -> Result<Response, HandlerError> {
    body_response(
        status,
        "application/javascript; charset=utf-8",
        body.as_bytes(),
        cookies,
        extra_headers,
    )
}

/// Builds a gzip plain-text response.
pub fn text_response(status: StatusCode, body: &str) -> Result<Response, HandlerError> {
    body_response(status, "text/plain; charset=utf-8", body.as_bytes(), &[], &[])
}

fn body_response(
    status: StatusCode,
    content_type: &str,
    body: &[u8],
    cookies: &[String],
    extra_headers: &[(&'static str, String)],
) -> Result<Response, HandlerError> {
    let compressed = gzip(body)?;
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_ENCODING, "gzip")
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-cache");
    for c in cookies {
        builder = builder.header(header::SET_COOKIE, c.as_str());
    }
    for (name, value) in extra_headers {
        builder = builder.header(*name, value.as_str());
    }
    builder
        .body(Body::from(compressed))
        .map_err(|e| HandlerError::Internal(e.to_string()))
}

/// Builds an uncompressed binary response.
pub fn octet_response(body: Vec<u8>) -> Result<Response, HandlerError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from(body))
        .map_err(|e| HandlerError::Internal(e.to_string()))
}

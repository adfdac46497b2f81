//! Access-node operation creation.
//!
//! Builds the initial bounce URL from the caller's form fields. Each key
//! carries its conflict policy and expiry in a mini-grammar:
//! `name<OP>YYYY-MM-DD` with `+` add, `<` oldest wins, `>` newest wins. A
//! key with no date is a read-only probe.

use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use swift_proto::pair::{Conflict, Pair};
use swift_proto::Operation;
use swift_ring::{Node, Role};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::HandlerError;
use crate::pages::text_response;
use crate::request::{form_pairs, form_value, form_values};
use crate::Services;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Form keys with meaning to the protocol; everything else is a pair.
const RESERVED: &[&str] = &[
    "accessKey",
    "accessNode",
    "returnUrl",
    "table",
    "state",
    "nodeCount",
    "postMessageOnComplete",
    "displayUserInterface",
    "useHomeNode",
    "javaScript",
    "title",
    "message",
    "backgroundColor",
    "messageColor",
    "progressColor",
    "X-FORWARDED-FOR",
    "remoteAddr",
];

/// Handles `/swift/api/v1/create`: answers with the starting URL for the
/// bounce as plain text.
pub async fn handle_store_creation(
    services: Arc<Services>,
    req: Request,
) -> Result<Response, HandlerError> {
    let info = crate::request::RequestInfo::from_request(&req);
    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|c| c.0.to_string())
        .unwrap_or_default();
    let form = form_pairs(req).await?;

    if !services
        .access
        .allowed(form_value(&form, "accessKey").unwrap_or(""))
    {
        return Err(HandlerError::AccessDenied);
    }

    let url = create(&services, &info.host, &form, &info.forwarded_for, &remote_addr)?;
    text_response(StatusCode::OK, &url)
}

/// Axum entry point.
pub async fn handle_create(State(services): State<Arc<Services>>, req: Request) -> Response {
    match handle_store_creation(services, req).await {
        Ok(r) => r,
        Err(e) => e.into_response(),
    }
}

/// Builds the storage operation URL for the access node `host` from the
/// caller's form fields.
pub fn create(
    services: &Arc<Services>,
    host: &str,
    form: &[(String, String)],
    header_xff: &str,
    header_remote: &str,
) -> Result<String, HandlerError> {
    let access = services
        .store
        .get_node(host)
        .ok_or_else(|| HandlerError::WrongNode(host.to_owned(), "registered"))?;
    if access.role() != Role::Access {
        return Err(HandlerError::WrongNode(host.to_owned(), "access"));
    }
    let network = services
        .store
        .get_nodes(access.network())
        .ok_or_else(|| HandlerError::Internal(format!("network '{}' unknown", access.network())))?;

    let mut op = Operation::new();
    op.access_node = resolve_access_node(services, &access, form_value(form, "accessNode"))?;
    op.state = form_values(form, "state")
        .into_iter()
        .map(str::to_owned)
        .collect();

    // Clamp the hop budget to the ring.
    let requested = match form_value(form, "nodeCount") {
        Some(v) => v
            .parse::<u8>()
            .map_err(|_| HandlerError::Validation(format!("node count '{v}' invalid")))?,
        None => services.config.node_count,
    };
    let ring_size = network.ring().len().min(u8::MAX as usize) as u8;
    op.node_count = requested.clamp(1, ring_size.max(1));

    op.html.post_message_on_complete = form_value(form, "postMessageOnComplete") == Some("true");
    op.html.display_user_interface = form_value(form, "displayUserInterface") != Some("false");
    op.html.use_home_node = form_value(form, "useHomeNode") != Some("false");
    op.html.java_script = form_value(form, "javaScript") == Some("true");

    op.return_url = validated_return_url(form_value(form, "returnUrl").unwrap_or(""))?;

    let table = form_value(form, "table").unwrap_or("").to_owned();
    if table.is_empty() {
        return Err(HandlerError::Validation("missing table name".to_owned()));
    }

    op.html.title = defaulted(form_value(form, "title"), &services.config.title);
    op.html.message = defaulted(form_value(form, "message"), &services.config.message);
    op.html.background_color = defaulted(
        form_value(form, "backgroundColor"),
        &services.config.background_color,
    );
    op.html.message_color = defaulted(
        form_value(form, "messageColor"),
        &services.config.message_color,
    );
    op.html.progress_color = defaulted(
        form_value(form, "progressColor"),
        &services.config.progress_color,
    );

    for (key, value) in form {
        if RESERVED.contains(&key.as_str()) {
            continue;
        }
        op.pairs.push(create_pair(key, value)?);
    }

    // The caller's application server forwards the client address so the
    // home node is computed for the browser, not for the server.
    let xff = form_value(form, "X-FORWARDED-FOR").unwrap_or(header_xff);
    let remote = form_value(form, "remoteAddr").unwrap_or(header_remote);
    let home = network.get_home_node(xff, remote).map_err(|e| match e {
        swift_ring::RingError::NoHomeNode { .. } => HandlerError::Internal(e.to_string()),
    })?;
    op.home_node = home.domain().to_owned();

    // Emit the starting URL against the home node.
    let table = home.scramble(&table)?;
    let sealed = home.encode(&op.to_bytes()?)?;
    Ok(format!(
        "{}://{}/{}/{}",
        services.config.scheme,
        home.domain(),
        table,
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(sealed)
    ))
}

fn defaulted(value: Option<&str>, fallback: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_owned(),
        _ => fallback.to_owned(),
    }
}

/// The caller may direct the sealed results at a peer access node in the
/// same network. The domain is validated against the store so a bad actor
/// cannot route results to an arbitrary host.
fn resolve_access_node(
    services: &Arc<Services>,
    access: &Arc<Node>,
    requested: Option<&str>,
) -> Result<String, HandlerError> {
    match requested {
        None | Some("") => Ok(access.domain().to_owned()),
        Some(domain) => {
            let node = services.store.get_node(domain).ok_or_else(|| {
                HandlerError::Validation(format!("'{domain}' is not a valid access node"))
            })?;
            if node.network() != access.network() {
                return Err(HandlerError::Validation(format!(
                    "'{domain}' is not an access node for network '{}'",
                    access.network()
                )));
            }
            Ok(node.domain().to_owned())
        }
    }
}

fn validated_return_url(value: &str) -> Result<String, HandlerError> {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .ok_or_else(|| {
            HandlerError::Validation(format!("return URL '{value}' must use http or https"))
        })?;
    let host = rest.split('/').next().unwrap_or("");
    if host.is_empty() {
        return Err(HandlerError::Validation(format!(
            "return URL '{value}' must include a host"
        )));
    }
    Ok(value.to_owned())
}

/// Parses one `name<OP>date=value` form field into a pair.
fn create_pair(key: &str, value: &str) -> Result<Pair, HandlerError> {
    let ops: Vec<usize> = key
        .char_indices()
        .filter(|(_, c)| matches!(c, '+' | '<' | '>'))
        .map(|(i, _)| i)
        .collect();
    let i = match ops.as_slice() {
        [i] => *i,
        [] => {
            return Err(HandlerError::Validation(format!(
                "key '{key}' must include '+' to add the value to a list, or '<' (oldest wins) \
                 or '>' (newest wins), optionally followed by a YYYY-MM-DD expiry date"
            )))
        }
        _ => {
            return Err(HandlerError::Validation(format!(
                "key '{key}' must contain only one '+', '<' or '>' character"
            )))
        }
    };

    let conflict = match key.as_bytes()[i] {
        b'+' => Conflict::Add,
        b'<' => Conflict::Oldest,
        _ => Conflict::Newest,
    };
    let name = &key[..i];
    if name.is_empty() {
        return Err(HandlerError::Validation(format!("key '{key}' has no name")));
    }
    let date_part = &key[i + 1..];

    let now = OffsetDateTime::now_utc();
    let mut pair = Pair {
        key: name.to_owned(),
        conflict,
        ..Pair::default()
    };

    if date_part.is_empty() {
        // Read-only probe: no value travels and the creation time stays
        // at the epoch so any stored copy wins resolution.
        pair.expires = now.date().next_day().unwrap_or_else(|| now.date());
        return Ok(pair);
    }
    pair.created = now;

    let expires = Date::parse(date_part, DATE_FORMAT)
        .map_err(|_| HandlerError::Validation(format!("expiry date '{date_part}' invalid")))?;
    if expires <= now.date() {
        return Err(HandlerError::Validation(format!(
            "key expiry date '{date_part}' must be in the future"
        )));
    }
    pair.expires = expires;

    // Base64 when it decodes, raw UTF-8 otherwise.
    pair.values = vec![STANDARD
        .decode(value)
        .unwrap_or_else(|_| value.as_bytes().to_vec())];
    Ok(pair)
}

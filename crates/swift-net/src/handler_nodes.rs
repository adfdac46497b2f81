//! Debug node listings. Only routed when debug is enabled.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::HandlerError;
use crate::pages::{escape, html_response};
use crate::Services;

fn rfc3339(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_default()
}

/// Handles `/swift/api/v1/nodes`: every known node as JSON.
pub async fn handle_nodes_json(State(services): State<Arc<Services>>) -> Response {
    let mut nodes = services.store.get_all_nodes();
    nodes.sort_by(|a, b| a.domain().cmp(b.domain()));
    let list: Vec<_> = nodes
        .iter()
        .map(|n| {
            json!({
                "network": n.network(),
                "domain": n.domain(),
                "role": n.role() as u8,
                "created": rfc3339(n.created()),
                "starts": rfc3339(n.starts()),
                "expires": rfc3339(n.expires()),
                "alive": n.alive(),
                "accessed": rfc3339(n.accessed()),
            })
        })
        .collect();

    match serde_json::to_vec(&list) {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/json"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            body,
        )
            .into_response(),
        Err(e) => HandlerError::Internal(e.to_string()).into_response(),
    }
}

/// Handles `/swift/nodes`: a plain table of the known nodes.
pub async fn handle_nodes(State(services): State<Arc<Services>>) -> Response {
    let mut nodes = services.store.get_all_nodes();
    nodes.sort_by(|a, b| a.domain().cmp(b.domain()));

    let mut rows = String::new();
    for n in &nodes {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(n.network()),
            escape(n.domain()),
            n.role() as u8,
            n.alive(),
            escape(&rfc3339(n.expires())),
        ));
    }
    let body = format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Nodes</title></head><body>\
         <table><tr><th>Network</th><th>Domain</th><th>Role</th><th>Alive</th><th>Expires</th></tr>\
         {rows}</table></body></html>"
    );
    match html_response(StatusCode::OK, &body, &[], &[]) {
        Ok(r) => r,
        Err(e) => e.into_response(),
    }
}

//! Access-node sealing endpoints: encrypt, decrypt and decode-as-json.
//!
//! Sealing needs no access key, a caller can only protect its own data
//! with it. Unsealing and JSON export reveal pair values, so both demand
//! a valid key.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use swift_ring::{Node, Role};

use crate::error::HandlerError;
use crate::pages::{gzip, octet_response};
use crate::request::{form_pairs, form_value, RequestInfo};
use crate::Services;

/// Handles `/swift/api/v1/encrypt`: seals the caller's bytes with this
/// access node.
pub async fn handle_encrypt(State(services): State<Arc<Services>>, req: Request) -> Response {
    match encrypt(services, req).await {
        Ok(r) => r,
        Err(e) => e.into_response(),
    }
}

async fn encrypt(services: Arc<Services>, req: Request) -> Result<Response, HandlerError> {
    let info = RequestInfo::from_request(&req);
    let form = form_pairs(req).await?;
    let node = access_node(&services, &info.host)?;

    let plain = STANDARD
        .decode(form_value(&form, "plain").unwrap_or(""))
        .map_err(|e| HandlerError::Validation(format!("'plain' not base64: {e}")))?;
    let sealed = node.encode(&plain)?;
    octet_response(sealed)
}

/// Handles `/swift/api/v1/decrypt`: unseals a blob for an authorised
/// caller.
pub async fn handle_decrypt(State(services): State<Arc<Services>>, req: Request) -> Response {
    match decrypt(services, req).await {
        Ok(r) => r,
        Err(e) => e.into_response(),
    }
}

async fn decrypt(services: Arc<Services>, req: Request) -> Result<Response, HandlerError> {
    let info = RequestInfo::from_request(&req);
    let form = form_pairs(req).await?;
    require_access(&services, &form)?;
    let node = access_node(&services, &info.host)?;

    let sealed = STANDARD
        .decode(form_value(&form, "encrypted").unwrap_or(""))
        .map_err(|e| HandlerError::Validation(format!("'encrypted' not base64: {e}")))?;
    let plain = node.decode(&sealed)?;
    octet_response(plain)
}

/// Handles `/swift/api/v1/decode-as-json`: unseals results and exports
/// them as JSON, rejecting expired payloads.
pub async fn handle_decode_as_json(
    State(services): State<Arc<Services>>,
    req: Request,
) -> Response {
    match decode_as_json(services, req).await {
        Ok(r) => r,
        Err(e) => e.into_response(),
    }
}

async fn decode_as_json(services: Arc<Services>, req: Request) -> Result<Response, HandlerError> {
    let info = RequestInfo::from_request(&req);
    let form = form_pairs(req).await?;
    require_access(&services, &form)?;
    let node = access_node(&services, &info.host)?;

    let sealed = STANDARD
        .decode(form_value(&form, "encrypted").unwrap_or(""))
        .map_err(|e| HandlerError::Validation(format!("'encrypted' not base64: {e}")))?;
    let results = node.decode_as_results(&sealed)?;
    if !results.is_time_stamp_valid() {
        return Err(HandlerError::Validation(
            "data expired and can no longer be used".to_owned(),
        ));
    }

    let json =
        serde_json::to_vec(&results).map_err(|e| HandlerError::Internal(e.to_string()))?;
    let compressed = gzip(&json)?;
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_ENCODING, "gzip")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(axum::body::Body::from(compressed))
        .map_err(|e| HandlerError::Internal(e.to_string()))
}

fn access_node(services: &Arc<Services>, host: &str) -> Result<Arc<Node>, HandlerError> {
    let node = services
        .store
        .get_node(host)
        .ok_or_else(|| HandlerError::WrongNode(host.to_owned(), "registered"))?;
    if node.role() != Role::Access {
        return Err(HandlerError::WrongNode(host.to_owned(), "access"));
    }
    Ok(node)
}

fn require_access(
    services: &Arc<Services>,
    form: &[(String, String)],
) -> Result<(), HandlerError> {
    if services
        .access
        .allowed(form_value(form, "accessKey").unwrap_or(""))
    {
        Ok(())
    } else {
        Err(HandlerError::AccessDenied)
    }
}

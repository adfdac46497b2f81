//! Liveness echo endpoint.
//!
//! A peer proves this node is reachable and still holds a shared secret
//! by posting a sealed nonce; the node answers with the plaintext.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};

use crate::error::HandlerError;
use crate::pages::octet_response;
use crate::request::RequestInfo;
use crate::Services;

/// Handles `/swift/api/v1/alive`: decodes the request body with this
/// node's secrets and echoes the plaintext.
pub async fn handle_alive(State(services): State<Arc<Services>>, req: Request) -> Response {
    match alive(services, req).await {
        Ok(r) => r,
        Err(e) => e.into_response(),
    }
}

async fn alive(services: Arc<Services>, req: Request) -> Result<Response, HandlerError> {
    let info = RequestInfo::from_request(&req);
    let node = services
        .store
        .get_node(&info.host)
        .ok_or_else(|| HandlerError::WrongNode(info.host.clone(), "registered"))?;

    let body = axum::body::to_bytes(req.into_body(), 1024 * 1024)
        .await
        .map_err(|e| HandlerError::Validation(e.to_string()))?;
    let plain = node
        .decode(&body)
        .map_err(|_| HandlerError::Validation("bad data".to_owned()))?;
    octet_response(plain)
}

//! Roster sharing endpoint.
//!
//! A share-role node exports every active node it knows as a JSON array,
//! compressed and sealed with its own secret. Peers that hold the share
//! node's secret ingest the roster as a read-only store.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use swift_proto::share::NodeShare;
use swift_ring::Role;

use crate::error::HandlerError;
use crate::pages::octet_response;
use crate::request::RequestInfo;
use crate::Services;

/// Handles `/swift/api/v1/share`.
pub async fn handle_share(State(services): State<Arc<Services>>, req: Request) -> Response {
    match share(services, req).await {
        Ok(r) => r,
        Err(e) => e.into_response(),
    }
}

async fn share(services: Arc<Services>, req: Request) -> Result<Response, HandlerError> {
    let info = RequestInfo::from_request(&req);
    let node = services
        .store
        .get_node(&info.host)
        .ok_or_else(|| HandlerError::WrongNode(info.host.clone(), "registered"))?;
    if node.role() != Role::Share {
        return Err(HandlerError::WrongNode(info.host.clone(), "share"));
    }

    let records: Vec<NodeShare> = services
        .store
        .get_all_active_nodes()
        .iter()
        .map(|n| n.to_share())
        .collect();
    let json =
        serde_json::to_vec(&records).map_err(|e| HandlerError::Internal(e.to_string()))?;
    let sealed = node.encode(&json)?;
    octet_response(sealed)
}

//! Handler error mapping.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use swift_proto::{OperationError, PairError, ResultsError};
use swift_ring::{NodeError, RingError};
use swift_store::StoreError;
use thiserror::Error;

/// Errors a handler can answer a request with.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Malformed caller input.
    #[error("{0}")]
    Validation(String),

    /// The access key was missing or invalid.
    #[error("access denied")]
    AccessDenied,

    /// The host is not a registered node, or has the wrong role for the
    /// endpoint.
    #[error("'{0}' is not a {1} node")]
    WrongNode(String, &'static str),

    /// No next node could be selected for the operation.
    #[error("no next node available")]
    NoNextNode,

    /// Anything the caller cannot fix.
    #[error("internal failure: {0}")]
    Internal(String),
}

impl HandlerError {
    /// The status code this error answers with.
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Validation(_) | HandlerError::WrongNode(..) => StatusCode::BAD_REQUEST,
            HandlerError::AccessDenied => StatusCode::UNAUTHORIZED,
            HandlerError::NoNextNode | HandlerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            ],
            self.to_string(),
        )
            .into_response()
    }
}

impl From<NodeError> for HandlerError {
    fn from(e: NodeError) -> Self {
        HandlerError::Internal(e.to_string())
    }
}

impl From<StoreError> for HandlerError {
    fn from(e: StoreError) -> Self {
        HandlerError::Internal(e.to_string())
    }
}

impl From<RingError> for HandlerError {
    fn from(e: RingError) -> Self {
        HandlerError::Internal(e.to_string())
    }
}

impl From<OperationError> for HandlerError {
    fn from(e: OperationError) -> Self {
        HandlerError::Internal(e.to_string())
    }
}

impl From<PairError> for HandlerError {
    fn from(e: PairError) -> Self {
        HandlerError::Internal(e.to_string())
    }
}

impl From<ResultsError> for HandlerError {
    fn from(e: ResultsError) -> Self {
        HandlerError::Internal(e.to_string())
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(e: std::io::Error) -> Self {
        HandlerError::Internal(e.to_string())
    }
}

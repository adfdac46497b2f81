//! Swift Net - the HTTP surface of a SWIFT node.
//!
//! Provides:
//! - The storage hop handler and its operation state machine
//! - Access-node endpoints: create, encrypt, decrypt, decode-as-json
//! - Node enrolment, roster sharing and liveness endpoints
//! - The background alive poller

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod access;
pub mod alive;
pub mod error;
pub mod handler_alive;
pub mod handler_codec;
pub mod handler_create;
pub mod handler_nodes;
pub mod handler_register;
pub mod handler_share;
pub mod handler_store;
pub mod operation;
pub mod pages;
pub mod request;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use swift_core::Configuration;
use swift_store::StorageService;

pub use access::{Access, AccessFixed};
pub use alive::spawn_alive;
pub use error::HandlerError;
pub use operation::OperationContext;
pub use pages::{DefaultPages, PageModel, PageRenderer};

/// Everything a handler needs to serve a request.
pub struct Services {
    /// Service configuration.
    pub config: Configuration,
    /// Node roster access.
    pub store: Arc<StorageService>,
    /// Access-key authorisation capability.
    pub access: Arc<dyn Access>,
    /// Page rendering capability.
    pub pages: Arc<dyn PageRenderer>,
}

impl Services {
    /// Bundles the services for the handlers.
    pub fn new(
        config: Configuration,
        store: Arc<StorageService>,
        access: Arc<dyn Access>,
        pages: Arc<dyn PageRenderer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            access,
            pages,
        })
    }
}

/// Builds the router for a node. The storage hop is the fallback route
/// because its first path segment is the scrambled table name.
pub fn router(services: Arc<Services>) -> Router {
    let mut r = Router::new()
        .route(
            "/swift/register",
            get(handler_register::handle_register).post(handler_register::handle_register),
        )
        .route("/swift/api/v1/alive", post(handler_alive::handle_alive))
        .route("/swift/api/v1/create", post(handler_create::handle_create))
        .route("/swift/api/v1/encrypt", post(handler_codec::handle_encrypt))
        .route("/swift/api/v1/decrypt", post(handler_codec::handle_decrypt))
        .route(
            "/swift/api/v1/decode-as-json",
            post(handler_codec::handle_decode_as_json),
        )
        .route("/swift/api/v1/share", get(handler_share::handle_share));

    if services.config.debug {
        r = r
            .route("/swift/nodes", get(handler_nodes::handle_nodes))
            .route("/swift/api/v1/nodes", get(handler_nodes::handle_nodes_json));
    }

    r.fallback(handler_store::handle_store).with_state(services)
}

//! Test harness for multi-node SWIFT networks.
//!
//! Builds a whole network in process: one volatile store, one `Services`
//! bundle, and a scripted browser that follows bounce pages and keeps
//! per-domain cookies, so the end-to-end scenarios run without sockets.

pub mod browser;
pub mod harness;

pub use browser::{Browser, HopOutcome};
pub use harness::TestNetwork;

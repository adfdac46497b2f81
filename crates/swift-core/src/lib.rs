//! Swift Core - primitives shared by every crate in the SWIFT workspace.
//!
//! This crate provides:
//! - The framed byte codec used for operation and result payloads
//! - AES-256-GCM sealing with random and fixed nonces
//! - Rotating shared secrets
//! - zlib compression for node-owned blobs
//! - The service configuration model

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod codec;
pub mod compress;
pub mod config;
pub mod crypto;
pub mod secret;

pub use codec::{CodecError, Reader, Writer, DATE_BASE};
pub use compress::{compress, decompress};
pub use config::Configuration;
pub use crypto::{random_bytes, Cipher, CryptoError, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use secret::Secret;

/// Carriage return used to join state elements for transport.
pub const STATE_SEPARATOR: &str = "\r";

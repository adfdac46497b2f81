//! Share-roster JSON records.
//!
//! A share-role node exports its view of the network as a JSON array of
//! these records, compressed and sealed with the share node's own secret.
//! Peers ingest them to bootstrap read-only rosters.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One shared secret inside a [`NodeShare`] record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretShare {
    /// URL-safe base64 key bytes.
    #[serde(rename = "Key")]
    pub key: String,
    /// When the secret was created.
    #[serde(rename = "Timestamp", with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// One node of the roster as published by a share node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeShare {
    /// Network the node belongs to.
    #[serde(rename = "Network")]
    pub network: String,
    /// The node's internet domain.
    #[serde(rename = "Domain")]
    pub domain: String,
    /// When the node first came online.
    #[serde(rename = "Created", with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    /// When the node becomes eligible for operations.
    #[serde(rename = "Starts", with = "time::serde::rfc3339")]
    pub starts: OffsetDateTime,
    /// When the node retires from the network.
    #[serde(rename = "Expires", with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    /// Numeric role: 0 access, 1 storage, 2 share.
    #[serde(rename = "Role")]
    pub role: u8,
    /// Scrambler key, empty when the node does not scramble.
    #[serde(rename = "ScrambleKey")]
    pub scramble_key: String,
    /// Secret history, newest first.
    #[serde(rename = "Secrets")]
    pub secrets: Vec<SecretShare>,
}

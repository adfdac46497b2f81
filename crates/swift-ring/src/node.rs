//! A SWIFT node: an addressable domain participating in a network.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use swift_core::codec::{CodecError, Reader, Writer};
use swift_core::crypto::{CryptoError, NONCE_SIZE};
use swift_core::{compress, decompress, Secret};
use swift_proto::pair::{Pair, PairError};
use swift_proto::results::{Results, ResultsError};
use swift_proto::share::{NodeShare, SecretShare};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;

use crate::hash::hash_value;

/// Errors raised by node-level coding and sealing.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The node has no secrets for the requested operation.
    #[error("no secrets for node '{0}'")]
    NoSecrets(String),

    /// Sealing or opening failed with every secret.
    #[error("node crypto failure")]
    Crypto(#[from] CryptoError),

    /// Compression failure.
    #[error("node compression failure")]
    Compress(#[from] std::io::Error),

    /// A base64 segment could not be decoded.
    #[error("base64 decode failure")]
    Base64(#[from] base64::DecodeError),

    /// A decoded segment was not valid UTF-8.
    #[error("scrambled value was not UTF-8")]
    NotUtf8,

    /// Framed payload failure.
    #[error("node codec failure")]
    Codec(#[from] CodecError),

    /// A cookie's pair payload failed to decode.
    #[error("cookie pair failure")]
    Pair(#[from] PairError),

    /// A results payload failed to decode.
    #[error("results failure")]
    Results(#[from] ResultsError),

    /// The share record carried an unknown role value.
    #[error("role '{0}' invalid")]
    InvalidRole(u8),
}

/// The part a node plays in its network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Role {
    /// Responds to server-initiated access requests.
    Access = 0,
    /// Participates in storage operations.
    Storage = 1,
    /// Publishes the node roster for peer discovery.
    Share = 2,
}

impl Role {
    /// Decodes the numeric role used in share records and forms.
    pub fn from_u8(v: u8) -> Result<Self, NodeError> {
        match v {
            0 => Ok(Role::Access),
            1 => Ok(Role::Storage),
            2 => Ok(Role::Share),
            other => Err(NodeError::InvalidRole(other)),
        }
    }
}

/// A storage, access or share node within a network.
///
/// Nodes are immutable after construction apart from the liveness fields,
/// which are plain atomics so handlers and the poller can update them
/// without locking. A store refresh replaces node objects wholesale.
#[derive(Debug)]
pub struct Node {
    network: String,
    domain: String,
    hash: u64,
    created: OffsetDateTime,
    starts: OffsetDateTime,
    expires: OffsetDateTime,
    role: Role,
    secrets: Vec<Secret>,
    scrambler: Option<Secret>,
    nonce: Vec<u8>,
    cookie_domain: String,
    accessed: AtomicI64,
    alive: AtomicBool,
}

impl Node {
    /// Creates a node. An empty `scramble_key` disables scrambling so the
    /// table and cookie names pass through unchanged.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        network: &str,
        domain: &str,
        created: OffsetDateTime,
        starts: OffsetDateTime,
        expires: OffsetDateTime,
        role: Role,
        scramble_key: &str,
        cookie_domain: &str,
    ) -> Result<Self, NodeError> {
        let scrambler = if scramble_key.is_empty() {
            None
        } else {
            Some(Secret::from_key(scramble_key, created)?)
        };
        let nonce = make_nonce(scrambler.as_ref(), domain.as_bytes());
        Ok(Self {
            network: network.to_owned(),
            domain: domain.to_owned(),
            hash: hash_value(domain),
            created,
            starts,
            expires,
            role,
            secrets: Vec::new(),
            scrambler,
            nonce,
            cookie_domain: cookie_domain.to_owned(),
            accessed: AtomicI64::new(0),
            alive: AtomicBool::new(false),
        })
    }

    /// The network the node belongs to.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// The node's internet domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The node's position on the ring.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// When the node first came online.
    pub fn created(&self) -> OffsetDateTime {
        self.created
    }

    /// When the node becomes eligible as a next hop.
    pub fn starts(&self) -> OffsetDateTime {
        self.starts
    }

    /// When the node retires from the network.
    pub fn expires(&self) -> OffsetDateTime {
        self.expires
    }

    /// The node's role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Domain attribute for cookies, empty to fall back to the request
    /// host.
    pub fn cookie_domain(&self) -> &str {
        &self.cookie_domain
    }

    /// The scrambler key, empty when the node does not scramble.
    pub fn scrambler_key(&self) -> &str {
        self.scrambler.as_ref().map(|s| s.key.as_str()).unwrap_or("")
    }

    /// The secret history, newest first once sorted.
    pub fn secrets(&self) -> &[Secret] {
        &self.secrets
    }

    /// True when the node can seal and open data.
    pub fn supports_crypto(&self) -> bool {
        !self.secrets.is_empty()
    }

    /// Appends a secret to the history.
    pub fn add_secret(&mut self, secret: Secret) {
        self.secrets.push(secret);
    }

    /// Orders the secret history newest first so sealing always uses the
    /// current secret and opening tries the most likely one first.
    pub fn sort_secrets(&mut self) {
        self.secrets
            .sort_by(|a, b| b.time_stamp.cmp(&a.time_stamp));
    }

    /// True while the node's window is open and it has at least one
    /// secret.
    pub fn is_active(&self) -> bool {
        self.expires > OffsetDateTime::now_utc() && self.supports_crypto()
    }

    /// True once the node's start time has passed.
    pub fn has_started(&self) -> bool {
        self.starts <= OffsetDateTime::now_utc()
    }

    /// Whether the node answered its last liveness check.
    pub fn alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Records the outcome of a liveness check.
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Relaxed);
    }

    /// When the node last proved reachable.
    pub fn accessed(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.accessed.load(Ordering::Relaxed))
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    /// Marks the node reachable now.
    pub fn mark_accessed(&self) {
        self.accessed
            .store(OffsetDateTime::now_utc().unix_timestamp(), Ordering::Relaxed);
        self.set_alive(true);
    }

    /// Obfuscates a table or cookie name. Deterministic for a given node
    /// and input because the nonce is fixed, so every visit computes the
    /// same path and cookie names.
    pub fn scramble(&self, s: &str) -> Result<String, NodeError> {
        match &self.scrambler {
            Some(scrambler) => {
                let sealed = scrambler
                    .cipher()
                    .encrypt_with_nonce(s.as_bytes(), &self.nonce)?;
                Ok(URL_SAFE_NO_PAD.encode(sealed))
            }
            None => Ok(s.to_owned()),
        }
    }

    /// Inverts [`Node::scramble`].
    pub fn unscramble(&self, s: &str) -> Result<String, NodeError> {
        match &self.scrambler {
            Some(scrambler) => {
                let sealed = URL_SAFE_NO_PAD.decode(s)?;
                let plain = scrambler.cipher().decrypt(&sealed)?;
                String::from_utf8(plain).map_err(|_| NodeError::NotUtf8)
            }
            None => Ok(s.to_owned()),
        }
    }

    /// Seals bytes with the newest secret.
    pub fn encrypt(&self, d: &[u8]) -> Result<Vec<u8>, NodeError> {
        let secret = self
            .secrets
            .first()
            .ok_or_else(|| NodeError::NoSecrets(self.domain.clone()))?;
        Ok(secret.cipher().encrypt(d)?)
    }

    /// Opens a blob, trying each secret newest first.
    pub fn decrypt(&self, b: &[u8]) -> Result<Vec<u8>, NodeError> {
        if self.secrets.is_empty() {
            return Err(NodeError::NoSecrets(self.domain.clone()));
        }
        for secret in &self.secrets {
            if let Ok(d) = secret.cipher().decrypt(b) {
                return Ok(d);
            }
        }
        Err(NodeError::Crypto(CryptoError::DecryptionFailed))
    }

    /// Compresses and, when the node has secrets, seals bytes ready for a
    /// URL segment, cookie value or HTTP body.
    pub fn encode(&self, b: &[u8]) -> Result<Vec<u8>, NodeError> {
        let compressed = compress(b)?;
        if self.supports_crypto() {
            self.encrypt(&compressed)
        } else {
            Ok(compressed)
        }
    }

    /// Inverts [`Node::encode`].
    pub fn decode(&self, b: &[u8]) -> Result<Vec<u8>, NodeError> {
        let compressed = if self.supports_crypto() {
            self.decrypt(b)?
        } else {
            b.to_vec()
        };
        Ok(decompress(&compressed)?)
    }

    /// Decodes a sealed results payload.
    pub fn decode_as_results(&self, d: &[u8]) -> Result<Results, NodeError> {
        let b = self.decode(d)?;
        Ok(Results::from_bytes(&b)?)
    }

    /// Builds the cookie value for a pair: `time writeTime ‖ pair`, node
    /// encoded, as standard base64.
    pub fn encode_cookie_value(
        &self,
        p: &Pair,
        write_time: OffsetDateTime,
    ) -> Result<String, NodeError> {
        let mut w = Writer::new();
        w.write_time(write_time)?;
        p.write_to(&mut w)?;
        let sealed = self.encode(&w.into_vec())?;
        Ok(STANDARD.encode(sealed))
    }

    /// Recovers the pair held in a cookie value, including the time the
    /// cookie was written.
    pub fn decode_cookie_value(&self, value: &str) -> Result<Pair, NodeError> {
        let sealed = STANDARD.decode(value)?;
        let plain = self.decode(&sealed)?;
        let mut r = Reader::new(&plain);
        let write_time = r.read_time()?;
        let mut pair = Pair::read_from(&mut r)?;
        pair.cookie_write_time = write_time;
        Ok(pair)
    }

    /// Exports the node as a share-roster record.
    pub fn to_share(&self) -> NodeShare {
        NodeShare {
            network: self.network.clone(),
            domain: self.domain.clone(),
            created: self.created,
            starts: self.starts,
            expires: self.expires,
            role: self.role as u8,
            scramble_key: self.scrambler_key().to_owned(),
            secrets: self
                .secrets
                .iter()
                .map(|s| SecretShare {
                    key: s.key.clone(),
                    timestamp: s.time_stamp,
                })
                .collect(),
        }
    }

    /// Rebuilds a node from a share record. Secrets that fail to decode
    /// are dropped; the caller discards nodes left with none.
    pub fn from_share(record: &NodeShare) -> Result<Self, NodeError> {
        let mut node = Node::new(
            &record.network,
            &record.domain,
            record.created,
            record.starts,
            record.expires,
            Role::from_u8(record.role)?,
            &record.scramble_key,
            "",
        )?;
        for s in &record.secrets {
            match Secret::from_key(&s.key, s.timestamp) {
                Ok(secret) => node.add_secret(secret),
                Err(e) => warn!(domain = %record.domain, error = %e, "dropping bad shared secret"),
            }
        }
        node.sort_secrets();
        Ok(node)
    }
}

/// Builds the scrambler's fixed nonce by cycling the domain bytes up to
/// the cipher nonce length. Safe only for the scrambler's deterministic
/// use; never reuse this nonce with other plaintexts.
fn make_nonce(scrambler: Option<&Secret>, domain: &[u8]) -> Vec<u8> {
    if scrambler.is_none() || domain.is_empty() {
        return Vec::new();
    }
    (0..NONCE_SIZE).map(|i| domain[i % domain.len()]).collect()
}

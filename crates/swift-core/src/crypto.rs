//! AES-256-GCM sealing for operation payloads, cookies and rosters.
//!
//! Blobs are framed as `nonce ‖ ciphertext ‖ tag`. Sealing normally uses a
//! fresh random nonce; the fixed-nonce variant exists solely for the node
//! scrambler, where identical input must produce identical output.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Key size for all symmetric operations.
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size.
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size.
pub const TAG_SIZE: usize = 16;

/// Errors raised by sealing and opening.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key was not [`KEY_SIZE`] bytes.
    #[error("invalid key length: expected {KEY_SIZE} bytes, got {0}")]
    InvalidKeyLength(usize),

    /// Caller-supplied nonce was not [`NONCE_SIZE`] bytes.
    #[error("invalid nonce length: expected {NONCE_SIZE} bytes, got {0}")]
    InvalidNonceLength(usize),

    /// Blob shorter than the nonce prefix.
    #[error("blob length {0} shorter than the {NONCE_SIZE} byte nonce")]
    BlobTooShort(usize),

    /// Sealing failed.
    #[error("encryption failed")]
    EncryptionFailed,

    /// Tag verification failed while opening.
    #[error("decryption failed: authentication tag mismatch")]
    DecryptionFailed,
}

/// An AES-256-GCM cipher bound to one 32-byte key.
#[derive(Clone)]
pub struct Cipher {
    gcm: Aes256Gcm,
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

impl Cipher {
    /// Creates a cipher from a 32-byte key.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(key.len()));
        }
        let gcm = Aes256Gcm::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
        Ok(Self { gcm })
    }

    /// Seals the plaintext with a fresh random nonce.
    ///
    /// Returns `nonce ‖ ciphertext ‖ tag`.
    pub fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = random_bytes(NONCE_SIZE);
        self.encrypt_with_nonce(plain, &nonce)
    }

    /// Seals the plaintext with a caller-supplied nonce.
    ///
    /// Repeating the nonce with differing plaintexts under the same key
    /// breaks GCM. Only the scrambler, which always seals the same
    /// plaintext space deterministically, may fix the nonce.
    pub fn encrypt_with_nonce(&self, plain: &[u8], nonce: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if nonce.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonceLength(nonce.len()));
        }
        let sealed = self
            .gcm
            .encrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: plain,
                    aad: &[],
                },
            )
            .map_err(|_| CryptoError::EncryptionFailed)?;
        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Opens a `nonce ‖ ciphertext ‖ tag` blob.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if blob.len() < NONCE_SIZE {
            return Err(CryptoError::BlobTooShort(blob.len()));
        }
        let (nonce, body) = blob.split_at(NONCE_SIZE);
        self.gcm
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: body,
                    aad: &[],
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

/// Returns `len` bytes from the operating system's secure random source.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut b = vec![0u8; len];
    OsRng.fill_bytes(&mut b);
    b
}

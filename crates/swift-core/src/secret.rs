//! Rotating shared secrets.
//!
//! A secret pairs a creation timestamp with a 32-byte key carried as
//! URL-safe base64. Nodes hold an ordered history of secrets so peers can
//! still open blobs sealed before a rotation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use time::OffsetDateTime;

use crate::crypto::{random_bytes, Cipher, CryptoError, KEY_SIZE};

/// A timestamped key and its cipher.
#[derive(Debug, Clone)]
pub struct Secret {
    /// When the secret was created. Orders the rotation history.
    pub time_stamp: OffsetDateTime,
    /// The 32 random key bytes as URL-safe unpadded base64.
    pub key: String,
    cipher: Cipher,
}

impl Secret {
    /// Creates a secret with fresh random key material stamped now.
    pub fn new_random() -> Result<Self, CryptoError> {
        let bytes = random_bytes(KEY_SIZE);
        let cipher = Cipher::new(&bytes)?;
        Ok(Self {
            time_stamp: OffsetDateTime::now_utc(),
            key: URL_SAFE_NO_PAD.encode(bytes),
            cipher,
        })
    }

    /// Rebuilds a secret from a base64 key and its original timestamp.
    pub fn from_key(key: &str, time_stamp: OffsetDateTime) -> Result<Self, CryptoError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(key)
            .map_err(|_| CryptoError::InvalidKeyLength(0))?;
        let cipher = Cipher::new(&bytes)?;
        Ok(Self {
            time_stamp,
            key: key.to_owned(),
            cipher,
        })
    }

    /// The cipher for this secret's key.
    pub fn cipher(&self) -> &Cipher {
        &self.cipher
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_secret_roundtrips_through_key() {
        let s = Secret::new_random().unwrap();
        let blob = s.cipher().encrypt(b"hello").unwrap();

        let rebuilt = Secret::from_key(&s.key, s.time_stamp).unwrap();
        assert_eq!(rebuilt.cipher().decrypt(&blob).unwrap(), b"hello");
        assert_eq!(rebuilt.key, s.key);
        assert_eq!(rebuilt.time_stamp, s.time_stamp);
    }

    #[test]
    fn bad_key_rejected() {
        assert!(Secret::from_key("not base64!!!", OffsetDateTime::now_utc()).is_err());
        // Valid base64, wrong length.
        assert!(Secret::from_key("AAAA", OffsetDateTime::now_utc()).is_err());
    }
}

//! Curve25519 keys in their base64 configuration form.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

/// Length of a raw key in bytes.
pub const KEY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key is not valid base64")]
    Base64,

    #[error("key must be {KEY_LEN} bytes, got {0}")]
    Length(usize),
}

/// A 32-byte key. `Debug` never prints the material.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Key(bytes)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let decoded = STANDARD.decode(encoded).map_err(|_| KeyError::Base64)?;
        let bytes: [u8; KEY_LEN] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::Length(decoded.len()))?;
        Ok(Key(bytes))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl FromStr for Key {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::from_base64(s)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(<redacted>)")
    }
}

/// A private key and the public key derived from it.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    private_key: Key,
    public_key: Key,
}

impl KeyPair {
    pub fn from_private_key(private_key: Key) -> Self {
        let secret = StaticSecret::from(*private_key.as_bytes());
        let public_key = Key(PublicKey::from(&secret).to_bytes());
        KeyPair {
            private_key,
            public_key,
        }
    }

    pub fn private_key(&self) -> &Key {
        &self.private_key
    }

    pub fn public_key(&self) -> &Key {
        &self.public_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key.to_base64())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7748 section 6.1 test vector (Alice).
    const ALICE_PRIVATE: [u8; 32] = [
        0x77, 0x07, 0x6d, 0x0a, 0x73, 0x18, 0xa5, 0x7d, 0x3c, 0x16, 0xc1, 0x72, 0x51, 0xb2, 0x66,
        0x45, 0xdf, 0x4c, 0x2f, 0x87, 0xeb, 0xc0, 0x99, 0x2a, 0xb1, 0x77, 0xfb, 0xa5, 0x1d, 0xb9,
        0x2c, 0x2a,
    ];
    const ALICE_PUBLIC: [u8; 32] = [
        0x85, 0x20, 0xf0, 0x09, 0x89, 0x30, 0xa7, 0x54, 0x74, 0x8b, 0x7d, 0xdc, 0xb4, 0x3e, 0xf7,
        0x5a, 0x0d, 0xbf, 0x3a, 0x0d, 0x26, 0x38, 0x1a, 0xf4, 0xeb, 0xa4, 0xa9, 0x8e, 0xaa, 0x9b,
        0x4e, 0x6a,
    ];

    #[test]
    fn test_public_key_derivation() {
        let pair = KeyPair::from_private_key(Key::from_bytes(ALICE_PRIVATE));
        assert_eq!(pair.public_key().as_bytes(), &ALICE_PUBLIC);
    }

    #[test]
    fn test_base64_round_trip() {
        let key = Key::from_bytes(ALICE_PUBLIC);
        let encoded = key.to_base64();
        assert_eq!(encoded.len(), 44);
        assert_eq!(Key::from_base64(&encoded).unwrap(), key);
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert_eq!(Key::from_base64("not base64!"), Err(KeyError::Base64));
        assert_eq!(Key::from_base64("AAAA"), Err(KeyError::Length(3)));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = Key::from_bytes(ALICE_PRIVATE);
        let pair = KeyPair::from_private_key(key.clone());
        assert!(!format!("{key:?}").contains(&key.to_base64()));
        assert!(!format!("{pair:?}").contains(&key.to_base64()));
    }
}

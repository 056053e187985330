//! Validator public keys.
//!
//! Keys travel over JSON as `{"type": "ed25519", "data": "<hex>"}`. Inside
//! ABCI messages a key is opaque bytes: one type byte followed by the raw key.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Type byte prefixed to ed25519 keys in their byte encoding.
pub const ED25519_TYPE_BYTE: u8 = 0x01;
/// Type byte prefixed to secp256k1 keys in their byte encoding.
pub const SECP256K1_TYPE_BYTE: u8 = 0x02;

/// Errors from decoding a public key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("unknown key type: {0}")]
    UnknownType(String),

    #[error("invalid hex in key data: {0}")]
    InvalidHex(String),

    #[error("invalid {key_type} key length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        key_type: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("empty key encoding")]
    Empty,
}

/// A validator public key.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PublicKeyJson", into = "PublicKeyJson")]
pub enum PublicKey {
    /// ED25519 public key (32 bytes).
    Ed25519([u8; 32]),
    /// Compressed secp256k1 public key (33 bytes).
    Secp256k1([u8; 33]),
}

impl PublicKey {
    /// Name of the key type as used on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            PublicKey::Ed25519(_) => "ed25519",
            PublicKey::Secp256k1(_) => "secp256k1",
        }
    }

    /// Raw key bytes without the type prefix.
    pub fn raw_bytes(&self) -> &[u8] {
        match self {
            PublicKey::Ed25519(bytes) => bytes,
            PublicKey::Secp256k1(bytes) => bytes,
        }
    }

    /// Type-prefixed byte encoding, as carried in ABCI validator updates.
    pub fn to_bytes(&self) -> Vec<u8> {
        let (type_byte, raw) = match self {
            PublicKey::Ed25519(bytes) => (ED25519_TYPE_BYTE, &bytes[..]),
            PublicKey::Secp256k1(bytes) => (SECP256K1_TYPE_BYTE, &bytes[..]),
        };
        let mut out = Vec::with_capacity(1 + raw.len());
        out.push(type_byte);
        out.extend_from_slice(raw);
        out
    }

    /// Decode the type-prefixed byte encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let (type_byte, raw) = bytes.split_first().ok_or(KeyError::Empty)?;
        match *type_byte {
            ED25519_TYPE_BYTE => Self::from_raw("ed25519", raw),
            SECP256K1_TYPE_BYTE => Self::from_raw("secp256k1", raw),
            other => Err(KeyError::UnknownType(format!("0x{:02x}", other))),
        }
    }

    /// Build a key from its type name and raw bytes.
    pub fn from_raw(key_type: &str, raw: &[u8]) -> Result<Self, KeyError> {
        match key_type {
            "ed25519" => {
                let bytes: [u8; 32] = raw.try_into().map_err(|_| KeyError::InvalidLength {
                    key_type: "ed25519",
                    expected: 32,
                    actual: raw.len(),
                })?;
                Ok(PublicKey::Ed25519(bytes))
            }
            "secp256k1" => {
                let bytes: [u8; 33] = raw.try_into().map_err(|_| KeyError::InvalidLength {
                    key_type: "secp256k1",
                    expected: 33,
                    actual: raw.len(),
                })?;
                Ok(PublicKey::Secp256k1(bytes))
            }
            other => Err(KeyError::UnknownType(other.to_string())),
        }
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PublicKey::{}({})",
            self.type_name(),
            hex::encode(self.raw_bytes())
        )
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name(), hex::encode(self.raw_bytes()))
    }
}

/// JSON shape of a public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PublicKeyJson {
    #[serde(rename = "type")]
    key_type: String,
    data: String,
}

impl TryFrom<PublicKeyJson> for PublicKey {
    type Error = KeyError;

    fn try_from(json: PublicKeyJson) -> Result<Self, Self::Error> {
        let raw = hex::decode(&json.data).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        PublicKey::from_raw(&json.key_type.to_ascii_lowercase(), &raw)
    }
}

impl From<PublicKey> for PublicKeyJson {
    fn from(key: PublicKey) -> Self {
        PublicKeyJson {
            key_type: key.type_name().to_string(),
            data: hex::encode_upper(key.raw_bytes()),
        }
    }
}

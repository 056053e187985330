//! Serde helpers for byte fields carried as hex strings in JSON.

use serde::{Deserialize, Deserializer, Serializer};

/// `#[serde(with = "serde_hex")]` for `Vec<u8>`.
pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&hex::encode(bytes))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| serde::de::Error::custom(format!("invalid hex: {}", e)))
}

//! # Wire Encodings
//!
//! Serde helpers for the canonical JSON forms: 0x-prefixed lowercase hex for
//! byte fields, decimal strings for 256-bit amounts. Optional fields
//! serialize as `null` so the field set (and therefore the canonical hash
//! preimage) is identical for every transaction of a given shape.

use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serializer};

/// `U256` as a decimal string.
pub mod u256_dec {
    use super::*;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        U256::from_dec_str(raw.trim()).map_err(serde::de::Error::custom)
    }
}

/// Byte vectors as 0x-prefixed lowercase hex.
pub mod bytes_hex {
    use super::*;

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        decode_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Optional byte vectors as 0x-hex or null.
pub mod opt_bytes_hex {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&format!("0x{}", hex::encode(bytes))),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| decode_hex(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Fixed-width byte arrays (addresses, hashes) as 0x-hex or null.
pub mod opt_array_hex {
    use super::*;

    pub fn serialize<S: Serializer, const N: usize>(
        value: &Option<[u8; N]>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&format!("0x{}", hex::encode(bytes))),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<Option<[u8; N]>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| {
            let bytes = decode_hex(&s).map_err(serde::de::Error::custom)?;
            if bytes.len() != N {
                return Err(serde::de::Error::custom("wrong byte length"));
            }
            let mut out = [0u8; N];
            out.copy_from_slice(&bytes);
            Ok(out)
        })
        .transpose()
    }
}

/// Optional 65-byte recoverable signatures as 0x-hex or null.
pub mod opt_sig {
    use super::*;
    use nhb_crypto::RecoverableSig;

    pub fn serialize<S: Serializer>(
        value: &Option<RecoverableSig>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(sig) => serializer.serialize_str(&format!("0x{}", hex::encode(sig.as_bytes()))),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<RecoverableSig>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| {
            let bytes = decode_hex(&s).map_err(serde::de::Error::custom)?;
            RecoverableSig::from_bytes(&bytes).map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

fn decode_hex(raw: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(raw.trim().trim_start_matches("0x"))
}

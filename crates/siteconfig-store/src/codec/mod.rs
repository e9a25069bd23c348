//! Conversion between [`ConfigValue`] and the text stored in the `value`
//! column.
//!
//! Writes always use the tagged JSON envelope. Reads try, in order:
//!
//! 1. the tagged envelope,
//! 2. the legacy serialize format older rows were written in ([`legacy`]),
//! 3. the raw text itself, as [`ConfigValue::String`].
//!
//! Decoding is total. Malformed payloads degrade to strings and never fail.

pub mod legacy;

use crate::error::StoreResult;
use crate::value::ConfigValue;

/// Which decoding step produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Envelope,
    Legacy,
    Raw,
}

/// Encode a value for storage.
pub fn encode(value: &ConfigValue) -> StoreResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decode stored text into a value.
pub fn decode(raw: &str) -> ConfigValue {
    decode_with_origin(raw).0
}

/// Decode stored text, also reporting which step succeeded.
pub fn decode_with_origin(raw: &str) -> (ConfigValue, Decoded) {
    if let Ok(value) = serde_json::from_str::<ConfigValue>(raw) {
        return (value, Decoded::Envelope);
    }
    if let Some(value) = legacy::parse(raw) {
        return (value, Decoded::Legacy);
    }
    (ConfigValue::String(raw.to_string()), Decoded::Raw)
}

// ── tests ────────────────────────────────────────────────────────────

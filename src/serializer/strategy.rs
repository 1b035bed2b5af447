//! Serialization strategies.
//!
//! A strategy turns a domain value into the bytes stored under a key or field
//! and back again. Strategies are stateless and deterministic; the choice is an
//! explicit tag carried by the [`SerializationContext`](super::SerializationContext).
//!
//! Data written with one strategy must be read with the same strategy. A
//! mismatch is not detected up front; it surfaces as a decode error on the call
//! that reads the bytes.

use crate::error::{Error, Result};
use crate::serializer::Role;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Which codec converts values for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerializationStrategy {
    /// Plain UTF-8 text. Strings are stored verbatim; numbers and booleans use
    /// their decimal/text form, so the store can increment them.
    RawString,

    /// Structured objects as JSON documents (`serde_json`).
    Json,

    /// Any serde type as compact binary (`bincode`). Not human readable and
    /// not numeric-coercible by the store.
    Binary,
}

impl SerializationStrategy {
    /// Encodes `value` for storage.
    pub fn encode<T>(&self, role: Role, value: &T) -> Result<Bytes>
    where
        T: Serialize + ?Sized,
    {
        match self {
            SerializationStrategy::RawString => {
                let json = serde_json::to_value(value).map_err(|e| Error::serialization(role, e))?;
                match json {
                    Value::String(s) => Ok(Bytes::from(s)),
                    Value::Number(n) => Ok(Bytes::from(n.to_string())),
                    Value::Bool(b) => Ok(Bytes::from(b.to_string())),
                    other => Err(Error::serialization(
                        role,
                        format!("raw string strategy cannot encode {}", json_kind(&other)),
                    )),
                }
            }
            SerializationStrategy::Json => serde_json::to_vec(value)
                .map(Bytes::from)
                .map_err(|e| Error::serialization(role, e)),
            SerializationStrategy::Binary => bincode::serialize(value)
                .map(Bytes::from)
                .map_err(|e| Error::serialization(role, e)),
        }
    }

    /// Decodes bytes read from the store.
    pub fn decode<T>(&self, role: Role, bytes: &[u8]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        match self {
            SerializationStrategy::RawString => {
                let text = std::str::from_utf8(bytes).map_err(|e| Error::serialization(role, e))?;
                // Text targets take the string as-is; numeric and boolean
                // targets parse it.
                match serde_json::from_value::<T>(Value::String(text.to_owned())) {
                    Ok(value) => Ok(value),
                    Err(as_text) => serde_json::from_str::<T>(text)
                        .map_err(|_| Error::serialization(role, as_text)),
                }
            }
            SerializationStrategy::Json => {
                serde_json::from_slice(bytes).map_err(|e| Error::serialization(role, e))
            }
            SerializationStrategy::Binary => {
                bincode::deserialize(bytes).map_err(|e| Error::serialization(role, e))
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a map or struct",
        Value::Bool(_) | Value::Number(_) | Value::String(_) => "a scalar",
    }
}

//! Operation Sets
//!
//! Each set is a narrow, typed view of one data-structure family, obtained
//! from a [`TypedClient`](crate::TypedClient). Sets carry no state of their
//! own beyond the client they were created from; creating one is free.
//!
//! | Set                     | Store family  | Commands                                   |
//! |-------------------------|---------------|--------------------------------------------|
//! | [`ValueOperations`]     | strings       | SET, GET, MGET, INCRBY, INCRBYFLOAT        |
//! | [`ListOperations`]      | lists         | LPUSH, RPUSH, LPOP, RPOP, LLEN, LRANGE     |
//! | [`HashOperations`]      | hashes        | HSET, HGET, HMGET, HVALS, HGETALL, HDEL... |
//! | [`ZSetOperations`]      | sorted sets   | ZADD, ZREM, ZCARD, ZRANGE, ZRANK, ZSCORE   |
//! | [`StreamOperations`]    | streams       | XADD, XLEN, XREAD                          |
//! | [`HyperLogLogOperations`] | cardinality | PFADD, PFCOUNT                             |

pub mod hash;
pub mod hyperloglog;
pub mod list;
pub mod stream;
pub mod value;
pub mod zset;

pub use hash::HashOperations;
pub use hyperloglog::HyperLogLogOperations;
pub use list::ListOperations;
pub use stream::{
    ParseRecordIdError, ReadOffset, RecordId, StreamOffset, StreamOperations, StreamReadOptions,
    StreamRecord, StreamSubscription,
};
pub use value::ValueOperations;
pub use zset::{ScoredMember, ZSetOperations};

use crate::error::{Error, Result};
use crate::protocol::RespValue;
use crate::serializer::{Role, SerializationContext};
use bytes::Bytes;
use serde::de::DeserializeOwned;

// ============================================================================
// Reply decoding shared by the operation sets
// ============================================================================

pub(crate) fn expect_integer(command: &'static str, reply: RespValue) -> Result<i64> {
    match reply {
        RespValue::Integer(n) => Ok(n),
        other => Err(Error::unexpected(command, other)),
    }
}

pub(crate) fn expect_count(command: &'static str, reply: RespValue) -> Result<usize> {
    let n = expect_integer(command, reply)?;
    usize::try_from(n).map_err(|_| Error::unexpected(command, RespValue::Integer(n)))
}

/// A float sent back as text, as INCRBYFLOAT and ZSCORE do.
pub(crate) fn expect_float(command: &'static str, reply: RespValue) -> Result<f64> {
    let parsed = reply.as_str().and_then(|s| s.parse::<f64>().ok());
    match parsed {
        Some(f) => Ok(f),
        None => Err(Error::unexpected(command, reply)),
    }
}

pub(crate) fn expect_ok(command: &'static str, reply: RespValue) -> Result<()> {
    match reply {
        RespValue::SimpleString(ref s) if s == "OK" => Ok(()),
        other => Err(Error::unexpected(command, other)),
    }
}

/// A bulk payload, or `None` for nil.
pub(crate) fn expect_optional(command: &'static str, reply: RespValue) -> Result<Option<Bytes>> {
    match reply {
        RespValue::Null => Ok(None),
        RespValue::BulkString(b) => Ok(Some(b)),
        other => Err(Error::unexpected(command, other)),
    }
}

/// The items of an array reply; nil reads as empty.
pub(crate) fn expect_array(command: &'static str, reply: RespValue) -> Result<Vec<RespValue>> {
    match reply {
        RespValue::Null => Ok(Vec::new()),
        RespValue::Array(items) => Ok(items),
        other => Err(Error::unexpected(command, other)),
    }
}

pub(crate) fn decode_optional<T: DeserializeOwned>(
    context: &SerializationContext,
    role: Role,
    command: &'static str,
    reply: RespValue,
) -> Result<Option<T>> {
    expect_optional(command, reply)?
        .map(|bytes| context.decode(role, &bytes))
        .transpose()
}

/// Decodes every element of an array reply; nil elements are kept as `None`.
pub(crate) fn decode_each_optional<T: DeserializeOwned>(
    context: &SerializationContext,
    role: Role,
    command: &'static str,
    reply: RespValue,
) -> Result<Vec<Option<T>>> {
    expect_array(command, reply)?
        .into_iter()
        .map(|item| decode_optional(context, role, command, item))
        .collect()
}

/// Decodes every element of an array reply; a nil element is an error.
pub(crate) fn decode_each<T: DeserializeOwned>(
    context: &SerializationContext,
    role: Role,
    command: &'static str,
    reply: RespValue,
) -> Result<Vec<T>> {
    expect_array(command, reply)?
        .into_iter()
        .map(|item| match item {
            RespValue::BulkString(bytes) => context.decode(role, &bytes),
            other => Err(Error::unexpected(command, other)),
        })
        .collect()
}

/// Decodes a flat `[k1, v1, k2, v2, ...]` array reply into pairs.
pub(crate) fn decode_pairs<A, B>(
    context: &SerializationContext,
    roles: (Role, Role),
    command: &'static str,
    items: Vec<RespValue>,
) -> Result<Vec<(A, B)>>
where
    A: DeserializeOwned,
    B: DeserializeOwned,
{
    if items.len() % 2 != 0 {
        return Err(Error::unexpected(command, RespValue::Array(items)));
    }

    let mut pairs = Vec::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(first), Some(second)) = (iter.next(), iter.next()) {
        match (first, second) {
            (RespValue::BulkString(a), RespValue::BulkString(b)) => {
                pairs.push((context.decode(roles.0, &a)?, context.decode(roles.1, &b)?));
            }
            (a, b) => return Err(Error::unexpected(command, RespValue::Array(vec![a, b]))),
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_count_rejects_negative() {
        assert!(matches!(
            expect_count("LLEN", RespValue::Integer(-1)),
            Err(Error::UnexpectedReply { command: "LLEN", .. })
        ));
        assert_eq!(expect_count("LLEN", RespValue::Integer(3)).unwrap(), 3);
    }

    #[test]
    fn test_decode_each_optional_keeps_nil_positions() {
        let ctx = SerializationContext::string();
        let reply = RespValue::array(vec![
            RespValue::bulk_string("a"),
            RespValue::Null,
            RespValue::bulk_string("c"),
        ]);
        let values: Vec<Option<String>> =
            decode_each_optional(&ctx, Role::Value, "MGET", reply).unwrap();
        assert_eq!(values, vec![Some("a".into()), None, Some("c".into())]);
    }

    #[test]
    fn test_decode_pairs() {
        let ctx = SerializationContext::string();
        let items = vec![
            RespValue::bulk_string("Apple"),
            RespValue::bulk_string("1.1"),
            RespValue::bulk_string("Manning"),
            RespValue::bulk_string("1.3"),
        ];
        let pairs: Vec<(String, f64)> =
            decode_pairs(&ctx, (Role::Value, Role::Value), "ZRANGE", items).unwrap();
        assert_eq!(pairs, vec![("Apple".into(), 1.1), ("Manning".into(), 1.3)]);
    }

    #[test]
    fn test_decode_pairs_rejects_odd_length() {
        let ctx = SerializationContext::string();
        let items = vec![RespValue::bulk_string("lonely")];
        let result: Result<Vec<(String, String)>> =
            decode_pairs(&ctx, (Role::HashKey, Role::HashValue), "HGETALL", items);
        assert!(result.is_err());
    }
}

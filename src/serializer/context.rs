//! The four-role binding of strategies used by a typed client.

use crate::error::{Error, Result};
use crate::serializer::{Role, SerializationStrategy};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Strategies for the key, value, hash-key and hash-value roles.
///
/// Built once and never mutated; copying it is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializationContext {
    key: SerializationStrategy,
    value: SerializationStrategy,
    hash_key: SerializationStrategy,
    hash_value: SerializationStrategy,
}

impl SerializationContext {
    pub fn builder() -> SerializationContextBuilder {
        SerializationContextBuilder::default()
    }

    /// The same strategy for every role.
    pub fn uniform(strategy: SerializationStrategy) -> Self {
        Self {
            key: strategy,
            value: strategy,
            hash_key: strategy,
            hash_value: strategy,
        }
    }

    /// Plain text everywhere.
    pub fn string() -> Self {
        Self::uniform(SerializationStrategy::RawString)
    }

    /// Text keys and hash keys, JSON values and hash values.
    pub fn json() -> Self {
        Self {
            key: SerializationStrategy::RawString,
            value: SerializationStrategy::Json,
            hash_key: SerializationStrategy::RawString,
            hash_value: SerializationStrategy::Json,
        }
    }

    /// Binary everywhere.
    pub fn binary() -> Self {
        Self::uniform(SerializationStrategy::Binary)
    }

    pub fn strategy(&self, role: Role) -> SerializationStrategy {
        match role {
            Role::Key => self.key,
            Role::Value => self.value,
            Role::HashKey => self.hash_key,
            Role::HashValue => self.hash_value,
        }
    }

    pub fn encode<T: Serialize + ?Sized>(&self, role: Role, value: &T) -> Result<Bytes> {
        self.strategy(role).encode(role, value)
    }

    pub fn decode<T: DeserializeOwned>(&self, role: Role, bytes: &[u8]) -> Result<T> {
        self.strategy(role).decode(role, bytes)
    }

    pub fn encode_key<K: Serialize + ?Sized>(&self, key: &K) -> Result<Bytes> {
        self.encode(Role::Key, key)
    }

    pub fn encode_value<V: Serialize + ?Sized>(&self, value: &V) -> Result<Bytes> {
        self.encode(Role::Value, value)
    }

    pub fn decode_value<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<V> {
        self.decode(Role::Value, bytes)
    }
}

/// Collects a strategy per role; every role must be bound before `build`.
#[derive(Debug, Default, Clone)]
pub struct SerializationContextBuilder {
    key: Option<SerializationStrategy>,
    value: Option<SerializationStrategy>,
    hash_key: Option<SerializationStrategy>,
    hash_value: Option<SerializationStrategy>,
}

impl SerializationContextBuilder {
    pub fn key(mut self, strategy: SerializationStrategy) -> Self {
        self.key = Some(strategy);
        self
    }

    pub fn value(mut self, strategy: SerializationStrategy) -> Self {
        self.value = Some(strategy);
        self
    }

    pub fn hash_key(mut self, strategy: SerializationStrategy) -> Self {
        self.hash_key = Some(strategy);
        self
    }

    pub fn hash_value(mut self, strategy: SerializationStrategy) -> Self {
        self.hash_value = Some(strategy);
        self
    }

    pub fn build(self) -> Result<SerializationContext> {
        let bound = |strategy: Option<SerializationStrategy>, role: Role| {
            strategy.ok_or_else(|| Error::Config(format!("no serializer bound for the {role} role")))
        };

        Ok(SerializationContext {
            key: bound(self.key, Role::Key)?,
            value: bound(self.value, Role::Value)?,
            hash_key: bound(self.hash_key, Role::HashKey)?,
            hash_value: bound(self.hash_value, Role::HashValue)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_binds_all_roles() {
        let ctx = SerializationContext::builder()
            .key(SerializationStrategy::RawString)
            .value(SerializationStrategy::Json)
            .hash_key(SerializationStrategy::RawString)
            .hash_value(SerializationStrategy::Json)
            .build()
            .unwrap();
        assert_eq!(ctx, SerializationContext::json());
        assert_eq!(ctx.strategy(Role::Value), SerializationStrategy::Json);
    }

    #[test]
    fn test_builder_rejects_unbound_role() {
        let err = SerializationContext::builder()
            .key(SerializationStrategy::RawString)
            .value(SerializationStrategy::RawString)
            .hash_key(SerializationStrategy::RawString)
            .build()
            .unwrap_err();
        match err {
            Error::Config(msg) => assert!(msg.contains("hash value")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_roles_use_their_own_strategy() {
        let ctx = SerializationContext::json();
        assert_eq!(&ctx.encode_key("BOOK:1").unwrap()[..], b"BOOK:1");
        assert_eq!(&ctx.encode_value("Apple").unwrap()[..], b"\"Apple\"");
        let back: String = ctx.decode_value(b"\"Apple\"").unwrap();
        assert_eq!(back, "Apple");
    }
}

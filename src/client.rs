//! Typed Client
//!
//! The entry point of the library. A [`TypedClient`] binds one
//! [`ConnectionFactory`] to one [`SerializationContext`] and hands out an
//! operation set per data-structure family.
//!
//! ## Example
//!
//! ```
//! use kvops::connection::ConnectionFactory;
//! use kvops::embedded::Store;
//! use kvops::serializer::SerializationContext;
//! use kvops::TypedClient;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let factory = Arc::new(ConnectionFactory::embedded(Arc::new(Store::new())));
//! let client: TypedClient<String, String> =
//!     TypedClient::bind(factory, SerializationContext::string());
//!
//! let values = client.ops_for_value();
//! values.set(&"name".to_string(), &"kvops".to_string()).await.unwrap();
//! assert_eq!(values.get(&"name".to_string()).await.unwrap(), Some("kvops".to_string()));
//! # });
//! ```

use crate::connection::ConnectionFactory;
use crate::error::{Error, Result};
use crate::ops::{
    expect_count, expect_integer, HashOperations, HyperLogLogOperations, ListOperations,
    StreamOperations, ValueOperations, ZSetOperations,
};
use crate::protocol::{Command, RespValue};
use crate::serializer::SerializationContext;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// A client for keys of type `K` and values of type `V`.
///
/// Cloning is cheap and every clone shares the same factory. The client is
/// safe to use from many tasks at once.
pub struct TypedClient<K, V> {
    factory: Arc<ConnectionFactory>,
    context: SerializationContext,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for TypedClient<K, V> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            context: self.context,
            _types: PhantomData,
        }
    }
}

impl<K, V> fmt::Debug for TypedClient<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedClient")
            .field("factory", &self.factory)
            .field("context", &self.context)
            .finish()
    }
}

impl TypedClient<String, String> {
    /// A client that stores keys and values as plain text.
    pub fn string(factory: Arc<ConnectionFactory>) -> Self {
        Self::bind(factory, SerializationContext::string())
    }
}

impl<K, V> TypedClient<K, V> {
    pub fn bind(factory: Arc<ConnectionFactory>, context: SerializationContext) -> Self {
        debug!(?context, "Typed client bound");
        Self {
            factory,
            context,
            _types: PhantomData,
        }
    }

    pub fn builder() -> TypedClientBuilder<K, V> {
        TypedClientBuilder::default()
    }

    pub fn context(&self) -> &SerializationContext {
        &self.context
    }

    pub fn factory(&self) -> &Arc<ConnectionFactory> {
        &self.factory
    }

    pub fn ops_for_value(&self) -> ValueOperations<K, V> {
        ValueOperations::new(self.clone())
    }

    pub fn ops_for_list(&self) -> ListOperations<K, V> {
        ListOperations::new(self.clone())
    }

    /// Hash operations with field type `HK` and field value type `HV`.
    pub fn ops_for_hash<HK, HV>(&self) -> HashOperations<K, HK, HV> {
        HashOperations::new(self.clone())
    }

    pub fn ops_for_zset(&self) -> ZSetOperations<K, V> {
        ZSetOperations::new(self.clone())
    }

    /// Stream operations whose records map `HK` fields to `HV` values.
    pub fn ops_for_stream<HK, HV>(&self) -> StreamOperations<K, HK, HV> {
        StreamOperations::new(self.clone())
    }

    pub fn ops_for_hyper_log_log(&self) -> HyperLogLogOperations<K, V> {
        HyperLogLogOperations::new(self.clone())
    }

    /// Checks that the store answers.
    pub async fn ping(&self) -> Result<()> {
        match self.execute(Command::new("PING")).await? {
            RespValue::SimpleString(s) if s == "PONG" => Ok(()),
            other => Err(Error::unexpected("PING", other)),
        }
    }

    /// The same factory and context, viewed with another value type.
    pub(crate) fn retype<W>(&self) -> TypedClient<K, W> {
        TypedClient {
            factory: Arc::clone(&self.factory),
            context: self.context,
            _types: PhantomData,
        }
    }

    pub(crate) async fn execute(&self, command: Command) -> Result<RespValue> {
        self.factory.execute(command).await
    }
}

impl<K: Serialize, V> TypedClient<K, V> {
    pub(crate) fn encode_key(&self, key: &K) -> Result<Bytes> {
        self.context.encode_key(key)
    }

    pub(crate) fn encode_keys(&self, keys: &[K]) -> Result<Vec<Bytes>> {
        keys.iter().map(|key| self.encode_key(key)).collect()
    }

    /// Removes the keys, whatever they hold. Returns how many existed.
    pub async fn delete(&self, keys: &[K]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let reply = self
            .execute(Command::new("DEL").args(self.encode_keys(keys)?))
            .await?;
        expect_count("DEL", reply)
    }

    pub async fn has_key(&self, key: &K) -> Result<bool> {
        let reply = self
            .execute(Command::new("EXISTS").arg(self.encode_key(key)?))
            .await?;
        Ok(expect_integer("EXISTS", reply)? > 0)
    }
}

/// Builds a [`TypedClient`], failing when a part is missing.
pub struct TypedClientBuilder<K, V> {
    factory: Option<Arc<ConnectionFactory>>,
    context: Option<SerializationContext>,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Default for TypedClientBuilder<K, V> {
    fn default() -> Self {
        Self {
            factory: None,
            context: None,
            _types: PhantomData,
        }
    }
}

impl<K, V> TypedClientBuilder<K, V> {
    pub fn factory(mut self, factory: Arc<ConnectionFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn context(mut self, context: SerializationContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(self) -> Result<TypedClient<K, V>> {
        let factory = self
            .factory
            .ok_or_else(|| Error::Config("typed client needs a connection factory".to_string()))?;
        let context = self.context.ok_or_else(|| {
            Error::Config("typed client needs a serialization context".to_string())
        })?;
        Ok(TypedClient::bind(factory, context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::spawn_server;
    use crate::connection::ConnectionConfig;
    use crate::embedded::Store;

    fn embedded_factory() -> Arc<ConnectionFactory> {
        Arc::new(ConnectionFactory::embedded(Arc::new(Store::new())))
    }

    #[test]
    fn test_builder_requires_factory() {
        let err = TypedClient::<String, String>::builder()
            .context(SerializationContext::string())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_builder_requires_context() {
        let err = TypedClient::<String, String>::builder()
            .factory(embedded_factory())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_ping_and_delete() {
        let client = TypedClient::string(embedded_factory());
        client.ping().await.unwrap();

        let values = client.ops_for_value();
        values.set(&"a".to_string(), &"1".to_string()).await.unwrap();
        values.set(&"b".to_string(), &"2".to_string()).await.unwrap();

        assert!(client.has_key(&"a".to_string()).await.unwrap());
        let deleted = client
            .delete(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert!(!client.has_key(&"a".to_string()).await.unwrap());
        assert_eq!(client.delete(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clients_share_factory() {
        let factory = embedded_factory();
        let text = TypedClient::string(Arc::clone(&factory));
        let numbers: TypedClient<String, i64> =
            TypedClient::bind(Arc::clone(&factory), SerializationContext::json());

        numbers
            .ops_for_value()
            .set(&"counter".to_string(), &41)
            .await
            .unwrap();
        let raw = text.ops_for_value().get(&"counter".to_string()).await.unwrap();
        assert_eq!(raw.as_deref(), Some("41"));
        assert_eq!(factory.stats().connections_opened, 1);
    }

    #[tokio::test]
    async fn test_client_over_tcp() {
        let addr = spawn_server(Arc::new(Store::new())).await;
        let factory = ConnectionFactory::create(ConnectionConfig::new("127.0.0.1", addr.port()))
            .unwrap();
        let client = TypedClient::string(Arc::new(factory));

        client.ping().await.unwrap();
        let values = client.ops_for_value();
        values.set(&"k".to_string(), &"v".to_string()).await.unwrap();
        assert_eq!(values.get(&"k".to_string()).await.unwrap(), Some("v".to_string()));
    }
}

//! Operations on plain values stored under a key.

use crate::client::TypedClient;
use crate::error::{Error, Result};
use crate::ops::{decode_each_optional, decode_optional, expect_float, expect_integer, expect_ok};
use crate::protocol::{Command, RespValue};
use crate::serializer::Role;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Typed access to string values.
pub struct ValueOperations<K, V> {
    client: TypedClient<K, V>,
}

impl<K, V> ValueOperations<K, V> {
    pub(crate) fn new(client: TypedClient<K, V>) -> Self {
        Self { client }
    }
}

impl<K, V> Clone for ValueOperations<K, V> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<K, V> ValueOperations<K, V>
where
    K: Serialize,
    V: Serialize + DeserializeOwned,
{
    /// Stores `value` under `key`, replacing whatever was there.
    pub async fn set(&self, key: &K, value: &V) -> Result<()> {
        let command = Command::new("SET")
            .arg(self.client.encode_key(key)?)
            .arg(self.client.context().encode_value(value)?);
        expect_ok("SET", self.client.execute(command).await?)
    }

    /// Stores `value` only if `key` does not exist yet. Returns whether it was
    /// written; the first writer wins.
    pub async fn set_if_absent(&self, key: &K, value: &V) -> Result<bool> {
        let command = Command::new("SET")
            .arg(self.client.encode_key(key)?)
            .arg(self.client.context().encode_value(value)?)
            .arg("NX");
        match self.client.execute(command).await? {
            RespValue::Null => Ok(false),
            reply => expect_ok("SET", reply).map(|()| true),
        }
    }

    pub async fn get(&self, key: &K) -> Result<Option<V>> {
        let command = Command::new("GET").arg(self.client.encode_key(key)?);
        let reply = self.client.execute(command).await?;
        decode_optional(self.client.context(), Role::Value, "GET", reply)
    }

    /// Values in the order of `keys`; missing keys yield `None`.
    pub async fn multi_get(&self, keys: &[K]) -> Result<Vec<Option<V>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let command = Command::new("MGET").args(self.client.encode_keys(keys)?);
        let reply = self.client.execute(command).await?;
        if reply.as_array().map_or(true, |items| items.len() != keys.len()) {
            return Err(Error::unexpected("MGET", reply));
        }
        decode_each_optional(self.client.context(), Role::Value, "MGET", reply)
    }

    /// Adds `delta` to the integer stored at `key` (absent counts as 0) and
    /// returns the result.
    ///
    /// Fails with [`Error::TypeMismatch`] when the stored value is not an
    /// integer.
    pub async fn increment(&self, key: &K, delta: i64) -> Result<i64> {
        let command = Command::new("INCRBY")
            .arg(self.client.encode_key(key)?)
            .num(delta);
        expect_integer("INCRBY", self.client.execute(command).await?)
    }

    pub async fn increment_float(&self, key: &K, delta: f64) -> Result<f64> {
        let command = Command::new("INCRBYFLOAT")
            .arg(self.client.encode_key(key)?)
            .num(delta);
        expect_float("INCRBYFLOAT", self.client.execute(command).await?)
    }
}

#[cfg(test)]
mod tests {
    use crate::connection::testing::spawn_canned_server;
    use crate::connection::{ConnectionConfig, ConnectionFactory};
    use crate::embedded::Store;
    use crate::protocol::RespValue;
    use crate::serializer::{SerializationContext, SerializationStrategy};
    use crate::{Error, TypedClient};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Book {
        name: String,
        price: u32,
    }

    fn client<V>(context: SerializationContext) -> TypedClient<String, V> {
        let factory = ConnectionFactory::embedded(Arc::new(Store::new()));
        TypedClient::bind(Arc::new(factory), context)
    }

    fn key(s: &str) -> String {
        s.to_string()
    }

    #[tokio::test]
    async fn test_set_if_absent_first_writer_wins() {
        let ops = client::<String>(SerializationContext::string()).ops_for_value();

        ops.set(&key("BOOK:1"), &"first".to_string()).await.unwrap();
        let written = ops
            .set_if_absent(&key("BOOK:1"), &"second".to_string())
            .await
            .unwrap();

        assert!(!written);
        assert_eq!(ops.get(&key("BOOK:1")).await.unwrap(), Some("first".to_string()));
        assert!(ops.set_if_absent(&key("BOOK:2"), &"x".to_string()).await.unwrap());
    }

    #[tokio::test]
    async fn test_multi_get_preserves_order() {
        let ops = client::<String>(SerializationContext::string()).ops_for_value();
        ops.set(&key("k1"), &"v1".to_string()).await.unwrap();
        ops.set(&key("k3"), &"v3".to_string()).await.unwrap();

        let values = ops
            .multi_get(&[key("k3"), key("k2"), key("k1")])
            .await
            .unwrap();
        assert_eq!(
            values,
            vec![Some("v3".to_string()), None, Some("v1".to_string())]
        );
        assert!(ops.multi_get(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_objects() {
        let ops = client::<Book>(SerializationContext::json()).ops_for_value();
        let book = Book {
            name: "Rust in Action".to_string(),
            price: 13000,
        };

        ops.set(&key("BOOK:1"), &book).await.unwrap();
        assert_eq!(ops.get(&key("BOOK:1")).await.unwrap(), Some(book));
        assert_eq!(ops.get(&key("BOOK:404")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_binary_objects() {
        let ops = client::<Book>(SerializationContext::binary()).ops_for_value();
        let book = Book {
            name: "Gone with the Wind".to_string(),
            price: 9000,
        };

        ops.set(&key("BOOK:2"), &book).await.unwrap();
        assert_eq!(ops.get(&key("BOOK:2")).await.unwrap(), Some(book));
    }

    #[tokio::test]
    async fn test_increment() {
        let ops = client::<i64>(SerializationContext::json()).ops_for_value();
        ops.set(&key("price"), &13000).await.unwrap();

        assert_eq!(ops.increment(&key("price"), 1000).await.unwrap(), 14000);
        assert_eq!(ops.increment(&key("fresh"), 5).await.unwrap(), 5);
        assert_eq!(ops.get(&key("price")).await.unwrap(), Some(14000));
    }

    #[tokio::test]
    async fn test_increment_float() {
        let ops = client::<f64>(SerializationContext::string()).ops_for_value();
        ops.set(&key("rate"), &1.5).await.unwrap();
        assert_eq!(ops.increment_float(&key("rate"), 0.25).await.unwrap(), 1.75);
    }

    #[tokio::test]
    async fn test_increment_non_numeric_is_type_mismatch() {
        let ops = client::<String>(SerializationContext::string()).ops_for_value();
        ops.set(&key("title"), &"Apple".to_string()).await.unwrap();

        let err = ops.increment(&key("title"), 1).await.unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
        assert_eq!(ops.get(&key("title")).await.unwrap(), Some("Apple".to_string()));
    }

    #[tokio::test]
    async fn test_decode_with_wrong_strategy_fails() {
        let factory = Arc::new(ConnectionFactory::embedded(Arc::new(Store::new())));
        // same text keys on both sides, so only the value codec differs
        let binary_values = SerializationContext::builder()
            .key(SerializationStrategy::RawString)
            .value(SerializationStrategy::Binary)
            .hash_key(SerializationStrategy::RawString)
            .hash_value(SerializationStrategy::Binary)
            .build()
            .unwrap();
        let writer: TypedClient<String, Book> =
            TypedClient::bind(Arc::clone(&factory), binary_values);
        let reader: TypedClient<String, Book> =
            TypedClient::bind(factory, SerializationContext::json());

        let book = Book {
            name: "Apple".to_string(),
            price: 1,
        };
        writer.ops_for_value().set(&key("BOOK:3"), &book).await.unwrap();

        let err = reader.ops_for_value().get(&key("BOOK:3")).await.unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    #[tokio::test]
    async fn test_multi_get_rejects_misaligned_reply() {
        let reply = RespValue::array(vec![RespValue::bulk_string("only")]);
        let addr = spawn_canned_server(reply).await;
        let factory =
            ConnectionFactory::create(ConnectionConfig::new("127.0.0.1", addr.port())).unwrap();
        let ops = TypedClient::string(Arc::new(factory)).ops_for_value();

        let err = ops.multi_get(&[key("a"), key("b")]).await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedReply { command: "MGET", .. }));
    }
}

//! Operations on lists: a double-ended queue per key.

use crate::client::TypedClient;
use crate::error::Result;
use crate::ops::{decode_each, decode_optional, expect_count};
use crate::protocol::Command;
use crate::serializer::Role;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Typed access to lists.
///
/// Pushing on one end and popping from the other gives FIFO order; the store
/// applies each call atomically.
pub struct ListOperations<K, V> {
    client: TypedClient<K, V>,
}

impl<K, V> ListOperations<K, V> {
    pub(crate) fn new(client: TypedClient<K, V>) -> Self {
        Self { client }
    }
}

impl<K, V> Clone for ListOperations<K, V> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<K, V> ListOperations<K, V>
where
    K: Serialize,
    V: Serialize + DeserializeOwned,
{
    /// Prepends `value`. Returns the new length.
    pub async fn left_push(&self, key: &K, value: &V) -> Result<usize> {
        self.push("LPUSH", key, value).await
    }

    /// Appends `value`. Returns the new length.
    pub async fn right_push(&self, key: &K, value: &V) -> Result<usize> {
        self.push("RPUSH", key, value).await
    }

    /// Removes and returns the head; `None` when the list is empty or absent.
    pub async fn left_pop(&self, key: &K) -> Result<Option<V>> {
        self.pop("LPOP", key).await
    }

    /// Removes and returns the tail; `None` when the list is empty or absent.
    pub async fn right_pop(&self, key: &K) -> Result<Option<V>> {
        self.pop("RPOP", key).await
    }

    pub async fn size(&self, key: &K) -> Result<usize> {
        let command = Command::new("LLEN").arg(self.client.encode_key(key)?);
        expect_count("LLEN", self.client.execute(command).await?)
    }

    /// Elements from `start` to `end` inclusive; negative indices count from
    /// the tail, so `range(key, 0, -1)` is the whole list.
    pub async fn range(&self, key: &K, start: i64, end: i64) -> Result<Vec<V>> {
        let command = Command::new("LRANGE")
            .arg(self.client.encode_key(key)?)
            .num(start)
            .num(end);
        let reply = self.client.execute(command).await?;
        decode_each(self.client.context(), Role::Value, "LRANGE", reply)
    }

    async fn push(&self, name: &'static str, key: &K, value: &V) -> Result<usize> {
        let command = Command::new(name)
            .arg(self.client.encode_key(key)?)
            .arg(self.client.context().encode_value(value)?);
        expect_count(name, self.client.execute(command).await?)
    }

    async fn pop(&self, name: &'static str, key: &K) -> Result<Option<V>> {
        let command = Command::new(name).arg(self.client.encode_key(key)?);
        let reply = self.client.execute(command).await?;
        decode_optional(self.client.context(), Role::Value, name, reply)
    }
}

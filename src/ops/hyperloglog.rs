//! Operations on distinct-element counters.
//!
//! The store estimates cardinality; a remote store answers within its
//! documented error bound and the embedded one counts exactly.

use crate::client::TypedClient;
use crate::error::Result;
use crate::ops::{expect_count, expect_integer};
use crate::protocol::Command;
use serde::Serialize;

/// Typed access to counters of `V` elements.
pub struct HyperLogLogOperations<K, V> {
    client: TypedClient<K, V>,
}

impl<K, V> HyperLogLogOperations<K, V> {
    pub(crate) fn new(client: TypedClient<K, V>) -> Self {
        Self { client }
    }
}

impl<K, V> Clone for HyperLogLogOperations<K, V> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<K, V> HyperLogLogOperations<K, V>
where
    K: Serialize,
    V: Serialize,
{
    /// Adds elements. Adding one twice has no effect. Returns true when the
    /// estimate changed.
    pub async fn add(&self, key: &K, elements: &[V]) -> Result<bool> {
        let encoded = elements
            .iter()
            .map(|e| self.client.context().encode_value(e))
            .collect::<Result<Vec<_>>>()?;
        let command = Command::new("PFADD")
            .arg(self.client.encode_key(key)?)
            .args(encoded);
        Ok(expect_integer("PFADD", self.client.execute(command).await?)? == 1)
    }

    /// Estimated number of distinct elements added to `key`.
    pub async fn size(&self, key: &K) -> Result<usize> {
        self.union_size(std::slice::from_ref(key)).await
    }

    /// Estimated number of distinct elements across all `keys`.
    pub async fn union_size(&self, keys: &[K]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let command = Command::new("PFCOUNT").args(self.client.encode_keys(keys)?);
        expect_count("PFCOUNT", self.client.execute(command).await?)
    }
}

#[cfg(test)]
mod tests {
    use crate::connection::ConnectionFactory;
    use crate::embedded::Store;
    use crate::serializer::SerializationContext;
    use crate::TypedClient;
    use std::sync::Arc;

    fn client() -> TypedClient<String, i64> {
        let factory = Arc::new(ConnectionFactory::embedded(Arc::new(Store::new())));
        TypedClient::bind(factory, SerializationContext::string())
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let hll = client().ops_for_hyper_log_log();
        let key = "visitors".to_string();

        assert!(hll.add(&key, &[1, 2, 3, 4, 5]).await.unwrap());
        assert_eq!(hll.size(&key).await.unwrap(), 5);

        assert!(!hll.add(&key, &[1, 2, 3, 4, 5]).await.unwrap());
        assert_eq!(hll.size(&key).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_size_is_non_decreasing() {
        let hll = client().ops_for_hyper_log_log();
        let key = "growing".to_string();

        let mut last = 0;
        for batch in [[1, 2], [2, 3], [10, 11]] {
            hll.add(&key, &batch).await.unwrap();
            let size = hll.size(&key).await.unwrap();
            assert!(size >= last);
            last = size;
        }
        assert_eq!(last, 5);
    }

    #[tokio::test]
    async fn test_union_size() {
        let hll = client().ops_for_hyper_log_log();
        let (a, b) = ("a".to_string(), "b".to_string());
        hll.add(&a, &[1, 2, 3]).await.unwrap();
        hll.add(&b, &[3, 4]).await.unwrap();

        assert_eq!(hll.union_size(&[a, b]).await.unwrap(), 4);
        assert_eq!(hll.size(&"missing".to_string()).await.unwrap(), 0);
    }
}

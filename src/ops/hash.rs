//! Operations on hashes: a field/value map per key.

use crate::client::TypedClient;
use crate::error::{Error, Result};
use crate::ops::{
    decode_each, decode_each_optional, decode_optional, decode_pairs, expect_array, expect_count,
    expect_float, expect_integer,
};
use crate::protocol::Command;
use crate::serializer::Role;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Typed access to hashes whose fields are `HK` and field values are `HV`.
///
/// Field order in replies is whatever the store returns; it is not stable.
pub struct HashOperations<K, HK, HV> {
    client: TypedClient<K, ()>,
    _fields: PhantomData<fn() -> (HK, HV)>,
}

impl<K, HK, HV> HashOperations<K, HK, HV> {
    pub(crate) fn new<V>(client: TypedClient<K, V>) -> Self {
        Self {
            client: client.retype(),
            _fields: PhantomData,
        }
    }
}

impl<K, HK, HV> Clone for HashOperations<K, HK, HV> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<K, HK, HV> HashOperations<K, HK, HV>
where
    K: Serialize,
    HK: Serialize + DeserializeOwned,
    HV: Serialize + DeserializeOwned,
{
    fn encode_field(&self, field: &HK) -> Result<bytes::Bytes> {
        self.client.context().encode(Role::HashKey, field)
    }

    fn encode_fields(&self, fields: &[HK]) -> Result<Vec<bytes::Bytes>> {
        fields.iter().map(|f| self.encode_field(f)).collect()
    }

    /// Upserts every field of `entries`. An empty map is a no-op.
    pub async fn put_all<'a, I>(&self, key: &K, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a HK, &'a HV)>,
        HK: 'a,
        HV: 'a,
    {
        let context = self.client.context();
        let mut command = Command::new("HSET").arg(self.client.encode_key(key)?);
        let mut fields = 0;
        for (field, value) in entries {
            command = command
                .arg(context.encode(Role::HashKey, field)?)
                .arg(context.encode(Role::HashValue, value)?);
            fields += 1;
        }
        if fields == 0 {
            return Ok(());
        }
        expect_count("HSET", self.client.execute(command).await?).map(|_| ())
    }

    /// Sets one field. Returns true when the field is new.
    pub async fn put(&self, key: &K, field: &HK, value: &HV) -> Result<bool> {
        let command = Command::new("HSET")
            .arg(self.client.encode_key(key)?)
            .arg(self.encode_field(field)?)
            .arg(self.client.context().encode(Role::HashValue, value)?);
        Ok(expect_count("HSET", self.client.execute(command).await?)? == 1)
    }

    pub async fn get(&self, key: &K, field: &HK) -> Result<Option<HV>> {
        let command = Command::new("HGET")
            .arg(self.client.encode_key(key)?)
            .arg(self.encode_field(field)?);
        let reply = self.client.execute(command).await?;
        decode_optional(self.client.context(), Role::HashValue, "HGET", reply)
    }

    /// Values for `fields`, in the same order; missing fields yield `None`.
    pub async fn multi_get(&self, key: &K, fields: &[HK]) -> Result<Vec<Option<HV>>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let command = Command::new("HMGET")
            .arg(self.client.encode_key(key)?)
            .args(self.encode_fields(fields)?);
        let reply = self.client.execute(command).await?;
        if reply.as_array().map_or(true, |items| items.len() != fields.len()) {
            return Err(Error::unexpected("HMGET", reply));
        }
        decode_each_optional(self.client.context(), Role::HashValue, "HMGET", reply)
    }

    /// Every field value, in no particular order.
    pub async fn values(&self, key: &K) -> Result<Vec<HV>> {
        let command = Command::new("HVALS").arg(self.client.encode_key(key)?);
        let reply = self.client.execute(command).await?;
        decode_each(self.client.context(), Role::HashValue, "HVALS", reply)
    }

    /// Every field with its value, in no particular order.
    pub async fn entries(&self, key: &K) -> Result<Vec<(HK, HV)>> {
        let command = Command::new("HGETALL").arg(self.client.encode_key(key)?);
        let items = expect_array("HGETALL", self.client.execute(command).await?)?;
        decode_pairs(
            self.client.context(),
            (Role::HashKey, Role::HashValue),
            "HGETALL",
            items,
        )
    }

    /// Number of fields.
    pub async fn size(&self, key: &K) -> Result<usize> {
        let command = Command::new("HLEN").arg(self.client.encode_key(key)?);
        expect_count("HLEN", self.client.execute(command).await?)
    }

    /// Adds `delta` to an integer field and returns the result.
    ///
    /// A field holding anything else fails with [`Error::TypeMismatch`] and
    /// keeps its value.
    pub async fn increment(&self, key: &K, field: &HK, delta: i64) -> Result<i64> {
        let command = Command::new("HINCRBY")
            .arg(self.client.encode_key(key)?)
            .arg(self.encode_field(field)?)
            .num(delta);
        expect_integer("HINCRBY", self.client.execute(command).await?)
    }

    /// Adds `delta` to a numeric field and returns the result.
    pub async fn increment_float(&self, key: &K, field: &HK, delta: f64) -> Result<f64> {
        let command = Command::new("HINCRBYFLOAT")
            .arg(self.client.encode_key(key)?)
            .arg(self.encode_field(field)?)
            .num(delta);
        expect_float("HINCRBYFLOAT", self.client.execute(command).await?)
    }

    /// Removes fields. Returns how many existed.
    pub async fn remove(&self, key: &K, fields: &[HK]) -> Result<usize> {
        if fields.is_empty() {
            return Ok(0);
        }
        let command = Command::new("HDEL")
            .arg(self.client.encode_key(key)?)
            .args(self.encode_fields(fields)?);
        expect_count("HDEL", self.client.execute(command).await?)
    }
}

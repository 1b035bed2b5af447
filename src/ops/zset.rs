//! Operations on sorted sets.
//!
//! Members are unique and ordered by score ascending; members with equal
//! scores are ordered by their encoded bytes.

use crate::client::TypedClient;
use crate::error::{Error, Result};
use crate::ops::{decode_each, expect_array, expect_count, expect_float};
use crate::protocol::{Command, RespValue};
use crate::serializer::Role;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A member together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember<V> {
    pub member: V,
    pub score: f64,
}

impl<V> ScoredMember<V> {
    pub fn new(member: V, score: f64) -> Self {
        Self { member, score }
    }
}

/// Typed access to sorted sets of `V` members.
pub struct ZSetOperations<K, V> {
    client: TypedClient<K, V>,
}

impl<K, V> ZSetOperations<K, V> {
    pub(crate) fn new(client: TypedClient<K, V>) -> Self {
        Self { client }
    }
}

impl<K, V> Clone for ZSetOperations<K, V> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<K, V> ZSetOperations<K, V>
where
    K: Serialize,
    V: Serialize + DeserializeOwned,
{
    fn encode_member(&self, member: &V) -> Result<bytes::Bytes> {
        self.client.context().encode_value(member)
    }

    /// Adds `member` or updates its score. Returns true when it is new.
    pub async fn add(&self, key: &K, member: &V, score: f64) -> Result<bool> {
        let command = Command::new("ZADD")
            .arg(self.client.encode_key(key)?)
            .num(score)
            .arg(self.encode_member(member)?);
        Ok(expect_count("ZADD", self.client.execute(command).await?)? == 1)
    }

    /// Upserts every member's score. Returns how many members are new.
    pub async fn add_all(&self, key: &K, members: &[ScoredMember<V>]) -> Result<usize> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut command = Command::new("ZADD").arg(self.client.encode_key(key)?);
        for scored in members {
            command = command.num(scored.score).arg(self.encode_member(&scored.member)?);
        }
        expect_count("ZADD", self.client.execute(command).await?)
    }

    /// Removes members. Returns how many existed.
    pub async fn remove(&self, key: &K, members: &[V]) -> Result<usize> {
        if members.is_empty() {
            return Ok(0);
        }
        let encoded = members
            .iter()
            .map(|m| self.encode_member(m))
            .collect::<Result<Vec<_>>>()?;
        let command = Command::new("ZREM")
            .arg(self.client.encode_key(key)?)
            .args(encoded);
        expect_count("ZREM", self.client.execute(command).await?)
    }

    pub async fn size(&self, key: &K) -> Result<usize> {
        let command = Command::new("ZCARD").arg(self.client.encode_key(key)?);
        expect_count("ZCARD", self.client.execute(command).await?)
    }

    /// Members at positions `start..=end` of the score order; `-1` is the last.
    pub async fn range(&self, key: &K, start: i64, end: i64) -> Result<Vec<V>> {
        let command = Command::new("ZRANGE")
            .arg(self.client.encode_key(key)?)
            .num(start)
            .num(end);
        let reply = self.client.execute(command).await?;
        decode_each(self.client.context(), Role::Value, "ZRANGE", reply)
    }

    /// Like [`range`](Self::range), with each member's score.
    pub async fn range_with_scores(
        &self,
        key: &K,
        start: i64,
        end: i64,
    ) -> Result<Vec<ScoredMember<V>>> {
        let command = Command::new("ZRANGE")
            .arg(self.client.encode_key(key)?)
            .num(start)
            .num(end)
            .arg("WITHSCORES");
        let items = expect_array("ZRANGE", self.client.execute(command).await?)?;

        // scores are numeric text whatever the value strategy is
        let mut members = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let Some(member) = iter.next() {
            let Some(score) = iter.next() else {
                return Err(Error::unexpected("ZRANGE", member));
            };
            let score = expect_float("ZRANGE", score)?;
            let member = match member {
                RespValue::BulkString(bytes) => self.client.context().decode_value(&bytes)?,
                other => return Err(Error::unexpected("ZRANGE", other)),
            };
            members.push(ScoredMember::new(member, score));
        }
        Ok(members)
    }

    /// Zero-based position of `member` in score order, or `None` if absent.
    pub async fn rank(&self, key: &K, member: &V) -> Result<Option<usize>> {
        let command = Command::new("ZRANK")
            .arg(self.client.encode_key(key)?)
            .arg(self.encode_member(member)?);
        match self.client.execute(command).await? {
            RespValue::Null => Ok(None),
            reply => expect_count("ZRANK", reply).map(Some),
        }
    }

    pub async fn score(&self, key: &K, member: &V) -> Result<Option<f64>> {
        let command = Command::new("ZSCORE")
            .arg(self.client.encode_key(key)?)
            .arg(self.encode_member(member)?);
        match self.client.execute(command).await? {
            RespValue::Null => Ok(None),
            reply => expect_float("ZSCORE", reply).map(Some),
        }
    }
}

//! Sharded In-Process Store
//!
//! Holds every data structure the operation sets talk to: strings, lists,
//! hashes, sorted sets, streams and cardinality counters. Keys are spread over
//! shards by hash so unrelated keys do not contend on one lock.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                        Store                         │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐     │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │     │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │     │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘     │
//! │                  stream_notify: Notify               │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Each key holds exactly one kind of [`Value`]; touching it as another kind
//! fails with [`StoreError::WrongType`] and leaves the value untouched.

use crate::ops::stream::RecordId;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::Notify;

const NUM_SHARDS: usize = 16;

/// Field/value pairs of one stream record.
pub type Fields = Vec<(Bytes, Bytes)>;

/// Errors the store reports back as error replies.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR value is not a valid float")]
    NotFloat,

    #[error("ERR hash value is not an integer")]
    HashNotInteger,

    #[error("ERR hash value is not a float")]
    HashNotFloat,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    #[error("ERR increment would produce NaN or Infinity")]
    NonFinite,

    #[error("ERR The ID specified in XADD is equal or smaller than the target stream top item")]
    StreamIdTooSmall,
}

type StoreResult<T> = Result<T, StoreError>;

/// An append-only log of stream records, ordered by id.
#[derive(Debug, Default, Clone)]
pub struct StreamLog {
    entries: Vec<(RecordId, Fields)>,
    last_id: RecordId,
}

impl StreamLog {
    fn after(&self, id: RecordId, count: Option<usize>) -> Vec<(RecordId, Fields)> {
        let start = self.entries.partition_point(|(entry_id, _)| *entry_id <= id);
        let end = match count {
            Some(n) => (start + n).min(self.entries.len()),
            None => self.entries.len(),
        };
        self.entries[start..end].to_vec()
    }
}

/// A stored value.
#[derive(Debug, Clone)]
pub enum Value {
    String(Bytes),
    List(VecDeque<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
    SortedSet(HashMap<Bytes, f64>),
    Stream(StreamLog),
    HyperLogLog(HashSet<Bytes>),
}

macro_rules! accessors {
    ($as_ref:ident, $as_mut:ident, $variant:ident, $ty:ty) => {
        fn $as_ref(&self) -> StoreResult<&$ty> {
            match self {
                Value::$variant(inner) => Ok(inner),
                _ => Err(StoreError::WrongType),
            }
        }

        fn $as_mut(&mut self) -> StoreResult<&mut $ty> {
            match self {
                Value::$variant(inner) => Ok(inner),
                _ => Err(StoreError::WrongType),
            }
        }
    };
}

impl Value {
    accessors!(as_string, as_string_mut, String, Bytes);
    accessors!(as_list, as_list_mut, List, VecDeque<Bytes>);
    accessors!(as_hash, as_hash_mut, Hash, HashMap<Bytes, Bytes>);
    accessors!(as_zset, as_zset_mut, SortedSet, HashMap<Bytes, f64>);
    accessors!(as_stream, as_stream_mut, Stream, StreamLog);
    accessors!(as_hll, as_hll_mut, HyperLogLog, HashSet<Bytes>);

    /// The name the `TYPE` command reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) | Value::HyperLogLog(_) => "string",
            Value::List(_) => "list",
            Value::Hash(_) => "hash",
            Value::SortedSet(_) => "zset",
            Value::Stream(_) => "stream",
        }
    }

    fn is_empty_collection(&self) -> bool {
        match self {
            Value::List(l) => l.is_empty(),
            Value::Hash(h) => h.is_empty(),
            Value::SortedSet(z) => z.is_empty(),
            _ => false,
        }
    }
}

type Shard = RwLock<HashMap<Bytes, Value>>;

/// The in-process store.
///
/// Wrap it in an `Arc` to share it between connections; every method takes
/// `&self`.
pub struct Store {
    shards: Vec<Shard>,
    /// Woken on every XADD so blocked stream reads can re-check.
    stream_notify: Notify,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("shards", &self.shards.len())
            .field("keys", &self.len())
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
            stream_notify: Notify::new(),
        }
    }

    #[inline]
    fn shard(&self, key: &[u8]) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    fn read<R>(&self, key: &[u8], f: impl FnOnce(Option<&Value>) -> StoreResult<R>) -> StoreResult<R> {
        let shard = self.shard(key).read();
        f(shard.get(key))
    }

    /// Runs `f` on the value at `key`, creating it with `init` when absent.
    /// Collections left empty afterwards are removed.
    fn upsert<R>(
        &self,
        key: &Bytes,
        init: fn() -> Value,
        f: impl FnOnce(&mut Value) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut shard = self.shard(key).write();
        let value = shard.entry(key.clone()).or_insert_with(init);
        let result = f(value);
        if value.is_empty_collection() {
            shard.remove(key);
        }
        result
    }

    /// Runs `f` on an existing value; returns `default` when the key is absent.
    fn modify<R>(
        &self,
        key: &[u8],
        default: R,
        f: impl FnOnce(&mut Value) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut shard = self.shard(key).write();
        let result = match shard.get_mut(key) {
            Some(value) => f(value),
            None => return Ok(default),
        };
        if shard.get(key).is_some_and(Value::is_empty_collection) {
            shard.remove(key);
        }
        result
    }

    pub fn stream_notify(&self) -> &Notify {
        &self.stream_notify
    }

    // ========================================================================
    // KEYSPACE
    // ========================================================================

    pub fn delete(&self, key: &[u8]) -> bool {
        self.shard(key).write().remove(key).is_some()
    }

    pub fn exists(&self, key: &[u8]) -> bool {
        self.shard(key).read().contains_key(key)
    }

    pub fn key_type(&self, key: &[u8]) -> &'static str {
        self.shard(key)
            .read()
            .get(key)
            .map_or("none", Value::type_name)
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flush(&self) {
        for shard in &self.shards {
            shard.write().clear();
        }
    }

    // ========================================================================
    // STRING OPERATIONS
    // ========================================================================

    /// Unconditional write; replaces a value of any kind.
    pub fn set(&self, key: Bytes, value: Bytes) {
        self.shard(&key).write().insert(key, Value::String(value));
    }

    /// Writes only when the key is absent. Returns whether it wrote.
    pub fn set_nx(&self, key: Bytes, value: Bytes) -> bool {
        let mut shard = self.shard(&key).write();
        if shard.contains_key(&key) {
            return false;
        }
        shard.insert(key, Value::String(value));
        true
    }

    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        self.read(key, |v| Ok(v.map(Value::as_string).transpose()?.cloned()))
    }

    pub fn incr_by(&self, key: &Bytes, delta: i64) -> StoreResult<i64> {
        self.upsert(key, || Value::String(Bytes::from_static(b"0")), |v| {
            let current = v.as_string_mut()?;
            let n = parse_int(current).ok_or(StoreError::NotInteger)?;
            let next = n.checked_add(delta).ok_or(StoreError::Overflow)?;
            *current = Bytes::from(next.to_string());
            Ok(next)
        })
    }

    pub fn incr_by_float(&self, key: &Bytes, delta: f64) -> StoreResult<f64> {
        self.upsert(key, || Value::String(Bytes::from_static(b"0")), |v| {
            let current = v.as_string_mut()?;
            let n = parse_float(current).ok_or(StoreError::NotFloat)?;
            let next = finite(n + delta)?;
            *current = Bytes::from(next.to_string());
            Ok(next)
        })
    }

    // ========================================================================
    // LIST OPERATIONS
    // ========================================================================

    /// Pushes each value to the head in turn, so `LPUSH k a b` yields `[b, a]`.
    pub fn lpush(&self, key: &Bytes, values: Vec<Bytes>) -> StoreResult<usize> {
        self.upsert(key, || Value::List(VecDeque::new()), |v| {
            let list = v.as_list_mut()?;
            for value in values {
                list.push_front(value);
            }
            Ok(list.len())
        })
    }

    pub fn rpush(&self, key: &Bytes, values: Vec<Bytes>) -> StoreResult<usize> {
        self.upsert(key, || Value::List(VecDeque::new()), |v| {
            let list = v.as_list_mut()?;
            list.extend(values);
            Ok(list.len())
        })
    }

    pub fn lpop(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        self.modify(key, None, |v| Ok(v.as_list_mut()?.pop_front()))
    }

    pub fn rpop(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        self.modify(key, None, |v| Ok(v.as_list_mut()?.pop_back()))
    }

    pub fn llen(&self, key: &[u8]) -> StoreResult<usize> {
        self.read(key, |v| Ok(v.map(Value::as_list).transpose()?.map_or(0, VecDeque::len)))
    }

    /// Inclusive range; negative indices count from the tail.
    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> StoreResult<Vec<Bytes>> {
        self.read(key, |v| {
            let Some(list) = v.map(Value::as_list).transpose()? else {
                return Ok(Vec::new());
            };
            Ok(match clamp_range(list.len(), start, stop) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            })
        })
    }

    // ========================================================================
    // HASH OPERATIONS
    // ========================================================================

    /// Upserts every pair. Returns how many fields were newly created.
    pub fn hset(&self, key: &Bytes, pairs: Vec<(Bytes, Bytes)>) -> StoreResult<usize> {
        self.upsert(key, || Value::Hash(HashMap::new()), |v| {
            let hash = v.as_hash_mut()?;
            Ok(pairs
                .into_iter()
                .filter(|(field, value)| hash.insert(field.clone(), value.clone()).is_none())
                .count())
        })
    }

    pub fn hmget(&self, key: &[u8], fields: &[Bytes]) -> StoreResult<Vec<Option<Bytes>>> {
        self.read(key, |v| {
            let hash = v.map(Value::as_hash).transpose()?;
            Ok(fields
                .iter()
                .map(|f| hash.and_then(|h| h.get(f).cloned()))
                .collect())
        })
    }

    pub fn hgetall(&self, key: &[u8]) -> StoreResult<Vec<(Bytes, Bytes)>> {
        self.read(key, |v| {
            Ok(v.map(Value::as_hash)
                .transpose()?
                .map(|h| h.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
                .unwrap_or_default())
        })
    }

    pub fn hlen(&self, key: &[u8]) -> StoreResult<usize> {
        self.read(key, |v| Ok(v.map(Value::as_hash).transpose()?.map_or(0, HashMap::len)))
    }

    pub fn hdel(&self, key: &[u8], fields: &[Bytes]) -> StoreResult<usize> {
        self.modify(key, 0, |v| {
            let hash = v.as_hash_mut()?;
            Ok(fields.iter().filter(|f| hash.remove(*f).is_some()).count())
        })
    }

    pub fn hincr_by(&self, key: &Bytes, field: Bytes, delta: i64) -> StoreResult<i64> {
        self.upsert(key, || Value::Hash(HashMap::new()), |v| {
            let hash = v.as_hash_mut()?;
            let current = match hash.get(&field) {
                Some(raw) => parse_int(raw).ok_or(StoreError::HashNotInteger)?,
                None => 0,
            };
            let next = current.checked_add(delta).ok_or(StoreError::Overflow)?;
            hash.insert(field, Bytes::from(next.to_string()));
            Ok(next)
        })
    }

    pub fn hincr_by_float(&self, key: &Bytes, field: Bytes, delta: f64) -> StoreResult<f64> {
        self.upsert(key, || Value::Hash(HashMap::new()), |v| {
            let hash = v.as_hash_mut()?;
            let current = match hash.get(&field) {
                Some(raw) => parse_float(raw).ok_or(StoreError::HashNotFloat)?,
                None => 0.0,
            };
            let next = finite(current + delta)?;
            hash.insert(field, Bytes::from(next.to_string()));
            Ok(next)
        })
    }

    // ========================================================================
    // SORTED SET OPERATIONS
    // ========================================================================

    /// Upserts member scores. Returns how many members were newly added.
    pub fn zadd(&self, key: &Bytes, members: Vec<(f64, Bytes)>) -> StoreResult<usize> {
        self.upsert(key, || Value::SortedSet(HashMap::new()), |v| {
            let zset = v.as_zset_mut()?;
            Ok(members
                .into_iter()
                .filter(|(score, member)| zset.insert(member.clone(), *score).is_none())
                .count())
        })
    }

    pub fn zrem(&self, key: &[u8], members: &[Bytes]) -> StoreResult<usize> {
        self.modify(key, 0, |v| {
            let zset = v.as_zset_mut()?;
            Ok(members.iter().filter(|m| zset.remove(*m).is_some()).count())
        })
    }

    pub fn zcard(&self, key: &[u8]) -> StoreResult<usize> {
        self.read(key, |v| Ok(v.map(Value::as_zset).transpose()?.map_or(0, HashMap::len)))
    }

    pub fn zscore(&self, key: &[u8], member: &[u8]) -> StoreResult<Option<f64>> {
        self.read(key, |v| {
            Ok(v.map(Value::as_zset).transpose()?.and_then(|z| z.get(member).copied()))
        })
    }

    /// Members in score order between two inclusive positions.
    pub fn zrange(&self, key: &[u8], start: i64, stop: i64) -> StoreResult<Vec<(Bytes, f64)>> {
        self.read(key, |v| {
            let Some(zset) = v.map(Value::as_zset).transpose()? else {
                return Ok(Vec::new());
            };
            let ordered = score_order(zset);
            Ok(match clamp_range(ordered.len(), start, stop) {
                Some((from, to)) => ordered[from..=to].to_vec(),
                None => Vec::new(),
            })
        })
    }

    pub fn zrank(&self, key: &[u8], member: &[u8]) -> StoreResult<Option<usize>> {
        self.read(key, |v| {
            let Some(zset) = v.map(Value::as_zset).transpose()? else {
                return Ok(None);
            };
            Ok(score_order(zset).iter().position(|(m, _)| &m[..] == member))
        })
    }

    // ========================================================================
    // STREAM OPERATIONS
    // ========================================================================

    /// Appends a record, generating its id when `id` is `None`.
    pub fn xadd(&self, key: &Bytes, id: Option<RecordId>, fields: Fields) -> StoreResult<RecordId> {
        let id = self.upsert(key, || Value::Stream(StreamLog::default()), |v| {
            let log = v.as_stream_mut()?;
            let id = match id {
                Some(id) if id <= log.last_id => return Err(StoreError::StreamIdTooSmall),
                Some(id) => id,
                None => next_stream_id(log.last_id),
            };
            log.entries.push((id, fields));
            log.last_id = id;
            Ok(id)
        })?;
        self.stream_notify.notify_waiters();
        Ok(id)
    }

    pub fn xlen(&self, key: &[u8]) -> StoreResult<usize> {
        self.read(key, |v| {
            Ok(v.map(Value::as_stream).transpose()?.map_or(0, |s| s.entries.len()))
        })
    }

    /// The id `$` refers to: the newest id in the stream, or `0-0`.
    pub fn last_stream_id(&self, key: &[u8]) -> StoreResult<RecordId> {
        self.read(key, |v| {
            Ok(v.map(Value::as_stream)
                .transpose()?
                .map_or(RecordId::MIN, |s| s.last_id))
        })
    }

    /// Records with ids in `start..=end`, newest first.
    pub fn xrevrange(
        &self,
        key: &[u8],
        start: RecordId,
        end: RecordId,
        count: Option<usize>,
    ) -> StoreResult<Vec<(RecordId, Fields)>> {
        self.read(key, |v| {
            let Some(log) = v.map(Value::as_stream).transpose()? else {
                return Ok(Vec::new());
            };
            let records = log
                .entries
                .iter()
                .rev()
                .filter(|(id, _)| (start..=end).contains(id))
                .take(count.unwrap_or(usize::MAX))
                .cloned()
                .collect();
            Ok(records)
        })
    }

    /// Records strictly newer than `after`.
    pub fn xread(
        &self,
        key: &[u8],
        after: RecordId,
        count: Option<usize>,
    ) -> StoreResult<Vec<(RecordId, Fields)>> {
        self.read(key, |v| {
            Ok(v.map(Value::as_stream)
                .transpose()?
                .map(|s| s.after(after, count))
                .unwrap_or_default())
        })
    }

    // ========================================================================
    // CARDINALITY OPERATIONS
    // ========================================================================

    /// Adds elements. Returns true when the counter changed.
    pub fn pfadd(&self, key: &Bytes, elements: Vec<Bytes>) -> StoreResult<bool> {
        let mut shard = self.shard(key).write();
        let created = !shard.contains_key(key);
        let value = shard
            .entry(key.clone())
            .or_insert_with(|| Value::HyperLogLog(HashSet::new()));
        let set = value.as_hll_mut()?;
        let mut changed = created;
        for element in elements {
            changed |= set.insert(element);
        }
        Ok(changed)
    }

    /// Distinct elements across the union of `keys`. Counting is exact.
    pub fn pfcount(&self, keys: &[Bytes]) -> StoreResult<usize> {
        let mut union: HashSet<Bytes> = HashSet::new();
        for key in keys {
            self.read(key, |v| {
                if let Some(set) = v.map(Value::as_hll).transpose()? {
                    union.extend(set.iter().cloned());
                }
                Ok(())
            })?;
        }
        Ok(union.len())
    }
}

fn parse_int(raw: &[u8]) -> Option<i64> {
    std::str::from_utf8(raw).ok()?.parse().ok()
}

fn parse_float(raw: &[u8]) -> Option<f64> {
    std::str::from_utf8(raw)
        .ok()?
        .parse::<f64>()
        .ok()
        .filter(|f| !f.is_nan())
}

fn finite(n: f64) -> StoreResult<f64> {
    if n.is_finite() {
        Ok(n)
    } else {
        Err(StoreError::NonFinite)
    }
}

/// Converts an inclusive, possibly negative, index pair into positions
/// within `0..len`. `None` when the range selects nothing.
fn clamp_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// Members ordered by score, ties broken by member bytes.
fn score_order(zset: &HashMap<Bytes, f64>) -> Vec<(Bytes, f64)> {
    let mut ordered: Vec<(Bytes, f64)> = zset.iter().map(|(m, s)| (m.clone(), *s)).collect();
    ordered.sort_by(|(ma, sa), (mb, sb)| sa.total_cmp(sb).then_with(|| ma.cmp(mb)));
    ordered
}

fn next_stream_id(last: RecordId) -> RecordId {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    if now > last.millis {
        RecordId::new(now, 0)
    } else {
        RecordId::new(last.millis, last.sequence + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_set_nx_keeps_first_writer() {
        let store = Store::new();
        assert!(store.set_nx(b("k"), b("v1")));
        assert!(!store.set_nx(b("k"), b("v2")));
        assert_eq!(store.get(b"k").unwrap(), Some(b("v1")));
    }

    #[test]
    fn test_incr_by_rejects_text() {
        let store = Store::new();
        store.set(b("name"), b("바람과 함께 사라지다"));
        assert_eq!(store.incr_by(&b("name"), 1), Err(StoreError::NotInteger));

        store.set(b("price"), b("13000"));
        assert_eq!(store.incr_by(&b("price"), 1000), Ok(14000));
        assert_eq!(store.incr_by(&b("fresh"), 5), Ok(5));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let store = Store::new();
        store.lpush(&b("q"), vec![b("a")]).unwrap();
        assert_eq!(store.get(b"q"), Err(StoreError::WrongType));
        assert_eq!(store.hlen(b"q"), Err(StoreError::WrongType));
        assert_eq!(store.llen(b"q"), Ok(1));
    }

    #[test]
    fn test_list_is_removed_when_emptied() {
        let store = Store::new();
        store.lpush(&b("q"), vec![b("a"), b("b")]).unwrap();
        assert_eq!(store.lrange(b"q", 0, -1).unwrap(), vec![b("b"), b("a")]);
        assert_eq!(store.rpop(b"q").unwrap(), Some(b("a")));
        assert_eq!(store.rpop(b"q").unwrap(), Some(b("b")));
        assert_eq!(store.rpop(b"q").unwrap(), None);
        assert!(!store.exists(b"q"));
    }

    #[test]
    fn test_hincr_by_float_leaves_text_untouched() {
        let store = Store::new();
        store.hset(&b("h"), vec![(b("name"), b("Apple"))]).unwrap();
        assert_eq!(
            store.hincr_by_float(&b("h"), b("name"), 1.0),
            Err(StoreError::HashNotFloat)
        );
        assert_eq!(store.hmget(b"h", &[b("name")]).unwrap(), vec![Some(b("Apple"))]);
    }

    #[test]
    fn test_zset_orders_by_score_then_member() {
        let store = Store::new();
        store
            .zadd(&b("z"), vec![(1.0, b("b")), (1.0, b("a")), (0.5, b("c"))])
            .unwrap();
        let members: Vec<Bytes> = store.zrange(b"z", 0, -1).unwrap().into_iter().map(|(m, _)| m).collect();
        assert_eq!(members, vec![b("c"), b("a"), b("b")]);
        assert_eq!(store.zrank(b"z", b"b").unwrap(), Some(2));
        assert_eq!(store.zrank(b"z", b"zz").unwrap(), None);
    }

    #[test]
    fn test_zadd_updates_existing_score() {
        let store = Store::new();
        assert_eq!(store.zadd(&b("z"), vec![(1.0, b("a"))]).unwrap(), 1);
        assert_eq!(store.zadd(&b("z"), vec![(3.0, b("a"))]).unwrap(), 0);
        assert_eq!(store.zcard(b"z").unwrap(), 1);
        assert_eq!(store.zscore(b"z", b"a").unwrap(), Some(3.0));
    }

    #[test]
    fn test_clamp_range() {
        assert_eq!(clamp_range(3, 0, -1), Some((0, 2)));
        assert_eq!(clamp_range(3, -2, 10), Some((1, 2)));
        assert_eq!(clamp_range(3, 2, 1), None);
        assert_eq!(clamp_range(0, 0, -1), None);
        assert_eq!(clamp_range(3, 5, 9), None);
    }

    #[test]
    fn test_xadd_ids_increase() {
        let store = Store::new();
        let first = store.xadd(&b("s"), None, vec![(b("1"), b("100"))]).unwrap();
        let second = store.xadd(&b("s"), None, vec![(b("2"), b("200"))]).unwrap();
        assert!(second > first);
        assert_eq!(store.last_stream_id(b"s").unwrap(), second);
        assert_eq!(store.xread(b"s", first, None).unwrap().len(), 1);
        assert_eq!(store.xread(b"s", RecordId::MIN, Some(1)).unwrap().len(), 1);
        assert_eq!(
            store.xadd(&b("s"), Some(first), vec![]),
            Err(StoreError::StreamIdTooSmall)
        );
    }

    #[test]
    fn test_xrevrange_newest_first() {
        let store = Store::new();
        let key = b("s");
        let ids: Vec<RecordId> = (0..3)
            .map(|i| store.xadd(&key, None, vec![(b("n"), b(&i.to_string()))]).unwrap())
            .collect();

        let newest = store
            .xrevrange(&key, RecordId::MIN, RecordId::MAX, Some(1))
            .unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].0, ids[2]);

        let all = store.xrevrange(&key, ids[0], ids[1], None).unwrap();
        assert_eq!(all.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![ids[1], ids[0]]);
        let missing = store.xrevrange(b"missing", RecordId::MIN, RecordId::MAX, None);
        assert!(missing.unwrap().is_empty());
    }

    #[test]
    fn test_pfadd_is_idempotent() {
        let store = Store::new();
        let elements: Vec<Bytes> = ["1", "2", "3", "4", "5"].into_iter().map(b).collect();
        assert!(store.pfadd(&b("B:300"), elements.clone()).unwrap());
        assert!(!store.pfadd(&b("B:300"), elements).unwrap());
        assert_eq!(store.pfcount(&[b("B:300")]).unwrap(), 5);
    }
}

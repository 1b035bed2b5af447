//! Stream Operations
//!
//! A stream is an append-only log of records, each a small field/value map
//! identified by a store-assigned [`RecordId`].
//!
//! Reading is the one long-lived operation in the crate. [`StreamOperations::read`]
//! opens a dedicated connection and a background task that polls the store
//! with `XREAD`, delivering records through a [`StreamSubscription`]:
//!
//! ```text
//!  read(options, offset)
//!         │
//!         ▼
//!  ┌──────────────────────┐   XREAD [COUNT n] [BLOCK ms]   ┌─────────┐
//!  │ poll task            │ ─────────────────────────────▶ │  store  │
//!  │ (dedicated conn)     │ ◀───────────────────────────── │         │
//!  └──────────┬───────────┘      records / nil             └─────────┘
//!             │ mpsc
//!             ▼
//!  StreamSubscription: futures::Stream<Item = Result<StreamRecord>>
//! ```
//!
//! A `latest` offset is pinned to the stream's newest id before `read`
//! returns, so anything appended afterwards is delivered. After each
//! non-empty batch the task moves its offset past the last record and polls
//! again. A poll that comes back empty ends the subscription; so
//! does a read without a block duration after its single poll. Dropping the
//! subscription or calling [`StreamSubscription::unsubscribe`] stops the task
//! and closes its connection.

use crate::client::TypedClient;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::ops::{decode_pairs, expect_array, expect_count};
use crate::protocol::{Command, RespValue};
use crate::serializer::{Role, SerializationContext};
use bytes::Bytes;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Records buffered between the poll task and the subscriber.
const SUBSCRIPTION_BUFFER: usize = 64;

// ============================================================================
// Record ids
// ============================================================================

/// A stream record id: `<millis>-<sequence>`.
///
/// Ids are totally ordered; every record appended to a stream has a larger id
/// than the one before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    pub millis: u64,
    pub sequence: u64,
}

impl RecordId {
    /// `0-0`, smaller than any real record id.
    pub const MIN: RecordId = RecordId::new(0, 0);
    pub const MAX: RecordId = RecordId::new(u64::MAX, u64::MAX);

    pub const fn new(millis: u64, sequence: u64) -> Self {
        Self { millis, sequence }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.sequence)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid stream record id: {0:?}")]
pub struct ParseRecordIdError(String);

impl FromStr for RecordId {
    type Err = ParseRecordIdError;

    /// Accepts `millis-sequence`, or bare `millis` meaning sequence 0.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || ParseRecordIdError(s.to_string());
        let (millis, sequence) = match s.split_once('-') {
            Some((millis, sequence)) => (millis, sequence),
            None => (s, "0"),
        };
        let millis = millis.parse().map_err(|_| invalid())?;
        let sequence = sequence.parse().map_err(|_| invalid())?;
        Ok(Self::new(millis, sequence))
    }
}

// ============================================================================
// Read parameters
// ============================================================================

/// Where a read starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOffset {
    /// Only records appended after `read` returns.
    Latest,
    /// Records with an id strictly greater than this one.
    After(RecordId),
}

/// A stream key together with the offset to read it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOffset<K> {
    pub key: K,
    pub offset: ReadOffset,
}

impl<K> StreamOffset<K> {
    pub fn latest(key: K) -> Self {
        Self {
            key,
            offset: ReadOffset::Latest,
        }
    }

    /// Records after `id`.
    pub fn from(key: K, id: RecordId) -> Self {
        Self {
            key,
            offset: ReadOffset::After(id),
        }
    }

    pub fn beginning(key: K) -> Self {
        Self::from(key, RecordId::MIN)
    }
}

/// How long each poll may wait and how many records it may return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamReadOptions {
    /// `None` polls once without waiting; `Some(ZERO)` waits indefinitely.
    pub block: Option<Duration>,
    pub count: Option<usize>,
}

impl StreamReadOptions {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn block(mut self, duration: Duration) -> Self {
        self.block = Some(duration);
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

/// One record read from a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord<HK, HV> {
    pub id: RecordId,
    pub fields: Vec<(HK, HV)>,
}

// ============================================================================
// Operations
// ============================================================================

/// Typed access to streams whose records map `HK` fields to `HV` values.
pub struct StreamOperations<K, HK, HV> {
    client: TypedClient<K, ()>,
    _fields: PhantomData<fn() -> (HK, HV)>,
}

impl<K, HK, HV> StreamOperations<K, HK, HV> {
    pub(crate) fn new<V>(client: TypedClient<K, V>) -> Self {
        Self {
            client: client.retype(),
            _fields: PhantomData,
        }
    }
}

impl<K, HK, HV> Clone for StreamOperations<K, HK, HV> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<K, HK, HV> StreamOperations<K, HK, HV>
where
    K: Serialize,
    HK: Serialize + DeserializeOwned + Send + 'static,
    HV: Serialize + DeserializeOwned + Send + 'static,
{
    /// Appends a record and returns the id the store assigned to it.
    pub async fn add<'a, I>(&self, key: &K, fields: I) -> Result<RecordId>
    where
        I: IntoIterator<Item = (&'a HK, &'a HV)>,
        HK: 'a,
        HV: 'a,
    {
        let context = self.client.context();
        let mut command = Command::new("XADD").arg(self.client.encode_key(key)?).arg("*");
        for (field, value) in fields {
            command = command
                .arg(context.encode(Role::HashKey, field)?)
                .arg(context.encode(Role::HashValue, value)?);
        }

        let reply = self.client.execute(command).await?;
        let id = reply.as_str().and_then(|s| s.parse::<RecordId>().ok());
        id.ok_or_else(|| Error::unexpected("XADD", reply))
    }

    /// Number of records in the stream.
    pub async fn size(&self, key: &K) -> Result<usize> {
        let command = Command::new("XLEN").arg(self.client.encode_key(key)?);
        expect_count("XLEN", self.client.execute(command).await?)
    }

    /// Starts reading `offset.key` and returns the subscription delivering
    /// its records.
    ///
    /// Connection errors are reported here; later failures arrive as `Err`
    /// items on the subscription, after which it ends.
    pub async fn read(
        &self,
        options: StreamReadOptions,
        offset: StreamOffset<K>,
    ) -> Result<StreamSubscription<HK, HV>> {
        let key = self.client.encode_key(&offset.key)?;
        let mut connection = self.client.factory().open_dedicated().await?;
        let position = match offset.offset {
            ReadOffset::After(id) => id,
            ReadOffset::Latest => newest_id(&mut connection, key.clone()).await?,
        };
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        debug!(
            stream = %String::from_utf8_lossy(&key),
            %position,
            ?options,
            "Stream subscription started"
        );

        let poller = Poller {
            connection,
            context: *self.client.context(),
            key,
            position,
            options,
            tx,
        };
        let task = tokio::spawn(poller.run());

        Ok(StreamSubscription { records: rx, task })
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// The records of a running stream read.
///
/// Yields `Ok(record)` in id order and ends when the read does. Dropping it
/// stops the read.
pub struct StreamSubscription<HK, HV> {
    records: mpsc::Receiver<Result<StreamRecord<HK, HV>>>,
    task: JoinHandle<()>,
}

impl<HK, HV> StreamSubscription<HK, HV> {
    /// Stops delivery and releases the connection.
    pub fn unsubscribe(mut self) {
        debug!("Stream subscription stopped");
        self.stop();
    }

    /// False once the read has ended or been stopped. Records already
    /// buffered can still be taken.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    fn stop(&mut self) {
        self.task.abort();
        self.records.close();
    }
}

impl<HK, HV> Stream for StreamSubscription<HK, HV> {
    type Item = Result<StreamRecord<HK, HV>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.records.poll_recv(cx)
    }
}

impl<HK, HV> Drop for StreamSubscription<HK, HV> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<HK, HV> fmt::Debug for StreamSubscription<HK, HV> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// The background side of a subscription.
struct Poller<HK, HV> {
    connection: Connection,
    context: SerializationContext,
    key: Bytes,
    position: RecordId,
    options: StreamReadOptions,
    tx: mpsc::Sender<Result<StreamRecord<HK, HV>>>,
}

impl<HK, HV> Poller<HK, HV>
where
    HK: DeserializeOwned + Send + 'static,
    HV: DeserializeOwned + Send + 'static,
{
    async fn run(mut self) {
        loop {
            let batch = match self.poll().await {
                Ok(batch) => batch,
                Err(e) => {
                    debug!(error = %e, "Stream read failed");
                    let _ = self.tx.send(Err(e)).await;
                    return;
                }
            };

            if batch.is_empty() {
                debug!("Stream read ended without new records");
                return;
            }

            trace!(records = batch.len(), "Stream batch received");
            for (id, fields) in batch {
                self.position = id;
                let record = decode_pairs(
                    &self.context,
                    (Role::HashKey, Role::HashValue),
                    "XREAD",
                    fields,
                )
                .map(|fields| StreamRecord { id, fields });
                if self.tx.send(record).await.is_err() {
                    return;
                }
            }

            if self.options.block.is_none() {
                return;
            }
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new("XREAD");
        if let Some(count) = self.options.count {
            command = command.arg("COUNT").num(count);
        }
        if let Some(block) = self.options.block {
            // BLOCK 0 waits forever, so a positive wait never rounds down to it
            command = command.arg("BLOCK").num(block.as_nanos().div_ceil(1_000_000));
        }
        command
            .arg("STREAMS")
            .arg(self.key.clone())
            .num(self.position)
    }

    /// One XREAD round trip; nil or an empty reply is an empty batch.
    async fn poll(&mut self) -> Result<Vec<(RecordId, Vec<RespValue>)>> {
        let command = self.command();
        let reply = self.connection.execute(command).await?;

        let mut batch = Vec::new();
        for stream in expect_array("XREAD", reply)? {
            let parts = expect_array("XREAD", stream)?;
            let [_key, records] = <[RespValue; 2]>::try_from(parts)
                .map_err(|parts| Error::unexpected("XREAD", RespValue::array(parts)))?;
            for record in expect_array("XREAD", records)? {
                batch.push(parse_record("XREAD", record)?);
            }
        }
        Ok(batch)
    }
}

/// The newest id in the stream, or `0-0` when it is empty or missing.
async fn newest_id(connection: &mut Connection, key: Bytes) -> Result<RecordId> {
    let command = Command::new("XREVRANGE")
        .arg(key)
        .arg("+")
        .arg("-")
        .arg("COUNT")
        .num(1);
    let reply = connection.execute(command).await?;
    match expect_array("XREVRANGE", reply)?.into_iter().next() {
        Some(record) => parse_record("XREVRANGE", record).map(|(id, _)| id),
        None => Ok(RecordId::MIN),
    }
}

/// `[id, [field, value, ...]]`
fn parse_record(command: &'static str, record: RespValue) -> Result<(RecordId, Vec<RespValue>)> {
    let parts = expect_array(command, record)?;
    let [id, fields] = <[RespValue; 2]>::try_from(parts)
        .map_err(|parts| Error::unexpected(command, RespValue::array(parts)))?;
    let parsed = id.as_str().and_then(|s| s.parse::<RecordId>().ok());
    let id = parsed.ok_or_else(|| Error::unexpected(command, id))?;
    Ok((id, expect_array(command, fields)?))
}

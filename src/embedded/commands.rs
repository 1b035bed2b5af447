//! Command Dispatcher
//!
//! Turns a RESP command array into a call on the [`Store`] and the result into
//! a RESP reply, the way a remote store would answer it.
//!
//! ## Supported Commands
//!
//! - Keyspace: `PING`, `DEL`, `EXISTS`, `TYPE`, `DBSIZE`, `FLUSHDB`
//! - Strings: `SET [NX]`, `SETNX`, `GET`, `MGET`, `INCR`, `INCRBY`, `INCRBYFLOAT`
//! - Lists: `LPUSH`, `RPUSH`, `LPOP`, `RPOP`, `LLEN`, `LRANGE`
//! - Hashes: `HSET`, `HGET`, `HMGET`, `HVALS`, `HGETALL`, `HLEN`, `HDEL`,
//!   `HINCRBY`, `HINCRBYFLOAT`
//! - Sorted sets: `ZADD`, `ZREM`, `ZCARD`, `ZRANGE [WITHSCORES]`, `ZRANK`, `ZSCORE`
//! - Streams: `XADD`, `XLEN`, `XREVRANGE key end start [COUNT n]`,
//!   `XREAD [COUNT n] [BLOCK ms] STREAMS key... id...`
//! - Cardinality: `PFADD`, `PFCOUNT`
//!
//! `XREAD` with `BLOCK` is the only command that waits; it goes through
//! [`CommandHandler::execute_async`].

use crate::embedded::engine::{Fields, Store, StoreError};
use crate::ops::stream::RecordId;
use crate::protocol::RespValue;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// A reply, or an error reply produced while validating arguments.
type Reply = Result<RespValue, RespValue>;

impl From<StoreError> for RespValue {
    fn from(err: StoreError) -> Self {
        RespValue::error(err.to_string())
    }
}

/// Parsed arguments of an `XREAD` command.
#[derive(Debug)]
struct XreadArgs {
    count: Option<usize>,
    block: Option<Duration>,
    keys: Vec<Bytes>,
    ids: Vec<StreamStart>,
}

#[derive(Debug, Clone, Copy)]
enum StreamStart {
    /// `$`: whatever is newest when the command arrives.
    Latest,
    After(RecordId),
}

/// Executes commands against a shared [`Store`].
#[derive(Clone, Debug)]
pub struct CommandHandler {
    storage: Arc<Store>,
}

impl CommandHandler {
    pub fn new(storage: Arc<Store>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<Store> {
        &self.storage
    }

    /// Executes a command that never waits.
    ///
    /// A blocking `XREAD` sent here is answered as if its timeout had already
    /// elapsed.
    pub fn execute(&self, command: RespValue) -> RespValue {
        let args = match split_command(command) {
            Ok(args) => args,
            Err(reply) => return reply,
        };
        let name = match command_name(&args[0]) {
            Ok(name) => name,
            Err(reply) => return reply,
        };
        trace!(command = %name, args = args.len() - 1, "Executing command");
        self.dispatch(&name, &args[1..]).unwrap_or_else(|e| e)
    }

    /// Executes any command, waiting on `XREAD ... BLOCK` until data arrives
    /// or the block duration elapses.
    pub async fn execute_async(&self, command: RespValue) -> RespValue {
        let args = match split_command(command) {
            Ok(args) => args,
            Err(reply) => return reply,
        };
        let name = match command_name(&args[0]) {
            Ok(name) => name,
            Err(reply) => return reply,
        };

        if name == "XREAD" {
            return match parse_xread(&args[1..]) {
                Ok(xread) => self.xread_blocking(xread).await.unwrap_or_else(|e| e),
                Err(reply) => reply,
            };
        }

        self.dispatch(&name, &args[1..]).unwrap_or_else(|e| e)
    }

    fn dispatch(&self, cmd: &str, args: &[RespValue]) -> Reply {
        match cmd {
            // Keyspace
            "PING" => Ok(match args.first() {
                Some(msg) => RespValue::bulk_string(bytes(msg)?),
                None => RespValue::simple_string("PONG"),
            }),
            "DEL" => {
                arity(cmd, args, 1)?;
                let deleted = keys(args)?.iter().filter(|k| self.storage.delete(k)).count();
                Ok(RespValue::integer(deleted as i64))
            }
            "EXISTS" => {
                arity(cmd, args, 1)?;
                let found = keys(args)?.iter().filter(|k| self.storage.exists(k)).count();
                Ok(RespValue::integer(found as i64))
            }
            "TYPE" => {
                exact(cmd, args, 1)?;
                Ok(RespValue::simple_string(self.storage.key_type(&bytes(&args[0])?)))
            }
            "DBSIZE" => Ok(RespValue::integer(self.storage.len() as i64)),
            "FLUSHDB" | "FLUSHALL" => {
                self.storage.flush();
                Ok(RespValue::ok())
            }

            // Strings
            "SET" => self.cmd_set(args),
            "SETNX" => {
                exact(cmd, args, 2)?;
                let written = self.storage.set_nx(bytes(&args[0])?, bytes(&args[1])?);
                Ok(RespValue::integer(written as i64))
            }
            "GET" => {
                exact(cmd, args, 1)?;
                Ok(optional(self.storage.get(&bytes(&args[0])?)?))
            }
            "MGET" => {
                arity(cmd, args, 1)?;
                let values = keys(args)?
                    .iter()
                    // MGET answers nil for keys of another type
                    .map(|k| optional(self.storage.get(k).ok().flatten()))
                    .collect();
                Ok(RespValue::array(values))
            }
            "INCR" => {
                exact(cmd, args, 1)?;
                Ok(RespValue::integer(self.storage.incr_by(&bytes(&args[0])?, 1)?))
            }
            "INCRBY" => {
                exact(cmd, args, 2)?;
                let delta = integer(&args[1])?;
                Ok(RespValue::integer(self.storage.incr_by(&bytes(&args[0])?, delta)?))
            }
            "INCRBYFLOAT" => {
                exact(cmd, args, 2)?;
                let delta = float(&args[1])?;
                let next = self.storage.incr_by_float(&bytes(&args[0])?, delta)?;
                Ok(RespValue::bulk_string(next.to_string()))
            }

            // Lists
            "LPUSH" | "RPUSH" => {
                arity(cmd, args, 2)?;
                let key = bytes(&args[0])?;
                let values = keys(&args[1..])?;
                let len = if cmd == "LPUSH" {
                    self.storage.lpush(&key, values)?
                } else {
                    self.storage.rpush(&key, values)?
                };
                Ok(RespValue::integer(len as i64))
            }
            "LPOP" => {
                exact(cmd, args, 1)?;
                Ok(optional(self.storage.lpop(&bytes(&args[0])?)?))
            }
            "RPOP" => {
                exact(cmd, args, 1)?;
                Ok(optional(self.storage.rpop(&bytes(&args[0])?)?))
            }
            "LLEN" => {
                exact(cmd, args, 1)?;
                Ok(RespValue::integer(self.storage.llen(&bytes(&args[0])?)? as i64))
            }
            "LRANGE" => {
                exact(cmd, args, 3)?;
                let items = self
                    .storage
                    .lrange(&bytes(&args[0])?, integer(&args[1])?, integer(&args[2])?)?;
                Ok(bulk_array(items))
            }

            // Hashes
            "HSET" => {
                if args.len() < 3 || args.len() % 2 == 0 {
                    return Err(wrong_arity(cmd));
                }
                let pairs = pairs(&args[1..])?;
                Ok(RespValue::integer(self.storage.hset(&bytes(&args[0])?, pairs)? as i64))
            }
            "HGET" => {
                exact(cmd, args, 2)?;
                let mut found = self.storage.hmget(&bytes(&args[0])?, &[bytes(&args[1])?])?;
                Ok(optional(found.pop().flatten()))
            }
            "HMGET" => {
                arity(cmd, args, 2)?;
                let values = self.storage.hmget(&bytes(&args[0])?, &keys(&args[1..])?)?;
                Ok(RespValue::array(values.into_iter().map(optional).collect()))
            }
            "HVALS" => {
                exact(cmd, args, 1)?;
                let entries = self.storage.hgetall(&bytes(&args[0])?)?;
                Ok(bulk_array(entries.into_iter().map(|(_, v)| v).collect()))
            }
            "HGETALL" => {
                exact(cmd, args, 1)?;
                Ok(flat_pairs(self.storage.hgetall(&bytes(&args[0])?)?))
            }
            "HLEN" => {
                exact(cmd, args, 1)?;
                Ok(RespValue::integer(self.storage.hlen(&bytes(&args[0])?)? as i64))
            }
            "HDEL" => {
                arity(cmd, args, 2)?;
                let removed = self.storage.hdel(&bytes(&args[0])?, &keys(&args[1..])?)?;
                Ok(RespValue::integer(removed as i64))
            }
            "HINCRBY" => {
                exact(cmd, args, 3)?;
                let next = self.storage.hincr_by(
                    &bytes(&args[0])?,
                    bytes(&args[1])?,
                    integer(&args[2])?,
                )?;
                Ok(RespValue::integer(next))
            }
            "HINCRBYFLOAT" => {
                exact(cmd, args, 3)?;
                let next = self.storage.hincr_by_float(
                    &bytes(&args[0])?,
                    bytes(&args[1])?,
                    float(&args[2])?,
                )?;
                Ok(RespValue::bulk_string(next.to_string()))
            }

            // Sorted sets
            "ZADD" => {
                if args.len() < 3 || args.len() % 2 == 0 {
                    return Err(wrong_arity(cmd));
                }
                let members = args[1..]
                    .chunks(2)
                    .map(|pair| -> Result<(f64, Bytes), RespValue> {
                        Ok((float(&pair[0])?, bytes(&pair[1])?))
                    })
                    .collect::<Result<Vec<_>, RespValue>>()?;
                Ok(RespValue::integer(self.storage.zadd(&bytes(&args[0])?, members)? as i64))
            }
            "ZREM" => {
                arity(cmd, args, 2)?;
                let removed = self.storage.zrem(&bytes(&args[0])?, &keys(&args[1..])?)?;
                Ok(RespValue::integer(removed as i64))
            }
            "ZCARD" => {
                exact(cmd, args, 1)?;
                Ok(RespValue::integer(self.storage.zcard(&bytes(&args[0])?)? as i64))
            }
            "ZRANGE" => self.cmd_zrange(args),
            "ZRANK" => {
                exact(cmd, args, 2)?;
                let rank = self.storage.zrank(&bytes(&args[0])?, &bytes(&args[1])?)?;
                Ok(rank.map_or(RespValue::Null, |r| RespValue::integer(r as i64)))
            }
            "ZSCORE" => {
                exact(cmd, args, 2)?;
                let score = self.storage.zscore(&bytes(&args[0])?, &bytes(&args[1])?)?;
                Ok(score.map_or(RespValue::Null, |s| RespValue::bulk_string(s.to_string())))
            }

            // Streams
            "XADD" => self.cmd_xadd(args),
            "XLEN" => {
                exact(cmd, args, 1)?;
                Ok(RespValue::integer(self.storage.xlen(&bytes(&args[0])?)? as i64))
            }
            "XREVRANGE" => self.cmd_xrevrange(args),
            "XREAD" => {
                let xread = parse_xread(args)?;
                let starts = self.resolve_starts(&xread)?;
                self.read_streams(&xread, &starts)
            }

            // Cardinality
            "PFADD" => {
                arity(cmd, args, 1)?;
                let changed = self.storage.pfadd(&bytes(&args[0])?, keys(&args[1..])?)?;
                Ok(RespValue::integer(changed as i64))
            }
            "PFCOUNT" => {
                arity(cmd, args, 1)?;
                Ok(RespValue::integer(self.storage.pfcount(&keys(args)?)? as i64))
            }

            _ => Err(RespValue::error(format!("ERR unknown command '{}'", cmd))),
        }
    }

    /// SET key value [NX]
    fn cmd_set(&self, args: &[RespValue]) -> Reply {
        if args.len() < 2 {
            return Err(wrong_arity("SET"));
        }
        let key = bytes(&args[0])?;
        let value = bytes(&args[1])?;

        let mut nx = false;
        for opt in &args[2..] {
            match string(opt)?.to_uppercase().as_str() {
                "NX" => nx = true,
                other => return Err(RespValue::error(format!("ERR unknown option '{}'", other))),
            }
        }

        if nx {
            return Ok(if self.storage.set_nx(key, value) {
                RespValue::ok()
            } else {
                RespValue::Null
            });
        }

        self.storage.set(key, value);
        Ok(RespValue::ok())
    }

    /// ZRANGE key start stop [WITHSCORES]
    fn cmd_zrange(&self, args: &[RespValue]) -> Reply {
        if args.len() != 3 && args.len() != 4 {
            return Err(wrong_arity("ZRANGE"));
        }
        let with_scores = match args.get(3) {
            Some(opt) if string(opt)?.eq_ignore_ascii_case("WITHSCORES") => true,
            Some(_) => return Err(RespValue::error("ERR syntax error")),
            None => false,
        };

        let members = self
            .storage
            .zrange(&bytes(&args[0])?, integer(&args[1])?, integer(&args[2])?)?;

        let mut reply = Vec::with_capacity(members.len() * 2);
        for (member, score) in members {
            reply.push(RespValue::bulk_string(member));
            if with_scores {
                reply.push(RespValue::bulk_string(score.to_string()));
            }
        }
        Ok(RespValue::array(reply))
    }

    /// XADD key <* | id> field value [field value ...]
    fn cmd_xadd(&self, args: &[RespValue]) -> Reply {
        if args.len() < 4 || args.len() % 2 != 0 {
            return Err(wrong_arity("XADD"));
        }
        let id = match string(&args[1])?.as_str() {
            "*" => None,
            explicit => Some(explicit.parse::<RecordId>().map_err(|_| {
                RespValue::error("ERR Invalid stream ID specified as stream command argument")
            })?),
        };
        let fields: Fields = pairs(&args[2..])?;
        let id = self.storage.xadd(&bytes(&args[0])?, id, fields)?;
        Ok(RespValue::bulk_string(id.to_string()))
    }

    /// XREVRANGE key end start [COUNT n]
    fn cmd_xrevrange(&self, args: &[RespValue]) -> Reply {
        let count = match args.len() {
            3 => None,
            5 if string(&args[3])?.eq_ignore_ascii_case("COUNT") => {
                Some(integer(&args[4])?.max(0) as usize)
            }
            3..=5 => return Err(syntax_error()),
            _ => return Err(wrong_arity("XREVRANGE")),
        };
        let end = range_bound(&args[1])?;
        let start = range_bound(&args[2])?;
        let records = self.storage.xrevrange(&bytes(&args[0])?, start, end, count)?;
        Ok(record_array(records))
    }

    /// Pins `$` to the newest id present right now.
    fn resolve_starts(&self, xread: &XreadArgs) -> Result<Vec<RecordId>, RespValue> {
        xread
            .keys
            .iter()
            .zip(&xread.ids)
            .map(|(key, start)| -> Result<RecordId, RespValue> {
                match start {
                    StreamStart::Latest => Ok(self.storage.last_stream_id(key)?),
                    StreamStart::After(id) => Ok(*id),
                }
            })
            .collect()
    }

    /// One non-blocking pass over the requested streams; nil when all are empty.
    fn read_streams(&self, xread: &XreadArgs, starts: &[RecordId]) -> Reply {
        let mut streams = Vec::new();
        for (key, after) in xread.keys.iter().zip(starts) {
            let records = self.storage.xread(key, *after, xread.count)?;
            if records.is_empty() {
                continue;
            }
            streams.push(RespValue::array(vec![
                RespValue::bulk_string(key.clone()),
                record_array(records),
            ]));
        }

        Ok(if streams.is_empty() {
            RespValue::Null
        } else {
            RespValue::array(streams)
        })
    }

    async fn xread_blocking(&self, xread: XreadArgs) -> Reply {
        let starts = self.resolve_starts(&xread)?;
        let Some(block) = xread.block else {
            return self.read_streams(&xread, &starts);
        };
        // BLOCK 0 waits until data arrives
        let deadline = (!block.is_zero()).then(|| Instant::now() + block);

        loop {
            let notified = self.storage.stream_notify().notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let reply = self.read_streams(&xread, &starts)?;
            if !reply.is_null() {
                return Ok(reply);
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Ok(RespValue::Null);
                    }
                }
                None => notified.await,
            }
        }
    }
}

fn split_command(command: RespValue) -> Result<Vec<RespValue>, RespValue> {
    match command {
        RespValue::Array(args) if !args.is_empty() => Ok(args),
        RespValue::Array(_) => Err(RespValue::error("ERR empty command")),
        _ => Err(RespValue::error("ERR invalid command format")),
    }
}

fn command_name(value: &RespValue) -> Result<String, RespValue> {
    value
        .as_str()
        .map(str::to_uppercase)
        .ok_or_else(|| RespValue::error("ERR invalid command name"))
}

fn parse_xread(args: &[RespValue]) -> Result<XreadArgs, RespValue> {
    let mut count = None;
    let mut block = None;
    let mut i = 0;

    while i < args.len() {
        match string(&args[i])?.to_uppercase().as_str() {
            "COUNT" => {
                let n = args.get(i + 1).ok_or_else(syntax_error).and_then(integer)?;
                count = Some(n.max(0) as usize);
                i += 2;
            }
            "BLOCK" => {
                let ms = args.get(i + 1).ok_or_else(syntax_error).and_then(integer)?;
                if ms < 0 {
                    return Err(RespValue::error("ERR timeout is negative"));
                }
                block = Some(Duration::from_millis(ms as u64));
                i += 2;
            }
            "STREAMS" => {
                let rest = &args[i + 1..];
                if rest.is_empty() || rest.len() % 2 != 0 {
                    return Err(RespValue::error(
                        "ERR Unbalanced 'xread' list of streams: for each stream key an ID or '$' must be specified.",
                    ));
                }
                let (key_args, id_args) = rest.split_at(rest.len() / 2);
                let keys = keys(key_args)?;
                let ids = id_args
                    .iter()
                    .map(|arg| -> Result<StreamStart, RespValue> {
                        match string(arg)?.as_str() {
                            "$" => Ok(StreamStart::Latest),
                            id => id.parse::<RecordId>().map(StreamStart::After).map_err(|_| {
                                RespValue::error(
                                    "ERR Invalid stream ID specified as stream command argument",
                                )
                            }),
                        }
                    })
                    .collect::<Result<Vec<_>, RespValue>>()?;
                return Ok(XreadArgs {
                    count,
                    block,
                    keys,
                    ids,
                });
            }
            _ => return Err(syntax_error()),
        }
    }

    Err(syntax_error())
}

// ============================================================================
// Argument helpers
// ============================================================================

fn bytes(value: &RespValue) -> Result<Bytes, RespValue> {
    match value {
        RespValue::BulkString(b) => Ok(b.clone()),
        RespValue::SimpleString(s) => Ok(Bytes::from(s.clone())),
        _ => Err(RespValue::error("ERR invalid argument")),
    }
}

fn string(value: &RespValue) -> Result<String, RespValue> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| RespValue::error("ERR invalid argument"))
}

fn integer(value: &RespValue) -> Result<i64, RespValue> {
    match value {
        RespValue::Integer(n) => Ok(*n),
        other => other
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| RespValue::from(StoreError::NotInteger)),
    }
}

fn float(value: &RespValue) -> Result<f64, RespValue> {
    value
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|f| !f.is_nan())
        .ok_or_else(|| RespValue::from(StoreError::NotFloat))
}

fn keys(args: &[RespValue]) -> Result<Vec<Bytes>, RespValue> {
    args.iter().map(bytes).collect()
}

fn pairs(args: &[RespValue]) -> Result<Vec<(Bytes, Bytes)>, RespValue> {
    args.chunks(2)
        .map(|pair| -> Result<(Bytes, Bytes), RespValue> {
            Ok((bytes(&pair[0])?, bytes(&pair[1])?))
        })
        .collect()
}

fn optional(value: Option<Bytes>) -> RespValue {
    value.map_or(RespValue::Null, RespValue::bulk_string)
}

fn bulk_array(items: Vec<Bytes>) -> RespValue {
    RespValue::array(items.into_iter().map(RespValue::bulk_string).collect())
}

fn flat_pairs(pairs: Vec<(Bytes, Bytes)>) -> RespValue {
    RespValue::array(
        pairs
            .into_iter()
            .flat_map(|(f, v)| [RespValue::bulk_string(f), RespValue::bulk_string(v)])
            .collect(),
    )
}

/// `-`, `+` or an explicit id.
fn range_bound(value: &RespValue) -> Result<RecordId, RespValue> {
    match string(value)?.as_str() {
        "-" => Ok(RecordId::MIN),
        "+" => Ok(RecordId::MAX),
        id => id.parse::<RecordId>().map_err(|_| {
            RespValue::error("ERR Invalid stream ID specified as stream command argument")
        }),
    }
}

/// `[[id, [field, value, ...]], ...]`
fn record_array(records: Vec<(RecordId, Fields)>) -> RespValue {
    RespValue::array(
        records
            .into_iter()
            .map(|(id, fields)| {
                RespValue::array(vec![RespValue::bulk_string(id.to_string()), flat_pairs(fields)])
            })
            .collect(),
    )
}

fn wrong_arity(cmd: &str) -> RespValue {
    RespValue::error(format!(
        "ERR wrong number of arguments for '{}' command",
        cmd.to_lowercase()
    ))
}

fn syntax_error() -> RespValue {
    RespValue::error("ERR syntax error")
}

fn arity(cmd: &str, args: &[RespValue], min: usize) -> Result<(), RespValue> {
    if args.len() < min {
        Err(wrong_arity(cmd))
    } else {
        Ok(())
    }
}

fn exact(cmd: &str, args: &[RespValue], n: usize) -> Result<(), RespValue> {
    if args.len() != n {
        Err(wrong_arity(cmd))
    } else {
        Ok(())
    }
}

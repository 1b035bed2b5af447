//! TCP Connection
//!
//! One socket to a remote store. A request writes a RESP command and reads
//! exactly one reply back.
//!
//! ## Buffer Management
//!
//! Replies accumulate in a `BytesMut` buffer. TCP is a stream protocol, so one
//! read may carry half a reply or several; the parser only consumes a reply
//! once it is complete.

use crate::connection::config::ConnectionConfig;
use crate::connection::stats::ConnectionStats;
use crate::error::{Error, Result};
use crate::protocol::{RespParser, RespValue};
use bytes::BytesMut;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Initial read buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// An open socket to the store.
pub struct TcpConnection {
    stream: BufWriter<TcpStream>,
    addr: String,
    buffer: BytesMut,
    parser: RespParser,
    stats: Arc<ConnectionStats>,
}

impl TcpConnection {
    /// Connects within the configured timeout.
    pub async fn connect(config: &ConnectionConfig, stats: Arc<ConnectionStats>) -> Result<Self> {
        let addr = config.addr();
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Timeout(addr.clone()))??;
        stream.set_nodelay(true)?;

        stats.connection_opened();
        debug!(server = %addr, "Connected");

        Ok(Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            parser: RespParser::new(),
            stats,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub(crate) fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Sends one command and waits for its reply.
    pub async fn request(&mut self, command: &RespValue) -> Result<RespValue> {
        self.send(command).await?;
        self.read_reply().await
    }

    async fn send(&mut self, command: &RespValue) -> Result<()> {
        let bytes = command.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(server = %self.addr, bytes = bytes.len(), "Sent command");
        Ok(())
    }

    async fn read_reply(&mut self) -> Result<RespValue> {
        loop {
            if !self.buffer.is_empty() {
                if let Some((value, consumed)) = self.parser.parse(&self.buffer)? {
                    let _ = self.buffer.split_to(consumed);
                    trace!(
                        server = %self.addr,
                        consumed = consumed,
                        remaining = self.buffer.len(),
                        "Parsed reply"
                    );
                    return Ok(value);
                }
            }

            if self.buffer.capacity() - self.buffer.len() < 1024 {
                self.buffer.reserve(INITIAL_BUFFER_SIZE);
            }

            let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            self.stats.bytes_read(n);
            trace!(server = %self.addr, bytes = n, "Read data");
        }
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.stats.connection_closed();
        debug!(server = %self.addr, "Connection closed");
    }
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("addr", &self.addr)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

//! Connection Module
//!
//! Everything between a typed operation and the store: coordinates, the
//! factory that owns them, and the connections it opens.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   ConnectionFactory                      │
//! │                                                          │
//! │   shared: Mutex<Option<Connection>>   open_dedicated()   │
//! │             │  (lazy, reused)                │           │
//! │             ▼                                ▼           │
//! │   ┌──────────────────┐              ┌──────────────────┐ │
//! │   │    Connection    │              │    Connection    │ │
//! │   │  Tcp | Embedded  │              │ (stream reads)   │ │
//! │   └──────────────────┘              └──────────────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`Connection`] is either a socket to a remote store or a handle on an
//! in-process [`Store`](crate::embedded::Store). Both answer the same commands
//! with the same replies.

pub mod config;
pub mod factory;
pub mod stats;
pub mod tcp;

pub use config::ConnectionConfig;
pub use factory::ConnectionFactory;
pub use stats::{ConnectionStats, StatsSnapshot};
pub use tcp::TcpConnection;

use crate::embedded::{CommandHandler, Store};
use crate::error::Result;
use crate::protocol::{Command, RespValue};
use std::sync::Arc;
use tracing::trace;

/// A connection to the store.
#[derive(Debug)]
pub enum Connection {
    Tcp(TcpConnection),
    Embedded(EmbeddedConnection),
}

impl Connection {
    pub async fn tcp(config: &ConnectionConfig, stats: Arc<ConnectionStats>) -> Result<Self> {
        Ok(Connection::Tcp(TcpConnection::connect(config, stats).await?))
    }

    pub fn embedded(store: Arc<Store>, stats: Arc<ConnectionStats>) -> Self {
        stats.connection_opened();
        Connection::Embedded(EmbeddedConnection {
            handler: CommandHandler::new(store),
            stats,
        })
    }

    /// Sends a command and returns its reply. Error replies come back as
    /// `Err`.
    pub async fn execute(&mut self, command: Command) -> Result<RespValue> {
        trace!(command = command.name(), args = command.arg_count(), "Executing");
        let request = command.into_resp();

        self.stats().command_sent();
        let reply = match self {
            Connection::Tcp(conn) => conn.request(&request).await?,
            Connection::Embedded(conn) => conn.handler.execute_async(request).await,
        };

        if reply.is_error() {
            self.stats().error_reply();
        }
        factory::check_reply(reply)
    }

    fn stats(&self) -> &ConnectionStats {
        match self {
            Connection::Tcp(conn) => conn.stats(),
            Connection::Embedded(conn) => &conn.stats,
        }
    }
}

/// A handle on an in-process store.
#[derive(Debug)]
pub struct EmbeddedConnection {
    handler: CommandHandler,
    stats: Arc<ConnectionStats>,
}

impl Drop for EmbeddedConnection {
    fn drop(&mut self) {
        self.stats.connection_closed();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::spawn_server;
    use crate::error::Error;

    #[tokio::test]
    async fn test_embedded_connection_executes() {
        let stats = Arc::new(ConnectionStats::new());
        let mut conn = Connection::embedded(Arc::new(Store::new()), Arc::clone(&stats));

        let reply = conn.execute(Command::new("PING")).await.unwrap();
        assert_eq!(reply, RespValue::simple_string("PONG"));
        assert_eq!(stats.snapshot().commands_sent, 1);
    }

    #[tokio::test]
    async fn test_tcp_connection_pipelined_requests() {
        let addr = spawn_server(Arc::new(Store::new())).await;
        let stats = Arc::new(ConnectionStats::new());
        let config = ConnectionConfig::new("127.0.0.1", addr.port());
        let mut conn = Connection::tcp(&config, Arc::clone(&stats)).await.unwrap();

        for i in 0..10 {
            let reply = conn
                .execute(Command::new("RPUSH").arg("list").num(i))
                .await
                .unwrap();
            assert_eq!(reply, RespValue::integer(i + 1));
        }

        let reply = conn
            .execute(Command::new("LRANGE").arg("list").num(0).num(-1))
            .await
            .unwrap();
        assert_eq!(reply.as_array().map(|items| items.len()), Some(10));
        assert_eq!(stats.snapshot().commands_sent, 11);
    }

    #[tokio::test]
    async fn test_tcp_error_reply() {
        let addr = spawn_server(Arc::new(Store::new())).await;
        let config = ConnectionConfig::new("127.0.0.1", addr.port());
        let mut conn = Connection::tcp(&config, Arc::new(ConnectionStats::new()))
            .await
            .unwrap();

        let err = conn.execute(Command::new("NOSUCH")).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));

        // the socket is still usable
        let reply = conn.execute(Command::new("PING")).await.unwrap();
        assert_eq!(reply, RespValue::simple_string("PONG"));
    }
}

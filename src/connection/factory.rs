//! Connection Factory
//!
//! Holds the store coordinates for the life of the process and hands out
//! connections. Ordinary commands share one lazily opened connection;
//! long-lived stream reads get a dedicated one each.

use crate::connection::config::ConnectionConfig;
use crate::connection::stats::{ConnectionStats, StatsSnapshot};
use crate::connection::Connection;
use crate::embedded::Store;
use crate::error::{Error, Result};
use crate::protocol::{Command, RespValue};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
enum Target {
    Remote(ConnectionConfig),
    Embedded(Arc<Store>),
}

/// Produces connections to one store.
///
/// Create it once at startup and share it behind an `Arc`; every method takes
/// `&self`.
#[derive(Debug)]
pub struct ConnectionFactory {
    target: Target,
    shared: Mutex<Option<Connection>>,
    stats: Arc<ConnectionStats>,
}

impl ConnectionFactory {
    /// Validates `config` and returns a factory for it. No connection is
    /// opened until the first command.
    pub fn create(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        info!(server = %config.addr(), "Connection factory created");
        Ok(Self::with_target(Target::Remote(config)))
    }

    /// A factory whose connections talk to an in-process store.
    pub fn embedded(store: Arc<Store>) -> Self {
        info!("Embedded connection factory created");
        Self::with_target(Target::Embedded(store))
    }

    fn with_target(target: Target) -> Self {
        Self {
            target,
            shared: Mutex::new(None),
            stats: Arc::new(ConnectionStats::new()),
        }
    }

    /// The remote coordinates, or `None` for an embedded factory.
    pub fn config(&self) -> Option<&ConnectionConfig> {
        match &self.target {
            Target::Remote(config) => Some(config),
            Target::Embedded(_) => None,
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.target, Target::Embedded(_))
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Opens a connection that belongs to the caller alone.
    pub async fn open_dedicated(&self) -> Result<Connection> {
        self.open().await
    }

    async fn open(&self) -> Result<Connection> {
        match &self.target {
            Target::Remote(config) => Connection::tcp(config, Arc::clone(&self.stats)).await,
            Target::Embedded(store) => {
                Ok(Connection::embedded(Arc::clone(store), Arc::clone(&self.stats)))
            }
        }
    }

    /// Runs one command on the shared connection.
    ///
    /// The connection is taken out of the slot while the command is in
    /// flight; if the caller abandons the future or the transport fails, it is
    /// dropped and the next command reconnects.
    pub async fn execute(&self, command: Command) -> Result<RespValue> {
        let mut slot = self.shared.lock().await;
        let mut connection = match slot.take() {
            Some(connection) => connection,
            None => self.open().await?,
        };

        let name = command.name();
        match connection.execute(command).await {
            Err(e) if e.is_transport() => {
                warn!(command = name, error = %e, "Dropping shared connection");
                Err(e)
            }
            result => {
                *slot = Some(connection);
                result
            }
        }
    }

    /// Closes the shared connection, if one is open.
    pub async fn shutdown(&self) {
        if self.shared.lock().await.take().is_some() {
            debug!("Shared connection closed");
        }
    }
}

/// Turns an error reply into an [`Error`].
pub(crate) fn check_reply(reply: RespValue) -> Result<RespValue> {
    match reply {
        RespValue::Error(message) => Err(Error::from_store_reply(message)),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::{spawn_server, spawn_server_closing_first};
    use std::time::Duration;

    #[test]
    fn test_create_rejects_invalid_config() {
        let err = ConnectionFactory::create(ConnectionConfig::new("", 6379)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_shared_connection_is_lazy_and_reused() {
        let factory = ConnectionFactory::embedded(Arc::new(Store::new()));
        assert_eq!(factory.stats().connections_opened, 0);

        factory.execute(Command::new("PING")).await.unwrap();
        factory.execute(Command::new("PING")).await.unwrap();

        let stats = factory.stats();
        assert_eq!(stats.connections_opened, 1);
        assert_eq!(stats.commands_sent, 2);
    }

    #[tokio::test]
    async fn test_error_reply_becomes_error() {
        let factory = ConnectionFactory::embedded(Arc::new(Store::new()));
        factory
            .execute(Command::new("SET").arg("k").arg("text"))
            .await
            .unwrap();

        let err = factory
            .execute(Command::new("INCRBY").arg("k").num(1))
            .await
            .unwrap_err();
        assert!(err.is_type_mismatch());

        // the shared connection survives a store error
        factory.execute(Command::new("PING")).await.unwrap();
        assert_eq!(factory.stats().connections_opened, 1);
        assert_eq!(factory.stats().error_replies, 1);
    }

    #[tokio::test]
    async fn test_tcp_roundtrip() {
        let addr = spawn_server(Arc::new(Store::new())).await;
        let factory = ConnectionFactory::create(ConnectionConfig::new("127.0.0.1", addr.port()))
            .unwrap();

        let reply = factory
            .execute(Command::new("SET").arg("name").arg("kvops"))
            .await
            .unwrap();
        assert_eq!(reply, RespValue::ok());

        let reply = factory.execute(Command::new("GET").arg("name")).await.unwrap();
        assert_eq!(reply, RespValue::bulk_string("kvops"));

        let stats = factory.stats();
        assert!(stats.bytes_written > 0);
        assert!(stats.bytes_read > 0);
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ConnectionConfig::new("127.0.0.1", port)
            .connect_timeout(Duration::from_millis(500));
        let factory = ConnectionFactory::create(config).unwrap();

        let err = factory.execute(Command::new("PING")).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_lost_connection_is_replaced_on_next_call() {
        let addr = spawn_server_closing_first(Arc::new(Store::new()), 1).await;
        let factory = ConnectionFactory::create(ConnectionConfig::new("127.0.0.1", addr.port()))
            .unwrap();

        factory.execute(Command::new("PING")).await.unwrap();
        // give the server time to close the first socket
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = factory.execute(Command::new("PING")).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(factory.stats().active_connections, 0);

        let reply = factory.execute(Command::new("PING")).await.unwrap();
        assert_eq!(reply, RespValue::simple_string("PONG"));
        assert_eq!(factory.stats().connections_opened, 2);
        assert_eq!(factory.stats().active_connections, 1);
    }

    #[tokio::test]
    async fn test_abandoned_command_drops_connection() {
        let factory = ConnectionFactory::embedded(Arc::new(Store::new()));
        factory.execute(Command::new("PING")).await.unwrap();

        let blocked = Command::new("XREAD")
            .arg("BLOCK")
            .num(0)
            .arg("STREAMS")
            .arg("events")
            .arg("$");
        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), factory.execute(blocked)).await;
        assert!(abandoned.is_err());
        assert_eq!(factory.stats().active_connections, 0);

        factory.execute(Command::new("PING")).await.unwrap();
        assert_eq!(factory.stats().connections_opened, 2);
        assert_eq!(factory.stats().active_connections, 1);
    }

    #[tokio::test]
    async fn test_dedicated_connections_are_separate() {
        let factory = ConnectionFactory::embedded(Arc::new(Store::new()));
        let first = factory.open_dedicated().await.unwrap();
        let second = factory.open_dedicated().await.unwrap();
        assert_eq!(factory.stats().active_connections, 2);

        drop(first);
        drop(second);
        assert_eq!(factory.stats().active_connections, 0);
    }
}

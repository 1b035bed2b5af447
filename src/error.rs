//! Error types for kvops operations.
//!
//! Every failure, whether it comes from configuration, a serializer, the store
//! or the network, travels back through the `Result` of the call that caused it.

use crate::protocol::{ParseError, RespValue};
use crate::serializer::Role;
use std::io;
use thiserror::Error;

/// The main error type for kvops operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or incomplete configuration, reported before any operation runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// A value could not be encoded or decoded with the strategy bound to `role`.
    #[error("serialization error ({role}): {message}")]
    Serialization { role: Role, message: String },

    /// The store rejected the operation because of the stored value's type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Any other error reply from the store.
    #[error("store error: {0}")]
    Store(String),

    /// The reply did not have the shape the command expects.
    #[error("unexpected reply to {command}: {reply:?}")]
    UnexpectedReply {
        command: &'static str,
        reply: RespValue,
    },

    /// Malformed bytes on the wire.
    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Connecting took longer than the configured timeout.
    #[error("timed out connecting to {0}")]
    Timeout(String),

    /// I/O errors from the socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A specialized `Result` type for kvops operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classifies an error reply from the store.
    pub(crate) fn from_store_reply(message: String) -> Self {
        if message.starts_with("WRONGTYPE")
            || message.contains("not an integer")
            || message.contains("not a valid float")
            || message.contains("not a float")
        {
            Error::TypeMismatch(message)
        } else {
            Error::Store(message)
        }
    }

    pub(crate) fn serialization(role: Role, message: impl ToString) -> Self {
        Error::Serialization {
            role,
            message: message.to_string(),
        }
    }

    pub(crate) fn unexpected(command: &'static str, reply: RespValue) -> Self {
        Error::UnexpectedReply { command, reply }
    }

    /// True for failures of the connection itself rather than of the command.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Protocol(_) | Error::ConnectionClosed | Error::Timeout(_)
        )
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Error::TypeMismatch(_))
    }
}

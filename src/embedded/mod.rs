//! Embedded Store
//!
//! An in-process store that answers the same RESP commands a remote server
//! would. [`ConnectionFactory::embedded`](crate::connection::ConnectionFactory::embedded)
//! wires a client straight to it, which is what the tests and the demo's
//! `--embedded` mode use.
//!
//! ## Example
//!
//! ```
//! use kvops::embedded::{CommandHandler, Store};
//! use kvops::protocol::{Command, RespValue};
//! use std::sync::Arc;
//!
//! let handler = CommandHandler::new(Arc::new(Store::new()));
//! handler.execute(Command::new("SET").arg("name").arg("kvops").into_resp());
//!
//! let reply = handler.execute(Command::new("GET").arg("name").into_resp());
//! assert_eq!(reply, RespValue::bulk_string("kvops"));
//! ```

pub mod commands;
pub mod engine;

pub use commands::CommandHandler;
pub use engine::{Store, StoreError, Value};

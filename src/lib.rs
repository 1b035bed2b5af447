//! # kvops - Typed Operation Sets for a Redis-Compatible Store
//!
//! kvops is a non-blocking client library. A [`TypedClient`] binds a
//! [`ConnectionFactory`] to a [`SerializationContext`] and exposes one narrow,
//! typed operation set per data-structure family: plain values, lists, hashes,
//! sorted sets, streams and distinct-element counters.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               TypedClient<K, V>                         │
//! │                                                                         │
//! │  ops_for_value  ops_for_list  ops_for_hash  ops_for_zset  ops_for_stream│
//! │        │              │             │             │             │       │
//! │        └──────────────┴──────┬──────┴─────────────┴─────────────┘       │
//! │                              │                                          │
//! │           ┌──────────────────┴──────────────────┐                       │
//! │           ▼                                     ▼                       │
//! │  ┌──────────────────────┐           ┌───────────────────────────┐       │
//! │  │ SerializationContext │           │     ConnectionFactory     │       │
//! │  │ key │ value │ hk │ hv│           │  shared conn │ dedicated  │       │
//! │  └──────────────────────┘           └─────────────┬─────────────┘       │
//! │                                                   │ RESP                │
//! └───────────────────────────────────────────────────┼─────────────────────┘
//!                                                     ▼
//!                              remote store (TCP)  or  embedded Store
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use kvops::connection::{ConnectionConfig, ConnectionFactory};
//! use kvops::serializer::SerializationContext;
//! use kvops::TypedClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> kvops::Result<()> {
//!     let factory = Arc::new(ConnectionFactory::create(ConnectionConfig::new("127.0.0.1", 6379))?);
//!     let client: TypedClient<String, i64> =
//!         TypedClient::bind(factory, SerializationContext::json());
//!
//!     let values = client.ops_for_value();
//!     values.set(&"price".to_string(), &13000).await?;
//!     let price = values.increment(&"price".to_string(), 1000).await?;
//!     assert_eq!(price, 14000);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP value type, incremental parser and command builder
//! - [`serializer`]: serialization strategies and the four-role context
//! - [`connection`]: configuration, connection factory, TCP connections
//! - [`embedded`]: an in-process store answering the same commands
//! - [`ops`]: the operation sets
//!
//! ## Errors
//!
//! Every operation returns [`Result`]. Configuration problems surface when the
//! factory or client is built; serialization, store and transport failures
//! surface on the call that hit them. Nothing is retried.

pub mod client;
pub mod connection;
pub mod embedded;
pub mod error;
pub mod ops;
pub mod protocol;
pub mod serializer;

// Re-export commonly used types for convenience
pub use client::{TypedClient, TypedClientBuilder};
pub use connection::{ConnectionConfig, ConnectionFactory};
pub use error::{Error, Result};
pub use ops::{
    HashOperations, HyperLogLogOperations, ListOperations, RecordId, ScoredMember, StreamOffset,
    StreamOperations, StreamReadOptions, StreamRecord, StreamSubscription, ValueOperations,
    ZSetOperations,
};
pub use serializer::{Role, SerializationContext, SerializationStrategy};

/// Version of kvops
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

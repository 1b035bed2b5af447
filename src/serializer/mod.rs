//! Serialization Layer
//!
//! Each typed client converts keys, values, hash fields and hash values to
//! bytes through a [`SerializationContext`]: one [`SerializationStrategy`] per
//! [`Role`].
//!
//! ## Example
//!
//! ```
//! use kvops::serializer::{SerializationContext, SerializationStrategy};
//!
//! let ctx = SerializationContext::builder()
//!     .key(SerializationStrategy::RawString)
//!     .value(SerializationStrategy::Json)
//!     .hash_key(SerializationStrategy::RawString)
//!     .hash_value(SerializationStrategy::Json)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(&ctx.encode_value("Apple").unwrap()[..], b"\"Apple\"");
//! ```

pub mod context;
pub mod strategy;

pub use context::{SerializationContext, SerializationContextBuilder};
pub use strategy::SerializationStrategy;

use std::fmt;

/// The position a serialized value occupies in a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Key,
    Value,
    HashKey,
    HashValue,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Key => "key",
            Role::Value => "value",
            Role::HashKey => "hash key",
            Role::HashValue => "hash value",
        };
        f.write_str(name)
    }
}

//! RESP Protocol Implementation
//!
//! This module is the command-encoding layer the operation sets sit on.
//! Operation sets build [`Command`]s, connections write them as RESP arrays
//! and decode the reply with [`RespParser`].
//!
//! ## Modules
//!
//! - `types`: the `RespValue` enum and its wire serialization
//! - `parser`: incremental parser for incoming RESP data
//! - `command`: builder for outgoing command arrays
//!
//! ## Example
//!
//! ```
//! use kvops::protocol::{parse_message, Command};
//!
//! let wire = Command::new("GET").arg("name").into_resp().serialize();
//! assert_eq!(&wire[..], b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n");
//!
//! let (reply, _) = parse_message(b"$4\r\nAriz\r\n").unwrap().unwrap();
//! assert_eq!(reply.as_str(), Some("Ariz"));
//! ```

pub mod command;
pub mod parser;
pub mod types;

pub use command::Command;
pub use parser::{parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;

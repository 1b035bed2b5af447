//! RESP Values
//!
//! A command goes out as an array of bulk strings; a reply comes back as any
//! one of the variants of [`RespValue`]. Each frame starts with a prefix byte
//! and its header ends in CRLF:
//!
//! | prefix | frame            | example                  |
//! |--------|------------------|--------------------------|
//! | `+`    | status           | `+OK\r\n`                |
//! | `-`    | error            | `-WRONGTYPE ...\r\n`     |
//! | `:`    | integer          | `:14000\r\n`             |
//! | `$`    | bulk string, nil | `$4\r\nAriz\r\n`, `$-1\r\n` |
//! | `*`    | array            | `*2\r\n$3\r\nGET\r\n...` |

use bytes::{BufMut, Bytes, BytesMut};

pub(crate) const CRLF: &[u8] = b"\r\n";

/// Frame prefix bytes.
pub(crate) mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// One RESP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    SimpleString(String),
    /// The first word is the error class (`ERR`, `WRONGTYPE`, ...).
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    /// Nil bulk string or nil array.
    Null,
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    /// `+OK`
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// Encodes the frame for the wire.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    fn encode(&self, buf: &mut BytesMut) {
        match self {
            RespValue::SimpleString(s) => header(buf, prefix::SIMPLE_STRING, s),
            RespValue::Error(s) => header(buf, prefix::ERROR, s),
            RespValue::Integer(n) => header(buf, prefix::INTEGER, n),
            RespValue::BulkString(data) => {
                header(buf, prefix::BULK_STRING, data.len());
                buf.put_slice(data);
                buf.put_slice(CRLF);
            }
            RespValue::Null => header(buf, prefix::BULK_STRING, -1),
            RespValue::Array(values) => {
                header(buf, prefix::ARRAY, values.len());
                for value in values {
                    value.encode(buf);
                }
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Text of a status or UTF-8 bulk string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<RespValue>> {
        match self {
            RespValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// `<prefix><body>\r\n`
fn header(buf: &mut BytesMut, prefix: u8, body: impl ToString) {
    buf.put_u8(prefix);
    buf.put_slice(body.to_string().as_bytes());
    buf.put_slice(CRLF);
}

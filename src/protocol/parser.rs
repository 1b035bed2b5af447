//! Incremental RESP Parser
//!
//! Replies arrive over TCP in arbitrary chunks, so the parser works on
//! whatever is buffered and reports one of:
//! - `Ok(Some((value, consumed)))` - a complete value, `consumed` bytes were used
//! - `Ok(None)` - the value is incomplete, read more and retry
//! - `Err(ParseError)` - the bytes are not valid RESP
//!
//! The same parser is used by the embedded store's test listener to decode
//! incoming command arrays.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use std::num::ParseIntError;
use thiserror::Error;

/// Errors that can occur during RESP parsing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Unknown type prefix byte
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    /// Invalid integer format
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a simple string or error message
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (but not -1 for null)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative (but not -1 for null)
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Protocol violation (missing CRLF, etc.)
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The message exceeds maximum allowed size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth. Stream replies nest four levels deep.
pub const MAX_NESTING_DEPTH: usize = 32;

/// An incremental RESP parser.
#[derive(Debug, Default)]
pub struct RespParser {
    /// Current nesting depth (for array parsing)
    depth: usize,
}

impl RespParser {
    pub fn new() -> Self {
        Self { depth: 0 }
    }

    /// Attempts to parse one RESP value from the front of `buf`.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        self.depth = 0;
        self.parse_value(buf)
    }

    fn parse_value(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::ProtocolError(format!(
                "maximum nesting depth exceeded: {}",
                MAX_NESTING_DEPTH
            )));
        }

        match buf[0] {
            prefix::SIMPLE_STRING => Ok(parse_line(buf)?
                .map(|(line, consumed)| (RespValue::SimpleString(line.to_string()), consumed))),
            prefix::ERROR => Ok(parse_line(buf)?
                .map(|(line, consumed)| (RespValue::Error(line.to_string()), consumed))),
            prefix::INTEGER => self.parse_integer(buf),
            prefix::BULK_STRING => self.parse_bulk_string(buf),
            prefix::ARRAY => self.parse_array(buf),
            other => Err(ParseError::UnknownPrefix(other)),
        }
    }

    /// Parses an integer: `:<integer>\r\n`
    fn parse_integer(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        match parse_line(buf)? {
            Some((line, consumed)) => {
                let n: i64 = line
                    .parse()
                    .map_err(|e: ParseIntError| ParseError::InvalidInteger(e.to_string()))?;
                Ok(Some((RespValue::Integer(n), consumed)))
            }
            None => Ok(None),
        }
    }

    /// Parses a bulk string: `$<length>\r\n<data>\r\n`
    fn parse_bulk_string(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let (length, header) = match parse_length(buf)? {
            Some(parsed) => parsed,
            None => return Ok(None),
        };

        if length == -1 {
            return Ok(Some((RespValue::Null, header)));
        }
        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = length as usize;
        if length > MAX_BULK_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let total_needed = header + length + 2;
        if buf.len() < total_needed {
            return Ok(None);
        }

        if &buf[header + length..total_needed] != CRLF {
            return Err(ParseError::ProtocolError(
                "bulk string missing trailing CRLF".to_string(),
            ));
        }

        let data = Bytes::copy_from_slice(&buf[header..header + length]);
        Ok(Some((RespValue::BulkString(data), total_needed)))
    }

    /// Parses an array: `*<count>\r\n<elements...>`
    fn parse_array(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let (count, mut consumed) = match parse_length(buf)? {
            Some(parsed) => parsed,
            None => return Ok(None),
        };

        if count == -1 {
            return Ok(Some((RespValue::Null, consumed)));
        }
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        let count = count as usize;
        let mut elements = Vec::with_capacity(count.min(1024));

        self.depth += 1;
        for _ in 0..count {
            if consumed >= buf.len() {
                return Ok(None);
            }

            match self.parse_value(&buf[consumed..])? {
                Some((value, element_consumed)) => {
                    elements.push(value);
                    consumed += element_consumed;
                }
                None => return Ok(None),
            }
        }
        self.depth -= 1;

        Ok(Some((RespValue::Array(elements), consumed)))
    }
}

/// Reads the text between the prefix byte and the first CRLF.
fn parse_line(buf: &[u8]) -> ParseResult<Option<(&str, usize)>> {
    match find_crlf(&buf[1..]) {
        Some(pos) => {
            let line = std::str::from_utf8(&buf[1..1 + pos])
                .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
            // +1 for prefix, +2 for CRLF
            Ok(Some((line, 1 + pos + 2)))
        }
        None => Ok(None),
    }
}

/// Reads the length header of a bulk string or array.
fn parse_length(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    match parse_line(buf)? {
        Some((line, consumed)) => {
            let n: i64 = line
                .parse()
                .map_err(|e: ParseIntError| ParseError::InvalidInteger(e.to_string()))?;
            Ok(Some((n, consumed)))
        }
        None => Ok(None),
    }
}

/// Finds the position of CRLF in the buffer.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Parses a single RESP message from bytes.
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    RespParser::new().parse(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_string() {
        let (value, consumed) = parse_message(b"+OK\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::SimpleString("OK".to_string()));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_parse_simple_string_incomplete() {
        assert!(parse_message(b"+OK").unwrap().is_none());
    }

    #[test]
    fn test_parse_wrongtype_error() {
        let input = b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n";
        let (value, consumed) = parse_message(input).unwrap().unwrap();
        assert!(matches!(value, RespValue::Error(ref s) if s.starts_with("WRONGTYPE")));
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_parse_negative_integer() {
        let (value, _) = parse_message(b":-42\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Integer(-42));
    }

    #[test]
    fn test_parse_bulk_string() {
        let (value, consumed) = parse_message(b"$5\r\nhello\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::BulkString(Bytes::from("hello")));
        assert_eq!(consumed, 11);
    }

    #[test]
    fn test_parse_null_bulk_string() {
        let (value, consumed) = parse_message(b"$-1\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Null);
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_parse_empty_bulk_string() {
        let (value, consumed) = parse_message(b"$0\r\n\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::BulkString(Bytes::new()));
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_parse_bulk_string_incomplete() {
        assert!(parse_message(b"$5\r\nhel").unwrap().is_none());
    }

    #[test]
    fn test_parse_null_array() {
        let (value, _) = parse_message(b"*-1\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Null);
    }

    #[test]
    fn test_parse_stream_reply() {
        // XREAD reply: [[stream, [[id, [field, value]]]]]
        let input = b"*1\r\n*2\r\n$8\r\nstream:1\r\n*1\r\n*2\r\n$3\r\n1-0\r\n*2\r\n$1\r\n1\r\n$3\r\n100\r\n";
        let (value, consumed) = parse_message(input).unwrap().unwrap();
        assert_eq!(consumed, input.len());

        let streams = value.into_array().unwrap();
        let stream = streams[0].as_array().unwrap();
        assert_eq!(stream[0].as_str(), Some("stream:1"));
        let record = stream[1].as_array().unwrap()[0].as_array().unwrap();
        assert_eq!(record[0].as_str(), Some("1-0"));
    }

    #[test]
    fn test_parse_partial_array_element() {
        let input = b"*2\r\n$3\r\nfoo\r\n$3\r\nba";
        assert!(parse_message(input).unwrap().is_none());
    }

    #[test]
    fn test_parse_unknown_prefix() {
        assert_eq!(
            parse_message(b"@oops\r\n"),
            Err(ParseError::UnknownPrefix(b'@'))
        );
    }

    #[test]
    fn test_parse_invalid_integer() {
        let result = parse_message(b":not_a_number\r\n");
        assert!(matches!(result, Err(ParseError::InvalidInteger(_))));
    }

    #[test]
    fn test_roundtrip() {
        let original = RespValue::Array(vec![
            RespValue::bulk_string(Bytes::from("HSET")),
            RespValue::bulk_string(Bytes::from("BOOK###1")),
            RespValue::bulk_string(Bytes::from("price")),
            RespValue::bulk_string(Bytes::from("2000")),
        ]);

        let serialized = original.serialize();
        let (parsed, _) = parse_message(&serialized).unwrap().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_binary_safe_bulk_string() {
        let (value, _) = parse_message(b"$5\r\nhel\x00o\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::BulkString(Bytes::from(&b"hel\x00o"[..])));
    }
}

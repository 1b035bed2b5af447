//! Command builder.
//!
//! A command is a RESP array of bulk strings: the command name followed by
//! its arguments. Operation sets build one per remote call.

use crate::protocol::types::RespValue;
use bytes::Bytes;

/// A single logical command ready to be written to a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: &'static str,
    args: Vec<Bytes>,
}

impl Command {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<Bytes>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends every argument from the iterator, in order.
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Bytes>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends a numeric argument in its decimal text form.
    pub fn num(self, n: impl ToString) -> Self {
        self.arg(n.to_string())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Converts the command to its RESP array representation.
    pub fn into_resp(self) -> RespValue {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(RespValue::BulkString(Bytes::from_static(
            self.name.as_bytes(),
        )));
        parts.extend(self.args.into_iter().map(RespValue::BulkString));
        RespValue::Array(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_encoding() {
        let cmd = Command::new("INCRBY").arg("book:1:price").num(1000);
        assert_eq!(cmd.name(), "INCRBY");
        assert_eq!(cmd.arg_count(), 2);
        assert_eq!(
            &cmd.into_resp().serialize()[..],
            b"*3\r\n$6\r\nINCRBY\r\n$12\r\nbook:1:price\r\n$4\r\n1000\r\n"
        );
    }

    #[test]
    fn test_command_args_preserve_order() {
        let cmd = Command::new("MGET").args(["a", "b", "c"]);
        let parts = cmd.into_resp().into_array().unwrap();
        let names: Vec<_> = parts.iter().filter_map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["MGET", "a", "b", "c"]);
    }
}

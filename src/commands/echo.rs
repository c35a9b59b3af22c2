use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::replication::Role;
use crate::store::Store;

/// Returns `message`.
///
/// Ref: <https://redis.io/docs/latest/commands/echo/>
#[derive(Debug, PartialEq)]
pub struct Echo {
    pub message: Bytes,
}

impl Executable for Echo {
    fn exec(self, _store: Store, _role: Role) -> Frame {
        // A simple string can't carry line terminators or invalid UTF-8.
        let simple = std::str::from_utf8(&self.message)
            .ok()
            .filter(|s| !s.contains(['\r', '\n']));

        match simple {
            Some(s) => Frame::Simple(s.to_string()),
            None => Frame::Bulk(self.message),
        }
    }
}

impl TryFrom<&mut CommandParser> for Echo {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let wrong_arity = CommandParserError::WrongNumberOfArguments { command: "echo" };

        let message = match parser.next_bytes() {
            Ok(message) => message,
            Err(CommandParserError::EndOfStream) => return Err(wrong_arity),
            Err(err) => return Err(err),
        };

        if parser.remaining() > 0 {
            return Err(wrong_arity);
        }

        Ok(Self { message })
    }
}

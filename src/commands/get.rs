use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::replication::Role;
use crate::store::Store;

/// Get the value of `key`. If the key does not exist, or has expired, the special value `nil` is
/// returned. An expired key is removed from the store on the way.
///
/// Ref: <https://redis.io/docs/latest/commands/get/>
#[derive(Debug, PartialEq)]
pub struct Get {
    pub key: String,
}

impl Executable for Get {
    fn exec(self, store: Store, _role: Role) -> Frame {
        let mut store = store.lock();

        match store.get(&self.key) {
            Some(value) => Frame::Bulk(value),
            None => Frame::Null,
        }
    }
}

impl TryFrom<&mut CommandParser> for Get {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = match parser.next_string() {
            Ok(key) => key,
            Err(CommandParserError::EndOfStream) => {
                return Err(CommandParserError::MissingArgument { command: "get" })
            }
            Err(err) => return Err(err),
        };

        if parser.remaining() > 0 {
            return Err(CommandParserError::WrongNumberOfArguments { command: "get" });
        }

        Ok(Self { key })
    }
}

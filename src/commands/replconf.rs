use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::replication::Role;
use crate::store::Store;

/// Part of the replication handshake: a replica announcing its listening port and capabilities.
/// The options are recorded for logging only and always acknowledged.
#[derive(Debug, PartialEq)]
pub struct Replconf {
    pub options: Vec<String>,
}

impl Executable for Replconf {
    fn exec(self, _store: Store, _role: Role) -> Frame {
        tracing::debug!(options = ?self.options, "REPLCONF acknowledged");
        Frame::Simple("OK".to_string())
    }
}

impl TryFrom<&mut CommandParser> for Replconf {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let mut options = vec![];

        loop {
            match parser.next_string() {
                Ok(option) => options.push(option),
                Err(CommandParserError::EndOfStream) => break,
                Err(err) => return Err(err),
            }
        }

        Ok(Self { options })
    }
}

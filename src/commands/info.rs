use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::replication::{self, Role};
use crate::store::Store;

/// Replication information about the server. Only the replication section exists, so it is
/// returned whichever section is asked for.
///
/// Ref: <https://redis.io/docs/latest/commands/info/>
#[derive(Debug, PartialEq)]
pub struct Info;

impl Executable for Info {
    fn exec(self, _store: Store, role: Role) -> Frame {
        Frame::Bulk(Bytes::from(replication::info_section(role)))
    }
}

impl TryFrom<&mut CommandParser> for Info {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        // The optional section name is read so a malformed one is still rejected.
        match parser.next_string() {
            Ok(_) | Err(CommandParserError::EndOfStream) => Ok(Self),
            Err(err) => Err(err),
        }
    }
}

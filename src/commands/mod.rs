pub mod echo;
pub mod executable;
pub mod get;
pub mod info;
pub mod ping;
pub mod replconf;
pub mod set;

use bytes::Bytes;
use std::str;
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::replication::Role;
use crate::store::Store;

use echo::Echo;
use get::Get;
use info::Info;
use ping::Ping;
use replconf::Replconf;
use set::Set;

#[derive(Debug, PartialEq)]
pub enum Command {
    Get(Get),
    Set(Set),

    Echo(Echo),
    Info(Info),
    Ping(Ping),
    Replconf(Replconf),
}

impl Executable for Command {
    fn exec(self, store: Store, role: Role) -> Frame {
        match self {
            Command::Echo(cmd) => cmd.exec(store, role),
            Command::Get(cmd) => cmd.exec(store, role),
            Command::Info(cmd) => cmd.exec(store, role),
            Command::Ping(cmd) => cmd.exec(store, role),
            Command::Replconf(cmd) => cmd.exec(store, role),
            Command::Set(cmd) => cmd.exec(store, role),
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = CommandParserError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the Redis server as RESP arrays.
        let frames = match frame {
            Frame::Array(array) => array,
            frame => {
                return Err(CommandParserError::InvalidFrame {
                    expected: "array".to_string(),
                    actual: frame,
                })
            }
        };

        let parser = &mut CommandParser::new(frames);

        let command_name = parser.parse_command_name()?;

        match &command_name[..] {
            "echo" => Echo::try_from(parser).map(Command::Echo),
            "get" => Get::try_from(parser).map(Command::Get),
            "info" => Info::try_from(parser).map(Command::Info),
            "ping" => Ping::try_from(parser).map(Command::Ping),
            "replconf" => Replconf::try_from(parser).map(Command::Replconf),
            "set" => Set::try_from(parser).map(Command::Set),
            _ => Err(CommandParserError::UnknownCommand {
                command: command_name,
            }),
        }
    }
}

/// Walks the arguments of a command by position. Running past the last argument yields
/// `CommandParserError::EndOfStream`, which each command maps to its own missing argument
/// reply.
pub struct CommandParser {
    parts: Vec<Frame>,
    position: usize,
}

impl CommandParser {
    fn new(parts: Vec<Frame>) -> CommandParser {
        CommandParser { parts, position: 0 }
    }

    fn next_frame(&mut self) -> Result<&Frame, CommandParserError> {
        let frame = self
            .parts
            .get(self.position)
            .ok_or(CommandParserError::EndOfStream)?;
        self.position += 1;
        Ok(frame)
    }

    /// Number of arguments not consumed yet.
    fn remaining(&self) -> usize {
        self.parts.len().saturating_sub(self.position)
    }

    fn parse_command_name(&mut self) -> Result<String, CommandParserError> {
        self.next_string().map(|name| name.to_lowercase())
    }

    fn next_string(&mut self) -> Result<String, CommandParserError> {
        match self.next_frame()? {
            // Both `Simple` and `Bulk` representation may be strings. Strings are parsed to UTF-8.
            // While errors are stored as strings, they are considered separate types.
            Frame::Simple(s) => Ok(s.clone()),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_string())
                .map_err(CommandParserError::InvalidUTF8String),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame.clone(),
            }),
        }
    }

    fn next_integer(&mut self) -> Result<i64, CommandParserError> {
        match self.next_frame()? {
            Frame::Integer(i) => Ok(*i),
            Frame::Simple(string) => string
                .parse::<i64>()
                .map_err(|_| CommandParserError::NotAnInteger),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map_err(|_| CommandParserError::NotAnInteger)?
                .parse::<i64>()
                .map_err(|_| CommandParserError::NotAnInteger),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "integer".to_string(),
                actual: frame.clone(),
            }),
        }
    }

    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        match self.next_frame()? {
            Frame::Simple(s) => Ok(Bytes::from(s.clone())),
            Frame::Bulk(bytes) => Ok(bytes.clone()),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame.clone(),
            }),
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("Protocol error: expected {expected}, got {actual}")]
    InvalidFrame { expected: String, actual: Frame },
    #[error("unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("wrong number of arguments for '{command}' command")]
    WrongNumberOfArguments { command: &'static str },
    /// A GET or SET without its key or value. Answered with a null reply and nothing is stored.
    #[error("missing argument for '{command}' command")]
    MissingArgument { command: &'static str },
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("invalid expire time in '{command}' command")]
    InvalidExpireTime { command: &'static str },
    #[error("syntax error")]
    SyntaxError,
    #[error("Protocol error: invalid UTF-8 string")]
    InvalidUTF8String(#[from] str::Utf8Error),
    #[error("Protocol error: attempting to extract a value failed due to the frame being fully consumed")]
    EndOfStream,
}

impl From<&CommandParserError> for Frame {
    fn from(err: &CommandParserError) -> Self {
        match err {
            CommandParserError::MissingArgument { .. } => Frame::Null,
            err => Frame::Error(format!("ERR {}", err)),
        }
    }
}

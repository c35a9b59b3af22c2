use bytes::Bytes;
use tokio::time::{Duration, Instant};

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::replication::Role;
use crate::store::Store;

/// Set `key` to hold the string `value`. If key already holds a value, it is overwritten, and
/// any previous time to live associated with the key is discarded.
///
/// Ref: <https://redis.io/docs/latest/commands/set/>
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: String,
    pub value: Bytes,
    pub ttl: Option<Ttl>,
}

#[derive(Debug, PartialEq)]
pub enum Ttl {
    Ex(u64),
    Px(u64),
}

impl Ttl {
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Ttl::Ex(seconds) => seconds.checked_mul(1000).map(Duration::from_millis),
            Ttl::Px(millis) => Some(Duration::from_millis(*millis)),
        }
    }
}

impl Executable for Set {
    fn exec(self, store: Store, _role: Role) -> Frame {
        let expires_at = match self.ttl {
            Some(ttl) => match ttl.duration().and_then(|d| Instant::now().checked_add(d)) {
                Some(expires_at) => Some(expires_at),
                None => {
                    let err = CommandParserError::InvalidExpireTime { command: "set" };
                    return Frame::from(&err);
                }
            },
            None => None,
        };

        store.lock().set(self.key, self.value, expires_at);

        Frame::Simple("OK".to_string())
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let (key, value) = match (parser.next_string(), parser.next_bytes()) {
            (Ok(key), Ok(value)) => (key, value),
            (Err(CommandParserError::EndOfStream), _) | (_, Err(CommandParserError::EndOfStream)) => {
                return Err(CommandParserError::MissingArgument { command: "set" })
            }
            (Err(err), _) | (_, Err(err)) => return Err(err),
        };

        let mut ttl = None;

        loop {
            let option = match parser.next_string() {
                Ok(option) => option,
                Err(CommandParserError::EndOfStream) => break,
                Err(err) => return Err(err),
            };

            let amount = match option.to_uppercase().as_str() {
                "EX" | "PX" if ttl.is_none() => match parser.next_integer() {
                    Ok(amount) => amount,
                    Err(CommandParserError::EndOfStream) => {
                        return Err(CommandParserError::SyntaxError)
                    }
                    Err(err) => return Err(err),
                },
                _ => return Err(CommandParserError::SyntaxError),
            };

            let amount = u64::try_from(amount)
                .ok()
                .filter(|amount| *amount > 0)
                .ok_or(CommandParserError::InvalidExpireTime { command: "set" })?;

            ttl = match option.to_uppercase().as_str() {
                "EX" => Some(Ttl::Ex(amount)),
                _ => Some(Ttl::Px(amount)),
            };
        }

        Ok(Self { key, value, ttl })
    }
}

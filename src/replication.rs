use std::fmt;
use thiserror::Error as ThisError;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

use crate::config::ReplicaOf;
use crate::connection::Connection;
use crate::frame::{self, Frame};

/// Replication id reported by INFO. Replication streams are not supported, so it never changes.
pub const MASTER_REPLID: &str = "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb";

/// Whether this process serves as a master or as a replica of another server. Decided once at
/// startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Master,
    Slave,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => write!(f, "master"),
            Role::Slave => write!(f, "slave"),
        }
    }
}

/// The replication section reported by INFO.
pub fn info_section(role: Role) -> String {
    format!("role:{role}\r\nmaster_replid:{MASTER_REPLID}\r\nmaster_repl_offset:0\r\n")
}

#[derive(Debug, ThisError)]
pub enum HandshakeError {
    #[error("failed to connect to master {master}: {source}")]
    Connect {
        master: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Frame(#[from] frame::Error),
    #[error("master closed the connection during the handshake")]
    ConnectionClosed,
    #[error("unexpected reply to {command}: expected +{expected}, got {actual}")]
    UnexpectedReply {
        command: &'static str,
        expected: &'static str,
        actual: Frame,
    },
}

/// Announces this server to its master: PING, then the listening port and the capabilities
/// through REPLCONF. The returned connection is the link to the master; nothing is streamed
/// over it.
#[instrument(name = "handshake", skip_all, fields(master = %master))]
pub async fn handshake(master: &ReplicaOf, listening_port: u16) -> Result<Connection, HandshakeError> {
    let stream = TcpStream::connect((master.host.as_str(), master.port))
        .await
        .map_err(|source| HandshakeError::Connect {
            master: master.to_string(),
            source,
        })?;
    let mut conn = Connection::new(stream);

    let port = listening_port.to_string();
    let steps: [(&'static str, Vec<&str>, &'static str); 3] = [
        ("PING", vec!["PING"], "PONG"),
        ("REPLCONF", vec!["REPLCONF", "listening-port", &port], "OK"),
        ("REPLCONF", vec!["REPLCONF", "capa", "psync2"], "OK"),
    ];

    for (command, parts, expected) in steps {
        let request = Frame::array_of_bulks(parts.into_iter().map(|p| p.to_string()));
        conn.write_frame(request).await?;

        let reply = conn
            .read_frame()
            .await?
            .ok_or(HandshakeError::ConnectionClosed)?;
        debug!("Master replied to {}: {}", command, reply);

        match reply {
            Frame::Simple(ref s) if s.eq_ignore_ascii_case(expected) => {}
            actual => {
                return Err(HandshakeError::UnexpectedReply {
                    command,
                    expected,
                    actual,
                })
            }
        }
    }

    info!("Handshake with master completed");
    Ok(conn)
}

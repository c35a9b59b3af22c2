use clap::Parser;
use std::fmt;
use std::str::FromStr;
use thiserror::Error as ThisError;
use tokio::time::Duration;

use crate::codec::DEFAULT_MAX_FRAME_SIZE;

pub const PORT: u16 = 6379;

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "tinyredis", version, about)]
pub struct Config {
    /// The address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,

    /// The port to listen on
    #[arg(short, long, default_value_t = PORT)]
    pub port: u16,

    /// Run as a replica of the given master, as "<host> <port>"
    #[arg(long, value_name = "HOST PORT")]
    pub replicaof: Option<ReplicaOf>,

    /// How often expired keys are purged in the background, in milliseconds
    #[arg(long = "sweep-interval-ms", default_value_t = 60_000, value_parser = clap::value_parser!(u64).range(1..))]
    pub sweep_interval_ms: u64,

    /// Largest frame a client may send, in bytes
    #[arg(long, env = "MAX_FRAME_SIZE", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
}

impl Config {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: PORT,
            replicaof: None,
            sweep_interval_ms: 60_000,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Address of the master this server replicates from.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaOf {
    pub host: String,
    pub port: u16,
}

impl FromStr for ReplicaOf {
    type Err = ParseReplicaOfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();

        let (host, port) = match (parts.next(), parts.next(), parts.next()) {
            (Some(host), Some(port), None) => (host, port),
            _ => return Err(ParseReplicaOfError::Format(s.to_string())),
        };

        let port = port
            .parse::<u16>()
            .map_err(|_| ParseReplicaOfError::Port(port.to_string()))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ReplicaOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum ParseReplicaOfError {
    #[error("expected \"<host> <port>\", got \"{0}\"")]
    Format(String),
    #[error("invalid port \"{0}\"")]
    Port(String),
}

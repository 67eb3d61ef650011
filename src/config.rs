use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default TCP port of the receiver's control interface (telnet)
pub const DEFAULT_PORT: u16 = 23;

/// Timing and channel settings for a connection
///
/// Every field has a default, so a partial JSON object is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Spacing between queries. The manual asks for 200ms; 40ms works.
    pub inter_message_delay_ms: u64,
    pub request_timeout_ms: u64,
    /// Reply timeout for source selection
    pub extended_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub backoff_floor_ms: u64,
    pub backoff_ceiling_ms: u64,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
    /// Ask for power, volume, mute and source as soon as connected
    pub query_on_connect: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            inter_message_delay_ms: 40,
            request_timeout_ms: 200,
            extended_timeout_ms: 5_000,
            connect_timeout_ms: 1_000,
            backoff_floor_ms: 50,
            backoff_ceiling_ms: 60_000,
            event_capacity: 100,
            query_on_connect: true,
        }
    }
}

impl ConnectionConfig {
    pub fn inter_message_delay(&self) -> Duration {
        Duration::from_millis(self.inter_message_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn extended_timeout(&self) -> Duration {
        Duration::from_millis(self.extended_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn backoff_floor(&self) -> Duration {
        Duration::from_millis(self.backoff_floor_ms)
    }

    pub fn backoff_ceiling(&self) -> Duration {
        Duration::from_millis(self.backoff_ceiling_ms)
    }
}

/// Where the receiver listens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Settings file contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub receiver: Endpoint,
    #[serde(default)]
    pub connection: ConnectionConfig,
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Input source code, e.g. `"GAME"` or `"SAT/CBL"`
pub type SourceCode = String;

/// Master volume display label, e.g. `"-18.0dB"`
pub type VolumeLabel = String;

/// Lifecycle of the connection to the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        };
        f.write_str(name)
    }
}

/// How long the receiver may take to answer a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    Standard,
    /// Source selection; switching inputs is slow on the device
    Extended,
}

impl TimeoutClass {
    pub fn for_line(line: &str) -> Self {
        if line.starts_with("SI") {
            TimeoutClass::Extended
        } else {
            TimeoutClass::Standard
        }
    }
}

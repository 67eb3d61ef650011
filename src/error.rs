use thiserror::Error;

/// Result type for receiver operations
pub type Result<T> = std::result::Result<T, DenonError>;

/// Errors that can occur when talking to a Denon receiver
///
/// Malformed or unknown tokens received from the device are never surfaced
/// here; they are logged and show up as empty fields on
/// [`ParsedMessage`](crate::ParsedMessage).
#[derive(Error, Debug)]
pub enum DenonError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The connection task is gone
    #[error("Connection closed")]
    ConnectionClosed,

    /// No connection to the receiver is established
    #[error("Not connected")]
    NotConnected,

    /// A volume label has no raw wire encoding
    #[error("No raw encoding for volume label: {0:?}")]
    UnknownVolume(String),

    /// The command code is not part of the grammar
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// The subcommand is not valid for the command
    #[error("Unknown subcommand {subcommand:?} for command {command}")]
    UnknownSubcommand {
        /// Command code
        command: String,
        /// Offending subcommand code
        subcommand: String,
    },

    /// The parameter is not valid for the command
    #[error("Unknown parameter {parameter:?} for command {command}")]
    UnknownParameter {
        /// Command code
        command: String,
        /// Offending parameter code
        parameter: String,
    },

    /// Channel receive error
    #[error("Channel error: {0}")]
    ChannelError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_volume() {
        let e = DenonError::UnknownVolume("-99.0dB".into());
        assert_eq!(e.to_string(), "No raw encoding for volume label: \"-99.0dB\"");
    }

    #[test]
    fn display_unknown_parameter() {
        let e = DenonError::UnknownParameter {
            command: "PW".into(),
            parameter: "OFF".into(),
        };
        assert_eq!(e.to_string(), "Unknown parameter \"OFF\" for command PW");
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let e: DenonError = io_err.into();
        assert!(matches!(e, DenonError::Io(_)));
        assert!(e.to_string().contains("refused"));
    }

    #[test]
    fn is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DenonError>();
    }
}

//! Rust library for controlling Denon DN-500AV receivers
//!
//! This library provides an async API for the receiver's line-oriented ASCII
//! control protocol (TCP port 23, or a serial bridge). It supports:
//!
//! - Parsing every documented status line into labelled fields
//! - Formatting requests checked against the command grammar
//! - Master volume, channel volume, tone, LFE and effect level dB labels
//! - Query pacing, reply timeouts and automatic reconnection
//! - Real-time event subscriptions
//!
//! # Quick Start
//!
//! ```no_run
//! use denon_remote::{ConnectionConfig, ConnectionState, DenonClient, Event};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DenonClient::new(ConnectionConfig::default());
//!     let mut events = client.subscribe();
//!
//!     client.connect("192.168.1.20", 23)?;
//!     client.wait_for_state(ConnectionState::Connected).await?;
//!
//!     client.set_power(true)?;
//!     client.set_volume("-25.0dB")?;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let Event::VolumeChanged(label) = event {
//!             println!("Volume is now {}", label);
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Parsing Without a Connection
//!
//! ```
//! use denon_remote::Codec;
//!
//! let codec = Codec::dn500av();
//! let message = codec.parse_response("MVMAX 98");
//! assert_eq!(message.response(), Some("Master Volume, Maximum:  18.0dB"));
//! assert_eq!(codec.volume_request("-18.0dB").ok().as_deref(), Some("MV62"));
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Volume**: Raw level encodings and their dB labels
//! - **Grammar**: Command, subcommand and parameter tables
//! - **Message**: Line parsing and request formatting
//! - **Protocol**: Line framing and typed requests
//! - **Connection**: The task that paces requests, matches replies and reconnects
//! - **Client**: Cloneable handle for sending intents and subscribing to events

mod backoff;
mod client;
mod config;
mod connection;
mod error;
mod grammar;
mod message;
mod pending;
mod protocol;
mod subscription;
mod transport;
mod types;
mod volume;

// Public exports
pub use backoff::Backoff;
pub use client::DenonClient;
pub use config::{ConnectionConfig, Endpoint, Settings, DEFAULT_PORT};
pub use error::{DenonError, Result};
pub use grammar::{CommandDescriptor, Grammar, ParameterTable, SubcommandTable, Table};
pub use message::{Codec, ParsedMessage, TextEncoding, QUERY_MARKER};
pub use pending::{Dispatch, Received, RequestQueue};
pub use protocol::{is_query, LineCodec, Request, DELIMITER, MAX_LINE_LENGTH};
pub use subscription::{Event, EventReceiver};
pub use transport::{Connector, TcpConnector};
pub use types::{ConnectionState, SourceCode, TimeoutClass, VolumeLabel};
pub use volume::{
    channel_volume_label, effect_level_label, lfe_label, master_volume_label, tone_label,
    ReverseIndex, Scale, Step, CHANNEL_VOLUME, EFFECT_LEVEL, LFE, MASTER_VOLUME, MINUS_INFINITY,
    TONE,
};

use crate::error::{DenonError, Result};
use crate::message::ParsedMessage;
use crate::types::{SourceCode, VolumeLabel};
use serde::Serialize;
use tokio::sync::broadcast;

/// Notification published by the connection task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "value", rename_all = "snake_case")]
pub enum Event {
    PowerChanged(bool),
    VolumeChanged(VolumeLabel),
    MaxVolumeChanged(VolumeLabel),
    MuteChanged(bool),
    SourceChanged(SourceCode),
    Connected,
    ConnectionFailed(String),
    ConnectionLost(String),
    /// The connection was closed on request and will not be retried
    Disconnected,
    /// Human readable trace of the session: parsed replies and lifecycle
    Debug(String),
}

impl Event {
    /// State update carried by a received message, if it is one we track
    pub fn from_message(message: &ParsedMessage) -> Option<Event> {
        let parameter = message.parameter_code();
        match message.command_code()? {
            "PW" => Some(Event::PowerChanged(parameter? != "STANDBY")),
            "MV" => {
                let label = message.parameter_label()?.to_string();
                match message.subcommand_code() {
                    None => Some(Event::VolumeChanged(label)),
                    Some("MAX") => Some(Event::MaxVolumeChanged(label)),
                    Some(_) => None,
                }
            }
            "MU" => Some(Event::MuteChanged(parameter? == "ON")),
            "SI" => Some(Event::SourceChanged(parameter?.to_string())),
            _ => None,
        }
    }
}

/// Receiver for connection events
pub struct EventReceiver {
    rx: broadcast::Receiver<Event>,
}

impl EventReceiver {
    pub(crate) fn new(rx: broadcast::Receiver<Event>) -> Self {
        Self { rx }
    }

    /// Receive the next event
    ///
    /// Fails with [`DenonError::ConnectionClosed`] once the connection task
    /// has ended.
    pub async fn recv(&mut self) -> Result<Event> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => DenonError::ConnectionClosed,
            broadcast::error::RecvError::Lagged(n) => {
                DenonError::ChannelError(format!("Lagged by {} messages", n))
            }
        })
    }

    /// Try to receive an event without blocking
    ///
    /// Returns `None` if no event is available.
    pub fn try_recv(&mut self) -> Result<Option<Event>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(DenonError::ConnectionClosed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                Err(DenonError::ChannelError(format!("Lagged by {} messages", n)))
            }
        }
    }
}

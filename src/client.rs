use crate::config::{ConnectionConfig, Endpoint};
use crate::connection::{self, Command};
use crate::error::{DenonError, Result};
use crate::message::Codec;
use crate::protocol::Request;
use crate::subscription::{Event, EventReceiver};
use crate::transport::{Connector, TcpConnector};
use crate::types::ConnectionState;
use tokio::sync::{broadcast, mpsc, watch};

/// Client for controlling a Denon DN-500AV receiver
///
/// Creating a client spawns the connection task, so it must happen inside a
/// Tokio runtime. Every method returns immediately: lines are written later,
/// per the send policy, and everything the receiver reports comes back as
/// [`Event`]s through [`subscribe`](Self::subscribe). Clones share the same
/// connection; it is shut down when the last clone is dropped.
#[derive(Clone)]
pub struct DenonClient {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<Event>,
    state: watch::Receiver<ConnectionState>,
    codec: Codec,
}

impl DenonClient {
    /// Create a client that talks TCP
    ///
    /// # Example
    ///
    /// ```no_run
    /// use denon_remote::{ConnectionConfig, DenonClient, Event};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = DenonClient::new(ConnectionConfig::default());
    ///     let mut events = client.subscribe();
    ///     client.connect("192.168.1.20", 23)?;
    ///
    ///     while let Ok(event) = events.recv().await {
    ///         if event == Event::Connected {
    ///             client.set_volume("-30.0dB")?;
    ///         }
    ///         println!("{:?}", event);
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub fn new(config: ConnectionConfig) -> Self {
        let connector = TcpConnector::new(config.connect_timeout());
        Self::with_connector(connector, config)
    }

    /// Create a client over a custom transport
    pub fn with_connector<C: Connector>(connector: C, config: ConnectionConfig) -> Self {
        let codec = Codec::dn500av();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let commands = connection::spawn(connector, codec.clone(), config, events.clone(), state_tx);

        Self {
            commands,
            events,
            state,
            codec,
        }
    }

    fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| DenonError::ConnectionClosed)
    }

    /// Connect to a receiver, retrying with backoff until it succeeds
    ///
    /// Progress is reported through [`Event::Connected`] and
    /// [`Event::ConnectionFailed`].
    pub fn connect(&self, host: impl Into<String>, port: u16) -> Result<()> {
        self.command(Command::Connect(Endpoint::new(host, port)))
    }

    /// Close the connection and stop reconnecting
    pub fn disconnect(&self) -> Result<()> {
        self.command(Command::Disconnect)
    }

    /// Queue a request for the receiver
    ///
    /// Fails with [`DenonError::NotConnected`] unless connected, and with a
    /// grammar error if the request cannot be encoded; nothing is sent then.
    pub fn send(&self, request: Request) -> Result<()> {
        let line = request.to_line(&self.codec)?;
        if !self.state().is_connected() {
            return Err(DenonError::NotConnected);
        }
        self.command(Command::Send(line))
    }

    pub fn get_power(&self) -> Result<()> {
        self.send(Request::PowerStatus)
    }

    pub fn set_power(&self, on: bool) -> Result<()> {
        self.send(Request::SetPower(on))
    }

    pub fn get_volume(&self) -> Result<()> {
        self.send(Request::VolumeStatus)
    }

    /// Set the master volume from a display label such as `"-18.0dB"`
    ///
    /// `"Up"` and `"Down"` step the volume. A label with no raw encoding
    /// fails with [`DenonError::UnknownVolume`].
    pub fn set_volume(&self, label: &str) -> Result<()> {
        self.send(Request::SetVolume(label.to_string()))
    }

    pub fn volume_up(&self) -> Result<()> {
        self.send(Request::VolumeUp)
    }

    pub fn volume_down(&self) -> Result<()> {
        self.send(Request::VolumeDown)
    }

    pub fn get_mute(&self) -> Result<()> {
        self.send(Request::MuteStatus)
    }

    pub fn set_mute(&self, on: bool) -> Result<()> {
        self.send(Request::SetMute(on))
    }

    pub fn get_source(&self) -> Result<()> {
        self.send(Request::SourceStatus)
    }

    /// Select an input source by code, e.g. `"GAME"`
    pub fn set_source(&self, code: &str) -> Result<()> {
        self.send(Request::SetSource(code.to_string()))
    }

    /// Subscribe to events from the connection
    ///
    /// Multiple subscriptions can be active simultaneously.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.events.subscribe())
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the connection reaches `target`
    pub async fn wait_for_state(&self, target: ConnectionState) -> Result<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| DenonError::ConnectionClosed)
    }

    /// Codec used to encode requests, also handy for parsing captured lines
    pub fn codec(&self) -> &Codec {
        &self.codec
    }
}

use crate::backoff::Backoff;
use crate::config::{ConnectionConfig, Endpoint};
use crate::message::{Codec, TextEncoding};
use crate::pending::{Dispatch, Received, RequestQueue};
use crate::protocol::{is_query, LineCodec, Request};
use crate::subscription::Event;
use crate::transport::Connector;
use crate::types::ConnectionState;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use std::io;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tokio_util::codec::Framed;

/// Messages from client handles to the connection task
#[derive(Debug)]
pub(crate) enum Command {
    Connect(Endpoint),
    Disconnect,
    Send(String),
}

/// Where the link to the receiver stands
enum Link<S> {
    /// Not connected and not trying to
    Idle,
    /// Waiting to retry
    Backoff(Instant),
    Connecting(BoxFuture<'static, io::Result<S>>),
    Connected(Framed<S, LineCodec>),
}

enum LinkEvent<S> {
    Retry,
    Established(io::Result<S>),
    Line(Option<io::Result<Bytes>>),
}

async fn next_link_event<S>(link: &mut Link<S>) -> LinkEvent<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    match link {
        Link::Idle => std::future::pending().await,
        Link::Backoff(at) => {
            sleep_until(*at).await;
            LinkEvent::Retry
        }
        Link::Connecting(handshake) => LinkEvent::Established(handshake.await),
        Link::Connected(framed) => LinkEvent::Line(framed.next().await),
    }
}

async fn sleep_until_some(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Start the connection task; it ends when every command sender is dropped
pub(crate) fn spawn<C: Connector>(
    connector: C,
    codec: Codec,
    config: ConnectionConfig,
    events: broadcast::Sender<Event>,
    state: watch::Sender<ConnectionState>,
) -> mpsc::UnboundedSender<Command> {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let engine = Engine {
        queue: RequestQueue::new(
            config.inter_message_delay(),
            config.request_timeout(),
            config.extended_timeout(),
        ),
        backoff: Backoff::new(config.backoff_floor(), config.backoff_ceiling()),
        connector: Arc::new(connector),
        codec,
        config,
        events,
        state,
        endpoint: None,
        link: Link::Idle,
        encoding: TextEncoding::Ascii,
    };
    tokio::spawn(engine.run(command_rx));
    command_tx
}

struct Engine<C: Connector> {
    connector: Arc<C>,
    codec: Codec,
    config: ConnectionConfig,
    queue: RequestQueue,
    backoff: Backoff,
    events: broadcast::Sender<Event>,
    state: watch::Sender<ConnectionState>,
    endpoint: Option<Endpoint>,
    link: Link<C::Stream>,
    encoding: TextEncoding,
}

impl<C: Connector> Engine<C> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let send_at = self.queue.next_send_time();
            let deadline = self.queue.deadline();

            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        tracing::debug!("All client handles dropped, stopping connection task");
                        break;
                    }
                },

                event = next_link_event(&mut self.link) => match event {
                    LinkEvent::Retry => self.start_connect(),
                    LinkEvent::Established(Ok(stream)) => self.on_connected(stream),
                    LinkEvent::Established(Err(e)) => self.on_connect_failed(e),
                    LinkEvent::Line(Some(Ok(line))) => self.on_line(&line),
                    LinkEvent::Line(Some(Err(e))) => self.on_lost(e.to_string()),
                    LinkEvent::Line(None) => self.on_lost("Connection closed by receiver".to_string()),
                },

                _ = sleep_until_some(send_at) => self.flush_due().await,

                _ = sleep_until_some(deadline) => self.on_timeout(),
            }
        }

        self.link = Link::Idle;
        self.queue.clear();
        self.set_state(ConnectionState::Disconnected);
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn debug_message(&self, text: impl Into<String>) {
        self.emit(Event::Debug(text.into()));
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(endpoint) => {
                // A new target starts a fresh failure streak
                self.abandon();
                self.backoff.reset();
                self.endpoint = Some(endpoint);
                self.start_connect();
            }
            Command::Disconnect => {
                if matches!(self.link, Link::Idle) {
                    tracing::debug!("Disconnect requested while already disconnected");
                    return;
                }
                tracing::info!("Disconnecting from receiver");
                self.abandon();
                self.link = Link::Idle;
                self.set_state(ConnectionState::Disconnected);
                self.debug_message("Disconnected.");
                self.emit(Event::Disconnected);
            }
            Command::Send(line) => {
                if !matches!(self.link, Link::Connected(_)) {
                    tracing::warn!("Not connected, dropping line: {}", line);
                    return;
                }
                match self.queue.submit(line, Instant::now()) {
                    Dispatch::Now(line) => {
                        self.write(line).await;
                    }
                    Dispatch::Queued(_) => {}
                }
            }
        }
    }

    /// Drop the transport and everything waiting on it
    fn abandon(&mut self) {
        let dropped = self.queue.clear();
        if dropped > 0 {
            tracing::debug!("Abandoned {} pending requests", dropped);
        }
        self.encoding = TextEncoding::Ascii;
    }

    fn start_connect(&mut self) {
        let Some(endpoint) = &self.endpoint else {
            self.link = Link::Idle;
            return;
        };

        let text = format!("Connecting to {}:{}...", endpoint.host, endpoint.port);
        tracing::info!("{}", text);
        let handshake = self.connector.connect(&endpoint.host, endpoint.port);
        self.link = Link::Connecting(handshake);
        self.set_state(ConnectionState::Connecting);
        self.debug_message(text);
    }

    fn on_connected(&mut self, stream: C::Stream) {
        tracing::info!("Connection successful");
        self.link = Link::Connected(Framed::new(stream, LineCodec::new()));
        self.backoff.reset();
        self.set_state(ConnectionState::Connected);
        self.debug_message("Connection successful!");
        self.emit(Event::Connected);

        if self.config.query_on_connect {
            let now = Instant::now();
            for request in Request::startup_burst() {
                match request.to_line(&self.codec) {
                    Ok(line) => {
                        self.queue.submit(line, now);
                    }
                    Err(e) => tracing::error!("Failed to format {:?}: {}", request, e),
                }
            }
        }
    }

    fn on_connect_failed(&mut self, error: io::Error) {
        tracing::error!("Connection to receiver failed: {}", error);
        self.debug_message("Connection to receiver failed!");
        self.emit(Event::ConnectionFailed(error.to_string()));
        self.schedule_reconnect();
    }

    fn on_lost(&mut self, reason: String) {
        tracing::warn!("Connection to receiver lost: {}", reason);
        self.abandon();
        self.debug_message("Connection to receiver lost!");
        self.emit(Event::ConnectionLost(reason));
        self.schedule_reconnect();
    }

    fn on_timeout(&mut self) {
        if !self.queue.expired(Instant::now()) {
            return;
        }
        tracing::warn!("No reply from receiver before deadline, resetting connection");
        self.debug_message("Connection timed out");
        self.on_lost("Reply timeout".to_string());
    }

    fn schedule_reconnect(&mut self) {
        let delay = self.backoff.next_delay();
        self.link = Link::Backoff(Instant::now() + delay);
        self.set_state(ConnectionState::Disconnected);
        self.debug_message(format!("Trying to reconnect in {} seconds.", delay.as_secs_f64()));
    }

    fn on_line(&mut self, line: &[u8]) {
        match self.queue.on_line(Instant::now()) {
            Received::Reply(request) => {
                tracing::debug!("Reply to {} (ongoing calls: {})", request, self.queue.ongoing())
            }
            Received::Unsolicited => tracing::debug!("Unsolicited line from receiver"),
        }

        let message = self.codec.parse_bytes(line, self.encoding);
        if let Some(response) = message.response() {
            tracing::info!("Received line: {}", response);
            self.debug_message(response);
        }
        if let Some(event) = Event::from_message(&message) {
            self.emit(event);
        }
    }

    /// Write at most one query; the next slot is spaced from when it went out
    async fn flush_due(&mut self) {
        let Some(line) = self.queue.take_due(Instant::now()) else {
            return;
        };
        if self.write(line).await {
            self.queue.written(Instant::now());
        }
    }

    /// Write one line; a failed write is treated as a lost connection
    async fn write(&mut self, line: String) -> bool {
        let Link::Connected(framed) = &mut self.link else {
            return false;
        };

        // NET/USB onscreen info arrives in UTF-8 after NSE
        if line.starts_with("NSE") {
            self.encoding = TextEncoding::Utf8;
        } else if is_query(&line) {
            self.encoding = TextEncoding::Ascii;
        }

        tracing::debug!("Sending line: {}", line);
        match framed.send(line).await {
            Ok(()) => true,
            Err(e) => {
                self.on_lost(e.to_string());
                false
            }
        }
    }
}

use denon_remote::{
    ConnectionConfig, ConnectionState, Connector, DenonClient, Event, EventReceiver, LineCodec,
    Request,
};
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tokio_util::codec::Framed;

type Device = Framed<DuplexStream, LineCodec>;

/// Hands out scripted outcomes, one per connection attempt, and records when
/// each attempt was made. Attempts past the end of the script are refused.
struct ScriptedConnector {
    outcomes: Mutex<VecDeque<io::Result<DuplexStream>>>,
    attempts: mpsc::UnboundedSender<Instant>,
}

impl Connector for ScriptedConnector {
    type Stream = DuplexStream;

    fn connect(&self, _host: &str, _port: u16) -> BoxFuture<'static, io::Result<DuplexStream>> {
        let _ = self.attempts.send(Instant::now());
        let outcome = self
            .outcomes
            .lock()
            .ok()
            .and_then(|mut outcomes| outcomes.pop_front())
            .unwrap_or_else(|| Err(io::ErrorKind::ConnectionRefused.into()));
        Box::pin(async move { outcome })
    }
}

enum Outcome {
    Accept,
    Refuse,
}

struct Harness {
    client: DenonClient,
    events: EventReceiver,
    devices: VecDeque<Device>,
    attempts: mpsc::UnboundedReceiver<Instant>,
}

fn harness(script: &[Outcome], config: ConnectionConfig) -> Harness {
    harness_with_buffer(script, config, 1024)
}

/// `buffer` bounds how many bytes each direction holds before writes block
fn harness_with_buffer(script: &[Outcome], config: ConnectionConfig, buffer: usize) -> Harness {
    let mut outcomes = VecDeque::new();
    let mut devices = VecDeque::new();
    for outcome in script {
        match outcome {
            Outcome::Accept => {
                let (ours, theirs) = tokio::io::duplex(buffer);
                outcomes.push_back(Ok(ours));
                devices.push_back(Framed::new(theirs, LineCodec::new()));
            }
            Outcome::Refuse => outcomes.push_back(Err(io::ErrorKind::ConnectionRefused.into())),
        }
    }

    let (attempts_tx, attempts) = mpsc::unbounded_channel();
    let connector = ScriptedConnector {
        outcomes: Mutex::new(outcomes),
        attempts: attempts_tx,
    };
    let client = DenonClient::with_connector(connector, config);
    let events = client.subscribe();
    Harness {
        client,
        events,
        devices,
        attempts,
    }
}

fn quiet_config() -> ConnectionConfig {
    ConnectionConfig {
        query_on_connect: false,
        ..ConnectionConfig::default()
    }
}

const DELAY: Duration = Duration::from_millis(40);
const TIMEOUT: Duration = Duration::from_millis(200);
const FLOOR: Duration = Duration::from_millis(50);

/// Next event that is not a debug message
async fn next_event(events: &mut EventReceiver) -> Event {
    loop {
        let event = timeout(Duration::from_secs(600), events.recv())
            .await
            .expect("event before timeout")
            .expect("event channel open");
        if !matches!(event, Event::Debug(_)) {
            return event;
        }
    }
}

/// Next debug text, skipping typed events
async fn next_debug(events: &mut EventReceiver) -> String {
    loop {
        let event = timeout(Duration::from_secs(600), events.recv())
            .await
            .expect("event before timeout")
            .expect("event channel open");
        if let Event::Debug(text) = event {
            return text;
        }
    }
}

async fn read_line(device: &mut Device) -> (String, Instant) {
    let line = timeout(Duration::from_secs(600), device.next())
        .await
        .expect("line before timeout")
        .expect("stream open")
        .expect("read ok");
    (String::from_utf8_lossy(&line).into_owned(), Instant::now())
}

async fn connected(h: &mut Harness) -> Device {
    h.client.connect("receiver.local", 23).expect("connect");
    assert_eq!(next_event(&mut h.events).await, Event::Connected);
    assert_eq!(h.client.state(), ConnectionState::Connected);
    h.devices.pop_front().expect("scripted device")
}

#[tokio::test(start_paused = true)]
async fn back_to_back_queries_are_spaced() {
    let mut h = harness(&[Outcome::Accept], quiet_config());
    let mut device = connected(&mut h).await;

    h.client.get_power().expect("send");
    h.client.get_volume().expect("send");

    let (first, first_at) = read_line(&mut device).await;
    let (second, second_at) = read_line(&mut device).await;
    assert_eq!(first, "PW?");
    assert_eq!(second, "MV?");
    assert!(second_at - first_at >= DELAY, "spacing {:?}", second_at - first_at);

    device.send("PWON".to_string()).await.expect("reply");
    assert_eq!(next_event(&mut h.events).await, Event::PowerChanged(true));
    device.send("MV62".to_string()).await.expect("reply");
    assert_eq!(
        next_event(&mut h.events).await,
        Event::VolumeChanged("-18.0dB".into())
    );
}

#[tokio::test(start_paused = true)]
async fn commands_are_not_delayed() {
    let mut h = harness(&[Outcome::Accept], quiet_config());
    let mut device = connected(&mut h).await;
    let start = Instant::now();

    h.client.get_power().expect("send");
    h.client.get_volume().expect("send");
    h.client.set_mute(true).expect("send");

    let mut received = Vec::new();
    for _ in 0..3 {
        received.push(read_line(&mut device).await);
    }

    let at = |line: &str| {
        received
            .iter()
            .find(|(l, _)| l == line)
            .map(|(_, at)| *at - start)
            .expect("line received")
    };
    assert_eq!(at("MUON"), Duration::ZERO);
    assert_eq!(at("PW?"), Duration::ZERO);
    assert!(at("MV?") >= DELAY);
}

#[tokio::test(start_paused = true)]
async fn unsolicited_push_is_dispatched_without_timeout() {
    let mut h = harness(&[Outcome::Accept], quiet_config());
    let mut device = connected(&mut h).await;

    device.send("MV45".to_string()).await.expect("push");
    assert_eq!(
        next_event(&mut h.events).await,
        Event::VolumeChanged("-35.0dB".into())
    );
    device.send("MVMAX 98".to_string()).await.expect("push");
    assert_eq!(
        next_event(&mut h.events).await,
        Event::MaxVolumeChanged(" 18.0dB".into())
    );

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.client.state(), ConnectionState::Connected);
    assert!(matches!(h.events.try_recv(), Ok(None)));
}

#[tokio::test(start_paused = true)]
async fn timeout_reconnects_with_doubling_backoff() {
    let script = [
        Outcome::Accept,
        Outcome::Refuse,
        Outcome::Refuse,
        Outcome::Accept,
    ];
    let mut h = harness(&script, quiet_config());
    let mut device = connected(&mut h).await;
    h.attempts.recv().await.expect("first attempt");

    h.client.get_power().expect("send");
    let (line, sent_at) = read_line(&mut device).await;
    assert_eq!(line, "PW?");

    // No reply
    assert_eq!(
        next_event(&mut h.events).await,
        Event::ConnectionLost("Reply timeout".into())
    );
    let lost_at = Instant::now();
    assert_eq!(lost_at - sent_at, TIMEOUT);
    assert_eq!(h.client.state(), ConnectionState::Disconnected);
    assert!(h.attempts.try_recv().is_err());

    let first = h.attempts.recv().await.expect("retry");
    assert_eq!(first - lost_at, FLOOR);
    assert!(matches!(
        next_event(&mut h.events).await,
        Event::ConnectionFailed(_)
    ));

    let second = h.attempts.recv().await.expect("retry");
    assert_eq!(second - first, FLOOR * 2);
    assert!(matches!(
        next_event(&mut h.events).await,
        Event::ConnectionFailed(_)
    ));

    let third = h.attempts.recv().await.expect("retry");
    assert_eq!(third - second, FLOOR * 4);
    assert_eq!(next_event(&mut h.events).await, Event::Connected);

    // Success resets the backoff to its floor
    let device = h.devices.pop_front().expect("scripted device");
    drop(device);
    assert!(matches!(
        next_event(&mut h.events).await,
        Event::ConnectionLost(_)
    ));
    let lost_at = Instant::now();
    let retry = h.attempts.recv().await.expect("retry");
    assert_eq!(retry - lost_at, FLOOR);
}

#[tokio::test(start_paused = true)]
async fn timed_out_request_is_not_retried() {
    let mut h = harness(&[Outcome::Accept, Outcome::Accept], quiet_config());
    let mut device = connected(&mut h).await;

    h.client.get_source().expect("send");
    let (line, sent_at) = read_line(&mut device).await;
    assert_eq!(line, "SI?");

    // Source selection gets the extended timeout
    assert!(matches!(
        next_event(&mut h.events).await,
        Event::ConnectionLost(_)
    ));
    assert_eq!(Instant::now() - sent_at, Duration::from_secs(5));
    assert_eq!(next_event(&mut h.events).await, Event::Connected);

    let mut device = h.devices.pop_front().expect("scripted device");
    h.client.get_power().expect("send");
    let (line, _) = read_line(&mut device).await;
    assert_eq!(line, "PW?");
}

#[tokio::test(start_paused = true)]
async fn startup_burst_on_connect() {
    let mut h = harness(&[Outcome::Accept], ConnectionConfig::default());
    let mut device = connected(&mut h).await;

    let replies = ["PWON", "MV50", "MUOFF", "SIGAME"];
    let mut last_at = None;
    for (expected, reply) in ["PW?", "MV?", "MU?", "SI?"].into_iter().zip(replies) {
        let (line, at) = read_line(&mut device).await;
        assert_eq!(line, expected);
        if let Some(last) = last_at {
            assert!(at - last >= DELAY);
        }
        last_at = Some(at);
        device.send(reply.to_string()).await.expect("reply");
    }

    assert_eq!(next_event(&mut h.events).await, Event::PowerChanged(true));
    assert_eq!(
        next_event(&mut h.events).await,
        Event::VolumeChanged("-30.0dB".into())
    );
    assert_eq!(next_event(&mut h.events).await, Event::MuteChanged(false));
    assert_eq!(
        next_event(&mut h.events).await,
        Event::SourceChanged("GAME".into())
    );
    assert_eq!(h.client.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn disconnect_stops_reconnecting() {
    let mut h = harness(&[Outcome::Accept], quiet_config());
    let mut device = connected(&mut h).await;
    h.attempts.recv().await.expect("first attempt");

    h.client.disconnect().expect("disconnect");
    assert_eq!(next_event(&mut h.events).await, Event::Disconnected);
    h.client
        .wait_for_state(ConnectionState::Disconnected)
        .await
        .expect("state");

    // Our side of the stream is gone
    let closed = timeout(Duration::from_secs(1), device.next()).await.expect("closed");
    assert!(closed.is_none());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(h.attempts.try_recv().is_err());
    assert!(matches!(
        h.client.get_power(),
        Err(denon_remote::DenonError::NotConnected)
    ));
}

#[tokio::test(start_paused = true)]
async fn failed_connect_reports_and_retries() {
    let mut h = harness(&[Outcome::Refuse, Outcome::Accept], quiet_config());
    h.client.connect("receiver.local", 23).expect("connect");

    let mut debug = Vec::new();
    loop {
        match timeout(Duration::from_secs(10), h.events.recv()).await {
            Ok(Ok(Event::Debug(text))) => debug.push(text),
            Ok(Ok(Event::Connected)) => break,
            Ok(Ok(Event::ConnectionFailed(reason))) => assert!(!reason.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    assert_eq!(
        debug,
        [
            "Connecting to receiver.local:23...",
            "Connection to receiver failed!",
            "Trying to reconnect in 0.05 seconds.",
            "Connecting to receiver.local:23...",
            "Connection successful!",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn replies_show_up_as_debug_text() {
    let mut h = harness(&[Outcome::Accept], quiet_config());
    let mut device = connected(&mut h).await;

    device.send("PSBAS 44".to_string()).await.expect("push");
    let text = loop {
        match h.events.recv().await.expect("event") {
            Event::Debug(text) => break text,
            other => panic!("unexpected {:?}", other),
        }
    };
    assert_eq!(text, "Parameter Setting, Bass: -6.0dB");
}

#[tokio::test(start_paused = true)]
async fn spacing_holds_when_writes_stall() {
    let mut h = harness_with_buffer(&[Outcome::Accept], ConnectionConfig::default(), 3);
    let mut device = connected(&mut h).await;

    // The receiver reads nothing for a while, so the first write blocks
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut sent = Vec::new();
    for reply in ["PWON", "MV50", "MUOFF", "SIGAME"] {
        sent.push(read_line(&mut device).await);
        device.send(reply.to_string()).await.expect("reply");
    }

    let lines: Vec<&str> = sent.iter().map(|(line, _)| line.as_str()).collect();
    assert_eq!(lines, ["PW?", "MV?", "MU?", "SI?"]);
    for pair in sent.windows(2) {
        let gap = pair[1].1 - pair[0].1;
        assert!(gap >= DELAY, "{} then {} after {:?}", pair[0].0, pair[1].0, gap);
    }
    assert_eq!(h.client.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn net_usb_info_is_utf8_until_the_next_query() {
    let mut h = harness(&[Outcome::Accept], quiet_config());
    let mut device = connected(&mut h).await;

    h.client.send(Request::Raw("NSE".into())).expect("send");
    let (line, _) = read_line(&mut device).await;
    assert_eq!(line, "NSE");
    device.send("SI\u{e9}".to_string()).await.expect("push");
    assert_eq!(next_debug(&mut h.events).await, "Select Input Source: unknown");

    h.client.get_power().expect("send");
    let (line, _) = read_line(&mut device).await;
    assert_eq!(line, "PW?");
    device.send("SI\u{e9}".to_string()).await.expect("push");
    device.send("PWON".to_string()).await.expect("reply");

    // Back in ASCII mode the accented line is dropped undecoded
    assert_eq!(next_debug(&mut h.events).await, "Power: On");
    assert_eq!(next_event(&mut h.events).await, Event::PowerChanged(true));
}

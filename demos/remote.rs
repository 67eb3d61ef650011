use crossterm::{
    event::{self, Event as TermEvent, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use denon_remote::{
    ConnectionConfig, ConnectionState, DenonClient, Endpoint, Event, EventReceiver, Settings,
    DEFAULT_PORT,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::io;

const VOLUME_PRESETS: [&str; 4] = ["-30.0dB", "-26.0dB", "-24.0dB", "-18.0dB"];
const FAVORITE_SOURCES: [(&str, &str); 3] = [
    ("GAME", "Computer HDMI"),
    ("CD", "Pro Analog"),
    ("TV", "Pro Digital"),
];
const LOG_LINES: usize = 200;

struct App {
    client: DenonClient,
    events: EventReceiver,
    endpoint: Endpoint,
    connection: ConnectionState,
    power: Option<bool>,
    volume: Option<String>,
    max_volume: Option<String>,
    mute: Option<bool>,
    source: Option<String>,
    log: VecDeque<String>,
    status_message: String,
}

impl App {
    fn new(endpoint: Endpoint, config: ConnectionConfig) -> Self {
        let client = DenonClient::new(config);
        let events = client.subscribe();

        Self {
            client,
            events,
            endpoint,
            connection: ConnectionState::Disconnected,
            power: None,
            volume: None,
            max_volume: None,
            mute: None,
            source: None,
            log: VecDeque::new(),
            status_message: "Press c to connect, q to quit".to_string(),
        }
    }

    fn connect(&mut self) {
        self.report(self.client.connect(self.endpoint.host.clone(), self.endpoint.port));
    }

    fn report(&mut self, result: denon_remote::Result<()>) {
        if let Err(e) = result {
            self.status_message = format!("Error: {}", e);
        }
    }

    fn push_log(&mut self, line: String) {
        if self.log.len() == LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }

    fn handle_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(Some(event)) => self.apply(event),
                Ok(None) => break,
                Err(e) => {
                    self.status_message = format!("Event error: {}", e);
                    break;
                }
            }
        }
        self.connection = self.client.state();
    }

    fn apply(&mut self, event: Event) {
        match event {
            Event::PowerChanged(on) => self.power = Some(on),
            Event::VolumeChanged(label) => self.volume = Some(label),
            Event::MaxVolumeChanged(label) => self.max_volume = Some(label),
            Event::MuteChanged(on) => self.mute = Some(on),
            Event::SourceChanged(code) => self.source = Some(code),
            Event::Connected => {
                self.status_message =
                    "Connected! p power, +/- volume, m mute, 1-4 presets, s source, r refresh, d disconnect, q quit"
                        .to_string();
            }
            Event::ConnectionFailed(reason) | Event::ConnectionLost(reason) => {
                self.status_message = format!("Connection problem: {}", reason);
            }
            Event::Disconnected => {
                self.status_message = "Disconnected. Press c to connect".to_string();
            }
            Event::Debug(text) => self.push_log(text),
        }
    }

    fn toggle_power(&mut self) {
        let on = !self.power.unwrap_or(false);
        self.report(self.client.set_power(on));
    }

    fn toggle_mute(&mut self) {
        let on = !self.mute.unwrap_or(false);
        self.report(self.client.set_mute(on));
    }

    fn volume_preset(&mut self, index: usize) {
        if let Some(label) = VOLUME_PRESETS.get(index) {
            self.report(self.client.set_volume(label));
        }
    }

    fn cycle_source(&mut self) {
        let current = FAVORITE_SOURCES
            .iter()
            .position(|(code, _)| Some(*code) == self.source.as_deref());
        let next = current.map_or(0, |i| (i + 1) % FAVORITE_SOURCES.len());
        self.report(self.client.set_source(FAVORITE_SOURCES[next].0));
    }

    fn refresh(&mut self) {
        let result = self
            .client
            .get_power()
            .and_then(|_| self.client.get_volume())
            .and_then(|_| self.client.get_mute())
            .and_then(|_| self.client.get_source());
        self.report(result);
    }
}

fn on_off(value: Option<bool>, on: &'static str, off: &'static str) -> &'static str {
    match value {
        Some(true) => on,
        Some(false) => off,
        None => "?",
    }
}

fn ui(f: &mut Frame, app: &App) {
    let outer_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(f.size());

    let inner_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(outer_chunks[0]);

    render_receiver(f, app, inner_chunks[0]);
    render_log(f, app, inner_chunks[1]);
    render_status(f, app, outer_chunks[1]);
}

fn render_receiver(f: &mut Frame, app: &App, area: Rect) {
    let title = format!(" {}:{} ({}) ", app.endpoint.host, app.endpoint.port, app.connection);
    let border = if app.connection.is_connected() {
        Color::Green
    } else {
        Color::Yellow
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));

    let label = Style::default().fg(Color::Cyan);
    let value = Style::default().add_modifier(Modifier::BOLD);
    let row = |name: &'static str, text: String| {
        Line::from(vec![Span::styled(format!("{:<12}", name), label), Span::styled(text, value)])
    };

    let volume = app.volume.clone().unwrap_or_else(|| "?".to_string());
    let mut lines = vec![
        row("Power", on_off(app.power, "On", "Standby").to_string()),
        row("Volume", volume.clone()),
        row("Maximum", app.max_volume.clone().unwrap_or_else(|| "?".to_string())),
        row("Mute", on_off(app.mute, "On", "Off").to_string()),
        row("Source", app.source.clone().unwrap_or_else(|| "?".to_string())),
        Line::from(""),
        Line::from(Span::styled("Volume presets", label)),
    ];

    for (i, preset) in VOLUME_PRESETS.iter().enumerate() {
        let active = volume.trim() == *preset;
        let style = if active {
            Style::default().fg(Color::Black).bg(Color::Green)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(format!("  {} {}", i + 1, preset), style)));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Favorite sources (s to cycle)", label)));
    for (code, name) in FAVORITE_SOURCES {
        let active = app.source.as_deref() == Some(code);
        let style = if active {
            Style::default().fg(Color::Black).bg(Color::Green)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(format!("  {} ({})", name, code), style)));
    }

    let text = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    f.render_widget(text, area);
}

fn render_log(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Debug ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let visible = area.height.saturating_sub(2) as usize;
    let items: Vec<ListItem> = app
        .log
        .iter()
        .skip(app.log.len().saturating_sub(visible))
        .map(|line| ListItem::new(line.as_str()))
        .collect();

    f.render_widget(List::new(items).block(block), area);
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Status ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let text = Paragraph::new(app.status_message.clone())
        .block(block)
        .wrap(Wrap { trim: true });

    f.render_widget(text, area);
}

/// `remote <host> [port]` or `remote <settings.json>`
fn settings_from_args() -> Result<Settings, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [path] if path.ends_with(".json") => Ok(Settings::load(path)?),
        [host] => Ok(Settings {
            receiver: Endpoint::new(host.clone(), DEFAULT_PORT),
            connection: ConnectionConfig::default(),
        }),
        [host, port] => Ok(Settings {
            receiver: Endpoint::new(host.clone(), port.parse()?),
            connection: ConnectionConfig::default(),
        }),
        _ => Err("usage: remote <host> [port] | remote <settings.json>".into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = settings_from_args()?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(settings.receiver, settings.connection);
    app.connect();

    let res = run_app(&mut terminal, &mut app).await;

    let _ = app.client.disconnect();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {}", err);
    }

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        app.handle_events();
        terminal.draw(|f| ui(f, app))?;

        // Handle input events (non-blocking)
        if !event::poll(std::time::Duration::from_millis(100))? {
            continue;
        }

        if let TermEvent::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Char('c') => app.connect(),
                KeyCode::Char('d') => {
                    let result = app.client.disconnect();
                    app.report(result);
                }
                KeyCode::Char('p') => app.toggle_power(),
                KeyCode::Char('+') | KeyCode::Char('=') => {
                    let result = app.client.volume_up();
                    app.report(result);
                }
                KeyCode::Char('-') | KeyCode::Char('_') => {
                    let result = app.client.volume_down();
                    app.report(result);
                }
                KeyCode::Char('m') => app.toggle_mute(),
                KeyCode::Char('s') => app.cycle_source(),
                KeyCode::Char('r') => app.refresh(),
                KeyCode::Char(c @ '1'..='4') => {
                    let index = c as usize - '1' as usize;
                    app.volume_preset(index);
                }
                _ => {}
            }
        }
    }
}

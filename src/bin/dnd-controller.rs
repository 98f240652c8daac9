//! Controller process: a small terminal menu that drives every configured light.

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dnd_light::{
    Availability, Controller, ControllerHandle, ControllerSettings, Coordinator, MenuAction,
    UiHandle, DEFAULT_SETTINGS_FILE,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const APP_TITLE: &str = "Do Not Disturb Light";

#[derive(Debug, Parser)]
#[command(name = "dnd-controller", version, about = "Toggle do-not-disturb lights")]
struct Args {
    /// Settings file listing the light addresses (created if missing)
    #[arg(long, env = "DND_SETTINGS", default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,
}

/// What the screen shows
struct ScreenState {
    status: Availability,
    notice: Option<String>,
}

/// UI capability handed to the controller worker
#[derive(Clone)]
struct TerminalUi {
    state: Arc<Mutex<ScreenState>>,
}

impl TerminalUi {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScreenState {
                status: Availability::Unknown,
                notice: Some("Reading light state...".to_string()),
            })),
        }
    }

    fn snapshot(&self) -> (Availability, Option<String>) {
        match self.state.lock() {
            Ok(state) => (state.status, state.notice.clone()),
            Err(_) => (Availability::Unknown, None),
        }
    }
}

impl UiHandle for TerminalUi {
    fn set_status(&self, status: Availability) {
        if let Ok(mut state) = self.state.lock() {
            state.status = status;
            state.notice = None;
        }
    }

    fn notify(&self, message: &str) {
        tracing::warn!("{}", message);
        if let Ok(mut state) = self.state.lock() {
            state.notice = Some(message.to_string());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only log when asked to; log lines would otherwise land on the menu
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .init();
    }

    let args = Args::parse();
    let settings = ControllerSettings::load_or_create(&args.settings)?;
    let coordinator = Arc::new(Coordinator::new(
        settings.device_addresses()?,
        settings.coordinator_config(),
    ));

    let ui = TerminalUi::new();
    let handle = Controller::spawn(coordinator, Arc::new(ui.clone()));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &ui, &handle);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    handle.shutdown().await;

    if let Err(err) = res {
        println!("Error: {}", err);
    }

    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ui: &TerminalUi,
    handle: &ControllerHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| render(f, ui))?;

        // Handle input events (non-blocking)
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let action = match key.code {
                    KeyCode::Char('t') | KeyCode::Enter => MenuAction::Toggle,
                    KeyCode::Char('a') => MenuAction::SetAvailable,
                    KeyCode::Char('b') => MenuAction::SetBusy,
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    _ => continue,
                };
                if let Err(e) = handle.try_dispatch(action) {
                    ui.notify(&e.to_string());
                }
            }
        }
    }
}

fn render(f: &mut Frame, ui: &TerminalUi) {
    let (status, notice) = ui.snapshot();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
        .split(f.size());

    let (label, color) = match status {
        Availability::Available => ("AVAILABLE", Color::Green),
        Availability::Busy => ("BUSY", Color::Red),
        Availability::Unknown => ("UNKNOWN", Color::Gray),
    };
    let status_widget = Paragraph::new(Line::from(Span::styled(
        label,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )))
    .block(
        Block::default()
            .title(format!(" {APP_TITLE} "))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color)),
    );
    f.render_widget(status_widget, chunks[0]);

    let menu = Paragraph::new(vec![
        Line::from("t / Enter  Toggle"),
        Line::from("a          Available"),
        Line::from("b          Busy"),
        Line::from("q / Esc    Exit"),
    ])
    .block(Block::default().title(" Menu ").borders(Borders::ALL));
    f.render_widget(menu, chunks[1]);

    let notice_widget = Paragraph::new(notice.unwrap_or_default())
        .block(
            Block::default()
                .title(" Status ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Gray)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(notice_widget, chunks[2]);
}

// Binary includes library modules - some public API items are only for library consumers
#![allow(unused)]

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod data;
mod engine;
mod error;
mod events;
mod session;
mod source;
mod ui;
mod view;

use app::App;
use config::Settings;
use data::MarkerTimeline;
use engine::MetricsEngine;
use session::{Role, SessionInfo, SessionNotes};
use source::{FileFeed, StreamFeed, SyntheticFeed, TelemetryFeed};

#[derive(Parser, Debug)]
#[command(name = "session-room")]
#[command(about = "Collaborative monitoring room for live video-contribution feeds")]
struct Args {
    /// Settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read telemetry frames from a JSON file instead of the synthetic feed
    #[arg(short, long, conflicts_with = "connect")]
    file: Option<PathBuf>,

    /// Read newline-delimited telemetry frames from a TCP endpoint (host:port)
    #[arg(short, long, conflicts_with = "file")]
    connect: Option<String>,

    /// Tick interval (e.g., "1s", "500ms")
    #[arg(short, long, value_parser = data::duration::parse_duration)]
    tick: Option<Duration>,

    /// Seed for reproducible synthetic telemetry
    #[arg(long)]
    seed: Option<u64>,

    /// Role of the local user (owner, commenter, viewer)
    #[arg(long)]
    role: Option<Role>,

    /// Session title
    #[arg(long)]
    title: Option<String>,

    /// Run headless for --ticks ticks, export state to a JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Number of ticks to run in export mode
    #[arg(long, default_value = "10", requires = "export")]
    ticks: u64,

    /// Log file (the terminal belongs to the UI)
    #[arg(long, default_value = "session-room.log")]
    log_file: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_file)?;

    let mut settings = Settings::load(args.config.as_deref())?;
    apply_overrides(&mut settings, &args);

    // Feeds and the tick runner need a runtime
    let rt = Runtime::new()?;
    let feed = build_feed(&rt, &args, &settings)?;

    let roster = settings.roster()?;
    let mut engine = MetricsEngine::new(feed, settings.engine_config());
    engine.initialize(&roster.seeds());

    // Handle export mode (non-interactive)
    if let Some(ref export_path) = args.export {
        return export_to_file(engine, &settings, &roster, args.ticks, export_path);
    }

    if !settings.session.live {
        engine.set_enabled(false);
    }

    let _guard = rt.enter();
    let handle = engine.start(settings.engine.tick);
    let app = App::new(handle, &settings, roster, ui::Theme::auto_detect());
    run_tui(app)
}

fn init_logging(path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("session_room=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Command-line flags win over the settings file and environment.
fn apply_overrides(settings: &mut Settings, args: &Args) {
    if let Some(tick) = args.tick {
        settings.engine.tick = tick;
    }
    if let Some(seed) = args.seed {
        settings.engine.seed = Some(seed);
    }
    if let Some(role) = args.role {
        settings.session.role = role;
    }
    if let Some(ref title) = args.title {
        settings.session.title = title.clone();
    }
}

/// Pick the telemetry feed: a file, a TCP stream, or synthetic.
fn build_feed(rt: &Runtime, args: &Args, settings: &Settings) -> Result<Box<dyn TelemetryFeed>> {
    if let Some(ref path) = args.file {
        info!("reading telemetry from {}", path.display());
        let feed = FileFeed::new(path).with_thresholds(settings.thresholds.clone());
        return Ok(Box::new(feed));
    }

    if let Some(ref addr) = args.connect {
        let thresholds = settings.thresholds.clone();
        let stale_after = settings.engine.stale_after;
        return rt.block_on(async {
            use tokio::net::TcpStream;

            println!("Connecting to {}...", addr);
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    println!("Connected!");
                    let feed = StreamFeed::spawn(stream, addr)
                        .with_thresholds(thresholds)
                        .with_stale_after(stale_after);
                    Ok(Box::new(feed) as Box<dyn TelemetryFeed>)
                }
                Err(e) => Err(anyhow::anyhow!("Failed to connect to {}: {}", addr, e)),
            }
        });
    }

    Ok(Box::new(SyntheticFeed::with_table(
        settings.transitions.clone(),
        settings.engine.seed,
    )))
}

/// Run the TUI until the user quits
fn run_tui(mut app: App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    // Run the main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    info!("session room closed");
    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 60;
    const MIN_HEIGHT: u16 = 16;

    while app.running {
        app.refresh();

        terminal.draw(|frame| {
            let area = frame.area();

            // Check for minimum terminal size
            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                let msg = format!(
                    "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                );
                let paragraph = ratatui::widgets::Paragraph::new(msg)
                    .alignment(ratatui::layout::Alignment::Center)
                    .style(ratatui::style::Style::default().fg(ratatui::style::Color::Yellow));
                let top = (area.height / 2).saturating_sub(2);
                let centered =
                    ratatui::layout::Rect::new(0, top, area.width, 5u16.min(area.height - top));
                frame.render_widget(paragraph, centered);
                app.tile_areas.clear();
                return;
            }

            ui::render(frame, app, area);
        })?;

        // Poll for events with a short timeout
        if let Some(event) = events::poll_event(Duration::from_millis(100))? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Mouse(mouse) => events::handle_mouse_event(app, mouse),
                Event::Resize(_, _) => {
                    // Terminal will redraw on next iteration
                }
                _ => {}
            }
        }
    }

    Ok(())
}

/// Run the engine for `ticks` ticks without a terminal and export the result
fn export_to_file(
    mut engine: MetricsEngine,
    settings: &Settings,
    roster: &session::Roster,
    ticks: u64,
    export_path: &Path,
) -> Result<()> {
    let mut session = SessionInfo::new(settings.session.title.clone());
    session.purpose = settings.session.purpose.clone();
    session.start(Utc::now());

    for _ in 0..ticks {
        engine.tick();
    }

    let document = app::export_document(
        &session,
        roster,
        &engine.snapshot(),
        &MarkerTimeline::new(),
        &SessionNotes::default(),
        Utc::now(),
    );
    app::write_json(export_path, &document)?;

    println!(
        "Exported {} inputs after {} ticks to: {}",
        roster.len(),
        engine.tick_count(),
        export_path.display()
    );
    Ok(())
}

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use serde::Serialize;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use obdwatch::monitor::{CommandDispatcher, CommandKind, ControllerSettings, MonitorController};
use obdwatch::notify::{Notification, QueueNotifier};
use obdwatch::source::TcpDevice;
use obdwatch::ui::{self, Theme};
use obdwatch::{events, App, MonitorConfig, MonitoringState, WatchdogState};

const DEFAULT_LOG_OUTPUT: &str = "obdwatch.log";

#[derive(Parser, Debug)]
#[command(name = "obdwatch")]
#[command(about = "Monitor live or replayed OBD-II telemetry")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Adapter address (host:port), overrides the configured one
    #[arg(short, long)]
    device: Option<String>,

    /// Recorded log used by "start with log" and "open log"
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Start from the recorded log (--log or the configured default) instead of the live device
    #[arg(short, long)]
    simulate: bool,

    /// Start monitoring on launch
    #[arg(short, long)]
    auto_start: bool,

    /// Print status changes as JSON lines instead of running the TUI
    #[arg(long)]
    headless: bool,

    /// Where to write diagnostics in TUI mode
    #[arg(long, default_value = DEFAULT_LOG_OUTPUT)]
    log_output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = MonitorConfig::load(args.config.as_deref())?;
    if let Some(address) = args.device.clone() {
        config.device.address = address;
    }
    if let Some(log) = args.log.clone() {
        config.replay.default_log = Some(log);
    }
    config.auto_start |= args.auto_start;

    init_tracing(&config.log_level, (!args.headless).then_some(args.log_output.as_path()))?;
    tracing::info!(device = %config.device.address, "obdwatch starting");

    let runtime = Runtime::new()?;
    let device = TcpDevice::new(&config.device.address, config.device.connect_timeout);
    let (notifier, notifications) = QueueNotifier::create();
    let controller = MonitorController::new(
        runtime.handle().clone(),
        Arc::new(device),
        Box::new(notifier),
        ControllerSettings::from(&config),
    );
    let dispatcher = CommandDispatcher::new().with_default_log(config.replay.default_log.clone());

    let startup = if args.simulate {
        Some(CommandKind::StartWithSimulation)
    } else if config.auto_start || args.headless {
        Some(CommandKind::Start)
    } else {
        None
    };

    let result = if args.headless {
        run_headless(&runtime, controller, dispatcher, notifications, startup)
    } else {
        let app = App::new(controller, dispatcher, notifications, Theme::auto_detect());
        run_tui(app, startup)
    };

    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

/// Install the tracing subscriber.
///
/// With `output` set, logs go to that file so the TUI stays intact.
fn init_tracing(level: &str, output: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

/// One line of headless output.
#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    state: MonitoringState,
    watchdog: &'a WatchdogState,
    restart_count: u32,
    records_received: u64,
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<&'a str>,
}

fn print_status(controller: &MonitorController, watchdog: &WatchdogState) -> Result<()> {
    let session = controller.session();
    let report = StatusReport {
        state: session.state(),
        watchdog,
        restart_count: session.restart_count(),
        records_received: session.records_received(),
        source: controller.source_description(),
        last_error: session.last_error(),
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

/// Run without a terminal UI until the session is no longer active.
fn run_headless(
    runtime: &Runtime,
    mut controller: MonitorController,
    dispatcher: CommandDispatcher,
    mut notifications: mpsc::UnboundedReceiver<Notification>,
    startup: Option<CommandKind>,
) -> Result<()> {
    let (interrupt_tx, mut interrupt_rx) = tokio::sync::oneshot::channel();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt_tx.send(());
        }
    });

    let kind = startup.unwrap_or(CommandKind::Start);
    let outcome = dispatcher.dispatch(&mut controller, kind.into());
    if !outcome.is_executed() {
        while let Ok(notification) = notifications.try_recv() {
            eprintln!("{}", notification.summary());
        }
        bail!("Could not start monitoring: {:?}", outcome);
    }

    let mut status = controller.subscribe_status();
    let mut last_state = None;
    loop {
        controller.process_events();

        while let Ok(notification) = notifications.try_recv() {
            eprintln!("{}", notification.summary());
        }

        let state = controller.state();
        if status.has_changed().unwrap_or(false) || last_state != Some(state) {
            let watchdog = status.borrow_and_update().clone();
            print_status(&controller, &watchdog)?;
            last_state = Some(state);
        }

        if !state.is_active() {
            break;
        }
        if interrupt_rx.try_recv().is_ok() {
            tracing::info!("interrupted, halting");
            controller.halt()?;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    match controller.session().last_error() {
        Some(err) => bail!("Monitoring failed: {}", err),
        None => Ok(()),
    }
}

/// Run the TUI
fn run_tui(mut app: App, startup: Option<CommandKind>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    if let Some(kind) = startup {
        app.trigger(kind);
    }

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    while app.running {
        app.tick();
        terminal.draw(|frame| ui::draw(frame, app))?;

        // Poll for events with a short timeout
        if let Some(Event::Key(key)) = events::poll_event(Duration::from_millis(100))? {
            events::handle_key_event(app, key);
        }
    }

    // Let the worker observe the halt before the runtime goes away
    for _ in 0..20 {
        app.tick();
        if !app.controller.state().is_active() {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    Ok(())
}

//! keyline
//!
//! Logs the lines typed on the keyboards of this machine, one file per day.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use keyline::binlog::LogReader;
use keyline::shutdown::{self, ShutdownHandle};
use keyline::{
    find_keyboards, CaptureConfig, DailyFileSink, KeyboardSet, Keylogger, Keymap, Layout,
    LogFormat, Session, DEFAULT_LINE_LIMIT, DEFAULT_LOG_DIR,
};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "keyline")]
#[command(about = "Reconstruct typed lines from keyboard events and log them per day")]
struct Cli {
    /// Log filter used when RUST_LOG is not set (e.g. "debug" or "keyline=trace")
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture key events and log every submitted line
    Capture(CaptureArgs),
    /// List the detected keyboards
    Devices,
    /// Print the lines stored in a binary log
    Decode {
        /// The binary log file
        file: PathBuf,
        /// The layout the log was captured with
        #[arg(short, long, default_value_t = Layout::Us)]
        layout: Layout,
    },
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// Directory the daily log files are written to
    #[arg(short = 'o', long, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Log file format (text or binary)
    #[arg(short, long, default_value_t = LogFormat::Text)]
    format: LogFormat,

    /// Keyboard layout (us or abnt2)
    #[arg(short, long, default_value_t = Layout::Us)]
    layout: Layout,

    /// Input device to watch; may be repeated. Keyboards are auto-detected if omitted
    #[arg(short, long = "device")]
    devices: Vec<PathBuf>,

    /// Maximum number of keys in a line before it is submitted anyway
    #[arg(long, default_value_t = DEFAULT_LINE_LIMIT)]
    line_limit: usize,

    /// Log the unsubmitted line on shutdown
    #[arg(long)]
    flush_on_exit: bool,

    /// Re-check for shutdown at least every this many milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

impl From<CaptureArgs> for CaptureConfig {
    fn from(args: CaptureArgs) -> Self {
        Self {
            log_dir: args.log_dir,
            format: args.format,
            layout: args.layout,
            line_limit: args.line_limit,
            flush_on_exit: args.flush_on_exit,
            poll_interval: args.poll_interval_ms.map(Duration::from_millis),
            devices: args.devices,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&cli.log_level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Command::Capture(args) => capture(args.into()).await,
        Command::Devices => list_devices(),
        Command::Decode { file, layout } => decode(&file, layout),
    }
}

async fn capture(config: CaptureConfig) -> Result<()> {
    config.validate()?;

    let keyboards = if config.devices.is_empty() {
        KeyboardSet::detect()
    } else {
        KeyboardSet::open(&config.devices)
    }
    .context("no usable keyboard")?;

    for kb in keyboards.devices() {
        tracing::info!("watching {} ({})", kb.name(), kb.path().display());
    }

    let sink = DailyFileSink::new(&config.log_dir, config.format)?;
    tracing::info!(
        "logging {} lines to {}",
        config.format,
        sink.dir().display()
    );

    let session = Session::new(Keymap::new(config.layout), config.line_limit);
    let (handle, signal) = shutdown::channel();
    tokio::spawn(stop_on_signal(handle));

    let stats = Keylogger::new(keyboards, sink, session, signal)
        .poll_interval(config.poll_interval)
        .flush_on_exit(config.flush_on_exit)
        .capture()
        .await?;

    tracing::info!("{} line(s) logged", stats.lines);

    Ok(())
}

/// Request a shutdown on SIGINT or SIGTERM.
async fn stop_on_signal(handle: ShutdownHandle) {
    let (mut interrupt, mut terminate) =
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(interrupt), Ok(terminate)) => (interrupt, terminate),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("cannot install signal handlers: {e}");
                return;
            }
        };

    tokio::select! {
        _ = interrupt.recv() => tracing::info!("interrupted, shutting down"),
        _ = terminate.recv() => tracing::info!("terminated, shutting down"),
    }

    handle.request();
}

fn list_devices() -> Result<()> {
    let keyboards = find_keyboards()?;

    if keyboards.is_empty() {
        println!("no keyboards found (reading input devices usually requires root)");
    }

    for kb in keyboards {
        println!("{}\t{}", kb.path().display(), kb.name());
    }

    Ok(())
}

fn decode(file: &Path, layout: Layout) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
    let keymap = Keymap::new(layout);

    for entry in LogReader::new(&bytes) {
        let entry = entry.with_context(|| format!("corrupt log {}", file.display()))?;
        println!("[{}] {}", entry.time.format("%H:%M:%S"), entry.text(&keymap));
    }

    Ok(())
}

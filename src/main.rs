//! GDC Kit - game-driven composition console
//!
//! Lists MIDI outputs, plays single notes, or runs an interactive session
//! that turns synthetic key presses into timed MIDI notes.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gdc_kit::cli::{self, format_ports, parse_pitch, ports_json};
use gdc_kit::config::AppConfig;
use gdc_kit::dispatcher::{MemoryAccess, MemoryRegistry, MidiAccess, MidirAccess, TokioScheduler};
use gdc_kit::input::SyntheticSource;
use gdc_kit::paths::ConfigPath;
use gdc_kit::Session;

/// GDC Kit - keyboard/mouse edges to timed MIDI notes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI output ports
    #[arg(long)]
    list_ports: bool,

    /// Print the port list as JSON
    #[arg(long, requires = "list_ports")]
    json: bool,

    /// Output port index, overriding auto-selection
    #[arg(short, long)]
    port: Option<usize>,

    /// Log every MIDI send and selection
    #[arg(short, long)]
    verbose: bool,

    /// Use an in-memory output instead of the system MIDI stack
    #[arg(long)]
    dry_run: bool,

    /// Play one note (number or name) and exit
    #[arg(long)]
    note: Option<String>,

    /// Velocity for --note
    #[arg(long, requires = "note")]
    velocity: Option<u8>,

    /// Duration in milliseconds for --note
    #[arg(long, requires = "note")]
    duration_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    let config_path = ConfigPath::resolve(args.config.as_deref());
    info!("Configuration file: {}", config_path.path.display());

    let mut config = AppConfig::load_or_default(&config_path.path).await?;
    if args.verbose {
        config.midi.verbose = true;
    }

    let access: Box<dyn MidiAccess> = if args.dry_run {
        info!("Dry run: using in-memory MIDI output");
        Box::new(MemoryAccess::new(MemoryRegistry::new(["Dry Run Output"])))
    } else {
        Box::new(MidirAccess::new(config.midi.client_name.clone()))
    };

    let scheduler = TokioScheduler::current().context("No tokio runtime for note timers")?;
    let mut source = SyntheticSource::new();
    let mut session = Session::new(config, &mut source, Arc::new(scheduler));

    match session.connect(access.as_ref()).await {
        Ok(Some(name)) => info!("MIDI output: {}", name),
        Ok(None) => warn!("No MIDI output ports found; notes will be dropped"),
        Err(e) => {
            // Capability absence is reported once; the session keeps running inert
            eprintln!("{} {}", "MIDI unavailable:".red().bold(), e);
        }
    }

    if let Some(index) = args.port {
        match session.dispatcher().select_port(index) {
            Some(name) => info!("Selected MIDI output {}: {}", index, name),
            None => warn!("No MIDI output available for index {}", index),
        }
    }

    if args.list_ports {
        let dispatcher = session.dispatcher();
        let names = dispatcher.list_ports();
        if args.json {
            println!("{}", ports_json(&names, dispatcher.selected_index())?);
        } else {
            println!("{}", format_ports(&names, dispatcher.selected_index()));
        }
        return Ok(());
    }

    if let Some(note) = &args.note {
        let pitch = parse_pitch(note)?;
        let mut event = session.note_event(pitch);
        if let Some(velocity) = args.velocity {
            event = event.with_velocity(velocity.min(127));
        }
        if let Some(ms) = args.duration_ms {
            event = event.with_duration(Duration::from_millis(ms));
        }

        let outcome = session.dispatcher().play(event);
        info!("Note {} ({:?}), holding for {:?}", pitch, outcome, event.duration);

        // Let the note-off fire before the runtime shuts down
        tokio::time::sleep(event.duration + Duration::from_millis(20)).await;
        return Ok(());
    }

    info!(
        "Session ready: {} mapped key(s), frame with 'frame'",
        session.keymap().len()
    );
    cli::run_repl(&mut session, &source).await?;

    info!("GDC Kit shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

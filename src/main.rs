//! SDE Editor - command-line host
//!
//! Connects to an SDE-3000 EVH over MIDI and edits its parameters from a REPL.

use anyhow::Result;
use clap::Parser;
use colored::*;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sde_editor::cli;
use sde_editor::config::AppConfig;
use sde_editor::transport::{MidiBackend, MidirBackend, SimulatedBackend};
use sde_editor::{DeviceSession, ParameterStore};

/// SDE Editor - edit SDE-3000 EVH parameters over MIDI SysEx
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "sde-editor.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Port name substring identifying the device (overrides config)
    #[arg(short, long)]
    device: Option<String>,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Use an in-memory simulated unit instead of MIDI hardware
    #[arg(long)]
    simulate: bool,

    /// Slot to read right after connecting
    #[arg(long)]
    read_slot: Option<u8>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting SDE Editor...");
    info!("Configuration file: {}", args.config);

    let mut config = AppConfig::load_or_default(&args.config).await?;
    if let Some(pattern) = args.device {
        config.device.name_pattern = pattern;
        config.validate()?;
    }

    let codec = config.codec()?;
    let mut backend: Box<dyn MidiBackend> = if args.simulate {
        info!("Using simulated SDE-3000");
        Box::new(SimulatedBackend::new(codec.clone()))
    } else {
        Box::new(MidirBackend::new(config.device.client_name.clone()))
    };

    if args.list_ports {
        cli::print_ports(&*backend, &config.matcher())?;
        return Ok(());
    }

    let store = ParameterStore::new(codec);
    let mut session = DeviceSession::new(store, config.matcher());

    match cli::connect_device(&mut session, &mut *backend) {
        Ok(()) => {
            if let Some(slot) = args.read_slot {
                if let Err(e) = session.read_slot(slot) {
                    warn!("Initial slot read failed: {}", e);
                }
            }
        }
        Err(e) => {
            println!("{} {:#}", "SDE-3000 EVH not available:".red().bold(), e);
            println!("Use 'ports' to inspect MIDI ports and 'connect' to retry.");
        }
    }

    cli::run_repl(&mut session, &mut *backend).await?;

    session.disconnect();
    info!("SDE Editor shutdown complete");
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

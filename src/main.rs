//! Application entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse the command line.
//! 3. Load and validate [`PetConfig`] (defaults written on first run).
//! 4. [`Orchestrator::init`]: tokio runtime, completion engine, whisper
//!    model, default microphone.  Any failure exits with code 1.
//! 5. [`Orchestrator::run`]: workers, hotkeys, then the foreground loop on
//!    the main thread until the pet quits.
//! 6. [`Orchestrator::shutdown`]: close the bus and join the workers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use desktop_pet::config::PetConfig;
use desktop_pet::pipeline::Orchestrator;

#[derive(Debug, Parser)]
#[command(name = "desktop-pet", version, about = "An LLM-driven desktop companion")]
struct Cli {
    /// Run without a window; the pet talks through the log.
    #[arg(long)]
    headless: bool,

    /// Settings file to use instead of the platform default.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> anyhow::Result<PetConfig> {
    let mut config = match &cli.config {
        Some(path) => PetConfig::load_from(path)?,
        None => PetConfig::load()?,
    };
    if cli.headless {
        config.ui.headless = true;
    }
    Ok(config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    log::info!("desktop-pet starting up");

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            log::error!("failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    let headless = config.ui.headless;

    let mut orchestrator = match Orchestrator::init(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            log::error!("initialization failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = orchestrator.run(headless);
    orchestrator.shutdown();

    match outcome {
        Ok(()) => {
            log::info!("desktop-pet exited cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

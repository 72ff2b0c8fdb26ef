//! # World Server - Main Entry Point
//!
//! Host process for the replication core: it loads the configured maps,
//! populates them with a simulated population and ticks them on a fixed
//! interval, draining every player session's packets after each tick.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! world_server
//!
//! # Specify custom configuration
//! world_server --config realm.toml
//!
//! # Override specific settings
//! world_server --tick-interval 100 --log-level debug
//!
//! # Run a fixed number of ticks and print the JSON summary
//! world_server --ticks 1000 --json-logs
//! ```
//!
//! ## Configuration
//!
//! The server loads configuration from a TOML file (default: `config.toml`).
//! If the file doesn't exist, a default configuration will be created.
//!
//! ## Signal Handling
//!
//! The server handles graceful shutdown on:
//! - SIGINT (Ctrl+C)
//! - SIGTERM (Unix systems)

use tracing::error;

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod signals;
pub mod simulation;

use app::{apply_overrides, Application};
use cli::CliArgs;
use config::AppConfig;

/// Runs the server until shutdown and prints the run summary as JSON.
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let mut config = match AppConfig::load_from_file(&args.config_path).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration from {}: {e}", args.config_path.display());
            std::process::exit(1);
        }
    };
    apply_overrides(&mut config, &args);

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    let summary = match Application::new(config, args.max_ticks) {
        Ok(app) => match app.run().await {
            Ok(summary) => summary,
            Err(e) => {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

pub use config::{LoggingSettings, MapSettings, PopulationSettings, ServerSettings};
pub use simulation::SimulationSummary;

//! # Outpost Manager - Main Entry Point
//!
//! World manager for a multiplayer game: tracks regions, areas, servers and
//! hosting tasks, and runs the control loops that keep game-server
//! processes in line with the areas that need simulation coverage. This
//! entry point handles CLI parsing, configuration loading, and application
//! lifecycle management.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! outpost
//!
//! # Specify custom configuration
//! outpost --config production.toml
//!
//! # Override specific settings
//! outpost --backend docker --log-level debug
//!
//! # JSON logging for production
//! outpost --json-logs
//! ```
//!
//! ## Configuration
//!
//! The manager loads configuration from a TOML file (default:
//! `outpost.toml`). If the file doesn't exist, a default configuration will
//! be created.
//!
//! ## Signal Handling
//!
//! The manager handles graceful shutdown on:
//! - SIGINT (Ctrl+C)
//! - SIGTERM (Unix systems)

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Main entry point for the Outpost manager.
///
/// Handles the complete application lifecycle including:
/// 1. Command-line argument parsing
/// 2. Configuration loading and validation
/// 3. Logging system initialization
/// 4. Application creation and execution
/// 5. Error handling and cleanup
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    // Parse CLI arguments first
    let args = CliArgs::parse();

    // Load configuration to get logging settings
    let config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();

    // Setup logging before anything else
    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    // Create and run application
    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

// Re-export main types for potential library usage
pub use config::{
    AreaSeed, GroupingPolicy, JobSettings, LoggingSettings, ManagerSettings, RegionSeed,
    WorldSettings,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_default_config_is_valid_and_converts() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let launcher = config.to_launcher_settings();
        assert_eq!(launcher.start_grace, chrono::Duration::seconds(90));

        let reconciler = config.to_reconciler_settings();
        assert!(!reconciler.tls);
    }

    #[tokio::test]
    async fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outpost.toml");

        // first load creates the default file
        let created = AppConfig::load_from_file(&path).await.unwrap();
        assert!(path.exists());

        // second load reads it back identically
        let loaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(
            loaded.manager.manager_domain,
            created.manager.manager_domain
        );
        assert_eq!(loaded.world.regions.len(), created.world.regions.len());
    }

    #[test]
    fn test_cli_defaults_structure() {
        let args = CliArgs {
            config_path: PathBuf::from("outpost.toml"),
            backend: None,
            log_level: None,
            json_logs: false,
        };

        assert_eq!(args.config_path, PathBuf::from("outpost.toml"));
        assert!(args.backend.is_none());
        assert!(!args.json_logs);
    }
}

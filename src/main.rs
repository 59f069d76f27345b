//! Main entry point for the pug-ladder service
//!
//! Loads configuration, initializes logging, wires the ladder service,
//! and runs the queue expiry sweeper until a shutdown signal arrives.

use anyhow::Result;
use clap::Parser;
use pug_ladder::config::AppConfig;
use pug_ladder::service::LadderService;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

/// Pug Ladder - Team matchmaking queues with a point ladder
#[derive(Parser)]
#[command(
    name = "pug-ladder",
    version,
    about = "Team matchmaking queues, captain drafts, and a reversible point ladder"
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Sweep interval override, in seconds
    #[arg(long, value_name = "SECONDS", help = "Override the queue sweep interval")]
    sweep_interval: Option<u64>,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without starting")]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load configuration, applying CLI overrides on top
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if let Some(seconds) = args.sweep_interval {
        config.queue.sweep_interval_seconds = seconds;
    }

    config.validate()?;
    Ok(config)
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    info!("Pug Ladder v{}", pug_ladder::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Sweep interval: {}s", config.queue.sweep_interval_seconds);
    info!(
        "   Queue expiry: {}m (bounds {}m-{}m)",
        config.queue.default_expiry_minutes,
        config.queue.min_expiry_minutes,
        config.queue.max_expiry_minutes
    );

    let service = Arc::new(LadderService::new(config));
    let sweeper = service.start_sweeper();

    info!("Pug Ladder service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received");
    service.shutdown();
    let _ = sweeper.await;

    info!("Pug Ladder service stopped");
    Ok(())
}

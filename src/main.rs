//! Main entry point for the matchday service
//!
//! Loads configuration, initializes logging, wires the service and runs it
//! until SIGINT or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use matchday::config::{validate_config, AppConfig};
use matchday::service::{AppState, HealthStatus, SeedData};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// Matchday - matchmaking, result confirmation and Elo ratings for amateur clubs
#[derive(Parser)]
#[command(
    name = "matchday",
    version,
    about = "Matchmaking service for amateur sports clubs",
    long_about = "Matchday pairs clubs looking for a friendly match by sport, region, rating \
                 and schedule preferences, tracks two-sided result confirmation, and keeps \
                 Elo ratings for a regional leaderboard."
)]
struct Args {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FILE",
        help = "TOML file with clubs and members to load at startup"
    )]
    seed: Option<PathBuf>,

    #[arg(long, help = "Perform a health check and exit with status code")]
    health_check: bool,

    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    #[arg(long, value_name = "PORT", help = "Override match API port")]
    http_port: Option<u16>,

    #[arg(long, value_name = "PORT", help = "Override health and metrics port")]
    health_port: Option<u16>,

    #[arg(long, help = "Publish notifications over AMQP")]
    amqp: bool,

    #[arg(long, value_name = "N", help = "Override the matchmaking rating band")]
    rating_band: Option<i32>,

    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging; RUST_LOG takes precedence over the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Initialize the service without serving and report its health
async fn perform_health_check(config: AppConfig, seed: &SeedData) -> Result<()> {
    info!("Performing health check...");

    let mut app_state = AppState::new_seeded(config, seed).await?;
    app_state.start().await?;
    let health = app_state.health().await;
    app_state.shutdown().await?;

    let health = health?;
    println!("Health Check: {}", health.status);
    println!("  Clubs: {}", health.stats.clubs);
    println!("  Waiting entries: {}", health.stats.waiting_entries);
    println!("  Active matches: {}", health.stats.active_matches);
    println!("  Finished matches: {}", health.stats.finished_matches);

    if health.status == HealthStatus::Unhealthy {
        std::process::exit(1);
    }
    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C) signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}

fn display_startup_banner(config: &AppConfig) {
    info!("Matchday service v{}", matchday::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   API port: {}", config.service.http_port);
    info!("   Health port: {}", config.service.health_port);
    if config.amqp.enabled {
        info!(
            "   AMQP: {}:{} exchange '{}'",
            config.amqp.host, config.amqp.port, config.amqp.exchange_name
        );
    } else {
        info!("   AMQP: disabled (notifications are logged)");
    }
    info!(
        "   Matchmaking: rating band {}, region granularity {:?}",
        config.matchmaking.rating_band, config.matchmaking.region_granularity
    );
    info!(
        "   Elo: K={}, initial rating {}",
        config.rating.k_factor, config.rating.initial_rating
    );
}

/// Environment or file, then CLI overrides, then validation
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if args.debug {
        config.service.log_level = "debug".to_string();
    }
    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }
    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }
    if args.amqp {
        config.amqp.enabled = true;
    }
    if let Some(band) = args.rating_band {
        config.matchmaking.rating_band = band;
    }

    validate_config(&config)?;
    Ok(config)
}

fn load_seed(args: &Args) -> Result<SeedData> {
    match &args.seed {
        Some(path) => SeedData::from_file(path),
        None => Ok(SeedData::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let seed = load_seed(&args).context("Failed to load seed data")?;

    if args.health_check {
        return perform_health_check(config, &seed).await;
    }

    if args.dry_run {
        display_startup_banner(&config);
        info!("Configuration is valid; dry run completed");
        return Ok(());
    }

    display_startup_banner(&config);

    let mut app_state = match AppState::new_seeded(config.clone(), &seed).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("Matchday is running; press Ctrl+C to shut down");
    wait_for_shutdown_signal().await;
    info!("Shutdown signal received, beginning graceful shutdown...");

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("Graceful shutdown completed"),
        Ok(Err(e)) => warn!("Shutdown finished with errors: {}", e),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    Ok(())
}

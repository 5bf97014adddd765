//! Binary entrypoint for the `wagerhall` wagering engine.
//!
//! Commands:
//! - `serve [--config <path>]` — run the HTTP surface and round scheduler
//!   in the same process until `ctrl_c`.
//! - `create-config [--config <path>]` — write a default config file.
//! - `status [--config <path>]` — print the current/previous round and a
//!   metrics snapshot, then exit.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use wagerhall::config::Config;
use wagerhall::http::AppState;
use wagerhall::metrics::Metrics;
use wagerhall::scheduler::Scheduler;
use wagerhall::settings::SettingsCache;

#[derive(Parser)]
#[command(name = "wagerhall")]
#[command(about = "Card-based wagering and settlement engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path.
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server and the round scheduler.
    Serve,
    /// Write a default configuration file and exit.
    CreateConfig,
    /// Print a brief status summary and exit.
    Status,
}

const SETTINGS_CACHE_TTL_SECONDS: u64 = 60;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if matches!(cli.command, Commands::CreateConfig) {
        Config::create_default(&cli.config).await?;
        println!("wrote default configuration to {}", cli.config);
        return Ok(());
    }

    let config = Config::load(&cli.config).await?;
    init_logging(&config, cli.verbose);
    info!("starting wagerhall v{}", env!("CARGO_PKG_VERSION"));

    let pool = wagerhall::db::connect(&config.database.url, config.database.max_connections).await?;
    let settings = Arc::new(SettingsCache::new(
        pool.clone(),
        Duration::from_secs(SETTINGS_CACHE_TTL_SECONDS),
    ));
    let metrics = Arc::new(Metrics::new());

    match cli.command {
        Commands::Serve => {
            let scheduler = Scheduler::new(
                pool.clone(),
                settings.clone(),
                metrics.clone(),
                config.scheduler.clone(),
                config.timezone,
            );
            scheduler.recover().await?;

            let scheduler_handle = tokio::spawn(async move { scheduler.run().await });

            let state = AppState { pool, settings, metrics };
            let request_timeout = Duration::from_secs(config.server.request_timeout_seconds);
            let router = wagerhall::http::build_router(state, request_timeout);

            info!("binding HTTP surface on {}", config.server.bind_address);
            let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("received shutdown signal");
                })
                .await?;

            scheduler_handle.abort();
        }
        Commands::Status => {
            let current = wagerhall::db::rounds::find_open(&pool).await.ok();
            let latest = wagerhall::db::rounds::latest(&pool).await.ok().flatten();
            println!("open rounds: {:?}", current.map(|r| r.len()).unwrap_or(0));
            if let Some(round) = latest {
                println!(
                    "most recent round: {} lifecycle={:?} settlement={:?}",
                    round.round_id, round.lifecycle_state, round.settlement_status
                );
            } else {
                println!("no rounds recorded yet");
            }
            println!("metrics: {:?}", metrics.snapshot());
        }
        Commands::CreateConfig => unreachable!("handled before connecting to the database"),
    }

    Ok(())
}

fn init_logging(config: &Config, verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let base_level = match verbosity {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

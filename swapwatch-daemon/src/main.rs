//! swapwatch daemon
//!
//! Periodically triggers the DCA contract's swap, extracts observed
//! conversions from the execution trace and notifies Telegram
//! subscribers watching the converting accounts.

mod commands;
mod config;
mod shutdown;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use swapwatch_core::framework::DatabaseProcessor;
use swapwatch_core::ledger::near_rpc::NearRpcClient;
use swapwatch_core::notify::telegram::TelegramNotifier;
use swapwatch_core::processors::{Pipeline, Scheduler};
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// swapwatch - NEAR DCA swap poller and Telegram notifier
#[derive(Parser, Debug)]
#[command(name = "swapwatch-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./swapwatch.toml")]
    config: PathBuf,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting swapwatch-daemon v{}", env!("CARGO_PKG_VERSION"));

    let loaded_config = ConfigLoader::new(&args.config).load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let database_url = get_database_url(&loaded_config);
    tracing::info!("Opening store at {}", database_url);
    let connect_options = database_url
        .parse::<SqliteConnectOptions>()?
        .create_if_missing(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            tracing::error!("Failed to open store: {}", e);
            e
        })?;

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed successfully");
    }

    let db = DatabaseProcessor {
        pool: db_pool.clone(),
    };
    let ledger = NearRpcClient::new(loaded_config.near.clone()).map_err(|e| {
        tracing::error!("Failed to build ledger client: {}", e);
        e
    })?;
    let notifier = TelegramNotifier::with_api_base(
        loaded_config.telegram.api_base.clone(),
        loaded_config.telegram.bot_token.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // The command interface runs beside the scheduler; both observe the
    // same shutdown signal and the store tolerates the concurrent access.
    let commands_handle = tokio::spawn(commands::run_command_loop(
        db.clone(),
        loaded_config.telegram.clone(),
        shutdown_rx.clone(),
    ));

    let pipeline = Pipeline::new(ledger, notifier, db, loaded_config.pipeline.clone());
    let scheduler = Scheduler::new(pipeline, loaded_config.poll_interval);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    shutdown::shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    let _ = scheduler_handle.await;
    let _ = commands_handle.await;

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Daemon shutdown complete");

    Ok(())
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

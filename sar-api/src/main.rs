//! sar-api - SAR credential request service
//!
//! Serves the request form's two actions (school lookup and credential
//! request) and offers one-off maintenance commands for the database.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sar_api::db::{import_records, SqliteRecordStore};
use sar_api::directory::HttpDirectorySource;
use sar_api::mailer::MailjetDispatcher;
use sar_api::{build_router, AppState};
use sar_common::config::{load_config, resolve_config_path, TomlConfig};
use sar_common::db::{open_database, setup_tables, tables_initialized};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for sar-api
#[derive(Parser, Debug)]
#[command(name = "sar-api")]
#[command(about = "SAR credential request service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file (overrides config)
    #[arg(short, long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Create the credential and request log tables
    Setup,
    /// Append credential records from a JSON file
    Import {
        /// JSON array of records
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = load_config(config_path.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.database_path = Some(database);
    }

    init_tracing(&config.logging.level);

    // Log build identification immediately after tracing init
    info!(
        "Starting SAR credential service (sar-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Setup => setup(&config).await,
        Command::Import { file } => import(&config, file).await,
    }
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config: TomlConfig) -> Result<()> {
    config.validate_for_serving()?;

    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());
    let pool = open_database(&db_path)
        .await
        .context("Failed to open database")?;

    if !tables_initialized(&pool).await? {
        warn!("Database tables are missing; requests will be refused until `sar-api setup` is run");
    }

    let store = Arc::new(SqliteRecordStore::new(pool));
    let directory = Arc::new(HttpDirectorySource::new(
        config.directory.base_url.clone(),
        Duration::from_secs(config.directory.timeout_secs),
    )?);
    let mailer = Arc::new(MailjetDispatcher::new(&config.mailjet)?);

    info!("Duplicate school id policy: {:?}", config.tie_break);
    let state = AppState::new(store, directory, mailer, config.tie_break);
    let app = build_router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("sar-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("sar-api stopped");
    Ok(())
}

async fn setup(config: &TomlConfig) -> Result<()> {
    let db_path = config.database_path();
    let pool = open_database(&db_path).await?;
    setup_tables(&pool).await?;
    info!("Setup complete: {}", db_path.display());
    info!("Load credential records with `sar-api import <file.json>`");
    Ok(())
}

async fn import(config: &TomlConfig, file: PathBuf) -> Result<()> {
    let pool = open_database(&config.database_path()).await?;
    if !tables_initialized(&pool).await? {
        anyhow::bail!("Database is not set up. Run `sar-api setup` first.");
    }

    let store = SqliteRecordStore::new(pool);
    let count = import_records(&store, &file)
        .await
        .with_context(|| format!("Failed to import {}", file.display()))?;
    info!("Imported {} records", count);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

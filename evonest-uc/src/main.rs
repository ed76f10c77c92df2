//! evonest-uc (Unit Canonicalization) - trait measurement unit conversion
//!
//! Serves the preview/apply HTTP API, or runs a single preview or apply batch
//! from the command line and prints the result as JSON.

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use evonest_common::config::{resolve_root_folder, BatchConfig, LoggingConfig, TomlConfig};
use evonest_common::db::settings::{
    get_setting, BATCH_TIME_BUDGET_MS, MAX_IN_FLIGHT_UPDATES, SCAN_PAGE_SIZE,
};
use evonest_common::db::{init_database, TraitId};
use evonest_uc::batch::{run_apply, run_preview, DEFAULT_MAX_IN_FLIGHT_UPDATES};
use evonest_uc::store::{TraitQuery, DEFAULT_PAGE_SIZE};
use evonest_uc::{build_router, AppState, BatchLimits, SqliteTraitStore};
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for evonest-uc
#[derive(Parser, Debug)]
#[command(name = "evonest-uc")]
#[command(about = "Trait unit canonicalization service for Evonest")]
#[command(version)]
struct Args {
    /// Bootstrap TOML file
    #[arg(short, long, global = true, env = "EVONEST_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file (overrides root folder and TOML)
    #[arg(short, long, global = true, env = "EVONEST_DATABASE")]
    database: Option<PathBuf>,

    /// Root folder holding the database (env: EVONEST_ROOT_FOLDER)
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Port to listen on (overrides TOML)
        #[arg(short, long, env = "EVONEST_UC_PORT")]
        port: Option<u16>,
    },
    /// Show what a conversion would change, without writing
    Preview(BatchArgs),
    /// Convert non-canonical units in place
    Apply(BatchArgs),
}

#[derive(ClapArgs, Debug)]
struct BatchArgs {
    /// Restrict the batch to these trait ids (repeatable)
    #[arg(long = "id")]
    ids: Vec<String>,

    /// Stop after scanning this many traits
    #[arg(long)]
    max_records: Option<u64>,

    /// Stop scanning after this many milliseconds
    #[arg(long)]
    time_budget_ms: Option<u64>,
}

impl BatchArgs {
    fn query(&self) -> TraitQuery {
        TraitQuery::by_ids(self.ids.iter().map(|id| TraitId::new(id.as_str())))
    }

    fn limits(&self, defaults: BatchLimits) -> BatchLimits {
        let mut limits = defaults;
        if let Some(max_records) = self.max_records {
            limits.max_records = Some(max_records);
        }
        if let Some(ms) = self.time_budget_ms {
            limits.time_budget = Some(Duration::from_millis(ms));
        }
        limits
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    init_tracing(&config.logging)?;

    info!(
        "Starting Evonest Unit Canonicalization (evonest-uc) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let db_path = match &args.database {
        Some(path) => path.clone(),
        None => {
            let root_folder =
                resolve_root_folder(args.root_folder.as_deref(), "EVONEST_ROOT_FOLDER", &config);
            config.database_path(&root_folder)
        }
    };
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let shutdown = CancellationToken::new();
    let (limits, page_size) = load_batch_settings(&pool, &config.batch).await?;
    let limits = limits.with_cancel(shutdown.clone());
    let store = SqliteTraitStore::new(pool).with_page_size(page_size);

    match args.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            serve(store, limits, port.unwrap_or(config.port), shutdown).await
        }
        Command::Preview(batch) => {
            spawn_cancel_on_signal(shutdown);
            let result = run_preview(&store, &batch.query(), &batch.limits(limits)).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Apply(batch) => {
            spawn_cancel_on_signal(shutdown);
            let result = run_apply(&store, &batch.query(), &batch.limits(limits)).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}

/// Initialize tracing; `RUST_LOG` overrides the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "evonest_uc={level},evonest_common={level},tower_http=info",
            level = logging.level
        ))
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

/// Batch defaults: TOML value, else `settings` table, else built-in
async fn load_batch_settings(pool: &SqlitePool, toml: &BatchConfig) -> Result<(BatchLimits, u32)> {
    let max_in_flight = match toml.max_in_flight_updates {
        Some(value) => value,
        None => get_setting::<usize>(pool, MAX_IN_FLIGHT_UPDATES)
            .await?
            .unwrap_or(DEFAULT_MAX_IN_FLIGHT_UPDATES),
    };
    let page_size = match toml.scan_page_size {
        Some(value) => value,
        None => get_setting::<u32>(pool, SCAN_PAGE_SIZE)
            .await?
            .unwrap_or(DEFAULT_PAGE_SIZE),
    };
    let budget_ms = match toml.time_budget_ms {
        Some(value) => value,
        None => get_setting::<u64>(pool, BATCH_TIME_BUDGET_MS)
            .await?
            .unwrap_or(0),
    };

    info!(
        max_in_flight,
        page_size,
        budget_ms,
        "Batch settings loaded"
    );

    let limits = BatchLimits {
        max_in_flight_updates: max_in_flight.max(1),
        time_budget: (budget_ms > 0).then(|| Duration::from_millis(budget_ms)),
        ..Default::default()
    };
    Ok((limits, page_size.max(1)))
}

async fn serve(
    store: SqliteTraitStore,
    limits: BatchLimits,
    port: u16,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = build_router(AppState::new(store, limits));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("evonest-uc listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Running batches stop scanning and drain their in-flight updates
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn spawn_cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        token.cancel();
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

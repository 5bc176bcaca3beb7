//! haqei-mapper - text to I Ching line state mapping service
//!
//! **Startup:**
//! 1. Load TOML config (`--config`, `HAQEI_CONFIG`, user or system file)
//! 2. Initialize tracing from `[logging]` (overridable by `RUST_LOG`)
//! 3. Resolve the seed and reference data; either failing is fatal
//! 4. Open the cold store in `<root_folder>/haqei.db`
//! 5. Serve HTTP until Ctrl+C / SIGTERM

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use haqei_common::config::{load_or_default, RootFolderInitializer, RootFolderResolver};
use haqei_common::db::init_database;
use haqei_common::time::{Clock, SystemClock};
use haqei_mapper::cache::{InMemoryKeyValueStore, SqliteStructuredStore};
use haqei_mapper::config::MapperConfig;
use haqei_mapper::reference::ReferenceTable;
use haqei_mapper::{build_router, AppState, MappingService};

const MODULE_NAME: &str = "haqei-mapper";

/// Command-line arguments for haqei-mapper
#[derive(Parser, Debug)]
#[command(name = "haqei-mapper")]
#[command(about = "Deterministic text to I Ching line state mapping service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides [server] port)
    #[arg(short, long, env = "HAQEI_PORT")]
    port: Option<u16>,

    /// Root folder holding haqei.db
    #[arg(short, long, env = "HAQEI_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "HAQEI_CONFIG")]
    config: Option<PathBuf>,

    /// Random seed (overrides [mapper] seed)
    #[arg(long, env = "HAQEI_SEED")]
    seed: Option<String>,

    /// Reference data JSON (overrides [mapper] reference_data)
    #[arg(long, env = "HAQEI_REFERENCE_DATA")]
    reference_data: Option<PathBuf>,

    /// Write the effective reference table as JSON to this path and exit
    #[arg(long)]
    export_reference: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, config_path) =
        load_or_default::<MapperConfig>(args.config.as_deref(), MODULE_NAME)
            .context("Failed to load configuration")?;

    init_tracing(&config).context("Failed to initialize logging")?;

    info!(
        "Starting haqei-mapper v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => warn!("No configuration file found, using compiled defaults"),
    }

    if let Some(path) = args.reference_data {
        config.mapper.reference_data = Some(path);
    }
    config.validate().context("Invalid configuration")?;

    if let Some(path) = &args.export_reference {
        let table = ReferenceTable::load(config.mapper.reference_data.as_deref(), &config.scoring)
            .context("Failed to load reference data")?;
        std::fs::write(path, table.to_json_pretty()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {} line states to {}", table.len(), path.display());
        return Ok(());
    }

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder)
        .with_toml_root(config.common.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to open cold store")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut builder = MappingService::builder(config.clone()).clock(clock.clone());
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    let service = builder
        .warm_store(Arc::new(InMemoryKeyValueStore::new(clock.clone())))
        .cold_store(Arc::new(SqliteStructuredStore::new(pool, clock)))
        .build()
        .context("Failed to build mapping service")?;

    let app = build_router(AppState::new(service));

    let port = args.port.unwrap_or(config.common.server.port);
    let host: std::net::IpAddr = config
        .common
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid [server] host {}", config.common.server.host))?;
    let addr = SocketAddr::new(host, port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("haqei-mapper listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Registry with an `EnvFilter` and a stdout layer, plus a file layer when
/// `[logging] file` is set
fn init_tracing(config: &MapperConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.common.logging.level)));

    let file_layer = match &config.common.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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

//! dlens-ds - Dataset Service
//!
//! **Module Identity:**
//! - Name: dlens-ds (Dataset Service)
//! - Default port: 5740
//!
//! Persists bounding-box annotations, proxies stored images and exports
//! labeled images as YOLO datasets into the object store.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dlens_common::config::{
    default_config_path, load_toml_config, ObjectStoreKind, RootFolderInitializer,
    RootFolderResolver, TomlConfig,
};
use dlens_ds::services::object_store::{FsObjectStore, HttpObjectStore, ObjectStore};
use dlens_ds::AppState;

const MODULE_NAME: &str = "dlens-ds";

/// Command-line arguments for dlens-ds
#[derive(Parser, Debug)]
#[command(name = "dlens-ds")]
#[command(about = "Annotation and YOLO dataset export service")]
#[command(version)]
struct Args {
    /// Root folder holding dlens.db and the filesystem object store
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file (default: <config dir>/dlens/dlens-ds.toml)
    #[arg(short, long, env = "DLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "DLENS_DS_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing starts so its log level can seed the filter
    let config_path = args
        .config
        .clone()
        .or_else(|| default_config_path(MODULE_NAME));
    let loaded = match &config_path {
        Some(path) => load_toml_config(path).context("Failed to load TOML config")?,
        None => None,
    };
    let config_missing = loaded.is_none();
    let config = loaded.unwrap_or_default();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting dlens-ds (Dataset Service) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if config_missing {
        warn!(
            "No config file found{}, using defaults",
            config_path
                .as_ref()
                .map(|p| format!(" at {}", p.display()))
                .unwrap_or_default()
        );
    }

    // Step 1: Resolve root folder (CLI → env → TOML → OS default)
    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder.clone())
        .with_toml_root(config.root_folder.clone())
        .resolve();

    // Step 2: Create root folder directory if missing
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    // Step 3: Open or create database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = dlens_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    // Step 4: Object store
    let fetch_timeout = Duration::from_secs(config.fetch_timeout_secs);
    let object_store = build_object_store(&config, &initializer, fetch_timeout)?;

    let state = AppState::new(db_pool, object_store, fetch_timeout)
        .context("Failed to initialize image source")?;
    let app = dlens_ds::build_router(state);

    let bind_address = args.bind.unwrap_or(config.bind_address.clone());
    let port = args.port.unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_address, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn build_object_store(
    config: &TomlConfig,
    initializer: &RootFolderInitializer,
    timeout: Duration,
) -> Result<Arc<dyn ObjectStore>> {
    let settings = &config.object_store;
    match settings.kind {
        ObjectStoreKind::Fs => {
            let root = settings
                .root
                .clone()
                .unwrap_or_else(|| initializer.objects_path());
            std::fs::create_dir_all(&root)
                .with_context(|| format!("Failed to create object store at {}", root.display()))?;
            info!("Object store: filesystem at {}", root.display());
            Ok(Arc::new(FsObjectStore::new(root)))
        }
        ObjectStoreKind::Http => {
            let endpoint = settings
                .endpoint
                .clone()
                .context("object_store.endpoint is required for kind = \"http\"")?;
            let bucket = settings
                .bucket
                .clone()
                .context("object_store.bucket is required for kind = \"http\"")?;
            info!("Object store: {} bucket {}", endpoint, bucket);
            let store = HttpObjectStore::new(endpoint, bucket, settings.token.clone(), timeout)
                .context("Failed to create HTTP object store")?;
            Ok(Arc::new(store))
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

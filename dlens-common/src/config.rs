//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. A missing file is not an
//! error: compiled defaults are used instead and the caller logs a warning.
//!
//! Root folder resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `DLENS_ROOT_FOLDER` environment variable
//! 3. `root_folder` in the TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "DLENS_ROOT_FOLDER";

/// SQLite database file name inside the root folder
pub const DATABASE_FILE: &str = "dlens.db";

/// Directory inside the root folder used by the filesystem object store
pub const OBJECTS_DIR: &str = "objects";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and local object store
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on each upstream image fetch during export
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub object_store: ObjectStoreConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: default_bind_address(),
            port: default_port(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            logging: LoggingConfig::default(),
            object_store: ObjectStoreConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error);
    /// `RUST_LOG` still takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Object store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStoreKind {
    /// Directory tree on local disk
    #[default]
    Fs,
    /// S3-compatible HTTP endpoint, path-style addressing
    Http,
}

/// Object store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    #[serde(default)]
    pub kind: ObjectStoreKind,

    /// Directory for the `fs` backend (defaults to `<root>/objects`)
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Base URL for the `http` backend
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bucket name for the `http` backend
    #[serde(default)]
    pub bucket: Option<String>,

    /// Bearer token sent to the `http` backend
    #[serde(default)]
    pub token: Option<String>,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5740
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Default TOML config location: `<config dir>/dlens/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dlens").join(format!("{}.toml", module_name)))
}

/// Load TOML configuration
///
/// Returns `Ok(None)` when the file does not exist so the caller can fall
/// back to [`TomlConfig::default`]. A file that exists but fails to parse is
/// a configuration error.
pub fn load_toml_config(path: &Path) -> Result<Option<TomlConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    Ok(Some(config))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("dlens"))
        .unwrap_or_else(|| PathBuf::from("./dlens_data"))
}

/// Resolves the root folder from CLI, environment, TOML and defaults
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml_root(mut self, path: Option<PathBuf>) -> Self {
        self.toml_root = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(module = %self.module_name, "Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!(module = %self.module_name, "Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            debug!(module = %self.module_name, "Root folder from TOML config");
            return path.clone();
        }

        default_root_folder()
    }
}

/// Creates the root folder layout and hands out well-known paths in it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn objects_path(&self) -> PathBuf {
        self.root_folder.join(OBJECTS_DIR)
    }
}

//! Bootstrap configuration loading and root folder resolution
//!
//! Bootstrap settings come from a TOML file and are read once at startup.
//! Root folder resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`HAQEI_ROOT_FOLDER`)
//! 3. TOML config file (`root_folder`)
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "HAQEI_ROOT_FOLDER";

/// Environment variable naming an explicit TOML config file
pub const CONFIG_FILE_ENV: &str = "HAQEI_CONFIG";

/// File name of the durable cache database inside the root folder
pub const DATABASE_FILE_NAME: &str = "haqei.db";

/// Bootstrap configuration shared by every HAQEI module
///
/// Module-specific sections are flattened next to these fields by each module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the durable cache database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error or an EnvFilter directive)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

/// Resolves the root folder from CLI, environment, TOML and compiled defaults
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

    /// Command-line override (highest priority)
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Value read from an already-loaded TOML file
    pub fn with_toml_root(mut self, path: Option<PathBuf>) -> Self {
        self.toml_root = path;
        self
    }

    /// Resolve the root folder; never fails, falls back to the compiled default
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

        get_default_root_folder()
    }
}

/// Creates the root folder on first run and locates files inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    /// Path of the durable cache database
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}

/// Locate the TOML config file for a module
///
/// Checks `HAQEI_CONFIG`, then `~/.config/haqei/<module>.toml`, then
/// `/etc/haqei/<module>.toml` (Linux only).
pub fn find_config_file(module_name: &str) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        warn!("{} points to missing file: {}", CONFIG_FILE_ENV, path.display());
    }

    let file_name = format!("{}.toml", module_name);
    if let Some(user) = dirs::config_dir().map(|d| d.join("haqei").join(&file_name)) {
        if user.exists() {
            return Some(user);
        }
    }

    if cfg!(target_os = "linux") {
        let system = PathBuf::from("/etc/haqei").join(&file_name);
        if system.exists() {
            return Some(system);
        }
    }

    None
}

/// Parse a TOML file into any bootstrap structure
pub fn load_toml_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML {} failed: {}", path.display(), e)))?;
    parse_toml_config(&content)
}

/// Parse TOML text into any bootstrap structure
pub fn parse_toml_config<T: DeserializeOwned>(content: &str) -> Result<T> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load the module config if a file exists, otherwise fall back to defaults
///
/// A missing file is not an error: a warning is logged and defaults are used.
/// A file that exists but does not parse is a configuration error.
pub fn load_or_default<T: DeserializeOwned + Default>(
    explicit: Option<&Path>,
    module_name: &str,
) -> Result<(T, Option<PathBuf>)> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => find_config_file(module_name),
    };

    match path {
        Some(p) => {
            let config = load_toml_config(&p)?;
            info!("Loaded TOML configuration from {}", p.display());
            Ok((config, Some(p)))
        }
        None => {
            warn!("No config file found for {}, using compiled defaults", module_name);
            Ok((T::default(), None))
        }
    }
}

/// Get OS-dependent default root folder path
pub fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/haqei (or /var/lib/haqei for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("haqei"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/haqei"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("haqei"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/haqei"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("haqei"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\haqei"))
    } else {
        PathBuf::from("./haqei_data")
    }
}

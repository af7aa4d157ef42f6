//! Configuration loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! The first two tiers are handled by the binary's argument parser; this
//! module owns the TOML file and the compiled defaults. A missing config
//! file is not an error: the service logs a warning and starts on defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "YAMDB_CONFIG";

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// SQLite database file; defaults to the platform data directory
    pub database_path: Option<PathBuf>,

    /// Listen address
    pub bind: String,

    /// HTTP server port
    pub port: u16,

    /// Page size for page-number pagination
    pub page_size: u32,

    pub auth: AuthConfig,

    pub mail: MailConfig,

    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            page_size: DEFAULT_PAGE_SIZE,
            auth: AuthConfig::default(),
            mail: MailConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Configured database path or the platform default
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    /// Configured outbox directory or `<data dir>/sent_emails`
    pub fn outbox_dir(&self) -> PathBuf {
        self.mail
            .outbox_dir
            .clone()
            .unwrap_or_else(|| default_data_dir().join("sent_emails"))
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be at least 1".to_string()));
        }
        if self.auth.access_token_lifetime_secs <= 0 {
            return Err(Error::Config(
                "auth.access_token_lifetime_secs must be positive".to_string(),
            ));
        }
        if self.mail.from_address.trim().is_empty() {
            return Err(Error::Config("mail.from_address must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Access token settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret; generated and stored in the database when unset
    pub jwt_secret: Option<String>,

    pub access_token_lifetime_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            access_token_lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
        }
    }
}

/// Where confirmation mail goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailBackend {
    /// Write messages to the log
    #[default]
    Log,
    /// One file per message in `outbox_dir`
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub backend: MailBackend,
    pub from_address: String,
    pub outbox_dir: Option<PathBuf>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            backend: MailBackend::Log,
            from_address: "noreply@yamdb.local".to_string(),
            outbox_dir: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// OS-dependent data directory (`~/.local/share/yamdb` on Linux)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("yamdb"))
        .unwrap_or_else(|| PathBuf::from("./yamdb_data"))
}

pub fn default_database_path() -> PathBuf {
    default_data_dir().join("yamdb.db")
}

/// `~/.config/yamdb/config.toml` (platform equivalent elsewhere)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("yamdb").join("config.toml"))
}

/// Pick the config file: CLI argument, then `YAMDB_CONFIG`, then the default path
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path()
}

/// Load the TOML config
///
/// A missing file yields defaults with a warning; an unreadable or malformed
/// file is an error.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let path = match path {
        Some(path) => path,
        None => {
            warn!("No config file location available, using defaults");
            return Ok(TomlConfig::default());
        }
    };

    if !path.exists() {
        warn!("Config file not found: {} (using defaults)", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config.validate()?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Write the config as TOML, creating parent directories
///
/// Writes to a temporary sibling and renames it into place.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

//! Configuration loader
//!
//! Loads [`AppConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `RELAYQ_STORAGE_BACKEND` is unset, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `RELAYQ_STORAGE_BACKEND` (required): `file`, `sqlite` or `memory`
//! - `RELAYQ_STORAGE_PATH`: Directory (file) or database path (sqlite)
//! - `RELAYQ_STORAGE_KEY`: Key the queue blob is stored under
//! - `RELAYQ_MAX_RETRY_COUNT`: Failed attempts before an action is dropped
//! - `RELAYQ_EXECUTOR_TIMEOUT_MS`: Executor time limit; `0` or `none` disables
//! - `RELAYQ_JOIN_TIMEOUT_MS`: How long `stop()` waits for the processor
//! - `RELAYQ_BACKOFF_BASE_MS` / `RELAYQ_BACKOFF_MAX_MS`: Enable timed retries
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.{json,toml}` and `./relayq.{json,toml}`
//! 2. The same names one and two directories up
//! 3. The same names relative to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use relayq_domain::{
    AppConfig, BackoffConfig, QueueConfig, QueueError, Result, StorageBackend, StorageConfig,
};

const CONFIG_FILE_NAMES: [&str; 4] = ["config.json", "config.toml", "relayq.json", "relayq.toml"];

/// Load configuration with automatic fallback strategy
///
/// Files are only consulted when `RELAYQ_STORAGE_BACKEND` is unset. Once the
/// backend variable is present the environment is authoritative and any
/// malformed `RELAYQ_*` value is returned as an error.
///
/// # Errors
/// Returns `QueueError::Config` if the environment configuration is invalid,
/// or if neither source yields a valid configuration.
pub fn load() -> Result<AppConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) if env_opt("RELAYQ_STORAGE_BACKEND").is_some() => {
            tracing::warn!(error = %e, "Invalid configuration in environment variables");
            Err(e)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `RELAYQ_STORAGE_BACKEND` is required; everything else falls back to
/// the defaults.
///
/// # Errors
/// Returns `QueueError::Config` if the backend is missing or any value fails
/// to parse or validate.
pub fn load_from_env() -> Result<AppConfig> {
    let backend = StorageBackend::from_str(&env_var("RELAYQ_STORAGE_BACKEND")?)
        .map_err(QueueError::Config)?;

    let mut storage = StorageConfig { backend, ..StorageConfig::default() };
    if let Some(path) = env_opt("RELAYQ_STORAGE_PATH") {
        storage.path = PathBuf::from(path);
    }

    let mut queue = QueueConfig::default();
    if let Some(key) = env_opt("RELAYQ_STORAGE_KEY") {
        queue.storage_key = key;
    }
    if let Some(count) = env_parse::<u32>("RELAYQ_MAX_RETRY_COUNT")? {
        queue.max_retry_count = count;
    }
    if let Some(raw) = env_opt("RELAYQ_EXECUTOR_TIMEOUT_MS") {
        queue.executor_timeout_ms = parse_timeout(&raw)?;
    }
    if let Some(join) = env_parse::<u64>("RELAYQ_JOIN_TIMEOUT_MS")? {
        queue.join_timeout_ms = join;
    }

    let base = env_parse::<u64>("RELAYQ_BACKOFF_BASE_MS")?;
    let max = env_parse::<u64>("RELAYQ_BACKOFF_MAX_MS")?;
    if base.is_some() || max.is_some() {
        let defaults = BackoffConfig::default();
        queue.retry_backoff = Some(BackoffConfig {
            base_delay_ms: base.unwrap_or(defaults.base_delay_ms),
            max_delay_ms: max.unwrap_or(defaults.max_delay_ms),
        });
    }

    let config = AppConfig { queue, storage };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `QueueError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or the result fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(QueueError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            QueueError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| QueueError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration; format is picked by extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| QueueError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| QueueError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(QueueError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut bases = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        bases.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            bases.extend([exe_dir.to_path_buf(), exe_dir.join(".."), exe_dir.join("../..")]);
        }
    }

    bases
        .iter()
        .flat_map(|base| CONFIG_FILE_NAMES.iter().map(move |name| base.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| QueueError::Config(format!("Missing required environment variable: {key}")))
}

/// Optional variable; blank values count as unset.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|value| value.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| raw.parse::<T>().map_err(|e| QueueError::Config(format!("Invalid {key}: {e}"))))
        .transpose()
}

/// `0`, `none` and `off` disable the executor timeout.
fn parse_timeout(raw: &str) -> Result<Option<u64>> {
    match raw.to_ascii_lowercase().as_str() {
        "0" | "none" | "off" => Ok(None),
        other => other.parse::<u64>().map(Some).map_err(|e| {
            QueueError::Config(format!("Invalid RELAYQ_EXECUTOR_TIMEOUT_MS: {e}"))
        }),
    }
}

//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required credentials are missing, falls back to a config file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required:
//! - `FLUFFER_DISCORD_TOKEN`: Bot token
//! - `FLUFFER_DISCORD_GUILD_ID`: Guild (server) the bot operates in
//! - `FLUFFER_GOOGLE_CLIENT_ID`, `FLUFFER_GOOGLE_CLIENT_SECRET`: OAuth client
//! - `FLUFFER_GOOGLE_REFRESH_TOKEN`: Long-lived refresh token
//!
//! Optional (defaults from [`Config::default`]):
//! - `FLUFFER_GOOGLE_CALENDAR_ID`
//! - `FLUFFER_DISCORD_DEFAULT_CHANNEL`, `FLUFFER_COMMAND_PREFIX`
//! - `FLUFFER_REFRESH_INTERVAL`: Seconds between ticks
//! - `FLUFFER_FUTURE_LIMIT_DAYS`, `FLUFFER_MATERIALITY_HOURS`,
//!   `FLUFFER_SWEEP_CONCURRENCY`
//! - `FLUFFER_DB_PATH`, `FLUFFER_DB_POOL_SIZE`
//! - `FLUFFER_TIMEZONE`, `FLUFFER_SYNTHETIC_EMAIL_DOMAIN`
//! - `FLUFFER_LOG_JSON`, `FLUFFER_LOG_FILE`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.{json,toml}` then `./fluffer.{json,toml}` (current directory)
//! 2. `../config.{json,toml}` and `../../config.{json,toml}`
//! 3. The same names relative to the executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use fluffer_domain::{Config, FlufferError, Result};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `FlufferError::Config` if neither source yields a configuration
/// or the file is malformed.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// The credential variables must be present; everything else falls back to
/// the defaults.
///
/// # Errors
/// Returns `FlufferError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.discord.token = env_var("FLUFFER_DISCORD_TOKEN")?;
    config.discord.guild_id = env_var("FLUFFER_DISCORD_GUILD_ID")?;
    config.calendar.client_id = env_var("FLUFFER_GOOGLE_CLIENT_ID")?;
    config.calendar.client_secret = env_var("FLUFFER_GOOGLE_CLIENT_SECRET")?;
    config.calendar.refresh_token = env_var("FLUFFER_GOOGLE_REFRESH_TOKEN")?;

    if let Some(calendar_id) = env_opt("FLUFFER_GOOGLE_CALENDAR_ID") {
        config.calendar.calendar_id = calendar_id;
    }
    if let Some(channel) = env_opt("FLUFFER_DISCORD_DEFAULT_CHANNEL") {
        config.discord.default_channel = channel;
    }
    if let Some(prefix) = env_opt("FLUFFER_COMMAND_PREFIX") {
        config.discord.command_prefix = prefix;
    }
    config.discord.gateway = env_bool("FLUFFER_DISCORD_GATEWAY", true);

    if let Some(secs) = env_parse("FLUFFER_REFRESH_INTERVAL", "refresh interval")? {
        config.sync.refresh_interval_secs = secs;
    }
    if let Some(days) = env_parse("FLUFFER_FUTURE_LIMIT_DAYS", "future limit")? {
        config.sync.future_limit_days = days;
    }
    if let Some(hours) = env_parse("FLUFFER_MATERIALITY_HOURS", "materiality threshold")? {
        config.sync.materiality_threshold_hours = hours;
    }
    if let Some(limit) = env_parse("FLUFFER_SWEEP_CONCURRENCY", "sweep concurrency")? {
        config.sync.sweep_concurrency = limit;
    }

    if let Some(path) = env_opt("FLUFFER_DB_PATH") {
        config.database.path = path;
    }
    if let Some(size) = env_parse("FLUFFER_DB_POOL_SIZE", "pool size")? {
        config.database.pool_size = size;
    }

    if let Some(timezone) = env_opt("FLUFFER_TIMEZONE") {
        config.display.timezone = timezone;
    }
    if let Some(domain) = env_opt("FLUFFER_SYNTHETIC_EMAIL_DOMAIN") {
        config.display.synthetic_email_domain = domain;
    }

    config.logging.json = env_bool("FLUFFER_LOG_JSON", false);
    config.logging.file = env_opt("FLUFFER_LOG_FILE");

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `FlufferError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(FlufferError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            FlufferError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| FlufferError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| FlufferError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| FlufferError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(FlufferError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("fluffer.json"),
        dir.join("fluffer.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

/// Get required environment variable
///
/// # Errors
/// Returns `FlufferError::Config` if the variable is not set or blank.
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        FlufferError::Config(format!("Missing required environment variable: {}", key))
    })
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str, what: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| FlufferError::Config(format!("Invalid {}: {}", what, e)))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

//! Application configuration structures
//!
//! Every section carries serde defaults so a config file only needs the
//! credentials; the loader in the infra crate fills the rest.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_COMMAND_PREFIX, DEFAULT_FUTURE_LIMIT_DAYS, DEFAULT_MATERIALITY_THRESHOLD_HOURS,
    DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_SWEEP_CONCURRENCY, DEFAULT_SYNTHETIC_EMAIL_DOMAIN,
};
use crate::{FlufferError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject configurations the process cannot run with.
    ///
    /// # Errors
    /// Returns `FlufferError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.discord.token.trim().is_empty() {
            return Err(FlufferError::Config("discord.token must not be empty".into()));
        }
        if self.discord.guild_id.trim().is_empty() {
            return Err(FlufferError::Config("discord.guild_id must not be empty".into()));
        }
        if self.calendar.calendar_id.trim().is_empty() {
            return Err(FlufferError::Config("calendar.calendar_id must not be empty".into()));
        }
        if self.calendar.refresh_token.trim().is_empty() {
            return Err(FlufferError::Config("calendar.refresh_token must not be empty".into()));
        }
        if self.sync.refresh_interval_secs == 0 {
            return Err(FlufferError::Config("sync.refresh_interval_secs must be > 0".into()));
        }
        if self.sync.sweep_concurrency == 0 {
            return Err(FlufferError::Config("sync.sweep_concurrency must be > 0".into()));
        }
        if self.database.pool_size == 0 {
            return Err(FlufferError::Config("database.pool_size must be > 0".into()));
        }
        self.display.tz()?;
        Ok(())
    }
}

/// Discord connection and routing settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiscordConfig {
    pub token: String,
    pub guild_id: String,
    /// Channel used when a role has no routing entry.
    pub default_channel: String,
    pub command_prefix: String,
    pub api_base_url: String,
    /// Listen on the gateway for messages, reactions and subscriptions.
    pub gateway: bool,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            guild_id: String::new(),
            default_channel: "general".to_string(),
            command_prefix: DEFAULT_COMMAND_PREFIX.to_string(),
            api_base_url: "https://discord.com/api/v10".to_string(),
            gateway: true,
        }
    }
}

/// Google Calendar credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CalendarConfig {
    pub calendar_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub api_base_url: String,
    pub token_url: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: "primary".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            api_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
        }
    }
}

/// Reconciliation timing knobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    pub refresh_interval_secs: u64,
    /// Events further out than this stay hidden until someone is invited.
    pub future_limit_days: i64,
    pub materiality_threshold_hours: i64,
    pub sweep_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            future_limit_days: DEFAULT_FUTURE_LIMIT_DAYS,
            materiality_threshold_hours: DEFAULT_MATERIALITY_THRESHOLD_HOURS,
            sweep_concurrency: DEFAULT_SWEEP_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "fluffer.db".to_string(), pool_size: 4 }
    }
}

/// How events are rendered for humans
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DisplayConfig {
    /// IANA timezone name, e.g. `America/Los_Angeles`.
    pub timezone: String,
    pub synthetic_email_domain: String,
}

impl DisplayConfig {
    /// Parse the configured timezone.
    ///
    /// # Errors
    /// Returns `FlufferError::Config` for names chrono-tz does not know.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| FlufferError::Config(format!("Unknown timezone {}: {}", self.timezone, e)))
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            synthetic_email_domain: DEFAULT_SYNTHETIC_EMAIL_DOMAIN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of the human formatter.
    pub json: bool,
    /// Optional log file; logs go to stdout only when unset.
    pub file: Option<String>,
}

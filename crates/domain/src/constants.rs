//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Response reactions
pub const YES_EMOJI: &str = "\u{2705}";
pub const NO_EMOJI: &str = "\u{274C}";
pub const NO_RESPONSE_EMOJI: &str = "\u{1F63E}";
pub const ZOOM_EMOJI: &str = "\u{1F468}\u{200D}\u{1F4BB}";

/// Reactions attached to every announcement, in display order.
pub const RESPONSE_REACTIONS: [&str; 3] = [YES_EMOJI, NO_EMOJI, ZOOM_EMOJI];

// Reconciliation defaults
pub const DEFAULT_MATERIALITY_THRESHOLD_HOURS: i64 = 4;
pub const DEFAULT_FUTURE_LIMIT_DAYS: i64 = 14;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_SWEEP_CONCURRENCY: usize = 4;
pub const DEFAULT_SCHEDULED_EVENT_DURATION_MINS: i64 = 60;

// Display
pub const DEFAULT_TITLE: &str = "Untitled event";
pub const DEFAULT_SYNTHETIC_EMAIL_DOMAIN: &str = "discord.invalid";
pub const DEFAULT_COMMAND_PREFIX: &str = "!";
pub const FOOTER_ICON_URL: &str =
    "https://www.gstatic.com/images/branding/product/2x/calendar_48dp.png";
pub const FROM_NOW_PAST: &str = "past";
pub const FROM_NOW_STARTED: &str = "started";

// Persistence keys
pub const RSVP_KEY_PREFIX: &str = "rsvp/";
pub const EVENT_CACHE_KEY_PREFIX: &str = "event/";
pub const SETTINGS_KEY: &str = "settings";
pub const CHECKPOINT_KEY: &str = "calendar/checkpoint";

//! Environment based configuration.
//!
//! Everything is read once at startup; the resulting [`Config`] is immutable
//! and shared read-only between the alert scheduler and the command handler.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{trace, warn};

use crate::monitors::evaluator::DEFAULT_COOLDOWN;
use crate::monitors::thresholds::ThresholdPolicy;
use crate::util::{parse_or, string_or};

const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
const TELEGRAM_API_URL: &str = "TELEGRAM_API_URL";
const ALLOWED_USERS: &str = "ALLOWED_USERS";
const ALERT_ENABLED: &str = "ALERT_ENABLED";
const ALERT_INTERVAL: &str = "ALERT_INTERVAL";
const ALERT_COOLDOWN: &str = "ALERT_COOLDOWN";
const ALERT_CPU_TEMP: &str = "ALERT_CPU_TEMP";
const ALERT_CPU_USAGE: &str = "ALERT_CPU_USAGE";
const ALERT_MEMORY: &str = "ALERT_MEMORY";
const ALERT_DISK: &str = "ALERT_DISK";
const MONITOR_DISK_PATH: &str = "MONITOR_DISK_PATH";
const WOL_MAC_ADDRESS: &str = "WOL_MAC_ADDRESS";
const WOL_BROADCAST: &str = "WOL_BROADCAST";
const WOL_HOST: &str = "WOL_HOST";

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";
const DEFAULT_BROADCAST: &str = "255.255.255.255:9";
const DEFAULT_DISK_PATH: &str = "/";
const DEFAULT_INTERVAL_SECS: u64 = 30;

/// Longest accepted check interval.
pub const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required variable is not set
    Missing(&'static str),

    /// A variable is set but does not parse
    Invalid { key: &'static str, value: String },

    /// A duration that must be positive is zero
    NotPositive(&'static str),

    /// A duration is longer than the allowed maximum
    TooLarge { key: &'static str, max: Duration },

    /// A threshold is negative or not finite
    InvalidThreshold { key: &'static str, value: f64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} environment variable is required", key),
            ConfigError::Invalid { key, value } => {
                write!(f, "invalid value for {}: {:?}", key, value)
            }
            ConfigError::NotPositive(key) => write!(f, "{} must be greater than zero", key),
            ConfigError::TooLarge { key, max } => {
                write!(f, "{} must not exceed {} seconds", key, max.as_secs())
            }
            ConfigError::InvalidThreshold { key, value } => {
                write!(f, "{} must be a non-negative number, got {}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bot_token: String,

    /// Base URL of the Telegram Bot API
    pub api_url: String,

    /// Users allowed to talk to the bot; also the alert recipients.
    /// Empty means everybody may use the bot and nobody gets alerts.
    pub allowed_users: Vec<i64>,

    pub alerts: AlertConfig,

    /// Mount point whose usage is monitored
    pub disk_path: PathBuf,

    pub wol: WolConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub cooldown: Duration,
    pub thresholds: ThresholdPolicy,
    pub snapshot_timeout: Duration,
    pub delivery_timeout: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            cooldown: DEFAULT_COOLDOWN,
            thresholds: ThresholdPolicy::default(),
            snapshot_timeout: Duration::from_secs(10),
            delivery_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WolConfig {
    /// e.g. `AA:BB:CC:DD:EE:FF`
    pub mac_address: Option<String>,
    /// e.g. `192.168.1.255:9`
    pub broadcast: String,
    /// Host probed to find out whether the machine is already up
    pub host: Option<String>,
}

/// Read-only projection answered by the `/alert` command.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertStatus {
    pub active: bool,
    pub interval: Duration,
    pub recipients: usize,
    pub thresholds: ThresholdPolicy,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup(TELEGRAM_BOT_TOKEN)
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::Missing(TELEGRAM_BOT_TOKEN))?;

        let interval = parse_or(&lookup, ALERT_INTERVAL, DEFAULT_INTERVAL_SECS).map_err(
            |value| ConfigError::Invalid {
                key: ALERT_INTERVAL,
                value,
            },
        )?;
        if interval == 0 {
            return Err(ConfigError::NotPositive(ALERT_INTERVAL));
        }
        if interval > MAX_INTERVAL.as_secs() {
            return Err(ConfigError::TooLarge {
                key: ALERT_INTERVAL,
                max: MAX_INTERVAL,
            });
        }

        let cooldown = parse_or(&lookup, ALERT_COOLDOWN, DEFAULT_COOLDOWN.as_secs()).map_err(
            |value| ConfigError::Invalid {
                key: ALERT_COOLDOWN,
                value,
            },
        )?;

        let defaults = ThresholdPolicy::default();
        let thresholds = ThresholdPolicy {
            cpu_temperature: threshold(&lookup, ALERT_CPU_TEMP, defaults.cpu_temperature)?,
            cpu_usage: threshold(&lookup, ALERT_CPU_USAGE, defaults.cpu_usage)?,
            memory_usage: threshold(&lookup, ALERT_MEMORY, defaults.memory_usage)?,
            disk_usage: threshold(&lookup, ALERT_DISK, defaults.disk_usage)?,
        };

        let config = Config {
            bot_token,
            api_url: string_or(&lookup, TELEGRAM_API_URL, DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            allowed_users: allowed_users(lookup(ALLOWED_USERS).as_deref()),
            alerts: AlertConfig {
                enabled: lookup(ALERT_ENABLED).as_deref() == Some("true"),
                interval: Duration::from_secs(interval),
                cooldown: Duration::from_secs(cooldown),
                thresholds,
                ..AlertConfig::default()
            },
            disk_path: PathBuf::from(string_or(&lookup, MONITOR_DISK_PATH, DEFAULT_DISK_PATH)),
            wol: WolConfig {
                mac_address: non_empty(lookup(WOL_MAC_ADDRESS)),
                broadcast: string_or(&lookup, WOL_BROADCAST, DEFAULT_BROADCAST),
                host: non_empty(lookup(WOL_HOST)),
            },
        };

        trace!("loaded config: {:?}", config.redacted());
        Ok(config)
    }

    /// With an empty whitelist everybody is allowed.
    pub fn is_user_allowed(&self, user_id: i64) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }

    /// Alerting needs to be switched on and have somebody to notify.
    pub fn should_start_scheduler(&self) -> bool {
        self.alerts.enabled && !self.allowed_users.is_empty()
    }

    pub fn alert_status(&self) -> AlertStatus {
        AlertStatus {
            active: self.should_start_scheduler(),
            interval: self.alerts.interval,
            recipients: self.allowed_users.len(),
            thresholds: self.alerts.thresholds,
        }
    }

    fn redacted(&self) -> Config {
        Config {
            bot_token: "<redacted>".to_string(),
            ..self.clone()
        }
    }
}

fn threshold<F>(lookup: F, key: &'static str, default: f64) -> Result<f64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value =
        parse_or(lookup, key, default).map_err(|value| ConfigError::Invalid { key, value })?;

    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidThreshold { key, value });
    }

    Ok(value)
}

/// Comma separated user ids; entries that are not numbers are skipped.
fn allowed_users(raw: Option<&str>) -> Vec<i64> {
    let Some(raw) = raw else {
        return vec![];
    };

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("ignoring invalid entry in {ALLOWED_USERS}: {entry:?}");
                None
            }
        })
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

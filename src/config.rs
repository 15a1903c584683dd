//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8005/api/auth";
pub const DEFAULT_SOCKET_URL: &str = "http://127.0.0.1:8005";
pub const DEFAULT_SOCKET_PATH: &str = "/socket.io/";
pub const DEFAULT_STORAGE_PATH: &str = ".sgs-client/storage.json";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
pub const DEFAULT_RECONNECT_DELAY_MAX_MS: u64 = 10_000;
pub const DEFAULT_RECENT_EVENTS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid boolean for {var}: {value:?} (expected true/false, yes/no, on/off, 1/0)")]
    InvalidBool { var: &'static str, value: String },
}

/// Reconnection behavior of the realtime transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub delay: Duration,
    pub delay_max: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            delay_max: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MAX_MS),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Policy that never reconnects.
    #[must_use]
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }

    /// Delay before reconnect attempt `attempt` (zero-based): doubles per
    /// attempt, capped at `delay_max`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.delay.saturating_mul(factor).min(self.delay_max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Server address, e.g. `http://host:8005`. `ws`/`wss` schemes are accepted too.
    pub url: String,
    pub path: String,
    /// Start the connection as soon as the handle is built.
    pub auto_connect: bool,
    pub reconnect: ReconnectPolicy,
    /// Number of inbound events kept in `ConnectionStatus::recent_events`.
    pub recent_event_capacity: usize,
}

impl RealtimeConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: DEFAULT_SOCKET_PATH.to_owned(),
            auto_connect: false,
            reconnect: ReconnectPolicy::default(),
            recent_event_capacity: DEFAULT_RECENT_EVENTS,
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKET_URL)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the auth API; `/login` and `/register` are appended.
    pub api_base: String,
    pub storage_path: PathBuf,
    pub realtime: RealtimeConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_owned(),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            realtime: RealtimeConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// All optional:
    /// - `SGS_API_BASE`: auth API base URL
    /// - `SGS_STORAGE_PATH`: JSON file holding the persisted token
    /// - `SGS_SOCKET_URL`, `SGS_SOCKET_PATH`: realtime endpoint
    /// - `SGS_AUTO_CONNECT`: default false
    /// - `SGS_RECONNECT`: default true
    /// - `SGS_RECONNECT_DELAY_MS`, `SGS_RECONNECT_DELAY_MAX_MS`: default 1000 / 10000
    /// - `SGS_RECONNECT_ATTEMPTS`: unset means unlimited
    /// - `SGS_RECENT_EVENTS`: default 100
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a boolean variable holds an unrecognized value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] but reads variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a boolean variable holds an unrecognized value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base = lookup("SGS_API_BASE")
            .unwrap_or_else(|| DEFAULT_API_BASE.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let storage_path = lookup("SGS_STORAGE_PATH").map_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH), PathBuf::from);

        let reconnect = ReconnectPolicy {
            enabled: parse_bool("SGS_RECONNECT", lookup("SGS_RECONNECT"))?.unwrap_or(true),
            delay: Duration::from_millis(parse_or(&lookup, "SGS_RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY_MS)),
            delay_max: Duration::from_millis(parse_or(
                &lookup,
                "SGS_RECONNECT_DELAY_MAX_MS",
                DEFAULT_RECONNECT_DELAY_MAX_MS,
            )),
            max_attempts: lookup("SGS_RECONNECT_ATTEMPTS").and_then(|v| v.trim().parse().ok()),
        };

        let realtime = RealtimeConfig {
            url: lookup("SGS_SOCKET_URL").unwrap_or_else(|| DEFAULT_SOCKET_URL.to_owned()),
            path: lookup("SGS_SOCKET_PATH").unwrap_or_else(|| DEFAULT_SOCKET_PATH.to_owned()),
            auto_connect: parse_bool("SGS_AUTO_CONNECT", lookup("SGS_AUTO_CONNECT"))?.unwrap_or(false),
            reconnect,
            recent_event_capacity: parse_or(&lookup, "SGS_RECENT_EVENTS", DEFAULT_RECENT_EVENTS),
        };

        Ok(Self { api_base, storage_path, realtime })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn parse_bool(var: &'static str, raw: Option<String>) -> Result<Option<bool>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidBool { var, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

//! Layered server configuration.
//!
//! Settings are resolved from three layers (in priority order):
//! 1. **Compiled defaults** — [`Config::default()`]
//! 2. **JSON file** — optional, partial files are merged over defaults via
//!    `#[serde(default)]`
//! 3. **Environment variables** — `WORDRUSH_*` overrides (highest priority)
//!
//! Every behavioral constant of the server lives here so tests and operators
//! can shrink timeouts or capacities without recompiling.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config at {path}: {source}")]
    Read {
        /// Config file path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Failed to parse the config file as JSON.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        /// Config file path.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// A resolved value is out of range.
    #[error("invalid config: {reason}")]
    Invalid {
        /// Human-readable description of the violation.
        reason: String,
    },
}

/// Server configuration with compiled defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// TCP listening port.
    pub port: u16,
    /// Maximum players per session lobby.
    pub lobby_capacity: usize,
    /// Maximum concurrently live sessions.
    pub registry_capacity: usize,
    /// Words sampled into each race's shared sequence.
    pub words_per_race: usize,
    /// First countdown value broadcast before a race activates.
    pub countdown_start: u32,
    /// Pause between countdown ticks, in milliseconds.
    pub countdown_tick_ms: u64,
    /// Seconds of post-start silence before a player is kicked.
    pub inactivity_kick_secs: u64,
    /// Absolute limit on a race's duration, in seconds.
    pub hard_timeout_secs: u64,
    /// Post-completion window before a finished player is disconnected.
    pub grace_window_secs: u64,
    /// Interval between `timeout_warning` events during the grace window.
    pub grace_warning_interval_secs: u64,
    /// Read-poll granularity for the per-connection loop, in milliseconds.
    pub poll_interval_ms: u64,
    /// Global concurrent-connection cap. Defaults to
    /// `registry_capacity * lobby_capacity` when unset.
    pub max_connections: Option<usize>,
    /// Maximum accepted length of the self-asserted client id, in characters.
    pub max_id_len: usize,
    /// Maximum accepted length of the display name, in characters.
    pub max_name_len: usize,
    /// Maximum length of a single wire line, in bytes.
    pub max_line_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 9000,
            lobby_capacity: 8,
            registry_capacity: 16,
            words_per_race: 50,
            countdown_start: 10,
            countdown_tick_ms: 1_000,
            inactivity_kick_secs: 60,
            hard_timeout_secs: 600,
            grace_window_secs: 20,
            grace_warning_interval_secs: 5,
            poll_interval_ms: 25,
            max_connections: None,
            max_id_len: 63,
            max_name_len: 15,
            max_line_len: 2_048,
        }
    }
}

impl Config {
    /// Resolve configuration: defaults, then the optional JSON file, then
    /// `WORDRUSH_*` environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a (possibly partial) JSON config file over compiled defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(path = %path.display(), "configuration loaded from file");
        Ok(config)
    }

    /// Apply `WORDRUSH_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (injectable for tests).
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T> {
            match raw.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(key, raw, "ignoring unparseable environment override");
                    None
                }
            }
        }

        if let Some(raw) = lookup("WORDRUSH_PORT") {
            if let Some(port) = parse("WORDRUSH_PORT", &raw) {
                self.port = port;
            }
        }
        if let Some(raw) = lookup("WORDRUSH_LOBBY_CAPACITY") {
            if let Some(capacity) = parse("WORDRUSH_LOBBY_CAPACITY", &raw) {
                self.lobby_capacity = capacity;
            }
        }
        if let Some(raw) = lookup("WORDRUSH_REGISTRY_CAPACITY") {
            if let Some(capacity) = parse("WORDRUSH_REGISTRY_CAPACITY", &raw) {
                self.registry_capacity = capacity;
            }
        }
        if let Some(raw) = lookup("WORDRUSH_WORDS_PER_RACE") {
            if let Some(count) = parse("WORDRUSH_WORDS_PER_RACE", &raw) {
                self.words_per_race = count;
            }
        }
        if let Some(raw) = lookup("WORDRUSH_MAX_CONNECTIONS") {
            if let Some(cap) = parse("WORDRUSH_MAX_CONNECTIONS", &raw) {
                self.max_connections = Some(cap);
            }
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.lobby_capacity >= 1, "lobby_capacity must be >= 1"),
            (self.registry_capacity >= 1, "registry_capacity must be >= 1"),
            (self.words_per_race >= 1, "words_per_race must be >= 1"),
            (self.countdown_start >= 1, "countdown_start must be >= 1"),
            (self.countdown_tick_ms >= 1, "countdown_tick_ms must be >= 1"),
            (self.poll_interval_ms >= 1, "poll_interval_ms must be >= 1"),
            (
                self.grace_warning_interval_secs >= 1,
                "grace_warning_interval_secs must be >= 1",
            ),
            (self.max_id_len >= 1, "max_id_len must be >= 1"),
            (self.max_name_len >= 1, "max_name_len must be >= 1"),
            (self.max_line_len >= 64, "max_line_len must be >= 64"),
        ];
        for (ok, reason) in checks {
            if !ok {
                return Err(ConfigError::Invalid {
                    reason: reason.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Effective global connection cap.
    pub fn max_connections(&self) -> usize {
        self.max_connections
            .unwrap_or(self.registry_capacity * self.lobby_capacity)
    }

    /// Pause between countdown ticks.
    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    /// Post-start inactivity limit.
    pub fn inactivity_kick(&self) -> Duration {
        Duration::from_secs(self.inactivity_kick_secs)
    }

    /// Absolute race-duration limit.
    pub fn hard_timeout(&self) -> Duration {
        Duration::from_secs(self.hard_timeout_secs)
    }

    /// Post-completion grace window.
    pub fn grace_window(&self) -> Duration {
        Duration::from_secs(self.grace_window_secs)
    }

    /// Read-poll granularity for the connection loop.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

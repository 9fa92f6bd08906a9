//! Configuration loading and data directory layout.
//!
//! Handles paths and persistence for:
//! - `config.yml` (reset defaults, broadcast settings)
//! - `worlds.json` (the reset registry, see [`crate::state::ResetStore`])
//! - `broadcasts.jsonl` (the warning feed)
//!
//! Reads are best-effort per key: a missing or mistyped value logs a warning
//! and falls back to its default so one typo never stops the daemon.

use fs_err as fs;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::duration::{parse_duration, DAY, HOUR, MINUTE};
use crate::error::{ResetError, Result};
use crate::state::MAX_INTERVAL;

pub const DEFAULT_CONFIG: &str = include_str!("default_config.yml");

const DEFAULT_BROADCAST_MESSAGE: &str = "&7Outer end islands will be reset in &a{time-left}";

/// Returns the platform data directory for worldreset (e.g. `~/.local/share/worldreset`).
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("worldreset"))
}

/// Where worldreset keeps its own files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DataDir { root: root.into() }
    }

    /// Uses [`default_data_dir`].
    pub fn from_default() -> Result<Self> {
        default_data_dir()
            .map(DataDir::new)
            .ok_or(ResetError::NoDataDir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.yml")
    }

    pub fn worlds_file(&self) -> PathBuf {
        self.root.join("worlds.json")
    }

    pub fn feed_file(&self) -> PathBuf {
        self.root.join("broadcasts.jsonl")
    }

    pub fn ensure_exists(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }
}

/// Typed view of `config.yml`.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub default_reset_interval: Duration,
    pub broadcast_message: String,
    /// Warning thresholds, largest first, without duplicates.
    pub broadcast_prior_reset: Vec<Duration>,
    pub audit_period: Duration,
    pub preserve_phase: bool,
    pub broadcast_feed: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            default_reset_interval: Duration::from_secs(30 * DAY),
            broadcast_message: DEFAULT_BROADCAST_MESSAGE.to_string(),
            broadcast_prior_reset: normalize_thresholds(
                [
                    24 * HOUR,
                    12 * HOUR,
                    6 * HOUR,
                    3 * HOUR,
                    2 * HOUR,
                    HOUR,
                    30 * MINUTE,
                    15 * MINUTE,
                    10 * MINUTE,
                    5 * MINUTE,
                    MINUTE,
                    30,
                ]
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
            ),
            audit_period: Duration::from_secs(5),
            preserve_phase: false,
            broadcast_feed: true,
        }
    }
}

impl Settings {
    /// Loads `config.yml`, writing the bundled default first if it is missing.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, DEFAULT_CONFIG)?;
            tracing::info!(path = %path.display(), "Wrote default config");
        }

        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let root: Value = if content.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(content)?
        };

        let empty = Mapping::new();
        let map = match &root {
            Value::Mapping(map) => map,
            Value::Null => &empty,
            _ => {
                tracing::warn!("Config root is not a mapping, using defaults");
                &empty
            }
        };

        let defaults = Settings::default();
        let audit_period = duration_key(map, "audit-period", defaults.audit_period);
        let reset_interval = duration_key(
            map,
            "default-reset-interval",
            defaults.default_reset_interval,
        );
        Ok(Settings {
            default_reset_interval: if reset_interval.is_zero() || reset_interval >= MAX_INTERVAL {
                tracing::warn!(
                    interval_secs = reset_interval.as_secs(),
                    "default-reset-interval out of range, using default"
                );
                defaults.default_reset_interval
            } else {
                reset_interval
            },
            broadcast_message: string_key(map, "broadcast-message", defaults.broadcast_message),
            broadcast_prior_reset: duration_list_key(
                map,
                "broadcast-prior-reset",
                defaults.broadcast_prior_reset,
            ),
            audit_period: if audit_period.is_zero() {
                tracing::warn!("audit-period must be positive, using default");
                defaults.audit_period
            } else {
                audit_period
            },
            preserve_phase: bool_key(map, "preserve-phase", defaults.preserve_phase),
            broadcast_feed: bool_key(map, "broadcast-feed", defaults.broadcast_feed),
        })
    }

    /// Applies the reloadable keys of `fresh`. `broadcast-prior-reset` and
    /// `audit-period` only change on restart.
    pub fn apply_reload(&mut self, fresh: Settings) {
        self.default_reset_interval = fresh.default_reset_interval;
        self.broadcast_message = fresh.broadcast_message;
        self.preserve_phase = fresh.preserve_phase;
        self.broadcast_feed = fresh.broadcast_feed;
    }
}

fn normalize_thresholds(mut thresholds: Vec<Duration>) -> Vec<Duration> {
    thresholds.retain(|d| !d.is_zero());
    thresholds.sort_unstable_by(|a, b| b.cmp(a));
    thresholds.dedup();
    thresholds
}

fn lookup<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    let value = map.get(key);
    if value.is_none() {
        tracing::warn!(key, "No value for config key, using default");
    }
    value
}

fn unexpected(key: &str, expected: &str, found: &Value) {
    tracing::warn!(key, expected, found = ?found, "Unexpected config value type, using default");
}

fn string_key(map: &Mapping, key: &str, fallback: String) -> String {
    match lookup(map, key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            unexpected(key, "string", other);
            fallback
        }
        None => fallback,
    }
}

fn bool_key(map: &Mapping, key: &str, fallback: bool) -> bool {
    match lookup(map, key) {
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            unexpected(key, "boolean", other);
            fallback
        }
        None => fallback,
    }
}

/// Strings use the duration grammar; bare numbers are seconds.
fn value_as_duration(key: &str, value: &Value) -> Option<Duration> {
    match value {
        Value::String(s) => match parse_duration(s) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!(key, value = %s, error = %e, "Invalid duration in config");
                None
            }
        },
        Value::Number(n) => n.as_u64().map(Duration::from_secs).or_else(|| {
            unexpected(key, "duration", value);
            None
        }),
        other => {
            unexpected(key, "duration", other);
            None
        }
    }
}

fn duration_key(map: &Mapping, key: &str, fallback: Duration) -> Duration {
    lookup(map, key)
        .and_then(|value| value_as_duration(key, value))
        .unwrap_or(fallback)
}

fn duration_list_key(map: &Mapping, key: &str, fallback: Vec<Duration>) -> Vec<Duration> {
    match lookup(map, key) {
        Some(Value::Sequence(items)) => normalize_thresholds(
            items
                .iter()
                .filter_map(|item| value_as_duration(key, item))
                .collect(),
        ),
        Some(other) => {
            unexpected(key, "list", other);
            fallback
        }
        None => fallback,
    }
}

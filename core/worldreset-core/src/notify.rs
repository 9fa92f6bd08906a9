//! Pre-reset warnings and the sinks that deliver them.

use chrono::{DateTime, Utc};
use fs_err::OpenOptions;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use crate::duration::{long_duration, short_duration};

static LEGACY_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[&§][0-9a-fk-or]").expect("legacy code pattern is valid"));

/// Expands `{time-left}`, `{time-left-long}` and `{world}` in a broadcast template.
pub fn render_message(template: &str, world: &str, time_left: Duration) -> String {
    template
        .replace("{time-left-long}", &long_duration(time_left))
        .replace("{time-left}", &short_duration(time_left))
        .replace("{world}", world)
}

/// Removes `&`/`§` color and format codes.
pub fn strip_legacy_codes(message: &str) -> String {
    LEGACY_CODE.replace_all(message, "").into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub world: String,
    pub reset_at: DateTime<Utc>,
    #[serde(rename = "time_left_secs", serialize_with = "as_secs")]
    pub time_left: Duration,
    /// Rendered message, color codes included.
    pub message: String,
}

fn as_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

/// Delivers warnings. Implementations log their own failures; a broken sink
/// never stops a tick.
pub trait Notifier {
    fn notify(&self, warning: &Warning);
}

/// Emits warnings as log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, warning: &Warning) {
        tracing::info!(
            world = %warning.world,
            time_left = %short_duration(warning.time_left),
            "{}",
            strip_legacy_codes(&warning.message)
        );
    }
}

/// Appends one JSON object per warning to a feed file for relaying into the game.
#[derive(Debug, Clone)]
pub struct FeedNotifier {
    path: PathBuf,
}

impl FeedNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FeedNotifier { path: path.into() }
    }

    fn append(&self, warning: &Warning) -> std::io::Result<()> {
        let line = serde_json::to_string(warning)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

impl Notifier for FeedNotifier {
    fn notify(&self, warning: &Warning) {
        if let Err(e) = self.append(warning) {
            tracing::warn!(error = %e, path = %self.path.display(), "Failed to append to broadcast feed");
        }
    }
}

/// Forwards each warning to every inner sink.
#[derive(Default)]
pub struct FanoutNotifier {
    sinks: Vec<Box<dyn Notifier + Send + Sync>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl Notifier + Send + Sync + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, warning: &Warning) {
        for sink in &self.sinks {
            sink.notify(warning);
        }
    }
}

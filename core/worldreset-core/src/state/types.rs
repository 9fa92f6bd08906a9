//! Serialized registry types. Current on-disk format is v1.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::duration::YEAR;

/// Longest reset interval. Keeps `last_reset_at + interval` far inside the
/// range chrono can represent.
pub const MAX_INTERVAL: Duration = Duration::from_secs(1000 * YEAR);

/// Reset bookkeeping for one world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionState {
    /// World folder name as it was scheduled, casing kept.
    pub world: String,
    /// Start of the current cycle. Only ever moves forward.
    pub last_reset_at: DateTime<Utc>,
    pub interval_secs: u64,
    /// Warning thresholds (seconds before the reset) not yet sent this cycle.
    #[serde(default)]
    pub pending_warnings: Vec<u64>,
}

impl RegionState {
    pub fn new(world: &str, interval: Duration, now: DateTime<Utc>, warnings: &[Duration]) -> Self {
        let mut state = RegionState {
            world: world.to_string(),
            last_reset_at: now,
            interval_secs: interval.as_secs().clamp(1, MAX_INTERVAL.as_secs()),
            pending_warnings: Vec::new(),
        };
        state.rearm_warnings(warnings);
        state
    }

    /// The interval, clamped to `1s..=MAX_INTERVAL` in case the registry
    /// was edited by hand.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.clamp(1, MAX_INTERVAL.as_secs()))
    }

    pub fn next_reset(&self) -> DateTime<Utc> {
        i64::try_from(self.interval().as_secs())
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|delta| self.last_reset_at.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_reset()
    }

    /// Time until the next reset; zero once due.
    pub fn time_left(&self, now: DateTime<Utc>) -> Duration {
        self.next_reset()
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Thresholds not shorter than the interval would fire right after a
    /// reset, so they are skipped.
    pub fn rearm_warnings(&mut self, warnings: &[Duration]) {
        let interval = self.interval().as_secs();
        self.pending_warnings = warnings
            .iter()
            .map(Duration::as_secs)
            .filter(|secs| *secs > 0 && *secs < interval)
            .collect();
        self.pending_warnings.sort_unstable_by(|a, b| b.cmp(a));
        self.pending_warnings.dedup();
    }

    /// Consumes every pending threshold the countdown has reached. Returns
    /// true if at least one was consumed.
    pub fn take_reached_warnings(&mut self, time_left: Duration) -> bool {
        let left = time_left.as_secs();
        let before = self.pending_warnings.len();
        self.pending_warnings.retain(|threshold| left > *threshold);
        self.pending_warnings.len() != before
    }

    /// Starts a new cycle after a reset that ran at `now`.
    ///
    /// With `preserve_phase` the cycle start is moved forward by whole
    /// intervals so it stays on the first cycle's grid; otherwise it becomes
    /// `now`.
    pub fn advance(&mut self, now: DateTime<Utc>, preserve_phase: bool, warnings: &[Duration]) {
        let next = if preserve_phase {
            let interval = i64::try_from(self.interval().as_secs()).unwrap_or(i64::MAX);
            let elapsed = now.signed_duration_since(self.last_reset_at).num_seconds();
            let cycles = (elapsed / interval).max(1);
            cycles
                .checked_mul(interval)
                .and_then(TimeDelta::try_seconds)
                .and_then(|offset| self.last_reset_at.checked_add_signed(offset))
                .unwrap_or(now)
        } else {
            now
        };

        if next > self.last_reset_at {
            self.last_reset_at = next;
        }
        self.rearm_warnings(warnings);
    }
}

/// Outcome of [`crate::state::ResetStore::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// The world had no schedule before.
    Scheduled,
    /// An existing schedule was replaced.
    Rescheduled,
}

//! Reset scheduler: decides which worlds are due and what warnings go out.
//!
//! ## Tick
//!
//! ```text
//! for each schedule, in world order:
//!   now - last_reset_at >= interval  → reset, last_reset_at = now, re-arm warnings
//!   reset failed                     → state untouched, retried next tick
//!   otherwise                        → consume reached thresholds, warn once
//! ```
//!
//! The scheduler owns no schedules; callers pass the [`ResetStore`] in and
//! decide when to persist it (see [`TickReport::changed`] and
//! [`ResetStore::save_merged`]).

use chrono::{DateTime, Utc};

use crate::config::Settings;
use crate::notify::{render_message, Notifier, Warning};
use crate::regions::{RegionResetter, ResetSummary};
use crate::state::ResetStore;

#[derive(Debug, Default)]
pub struct TickReport {
    pub reset: Vec<(String, ResetSummary)>,
    pub warned: Vec<Warning>,
    /// World and error message of each reset that failed.
    pub failed: Vec<(String, String)>,
}

impl TickReport {
    /// True if any schedule was modified and the store should be saved.
    pub fn changed(&self) -> bool {
        !self.reset.is_empty() || !self.warned.is_empty()
    }

    /// Worlds whose schedule this tick modified.
    pub fn touched(&self) -> impl Iterator<Item = &str> {
        self.reset
            .iter()
            .map(|(world, _)| world.as_str())
            .chain(self.warned.iter().map(|warning| warning.world.as_str()))
    }
}

pub struct Scheduler<R, N> {
    settings: Settings,
    resetter: R,
    notifier: N,
}

impl<R: RegionResetter, N: Notifier> Scheduler<R, N> {
    pub fn new(settings: Settings, resetter: R, notifier: N) -> Self {
        Scheduler {
            settings,
            resetter,
            notifier,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn resetter(&self) -> &R {
        &self.resetter
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Resets every due world and sends any warnings that came due.
    pub fn tick(&self, store: &mut ResetStore, now: DateTime<Utc>) -> TickReport {
        self.run(store, now, true)
    }

    /// Resets every due world without sending warnings. Meant to run while
    /// the server is stopped.
    pub fn sweep(&self, store: &mut ResetStore, now: DateTime<Utc>) -> TickReport {
        self.run(store, now, false)
    }

    fn run(&self, store: &mut ResetStore, now: DateTime<Utc>, warn: bool) -> TickReport {
        let mut report = TickReport::default();
        let thresholds = &self.settings.broadcast_prior_reset;

        for state in store.states_mut() {
            if state.is_due(now) {
                match self.resetter.reset(&state.world) {
                    Ok(summary) => {
                        let previous = state.last_reset_at;
                        state.advance(now, self.settings.preserve_phase, thresholds);
                        tracing::info!(
                            world = %state.world,
                            deleted = summary.deleted,
                            failed = summary.failed,
                            previous = %previous,
                            next_reset = %state.next_reset(),
                            "World reset"
                        );
                        report.reset.push((state.world.clone(), summary));
                    }
                    Err(e) => {
                        tracing::error!(world = %state.world, error = %e, "World reset failed, will retry");
                        report.failed.push((state.world.clone(), e.to_string()));
                    }
                }
                continue;
            }

            if !warn {
                continue;
            }

            let time_left = state.time_left(now);
            if state.take_reached_warnings(time_left) {
                let warning = Warning {
                    world: state.world.clone(),
                    reset_at: state.next_reset(),
                    time_left,
                    message: render_message(
                        &self.settings.broadcast_message,
                        &state.world,
                        time_left,
                    ),
                };
                tracing::debug!(world = %warning.world, time_left_secs = time_left.as_secs(), "Sending warning");
                self.notifier.notify(&warning);
                report.warned.push(warning);
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ResetError, Result};
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeResetter {
        calls: RefCell<Vec<String>>,
        broken: Option<&'static str>,
    }

    impl RegionResetter for FakeResetter {
        fn reset(&self, world: &str) -> Result<ResetSummary> {
            self.calls.borrow_mut().push(world.to_string());
            if self.broken == Some(world) {
                return Err(ResetError::UnknownWorld(world.to_string()));
            }
            Ok(ResetSummary {
                deleted: 1,
                failed: 0,
            })
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        sent: RefCell<Vec<Warning>>,
    }

    impl Notifier for FakeNotifier {
        fn notify(&self, warning: &Warning) {
            self.sent.borrow_mut().push(warning.clone());
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn mins(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        t0() + chrono::Duration::minutes(minutes)
    }

    fn settings(thresholds: &[u64]) -> Settings {
        Settings {
            broadcast_message: "{world} in {time-left}".to_string(),
            broadcast_prior_reset: thresholds.iter().map(|m| mins(*m)).collect(),
            ..Settings::default()
        }
    }

    fn scheduler(
        thresholds: &[u64],
        resetter: FakeResetter,
    ) -> Scheduler<FakeResetter, FakeNotifier> {
        Scheduler::new(settings(thresholds), resetter, FakeNotifier::default())
    }

    #[test]
    fn test_tick_resets_only_due_worlds() {
        let scheduler = scheduler(&[], FakeResetter::default());
        let mut store = ResetStore::new_in_memory();
        store.schedule("end", mins(60), t0(), &[]);
        store.schedule("nether", mins(120), t0(), &[]);

        let report = scheduler.tick(&mut store, at(60));

        assert_eq!(*scheduler.resetter().calls.borrow(), vec!["end"]);
        assert_eq!(report.reset.len(), 1);
        assert!(report.changed());
        assert_eq!(report.touched().collect::<Vec<_>>(), vec!["end"]);
        assert_eq!(store.get("end").unwrap().last_reset_at, at(60));
        assert_eq!(store.get("nether").unwrap().last_reset_at, t0());
    }

    #[test]
    fn test_tick_before_due_does_nothing() {
        let scheduler = scheduler(&[], FakeResetter::default());
        let mut store = ResetStore::new_in_memory();
        store.schedule("end", mins(60), t0(), &[]);

        let report = scheduler.tick(&mut store, at(59));

        assert!(!report.changed());
        assert!(scheduler.resetter().calls.borrow().is_empty());
    }

    #[test]
    fn test_overdue_reset_restarts_cycle_from_now() {
        let scheduler = scheduler(&[], FakeResetter::default());
        let mut store = ResetStore::new_in_memory();
        store.schedule("end", mins(60), t0(), &[]);

        scheduler.tick(&mut store, at(150));

        let state = store.get("end").unwrap();
        assert_eq!(state.last_reset_at, at(150));
        assert_eq!(state.next_reset(), at(210));
    }

    #[test]
    fn test_preserve_phase_keeps_grid() {
        let mut scheduler = scheduler(&[], FakeResetter::default());
        scheduler.settings_mut().preserve_phase = true;
        let mut store = ResetStore::new_in_memory();
        store.schedule("end", mins(60), t0(), &[]);

        scheduler.tick(&mut store, at(150));

        assert_eq!(store.get("end").unwrap().last_reset_at, at(120));
    }

    #[test]
    fn test_failed_reset_leaves_state_and_retries() {
        let resetter = FakeResetter {
            broken: Some("end"),
            ..FakeResetter::default()
        };
        let scheduler = scheduler(&[], resetter);
        let mut store = ResetStore::new_in_memory();
        store.schedule("end", mins(60), t0(), &[]);

        let first = scheduler.tick(&mut store, at(60));
        let second = scheduler.tick(&mut store, at(61));

        assert_eq!(first.failed.len(), 1);
        assert_eq!(second.failed.len(), 1);
        assert!(!first.changed());
        assert_eq!(store.get("end").unwrap().last_reset_at, t0());
        assert_eq!(scheduler.resetter().calls.borrow().len(), 2);
    }

    #[test]
    fn test_each_threshold_fires_once() {
        let scheduler = scheduler(&[30, 10], FakeResetter::default());
        let mut store = ResetStore::new_in_memory();
        store.schedule("end", mins(60), t0(), &scheduler.settings().broadcast_prior_reset);

        assert!(scheduler.tick(&mut store, at(29)).warned.is_empty());
        let first = scheduler.tick(&mut store, at(30));
        let again = scheduler.tick(&mut store, at(31));
        let second = scheduler.tick(&mut store, at(50));

        assert_eq!(first.warned.len(), 1);
        assert_eq!(first.warned[0].message, "end in 30m");
        assert!(again.warned.is_empty());
        assert_eq!(second.warned.len(), 1);
        assert_eq!(scheduler.notifier.sent.borrow().len(), 2);
    }

    #[test]
    fn test_missed_thresholds_collapse_into_one_warning() {
        let scheduler = scheduler(&[30, 10, 5], FakeResetter::default());
        let mut store = ResetStore::new_in_memory();
        store.schedule("end", mins(60), t0(), &scheduler.settings().broadcast_prior_reset);

        let report = scheduler.tick(&mut store, at(56));

        assert_eq!(report.warned.len(), 1);
        assert_eq!(report.warned[0].time_left, mins(4));
        assert!(store.get("end").unwrap().pending_warnings.is_empty());
    }

    #[test]
    fn test_warnings_rearm_after_reset() {
        let scheduler = scheduler(&[10], FakeResetter::default());
        let mut store = ResetStore::new_in_memory();
        store.schedule("end", mins(60), t0(), &scheduler.settings().broadcast_prior_reset);

        scheduler.tick(&mut store, at(50));
        assert!(store.get("end").unwrap().pending_warnings.is_empty());

        scheduler.tick(&mut store, at(60));
        assert_eq!(store.get("end").unwrap().pending_warnings, vec![600]);

        let report = scheduler.tick(&mut store, at(110));
        assert_eq!(report.warned.len(), 1);
    }

    #[test]
    fn test_sweep_resets_without_warning() {
        let scheduler = scheduler(&[30], FakeResetter::default());
        let mut store = ResetStore::new_in_memory();
        store.schedule("end", mins(60), t0(), &scheduler.settings().broadcast_prior_reset);
        store.schedule("nether", mins(30), t0(), &[]);

        let report = scheduler.sweep(&mut store, at(45));

        assert!(report.warned.is_empty());
        assert_eq!(report.reset.len(), 1);
        assert_eq!(report.reset[0].0, "nether");
        assert_eq!(store.get("end").unwrap().pending_warnings, vec![1800]);
    }

    #[test]
    fn test_last_reset_never_decreases() {
        let scheduler = scheduler(&[], FakeResetter::default());
        let mut store = ResetStore::new_in_memory();
        store.schedule("end", mins(1), t0(), &[]);

        let mut previous = t0();
        for minute in [1, 1, 3, 2, 10] {
            scheduler.tick(&mut store, at(minute));
            let last = store.get("end").unwrap().last_reset_at;
            assert!(last >= previous);
            previous = last;
        }
    }
}

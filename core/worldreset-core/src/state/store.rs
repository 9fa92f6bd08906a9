//! File-backed reset registry.
//!
//! Stores reset schedules in `worlds.json` inside the data directory. The
//! daemon and the one-shot CLI commands both read and write this file.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "worlds": {
//!     "world_the_end": { ... RegionState fields ... }
//!   }
//! }
//! ```
//!
//! Keys are case-folded world names; the record keeps the casing as typed.
//!
//! # Defensive Design
//!
//! - Missing file: empty store, file created on load
//! - Empty file: empty store
//! - Corrupt JSON: file moved aside to `worlds.<timestamp>.err.json`, empty store
//! - Unsupported version: empty store, file left alone until the next save
//!
//! # Atomic Writes
//!
//! Uses temp file + rename so a crash never leaves a half-written registry.

use fs_err as fs;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{ResetError, Result};

use super::types::{RegionState, ScheduleOutcome};

const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    worlds: BTreeMap<String, RegionState>,
}

impl Default for StoreFile {
    fn default() -> Self {
        StoreFile {
            version: STORE_VERSION,
            worlds: BTreeMap::new(),
        }
    }
}

fn world_key(world: &str) -> String {
    world.trim().to_lowercase()
}

/// In-memory registry of reset schedules, optionally backed by a file.
///
/// Create with [`ResetStore::load`] to read from disk, or
/// [`ResetStore::new_in_memory`] for tests.
#[derive(Debug, Clone)]
pub struct ResetStore {
    worlds: BTreeMap<String, RegionState>,
    file_path: Option<PathBuf>,
}

impl ResetStore {
    pub fn new_in_memory() -> Self {
        ResetStore {
            worlds: BTreeMap::new(),
            file_path: None,
        }
    }

    pub fn new(file_path: &Path) -> Self {
        ResetStore {
            worlds: BTreeMap::new(),
            file_path: Some(file_path.to_path_buf()),
        }
    }

    pub fn load(file_path: &Path) -> Result<Self> {
        if !file_path.exists() {
            let store = ResetStore::new(file_path);
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent)?;
            }
            store.save()?;
            return Ok(store);
        }

        let content = fs::read_to_string(file_path)?;

        if content.trim().is_empty() {
            tracing::warn!(path = %file_path.display(), "Empty registry file, starting empty");
            return Ok(ResetStore::new(file_path));
        }

        match serde_json::from_str::<StoreFile>(&content) {
            Ok(store_file) if store_file.version == STORE_VERSION => Ok(ResetStore {
                worlds: store_file.worlds,
                file_path: Some(file_path.to_path_buf()),
            }),
            Ok(store_file) => {
                tracing::warn!(
                    version = store_file.version,
                    expected = STORE_VERSION,
                    "Unsupported registry version, starting empty"
                );
                Ok(ResetStore::new(file_path))
            }
            Err(e) => {
                let backup = backup_path(file_path, Utc::now());
                tracing::warn!(
                    error = %e,
                    path = %file_path.display(),
                    backup = %backup.display(),
                    "Failed to parse registry, moving it aside and starting empty"
                );
                fs::rename(file_path, &backup)?;
                let store = ResetStore::new(file_path);
                store.save()?;
                Ok(store)
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let file_path = self.file_path.as_ref().ok_or(ResetError::InMemoryStore)?;

        let store_file = StoreFile {
            version: STORE_VERSION,
            worlds: self.worlds.clone(),
        };
        let content = serde_json::to_string_pretty(&store_file)?;

        let parent_dir = file_path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_file = NamedTempFile::new_in(parent_dir)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.write_all(b"\n")?;
        temp_file.flush()?;
        temp_file.persist(file_path)?;

        Ok(())
    }

    /// Saves the schedules of `worlds` over a fresh read of the backing file.
    /// A schedule that no longer equals its copy in `loaded` was changed or
    /// removed by another writer since then, and is left as found.
    pub fn save_merged<'a>(
        &self,
        loaded: &ResetStore,
        worlds: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        let file_path = self.file_path.as_ref().ok_or(ResetError::InMemoryStore)?;
        let mut latest = ResetStore::load(file_path)?;

        for world in worlds {
            let (Some(expected), Some(updated)) = (loaded.get(world), self.get(world)) else {
                continue;
            };
            if !latest.apply_if_unchanged(expected, updated.clone()) {
                tracing::info!(world, "Schedule changed by another writer, keeping it");
            }
        }

        latest.save()
    }

    /// Replaces the schedule of `updated.world` if it still equals `expected`.
    pub fn apply_if_unchanged(&mut self, expected: &RegionState, updated: RegionState) -> bool {
        match self.worlds.get_mut(&world_key(&updated.world)) {
            Some(current) if current == expected => {
                *current = updated;
                true
            }
            _ => false,
        }
    }

    /// Replaces any schedule for `world` (case-insensitive) with a new cycle
    /// starting at `now`.
    pub fn schedule(
        &mut self,
        world: &str,
        interval: Duration,
        now: DateTime<Utc>,
        warnings: &[Duration],
    ) -> ScheduleOutcome {
        let state = RegionState::new(world.trim(), interval, now, warnings);
        match self.worlds.insert(world_key(world), state) {
            Some(_) => ScheduleOutcome::Rescheduled,
            None => ScheduleOutcome::Scheduled,
        }
    }

    /// Returns true if a schedule was removed.
    pub fn unschedule(&mut self, world: &str) -> bool {
        self.worlds.remove(&world_key(world)).is_some()
    }

    pub fn get(&self, world: &str) -> Option<&RegionState> {
        self.worlds.get(&world_key(world))
    }

    /// All schedules in ascending world order.
    pub fn states(&self) -> impl Iterator<Item = &RegionState> {
        self.worlds.values()
    }

    pub(crate) fn states_mut(&mut self) -> impl Iterator<Item = &mut RegionState> {
        self.worlds.values_mut()
    }

    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }

    /// Test helper: Move the cycle start of a schedule.
    /// Only available with the `test-helpers` feature or in tests.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn set_last_reset_for_test(&mut self, world: &str, timestamp: DateTime<Utc>) {
        if let Some(state) = self.worlds.get_mut(&world_key(world)) {
            state.last_reset_at = timestamp;
        }
    }
}

fn backup_path(file_path: &Path, now: DateTime<Utc>) -> PathBuf {
    let stem = file_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("worlds");
    file_path.with_file_name(format!("{}.{}.err.json", stem, now.format("%Y%m%dT%H%M%SZ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn hours(h: u64) -> Duration {
        Duration::from_secs(h * 3600)
    }

    #[test]
    fn test_schedule_then_reschedule_case_insensitive() {
        let mut store = ResetStore::new_in_memory();
        assert_eq!(
            store.schedule("World_The_End", hours(1), t0(), &[]),
            ScheduleOutcome::Scheduled
        );
        assert_eq!(
            store.schedule("world_the_end", hours(2), t0(), &[]),
            ScheduleOutcome::Rescheduled
        );
        assert_eq!(store.len(), 1);

        let state = store.get("WORLD_THE_END").unwrap();
        assert_eq!(state.world, "world_the_end");
        assert_eq!(state.interval(), hours(2));
    }

    #[test]
    fn test_unschedule() {
        let mut store = ResetStore::new_in_memory();
        store.schedule("nether", hours(1), t0(), &[]);
        assert!(store.unschedule("NETHER"));
        assert!(!store.unschedule("nether"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_states_are_ordered() {
        let mut store = ResetStore::new_in_memory();
        store.schedule("zeta", hours(1), t0(), &[]);
        store.schedule("Alpha", hours(1), t0(), &[]);
        let names: Vec<_> = store.states().map(|s| s.world.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "zeta"]);
    }

    #[test]
    fn test_save_in_memory_fails() {
        let store = ResetStore::new_in_memory();
        assert!(matches!(store.save(), Err(ResetError::InMemoryStore)));
    }

    #[test]
    fn test_persistence_round_trip() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("worlds.json");

        {
            let mut store = ResetStore::new(&file);
            store.schedule("world_the_end", hours(24), t0(), &[hours(1)]);
            store.save().unwrap();
        }

        let store = ResetStore::load(&file).unwrap();
        let state = store.get("world_the_end").unwrap();
        assert_eq!(state.last_reset_at, t0());
        assert_eq!(state.pending_warnings, vec![3600]);
    }

    #[test]
    fn test_load_missing_file_creates_it() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("data").join("worlds.json");

        let store = ResetStore::load(&file).unwrap();

        assert!(store.is_empty());
        assert!(file.exists());
    }

    #[test]
    fn test_load_empty_file_returns_empty_store() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("worlds.json");
        fs::write(&file, "").unwrap();

        assert!(ResetStore::load(&file).unwrap().is_empty());
    }

    #[test]
    fn test_load_corrupt_json_backs_up_and_resets() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("worlds.json");
        fs::write(&file, "{not json").unwrap();

        let store = ResetStore::load(&file).unwrap();
        assert!(store.is_empty());

        let backups: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".err.json"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(
            fs::read_to_string(temp.path().join(&backups[0])).unwrap(),
            "{not json"
        );
        assert!(ResetStore::load(&file).unwrap().is_empty());
    }

    #[test]
    fn test_load_unsupported_version_returns_empty_store() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("worlds.json");
        fs::write(&file, r#"{"version":9,"worlds":{}}"#).unwrap();

        assert!(ResetStore::load(&file).unwrap().is_empty());
        assert!(fs::read_to_string(&file).unwrap().contains("\"version\":9"));
    }

    #[test]
    fn test_save_merged_applies_changes() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("worlds.json");
        let mut store = ResetStore::new(&file);
        store.schedule("end", hours(1), t0(), &[]);
        store.save().unwrap();

        let loaded = ResetStore::load(&file).unwrap();
        let mut ticked = loaded.clone();
        ticked.set_last_reset_for_test("end", t0() + chrono::Duration::hours(1));

        ticked.save_merged(&loaded, ["end"]).unwrap();

        let on_disk = ResetStore::load(&file).unwrap();
        assert_eq!(
            on_disk.get("end").unwrap().last_reset_at,
            t0() + chrono::Duration::hours(1)
        );
    }

    #[test]
    fn test_save_merged_keeps_concurrent_edits() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("worlds.json");
        let mut store = ResetStore::new(&file);
        store.schedule("end", hours(1), t0(), &[]);
        store.schedule("nether", hours(1), t0(), &[]);
        store.save().unwrap();

        let loaded = ResetStore::load(&file).unwrap();
        let mut ticked = loaded.clone();
        ticked.set_last_reset_for_test("end", t0() + chrono::Duration::hours(1));
        ticked.set_last_reset_for_test("nether", t0() + chrono::Duration::hours(1));

        // Another command edits the file while the tick runs.
        let mut other = ResetStore::load(&file).unwrap();
        other.unschedule("end");
        other.schedule("nether", hours(5), t0(), &[]);
        other.schedule("overworld", hours(2), t0(), &[]);
        other.save().unwrap();

        ticked.save_merged(&loaded, ["end", "nether"]).unwrap();

        let on_disk = ResetStore::load(&file).unwrap();
        assert!(on_disk.get("end").is_none());
        assert_eq!(on_disk.get("nether").unwrap().interval(), hours(5));
        assert_eq!(on_disk.get("nether").unwrap().last_reset_at, t0());
        assert!(on_disk.get("overworld").is_some());
    }
}

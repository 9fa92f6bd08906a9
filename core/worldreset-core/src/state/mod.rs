//! Reset registry: per-world schedules and their on-disk store.

mod store;
mod types;

pub use store::ResetStore;
pub use types::{RegionState, ScheduleOutcome, MAX_INTERVAL};

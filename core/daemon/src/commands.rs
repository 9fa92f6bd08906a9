//! One-shot commands: schedule, unschedule, list, worlds, sweep.
//!
//! Each command loads `config.yml` and `worlds.json` fresh, applies its
//! change and saves, so it is safe to run while the daemon is up.

use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use worldreset_core::config::{DataDir, Settings};
use worldreset_core::duration::{long_duration, short_duration, DurationBounds};
use worldreset_core::notify::LogNotifier;
use worldreset_core::regions::{discover_worlds, is_world_name, world_exists, RegionFileResetter};
use worldreset_core::scheduler::Scheduler;
use worldreset_core::state::{ResetStore, ScheduleOutcome, MAX_INTERVAL};
use worldreset_core::ResetError;

/// Shortest interval accepted on the command line.
pub const MIN_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Core(#[from] ResetError),

    #[error("{0} world reset(s) failed, see the log for details")]
    ResetsFailed(usize),
}

pub type CommandResult = Result<(), CommandError>;

/// Paths every command works against.
#[derive(Debug, Clone)]
pub struct Context {
    pub data: DataDir,
    pub worlds: PathBuf,
}

impl Context {
    fn settings(&self) -> Result<Settings, ResetError> {
        Settings::load(&self.data.config_file())
    }

    fn store(&self) -> Result<ResetStore, ResetError> {
        ResetStore::load(&self.data.worlds_file())
    }
}

pub fn schedule(ctx: &Context, world: &str, interval: Option<&str>) -> CommandResult {
    if !is_world_name(world.trim()) {
        return Err(ResetError::InvalidWorldName(world.to_string()).into());
    }
    if !world_exists(&ctx.worlds, world) {
        return Err(ResetError::UnknownWorld(world.to_string()).into());
    }

    let settings = ctx.settings()?;
    let interval = match interval {
        Some(raw) => DurationBounds::between(MIN_INTERVAL, MAX_INTERVAL)
            .parse(raw)
            .map_err(ResetError::from)?,
        None => settings.default_reset_interval,
    };

    let mut store = ctx.store()?;
    let outcome = store.schedule(world, interval, Utc::now(), &settings.broadcast_prior_reset);
    store.save()?;

    let verb = match outcome {
        ScheduleOutcome::Scheduled => "scheduled",
        ScheduleOutcome::Rescheduled => "rescheduled",
    };
    tracing::info!(world, interval_secs = interval.as_secs(), outcome = verb, "Schedule updated");
    println!(
        "World reset {} successfully. World {} will reset every {} ({}).",
        verb,
        world,
        short_duration(interval),
        long_duration(interval)
    );
    Ok(())
}

pub fn unschedule(ctx: &Context, world: &str) -> CommandResult {
    let mut store = ctx.store()?;
    if store.unschedule(world) {
        store.save()?;
        tracing::info!(world, "Schedule removed");
        println!("World {} has been unscheduled for reset.", world);
    } else {
        println!("World {} was not scheduled for reset.", world);
    }
    Ok(())
}

pub fn list(ctx: &Context) -> CommandResult {
    let store = ctx.store()?;
    if store.is_empty() {
        println!("There are no scheduled resets.");
        return Ok(());
    }

    let now = Utc::now();
    println!("Worlds scheduled to reset (world - next reset - interval):");
    for state in store.states() {
        let next = if state.is_due(now) {
            "due".to_string()
        } else {
            format!("in {}", short_duration(state.time_left(now)))
        };
        println!(
            "  {} - {} ({}) - {}",
            state.world,
            next,
            state.next_reset().format("%Y-%m-%d %H:%M:%S UTC"),
            short_duration(state.interval())
        );
    }
    Ok(())
}

pub fn worlds(ctx: &Context) -> CommandResult {
    let found = discover_worlds(&ctx.worlds)?;
    if found.is_empty() {
        println!("No worlds found in {}.", ctx.worlds.display());
        return Ok(());
    }

    let store = ctx.store()?;
    println!("Worlds in {} (* = scheduled):", ctx.worlds.display());
    for world in found {
        let mark = if store.get(&world).is_some() { "*" } else { " " };
        println!("  {} {}", mark, world);
    }
    Ok(())
}

/// Resets every due world now. Run it while the server is stopped.
pub fn sweep(ctx: &Context) -> CommandResult {
    let settings = ctx.settings()?;
    let mut store = ctx.store()?;
    let loaded = store.clone();
    let scheduler = Scheduler::new(settings, RegionFileResetter::new(&ctx.worlds), LogNotifier);

    let report = scheduler.sweep(&mut store, Utc::now());
    if report.changed() {
        store.save_merged(&loaded, report.touched())?;
    }

    for (world, summary) in &report.reset {
        println!(
            "Reset {}: {} region file(s) deleted, {} failed.",
            world, summary.deleted, summary.failed
        );
    }
    if report.reset.is_empty() && report.failed.is_empty() {
        println!("No worlds are due for reset.");
    }

    if report.failed.is_empty() {
        Ok(())
    } else {
        for (world, error) in &report.failed {
            eprintln!("Failed to reset {}: {}", world, error);
        }
        Err(CommandError::ResetsFailed(report.failed.len()))
    }
}

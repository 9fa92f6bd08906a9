//! Long-running reset loop.
//!
//! Ticks the scheduler every `audit-period` on a single-threaded runtime.
//! `worlds.json` is re-read at the start of every tick so one-shot commands
//! run from another shell take effect without a restart. Tick results are
//! merged into a fresh read before saving, so those commands' edits survive.
//!
//! Signals: Ctrl-C / SIGTERM stop after the current tick, SIGHUP reloads the
//! reloadable keys of `config.yml`.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::time::MissedTickBehavior;
use worldreset_core::config::{DataDir, Settings};
use worldreset_core::notify::{FanoutNotifier, FeedNotifier, LogNotifier};
use worldreset_core::regions::RegionFileResetter;
use worldreset_core::scheduler::Scheduler;
use worldreset_core::state::ResetStore;
use worldreset_core::Result;

type DaemonScheduler = Scheduler<RegionFileResetter, FanoutNotifier>;

pub fn run(data: &DataDir, worlds: &Path) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_loop(data, worlds.to_path_buf()))
}

fn build_scheduler(data: &DataDir, worlds: &Path, settings: Settings) -> DaemonScheduler {
    let mut notifier = FanoutNotifier::new().with(LogNotifier);
    if settings.broadcast_feed {
        notifier = notifier.with(FeedNotifier::new(data.feed_file()));
    }
    Scheduler::new(settings, RegionFileResetter::new(worlds), notifier)
}

async fn run_loop(data: &DataDir, worlds: PathBuf) -> Result<()> {
    data.ensure_exists()?;
    let settings = Settings::load(&data.config_file())?;
    let mut audit = tokio::time::interval(settings.audit_period);
    audit.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        data_dir = %data.root().display(),
        worlds = %worlds.display(),
        audit_period_secs = settings.audit_period.as_secs(),
        "Starting worldreset daemon"
    );

    let mut scheduler = build_scheduler(data, &worlds, settings);
    let mut hangup = SignalListener::hangup()?;
    let mut terminate = SignalListener::terminate()?;

    loop {
        tokio::select! {
            _ = audit.tick() => tick_once(&scheduler, data),
            _ = hangup.recv() => {
                match Settings::load(&data.config_file()) {
                    Ok(fresh) => {
                        let mut settings = scheduler.settings().clone();
                        settings.apply_reload(fresh);
                        scheduler = build_scheduler(data, &worlds, settings);
                        tracing::info!("Reloaded config");
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to reload config, keeping current"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
            _ = terminate.recv() => break,
        }
    }

    tracing::info!("Stopping worldreset daemon");
    Ok(())
}

fn tick_once(scheduler: &DaemonScheduler, data: &DataDir) {
    let mut store = match ResetStore::load(&data.worlds_file()) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load registry, skipping tick");
            return;
        }
    };

    let loaded = store.clone();
    let report = scheduler.tick(&mut store, Utc::now());
    if report.changed() {
        if let Err(e) = store.save_merged(&loaded, report.touched()) {
            tracing::error!(error = %e, "Failed to save registry");
        }
    }
}

/// A Unix signal stream; never fires on other platforms.
struct SignalListener {
    #[cfg(unix)]
    inner: tokio::signal::unix::Signal,
}

impl SignalListener {
    #[cfg(unix)]
    fn hangup() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(SignalListener {
            inner: signal(SignalKind::hangup())?,
        })
    }

    #[cfg(unix)]
    fn terminate() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(SignalListener {
            inner: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    fn hangup() -> std::io::Result<Self> {
        Ok(SignalListener {})
    }

    #[cfg(not(unix))]
    fn terminate() -> std::io::Result<Self> {
        Ok(SignalListener {})
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        {
            self.inner.recv().await;
        }
        #[cfg(not(unix))]
        {
            std::future::pending::<()>().await;
        }
    }
}

//! `worldreset` -- timed resets of the outer terrain of server worlds.
//!
//! ## Usage
//!
//! ```bash
//! worldreset --worlds /srv/mc schedule world_the_end 30d
//! worldreset --worlds /srv/mc list
//! worldreset --worlds /srv/mc sweep   # before starting the server
//! worldreset --worlds /srv/mc run     # alongside the server
//! ```
//!
//! # Environment variables
//!
//! | Variable              | Default                        | Description                 |
//! |-----------------------|--------------------------------|-----------------------------|
//! | `WORLDRESET_DATA_DIR` | `<platform data dir>/worldreset` | config, registry, feed, logs |
//! | `WORLDRESET_WORLDS`   | `.`                            | world container directory   |
//! | `RUST_LOG`            | `worldreset=info,worldreset_core=info` | log filter          |

mod commands;
mod daemon;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use worldreset_core::config::DataDir;

use commands::{CommandError, Context};

#[derive(Parser)]
#[command(name = "worldreset")]
#[command(version, about = "Schedules resets of the outer regions of server worlds")]
struct Cli {
    /// Directory holding config.yml, worlds.json, the broadcast feed and logs
    #[arg(long, env = "WORLDRESET_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// World container: the directory with one folder per world
    #[arg(long, env = "WORLDRESET_WORLDS", default_value = ".", global = true)]
    worlds: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule (or reschedule) periodic resets of a world
    Schedule {
        world: String,
        /// Reset interval, e.g. 30d or 12h (defaults to default-reset-interval)
        interval: Option<String>,
    },
    /// Stop resetting a world
    Unschedule { world: String },
    /// Show scheduled resets
    List,
    /// Show worlds found in the world container
    Worlds,
    /// Reset every due world now and exit
    Sweep,
    /// Run the reset daemon until interrupted
    Run,
}

fn main() {
    let cli = Cli::parse();

    let data = match cli.data_dir {
        Some(dir) => DataDir::new(dir),
        None => match DataDir::from_default() {
            Ok(data) => data,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    };

    let guard = logging::init(
        &data.root().join("logs"),
        matches!(cli.command, Commands::Run),
    );

    let ctx = Context {
        data,
        worlds: cli.worlds,
    };

    let result = match &cli.command {
        Commands::Schedule { world, interval } => {
            commands::schedule(&ctx, world, interval.as_deref())
        }
        Commands::Unschedule { world } => commands::unschedule(&ctx, world),
        Commands::List => commands::list(&ctx),
        Commands::Worlds => commands::worlds(&ctx),
        Commands::Sweep => commands::sweep(&ctx),
        Commands::Run => daemon::run(&ctx.data, &ctx.worlds).map_err(CommandError::from),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        // exit() skips destructors; flush the log writer first.
        drop(guard);
        std::process::exit(1);
    }
}

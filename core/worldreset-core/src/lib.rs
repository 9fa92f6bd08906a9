//! Core library for worldreset: timed resets of the outer terrain of
//! block-game worlds.
//!
//! - [`state`]: the per-world reset registry and its `worlds.json` store
//! - [`scheduler`]: decides which worlds are due and which warnings go out
//! - [`regions`]: deletes outer region files, discovers worlds
//! - [`notify`]: warning sinks
//! - [`config`]: `config.yml` and the data directory layout
//! - [`duration`]: the `30d` / `1h30m` duration grammar

pub mod config;
pub mod duration;
pub mod error;
pub mod notify;
pub mod regions;
pub mod scheduler;
pub mod state;

pub use error::{ResetError, Result};

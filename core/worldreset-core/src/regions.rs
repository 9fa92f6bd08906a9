//! Filesystem side of a reset.
//!
//! Worlds are directories under the world container. Terrain is stored in
//! region files named `r.<x>.<z>.mca` (in `region/`, `DIM-1/region/`,
//! `DIM1/region/` ...). A reset deletes every region file except the four
//! that meet at the origin, so spawn terrain survives and everything else
//! regenerates the next time the server loads the world.

use fs_err as fs;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{ResetError, Result};

static REGION_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^r\.(-?\d+)\.(-?\d+)\.mca$").expect("region pattern is valid"));

/// True for region files other than `r.0.0`, `r.0.-1`, `r.-1.0` and `r.-1.-1`.
pub fn is_outer_region(file_name: &str) -> bool {
    let Some(caps) = REGION_FILE.captures(file_name) else {
        return false;
    };
    let inner = |coord: &str| coord == "0" || coord == "-1";
    !(inner(&caps[1]) && inner(&caps[2]))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetSummary {
    pub deleted: usize,
    pub failed: usize,
}

/// Performs the reset of one world.
pub trait RegionResetter {
    fn reset(&self, world: &str) -> Result<ResetSummary>;
}

/// Deletes outer region files below `<world_container>/<world>`.
#[derive(Debug, Clone)]
pub struct RegionFileResetter {
    world_container: PathBuf,
}

impl RegionFileResetter {
    pub fn new(world_container: impl Into<PathBuf>) -> Self {
        RegionFileResetter {
            world_container: world_container.into(),
        }
    }

    pub fn world_container(&self) -> &Path {
        &self.world_container
    }
}

impl RegionResetter for RegionFileResetter {
    fn reset(&self, world: &str) -> Result<ResetSummary> {
        if !is_world_name(world) {
            return Err(ResetError::InvalidWorldName(world.to_string()));
        }
        let folder = self.world_container.join(world);
        let mut summary = ResetSummary::default();

        if !folder.is_dir() {
            tracing::warn!(world, folder = %folder.display(), "World folder missing, nothing to reset");
            return Ok(summary);
        }

        for entry in WalkDir::new(&folder) {
            let entry = match entry {
                Ok(entry) => entry,
                // The root itself failing means the world can't be reset at all.
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(world, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            let is_target = entry.file_name().to_str().is_some_and(is_outer_region);
            if !is_target {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => summary.deleted += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(world, error = %e, "Failed to delete region file");
                }
            }
        }

        tracing::debug!(
            world,
            deleted = summary.deleted,
            failed = summary.failed,
            "Deleted outer regions"
        );
        Ok(summary)
    }
}

/// True if `name` is a single plain folder name, so joining it onto the
/// container can never leave the container.
pub fn is_world_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// True if `<world_container>/<name>` is a directory.
pub fn world_exists(world_container: &Path, name: &str) -> bool {
    let name = name.trim();
    is_world_name(name) && world_container.join(name).is_dir()
}

/// Names of the sub-directories of the container that hold a `level.dat`.
pub fn discover_worlds(world_container: &Path) -> Result<Vec<String>> {
    let mut worlds: Vec<String> = fs::read_dir(world_container)?
        .flatten()
        .filter(|entry| entry.path().join("level.dat").is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    worlds.sort_unstable_by_key(|name| name.to_lowercase());
    Ok(worlds)
}

use std::env;
use std::fs;
use std::path::{self, PathBuf};

use crate::error::{HarnessError, HarnessResult};

/// Environment variable pointing at the root of an EPICS base installation.
pub const EPICS_BASE_ENV: &str = "EPICS_BASE";

const SOFTIOC_BINARY: &str = if cfg!(windows) { "softIoc.exe" } else { "softIoc" };

/// Find the path to the database definitions directory, based on the environment.
///
/// If `EPICS_BASE` is set, the `dbd` subdirectory of it is returned without
/// checking that it exists. Otherwise the `softIoc` binary is searched for on
/// `PATH` and the `dbd` directory is derived from its install layout
/// (`<prefix>/bin/softIoc` -> `<prefix>/dbd`).
pub fn find_dbd_path() -> HarnessResult<PathBuf> {
    if let Some(base) = env::var_os(EPICS_BASE_ENV) {
        return Ok(PathBuf::from(base).join("dbd"));
    }

    let softioc = find_on_path(SOFTIOC_BINARY).ok_or(HarnessError::DbdPathNotFound)?;
    let dbd = softioc
        .parent()
        .and_then(|bin| bin.parent())
        .map(|base| base.join("dbd"))
        .ok_or(HarnessError::DbdPathNotFound)?;

    // Prefer the canonical form; if the directory does not exist yet,
    // absolutize lexically (existence is checked at spawn time).
    Ok(fs::canonicalize(&dbd).or_else(|_| path::absolute(&dbd))?)
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

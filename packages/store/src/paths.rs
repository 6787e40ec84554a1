#![allow(clippy::module_name_repetitions)]
//! Canonical file paths inside a harvest output folder.

use std::path::{Path, PathBuf};

/// File name of the record store snapshot.
pub const SNAPSHOT_FILE_NAME: &str = "crawler_status.json";

/// Returns the snapshot path for an output folder.
#[must_use]
pub fn snapshot_path(folder: &Path) -> PathBuf {
    folder.join(SNAPSHOT_FILE_NAME)
}

/// Returns the temporary path a snapshot is written to before it replaces
/// the real one.
#[must_use]
pub fn snapshot_tmp_path(folder: &Path) -> PathBuf {
    folder.join(format!("{SNAPSHOT_FILE_NAME}.tmp"))
}

/// Returns the `imgs/` directory holding cached thumbnails.
#[must_use]
pub fn images_dir(folder: &Path) -> PathBuf {
    folder.join("imgs")
}

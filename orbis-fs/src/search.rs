//! Path validation and locating extracted games on disk.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::paths::path_to_utf8_string;

/// Longest accepted path, in encoded units.
#[cfg(windows)]
pub const MAX_PATH: usize = 260;
#[cfg(not(windows))]
pub const MAX_PATH: usize = 1024;

/// `false` for empty paths and paths of `MAX_PATH` units or more.
pub fn validate_path(path: &Path) -> bool {
    if path.as_os_str().is_empty() {
        tracing::error!("input path is empty");
        return false;
    }

    #[cfg(windows)]
    let len = {
        use std::os::windows::ffi::OsStrExt;
        path.as_os_str().encode_wide().count()
    };
    #[cfg(not(windows))]
    let len = path.as_os_str().len();

    if len >= MAX_PATH {
        tracing::error!(path = %path_to_utf8_string(path), "input path is too long");
        return false;
    }
    true
}

/// Search `dir` up to `max_depth` levels down for directories named `game_id`
/// that hold `sce_sys/param.sfo` and `eboot.bin`, yielding the executable
/// paths lazily in traversal order.
pub fn find_game_by_id(
    dir: impl AsRef<Path>,
    game_id: &str,
    max_depth: usize,
) -> impl Iterator<Item = PathBuf> {
    let game_id = game_id.to_owned();
    WalkDir::new(dir.as_ref())
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(move |entry| entry.file_type().is_dir() && entry.file_name() == game_id.as_str())
        .filter(|entry| entry.path().join("sce_sys").join("param.sfo").is_file())
        .map(|entry| entry.path().join("eboot.bin"))
        .filter(|eboot| eboot.is_file())
}

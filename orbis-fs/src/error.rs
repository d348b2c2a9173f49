//! Error types for user-path handling

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("failed to create {path:?}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0:?} is not a directory")]
    NotADirectory(PathBuf),

    #[error("no user directory: neither XDG_DATA_HOME nor HOME is set")]
    NoHomeDirectory,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

//! User data directories, path validation and on-disk game lookup.

pub mod error;
pub mod paths;
pub mod search;

pub use error::PathError;
pub use paths::{PathType, UserPaths, path_to_utf8_string};
pub use search::{MAX_PATH, find_game_by_id, validate_path};

//! Options structs for opening and extracting packages.
//!
//! Both derive a builder; `Default` gives the settings used by the CLI.

use derive_builder::Builder;

use crate::structs::DEFAULT_MAX_ENTRIES;

/// Options applied while parsing the header and tables.
#[derive(Debug, Clone, Builder)]
#[builder(default, setter(into))]
pub struct OpenOptions {
    /// Largest `entry_count` accepted before anything is allocated for it.
    pub max_entries: u32,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Options applied while extracting entries.
#[derive(Debug, Clone, Builder)]
#[builder(default, setter(into))]
pub struct ExtractOptions {
    /// Compare each entry against its digest-table slot.
    pub verify_digests: bool,
    /// Create the extraction root if it does not exist.
    pub create_root: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            verify_digests: true,
            create_root: true,
        }
    }
}

//! CNT game package handling
//!
//! This crate opens encrypted game packages, resolves their entry table and
//! title metadata, and extracts entries to disk. Entry data may be
//! AES-128-CBC encrypted, zlib compressed, or both; every extracted file is
//! checked against the package's digest table before it is written.

pub mod bytes;
pub mod crypto;
pub mod entries;
pub mod error;
pub mod extract;
pub mod handle;
pub mod header;
pub mod options;
pub mod package;
pub mod pipeline;
pub mod sfo;
pub mod structs;

// Re-export main types for convenience
pub use error::{EntryError, MetadataError, OutOfRange, PkgError};
pub use extract::{CollisionWarning, EntryStatus, ExtractionPlan, ExtractionReport, Extractor};
pub use handle::PkgHandle;
pub use options::{ExtractOptions, ExtractOptionsBuilder, OpenOptions, OpenOptionsBuilder};
pub use package::{Package, UNKNOWN_TITLE_ID};
pub use sfo::{MetadataTable, PropertyValue};
pub use structs::{EntryDescriptor, EntryKind, PackageHeader, WellKnownEntry};

#[cfg(test)]
mod fixture;

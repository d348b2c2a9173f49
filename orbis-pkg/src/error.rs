//! Error types for package operations

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A read that would go past the end of the underlying buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("read of {len} bytes at {offset:#x} exceeds buffer of {size} bytes")]
pub struct OutOfRange {
    pub offset: u64,
    pub len: u64,
    pub size: u64,
}

/// Errors that abort opening (or addressing) a package.
#[derive(Debug, Error)]
pub enum PkgError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("not a package: bad magic {found:#010x}")]
    BadMagic { found: u32 },

    #[error("corrupt package: truncated {what}")]
    Truncated { what: &'static str },

    #[error("corrupt package: {what} out of bounds")]
    InvalidOffsets { what: &'static str },

    #[error("entry count {count} exceeds limit of {max}")]
    TooManyEntries { count: u32, max: u32 },

    #[error(transparent)]
    OutOfRange(#[from] OutOfRange),

    #[error("invalid UTF-8 in entry name at index {0}")]
    InvalidEntryName(usize),

    #[error("package has not been opened")]
    NotOpened,

    #[error("no extraction root set, call extract first")]
    NoExtractRoot,

    #[error("entry index {0} out of range")]
    EntryIndex(usize),

    #[error("entry #{index}: {source}")]
    Entry {
        index: usize,
        #[source]
        source: EntryError,
    },
}

/// Errors confined to a single entry. These never abort a whole extraction.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    OutOfRange(#[from] OutOfRange),

    #[error("unsupported key slot {slot} for encryption scheme {scheme}")]
    UnsupportedKeySlot { scheme: u8, slot: u8 },

    #[error("encrypted data is not block-aligned (size {size} is not a multiple of 16)")]
    Misaligned { size: u64 },

    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("decompressed data exceeds declared size of {declared} bytes")]
    OverLengthDecompression { declared: u64 },

    #[error("decompression failed: {0}")]
    Decompress(#[source] io::Error),

    #[error("digest mismatch")]
    Integrity,

    #[error("refusing to write outside the output root: {0:?}")]
    UnsafePath(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from the embedded property block.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("truncated property block")]
    Truncated,

    #[error("malformed property block: {0}")]
    BadFormat(String),

    #[error("missing property {0}")]
    MissingProperty(&'static str),

    #[error("package has no readable metadata entry")]
    Unavailable,

    #[error("metadata entry: {0}")]
    Entry(#[from] EntryError),
}

impl From<OutOfRange> for MetadataError {
    fn from(_: OutOfRange) -> Self {
        Self::Truncated
    }
}

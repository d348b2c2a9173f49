//! Opened package: parsed header, entry table and metadata over a read-only
//! byte source.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use memmap2::Mmap;

use crate::bytes::ByteReader;
use crate::entries::parse_entries;
use crate::error::{EntryError, MetadataError, PkgError};
use crate::extract::Extractor;
use crate::header::parse_header;
use crate::options::OpenOptions;
use crate::pipeline::process_entry;
use crate::sfo::MetadataTable;
use crate::structs::{EntryDescriptor, EntryKind, PackageHeader, WellKnownEntry};

/// Title id used when neither the metadata nor the file name yields one.
pub const UNKNOWN_TITLE_ID: &str = "UNKNOWN";

/// A parsed package.
///
/// The byte source is never written after [`Package::from_bytes`] returns, so
/// a `Package` can be shared across threads; every read is positional.
///
/// ```ignore
/// let pkg = Package::open("game.pkg")?;
/// println!("{} has {} entries", pkg.resolved_title_id(), pkg.number_of_files());
///
/// let report = pkg.extractor("out/CUSA00001").extract_all();
/// if !report.is_success() {
///     eprintln!("{}", report.reason());
/// }
/// ```
pub struct Package<B> {
    source: B,
    header: PackageHeader,
    entries: Vec<EntryDescriptor>,
    metadata: Option<MetadataTable>,
    origin: Option<PathBuf>,
    locks: PathLocks,
}

impl Package<Mmap> {
    /// Memory-map and parse the package at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PkgError> {
        Self::open_with(path, &OpenOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self, PkgError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: the map is only ever read. Truncating the file from another
        // process while it is open is outside what this reader supports.
        let map = unsafe { Mmap::map(&file)? };

        let mut package = Self::from_bytes_with(map, options)?;
        package.origin = Some(path.to_path_buf());
        Ok(package)
    }
}

impl<B: AsRef<[u8]>> Package<B> {
    pub fn from_bytes(source: B) -> Result<Self, PkgError> {
        Self::from_bytes_with(source, &OpenOptions::default())
    }

    /// Parse the header and tables of an in-memory package.
    ///
    /// Fails only for header or table corruption. An unreadable metadata
    /// block is logged and leaves [`Package::metadata`] empty.
    pub fn from_bytes_with(source: B, options: &OpenOptions) -> Result<Self, PkgError> {
        let bytes = source.as_ref();
        let header = parse_header(bytes, options)?;
        let entries = parse_entries(&ByteReader::new(bytes), &header)?;

        let mut package = Self {
            source,
            header,
            entries,
            metadata: None,
            origin: None,
            locks: PathLocks::default(),
        };

        match package.load_metadata() {
            Ok(table) => package.metadata = Some(table),
            Err(e) => tracing::warn!(error = %e, "package metadata unavailable"),
        }

        Ok(package)
    }

    // -- accessors ----------------------------------------------------------

    pub const fn header(&self) -> &PackageHeader {
        &self.header
    }

    /// Descriptors in file order.
    pub fn entries(&self) -> &[EntryDescriptor] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Result<&EntryDescriptor, PkgError> {
        self.entries.get(index).ok_or(PkgError::EntryIndex(index))
    }

    pub fn number_of_files(&self) -> usize {
        self.entries.len()
    }

    pub fn find_entry(&self, wk: WellKnownEntry) -> Option<&EntryDescriptor> {
        self.entries
            .iter()
            .find(|e| e.kind == EntryKind::WellKnown(wk))
    }

    pub fn metadata(&self) -> Option<&MetadataTable> {
        self.metadata.as_ref()
    }

    /// Path the package was opened from, if any.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn reader(&self) -> ByteReader<'_> {
        ByteReader::new(self.source.as_ref())
    }

    // -- title id -----------------------------------------------------------

    /// `TITLE_ID` from the metadata block.
    pub fn title_id(&self) -> Result<&str, MetadataError> {
        self.metadata
            .as_ref()
            .ok_or(MetadataError::Unavailable)?
            .title_id()
    }

    /// [`Self::title_id`], falling back to the content id's title segment,
    /// then the package file stem.
    pub fn resolved_title_id(&self) -> Cow<'_, str> {
        if let Ok(id) = self.title_id() {
            return Cow::Borrowed(id);
        }
        if let Some(id) = self.header.content_title_id() {
            return Cow::Borrowed(id);
        }
        self.origin
            .as_deref()
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy())
            .unwrap_or(Cow::Borrowed(UNKNOWN_TITLE_ID))
    }

    // -- entry data ---------------------------------------------------------

    /// Decrypted, decompressed and verified content of entry `index`.
    pub fn read_entry(&self, index: usize) -> Result<Vec<u8>, PkgError> {
        let entry = self.entry(index)?;
        self.read_descriptor(entry, true)
            .map_err(|source| PkgError::Entry { index, source })
    }

    pub(crate) fn read_descriptor(
        &self,
        entry: &EntryDescriptor,
        verify_digest: bool,
    ) -> Result<Vec<u8>, EntryError> {
        process_entry(&self.reader(), &self.header, entry, verify_digest)
    }

    /// Extraction into `root` with default options.
    pub fn extractor(&self, root: impl Into<PathBuf>) -> Extractor<'_, B> {
        Extractor::new(self, root)
    }

    pub(crate) const fn locks(&self) -> &PathLocks {
        &self.locks
    }

    fn load_metadata(&self) -> Result<MetadataTable, MetadataError> {
        let entry = self
            .find_entry(WellKnownEntry::ParamSfo)
            .ok_or(MetadataError::Unavailable)?;
        let block = self.read_descriptor(entry, true)?;
        MetadataTable::parse(&block)
    }
}

impl<B> core::fmt::Debug for Package<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Package")
            .field("header", &self.header)
            .field("entry_count", &self.entries.len())
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// One lock per resolved output path, so concurrent writers to the same file
/// are serialized.
#[derive(Debug, Default)]
pub(crate) struct PathLocks {
    inner: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    pub(crate) fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(path.to_path_buf()).or_default())
    }
}

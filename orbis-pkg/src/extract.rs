//! Writing entries to disk.
//!
//! Entries are extracted in file order. Each file is written to a temporary
//! sibling and renamed over the target, so a failed entry never leaves a
//! partial file behind. Two entries that resolve to the same path are both
//! written in order, so the last one written wins, and reported as a
//! collision naming the entry that was kept.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::PoisonError;

use tempfile::NamedTempFile;

use crate::error::{EntryError, PkgError};
use crate::options::ExtractOptions;
use crate::package::Package;
use crate::structs::EntryDescriptor;

// ---------------------------------------------------------------------------
// Plan and report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Extracted,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PlannedEntry {
    pub index: usize,
    /// Sanitized path relative to the root; `None` if the name is unsafe.
    pub path: Option<PathBuf>,
    pub status: EntryStatus,
}

/// Two entries resolving to the same output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionWarning {
    pub path: PathBuf,
    /// The earlier entry in file order.
    pub first: usize,
    /// The later entry in file order.
    pub second: usize,
    /// The last entry on `path` that was actually written, filled in after a
    /// run. `None` if none of them were.
    pub kept: Option<usize>,
}

/// Output paths and statuses for one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionPlan {
    entries: Vec<PlannedEntry>,
    collisions: Vec<CollisionWarning>,
}

impl ExtractionPlan {
    pub fn new(entries: &[EntryDescriptor]) -> Self {
        let mut seen: HashMap<PathBuf, usize> = HashMap::new();
        let mut collisions = Vec::new();

        let entries = entries
            .iter()
            .map(|entry| {
                let path = sanitize(&entry.relative_path()).ok();
                if let Some(path) = &path {
                    if let Some(first) = seen.insert(path.clone(), entry.index) {
                        collisions.push(CollisionWarning {
                            path: path.clone(),
                            first,
                            second: entry.index,
                            kept: None,
                        });
                    }
                }
                PlannedEntry {
                    index: entry.index,
                    path,
                    status: EntryStatus::Pending,
                }
            })
            .collect();

        Self {
            entries,
            collisions,
        }
    }

    pub fn entries(&self) -> &[PlannedEntry] {
        &self.entries
    }

    pub fn collisions(&self) -> &[CollisionWarning] {
        &self.collisions
    }

    fn set_status(&mut self, index: usize, status: EntryStatus) {
        if let Some(planned) = self.entries.get_mut(index) {
            planned.status = status;
        }
    }

    /// Record which entry's content is on disk for every collision.
    fn resolve_collisions(&mut self) {
        for c in &mut self.collisions {
            c.kept = self
                .entries
                .iter()
                .rev()
                .find(|e| e.status == EntryStatus::Extracted && e.path.as_ref() == Some(&c.path))
                .map(|e| e.index);
        }
    }
}

#[derive(Debug)]
pub struct EntryFailure {
    pub index: usize,
    pub name: String,
    pub error: EntryError,
}

/// Outcome of extracting a whole package.
#[derive(Debug)]
pub struct ExtractionReport {
    pub root: PathBuf,
    pub plan: ExtractionPlan,
    pub failures: Vec<EntryFailure>,
}

impl ExtractionReport {
    /// `true` when every entry was written.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn collisions(&self) -> &[CollisionWarning] {
        self.plan.collisions()
    }

    pub fn extracted_count(&self) -> usize {
        self.plan
            .entries()
            .iter()
            .filter(|e| e.status == EntryStatus::Extracted)
            .count()
    }

    /// One line per failed entry; empty on success.
    pub fn reason(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("entry #{} ({}): {}", f.index, f.name, f.error))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Extracts entries of one package below `root`.
///
/// [`Extractor::extract_one`] takes `&self` and may be called from several
/// threads for different indices.
pub struct Extractor<'a, B> {
    package: &'a Package<B>,
    root: PathBuf,
    options: ExtractOptions,
}

impl<'a, B: AsRef<[u8]>> Extractor<'a, B> {
    pub fn new(package: &'a Package<B>, root: impl Into<PathBuf>) -> Self {
        Self {
            package,
            root: root.into(),
            options: ExtractOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn plan(&self) -> ExtractionPlan {
        ExtractionPlan::new(self.package.entries())
    }

    /// Extract every entry, calling `progress(done, total)` after each one.
    pub fn run(&self, mut progress: impl FnMut(usize, usize)) -> ExtractionReport {
        let mut plan = self.plan();
        let mut failures = Vec::new();

        let total = self.package.number_of_files();
        for (done, entry) in self.package.entries().iter().enumerate() {
            match self.extract_entry(entry) {
                Ok(path) => {
                    tracing::debug!(index = entry.index, path = %path.display(), "extracted entry");
                    plan.set_status(entry.index, EntryStatus::Extracted);
                }
                Err(error) => {
                    tracing::error!(
                        index = entry.index,
                        name = %entry.name(),
                        error = %error,
                        "failed to extract entry"
                    );
                    plan.set_status(entry.index, EntryStatus::Failed(error.to_string()));
                    failures.push(EntryFailure {
                        index: entry.index,
                        name: entry.name().into_owned(),
                        error,
                    });
                }
            }
            progress(done + 1, total);
        }

        plan.resolve_collisions();
        for c in plan.collisions() {
            tracing::warn!(
                path = %c.path.display(),
                first = c.first,
                second = c.second,
                kept = ?c.kept,
                "entries share an output path"
            );
        }

        ExtractionReport {
            root: self.root.clone(),
            plan,
            failures,
        }
    }

    pub fn extract_all(&self) -> ExtractionReport {
        self.run(|_, _| {})
    }

    /// Extract a single entry and return the path written.
    pub fn extract_one(&self, index: usize) -> Result<PathBuf, PkgError> {
        let entry = self.package.entry(index)?;
        self.extract_entry(entry)
            .map_err(|source| PkgError::Entry { index, source })
    }

    fn extract_entry(&self, entry: &EntryDescriptor) -> Result<PathBuf, EntryError> {
        let target = self.root.join(sanitize(&entry.relative_path())?);

        if !self.options.create_root && !self.root.is_dir() {
            return Err(EntryError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("output root {} does not exist", self.root.display()),
            )));
        }

        let data = self
            .package
            .read_descriptor(entry, self.options.verify_digests)?;

        let lock = self.package.locks().lock_for(&target);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        write_atomic(&target, &data)?;

        Ok(target)
    }
}

/// Reject absolute paths and `..`; drop `.` components.
fn sanitize(relative: &Path) -> Result<PathBuf, EntryError> {
    let mut out = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(EntryError::UnsafePath(relative.to_path_buf()));
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(EntryError::UnsafePath(relative.to_path_buf()));
    }
    Ok(out)
}

fn write_atomic(target: &Path, data: &[u8]) -> io::Result<()> {
    let parent = target.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "output path has no parent")
    })?;
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

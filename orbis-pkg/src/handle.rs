//! Stateful handle over an optionally-opened package.
//!
//! Mirrors the open → query → extract flow of a front end: the handle starts
//! empty, [`PkgHandle::open`] loads a package, [`PkgHandle::extract`] records
//! the output root so single entries can be extracted afterwards.

use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::PkgError;
use crate::extract::ExtractionReport;
use crate::options::{ExtractOptions, OpenOptions};
use crate::package::Package;

#[derive(Debug, Default)]
pub struct PkgHandle {
    package: Option<Package<Mmap>>,
    extract_root: Option<PathBuf>,
    open_options: OpenOptions,
    extract_options: ExtractOptions,
}

impl PkgHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(open_options: OpenOptions, extract_options: ExtractOptions) -> Self {
        Self {
            open_options,
            extract_options,
            ..Self::default()
        }
    }

    /// Open `path`, replacing any previously opened package.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), PkgError> {
        let path = path.as_ref();
        self.package = None;
        self.extract_root = None;

        let package = Package::open_with(path, &self.open_options)?;
        tracing::info!(
            path = %path.display(),
            entries = package.number_of_files(),
            "opened package"
        );
        self.package = Some(package);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.package.is_some()
    }

    pub fn package(&self) -> Result<&Package<Mmap>, PkgError> {
        self.package.as_ref().ok_or(PkgError::NotOpened)
    }

    /// Title id with the content-id and file-name fallbacks applied.
    pub fn title_id(&self) -> Result<String, PkgError> {
        Ok(self.package()?.resolved_title_id().into_owned())
    }

    pub fn number_of_files(&self) -> Result<usize, PkgError> {
        Ok(self.package()?.number_of_files())
    }

    pub fn extract_root(&self) -> Option<&Path> {
        self.extract_root.as_deref()
    }

    /// Extract every entry into `dest` and remember it as the output root.
    pub fn extract(&mut self, dest: impl Into<PathBuf>) -> Result<ExtractionReport, PkgError> {
        self.extract_with_progress(dest, |_, _| {})
    }

    /// [`Self::extract`], calling `progress(done, total)` after each entry.
    pub fn extract_with_progress(
        &mut self,
        dest: impl Into<PathBuf>,
        progress: impl FnMut(usize, usize),
    ) -> Result<ExtractionReport, PkgError> {
        let dest = dest.into();
        let package = self.package.as_ref().ok_or(PkgError::NotOpened)?;

        let report = package
            .extractor(&dest)
            .with_options(self.extract_options.clone())
            .run(progress);

        self.extract_root = Some(dest);
        Ok(report)
    }

    /// Extract entry `index` into the root set by [`Self::extract`].
    pub fn extract_file(&self, index: usize) -> Result<PathBuf, PkgError> {
        let package = self.package()?;
        let root = self.extract_root.as_ref().ok_or(PkgError::NoExtractRoot)?;
        package
            .extractor(root)
            .with_options(self.extract_options.clone())
            .extract_one(index)
    }
}

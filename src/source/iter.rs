//! Enumerable sources: directories, CSV listings and glob expressions.
//!
//! None of these read anything at construction. `into_children` opens the
//! underlying listing and returns a lazy `Children` iterator; every entry is
//! handed back to the factory, so children may themselves be enumerable.

use std::fs::File;
use std::path::{Path, PathBuf};

use super::{Source, SourceFactory};
use crate::classify;
use crate::error::{Result, SourceError};
use crate::resolve::ResolvedInput;

type Entries = Box<dyn Iterator<Item = Result<String>>>;

/// Lazy, forward-only sequence of child sources.
///
/// An entry that cannot be resolved or constructed is yielded as `Err` and
/// iteration continues with the next entry.
pub struct Children {
    parent: String,
    factory: SourceFactory,
    entries: Entries,
    yielded: u64,
}

impl Children {
    fn new(parent: &ResolvedInput, factory: SourceFactory, entries: Entries) -> Self {
        Self {
            parent: parent.local_reference().to_string(),
            factory,
            entries,
            yielded: 0,
        }
    }

    /// Reference of the enumerable source these children came from.
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Number of entries produced so far, failed ones included.
    pub fn yielded(&self) -> u64 {
        self.yielded
    }
}

impl Iterator for Children {
    type Item = Result<Source>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        self.yielded += 1;
        let child = entry.and_then(|descriptor| self.factory.create(&descriptor));
        if let Err(err) = &child {
            log::debug!("child {} of {}: {}", self.yielded, self.parent, err);
        }
        Some(child)
    }
}

impl std::fmt::Debug for Children {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Children")
            .field("parent", &self.parent)
            .field("yielded", &self.yielded)
            .finish()
    }
}

fn path_descriptor(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}

// ---- Directory ----

/// Immediate entries of a directory, in filesystem order. Not recursive;
/// sub-directories come back as `Directory` children.
#[derive(Debug)]
pub struct DirectorySource {
    resolved: ResolvedInput,
    factory: SourceFactory,
}

impl DirectorySource {
    pub fn new(resolved: ResolvedInput, factory: SourceFactory) -> Self {
        Self { resolved, factory }
    }

    pub fn resolved(&self) -> &ResolvedInput {
        &self.resolved
    }

    pub fn into_children(self) -> Result<Children> {
        let listing = std::fs::read_dir(self.resolved.local_path())?;
        let entries: Entries = Box::new(listing.map(|entry| {
            entry
                .map(|entry| path_descriptor(entry.path()))
                .map_err(SourceError::from)
        }));
        Ok(Children::new(&self.resolved, self.factory, entries))
    }
}

// ---- CSV ----

/// One descriptor per row, taken from the first field. Rows are streamed;
/// the file is never loaded whole.
#[derive(Debug)]
pub struct CsvSource {
    resolved: ResolvedInput,
    factory: SourceFactory,
}

impl CsvSource {
    pub fn new(resolved: ResolvedInput, factory: SourceFactory) -> Self {
        Self { resolved, factory }
    }

    pub fn resolved(&self) -> &ResolvedInput {
        &self.resolved
    }

    pub fn into_children(self) -> Result<Children> {
        let reader = open_csv(&self.resolved.local_path())
            .map_err(|err| malformed(&self.resolved, err))?;
        let entries: Entries = Box::new(reader.into_records().map(|record| {
            let record = record.map_err(|err| SourceError::read_failure(err.to_string()))?;
            Ok(record.get(0).unwrap_or_default().trim().to_string())
        }));
        Ok(Children::new(&self.resolved, self.factory, entries))
    }
}

fn open_csv(path: &Path) -> std::result::Result<csv::Reader<File>, csv::Error> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
}

// ---- Glob ----

/// Files matching the pattern inside a `glob(...)` wrapper.
#[derive(Debug)]
pub struct GlobSource {
    resolved: ResolvedInput,
    factory: SourceFactory,
}

impl GlobSource {
    pub fn new(resolved: ResolvedInput, factory: SourceFactory) -> Self {
        Self { resolved, factory }
    }

    pub fn resolved(&self) -> &ResolvedInput {
        &self.resolved
    }

    /// The bare pattern, without the `glob(...)` wrapper.
    pub fn pattern(&self) -> Option<&str> {
        classify::glob_pattern(self.resolved.local_reference())
    }

    pub fn into_children(self) -> Result<Children> {
        let pattern = self
            .pattern()
            .ok_or_else(|| malformed(&self.resolved, "expected glob(<pattern>)"))?;
        let paths = glob::glob(pattern).map_err(|err| malformed(&self.resolved, err))?;
        let entries: Entries = Box::new(paths.map(|path| {
            path.map(path_descriptor)
                .map_err(|err| SourceError::Io(err.into_error()))
        }));
        Ok(Children::new(&self.resolved, self.factory, entries))
    }
}

fn malformed(resolved: &ResolvedInput, reason: impl ToString) -> SourceError {
    SourceError::MalformedPattern {
        descriptor: resolved.raw().to_string(),
        reason: reason.to_string(),
    }
}

//! Descriptor resolution.
//!
//! `Resolver::resolve` turns a raw descriptor into a `ResolvedInput`: a local
//! reference (downloading remote content first, see `fetch`) tagged with
//! exactly one `SourceKind`.
//!
//! Classification order is fixed because the predicates overlap at the
//! string level (a `.csv` path is also a file):
//! 1. regular file: image, then video, then point cloud, then CSV
//! 2. existing path: directory
//! 3. lexical forms: network stream, screenshot token, glob expression

pub mod fetch;

use std::fmt;
use std::path::PathBuf;

use crate::classify;
use crate::config::SourceConfig;
use crate::error::{Result, SourceError};

pub use fetch::Downloader;

/// Closed set of source kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    ImageFile,
    PointCloudFile,
    VideoFile,
    VideoStream,
    Screenshot,
    Directory,
    CsvFile,
    GlobPattern,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::ImageFile => "image-file",
            SourceKind::PointCloudFile => "point-cloud-file",
            SourceKind::VideoFile => "video-file",
            SourceKind::VideoStream => "video-stream",
            SourceKind::Screenshot => "screenshot",
            SourceKind::Directory => "directory",
            SourceKind::CsvFile => "csv-file",
            SourceKind::GlobPattern => "glob-pattern",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The raw string a caller supplied. Never modified after construction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceDescriptor(String);

impl SourceDescriptor {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A descriptor with its canonical local reference and its single kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedInput {
    raw: SourceDescriptor,
    local_reference: String,
    kind: SourceKind,
}

impl ResolvedInput {
    pub fn raw(&self) -> &SourceDescriptor {
        &self.raw
    }

    /// Path or URI the source actually reads from. Equal to the raw
    /// descriptor unless a download happened.
    pub fn local_reference(&self) -> &str {
        &self.local_reference
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn local_path(&self) -> PathBuf {
        PathBuf::from(&self.local_reference)
    }

    /// True when the local reference is a cached download.
    pub fn was_fetched(&self) -> bool {
        self.raw.as_str() != self.local_reference
    }
}

/// Resolves descriptors against the filesystem and the download cache.
#[derive(Clone)]
pub struct Resolver {
    downloader: Downloader,
}

impl Resolver {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            downloader: Downloader::new(config),
        }
    }

    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    pub fn resolve(&self, descriptor: &str) -> Result<ResolvedInput> {
        let raw = SourceDescriptor::new(descriptor);
        let local_reference = if classify::is_url(descriptor) {
            let path = self.downloader.fetch(descriptor)?;
            path.to_string_lossy().into_owned()
        } else {
            descriptor.to_string()
        };

        let kind = classify_reference(&local_reference)?;
        log::debug!("resolved '{}' as {} ({})", raw, kind, local_reference);
        Ok(ResolvedInput {
            raw,
            local_reference,
            kind,
        })
    }
}

/// Assign exactly one kind to a local reference, in fixed precedence.
pub fn classify_reference(reference: &str) -> Result<SourceKind> {
    let kind = if classify::is_file(reference) {
        if classify::is_image(reference) {
            Some(SourceKind::ImageFile)
        } else if classify::is_video(reference) {
            Some(SourceKind::VideoFile)
        } else if classify::is_point_cloud(reference) {
            Some(SourceKind::PointCloudFile)
        } else if classify::is_csv(reference) {
            Some(SourceKind::CsvFile)
        } else {
            None
        }
    } else if classify::is_path(reference) {
        Some(SourceKind::Directory)
    } else if classify::is_network_stream(reference) {
        Some(SourceKind::VideoStream)
    } else if classify::is_screenshot_token(reference) {
        Some(SourceKind::Screenshot)
    } else if classify::is_glob_expression(reference) {
        Some(SourceKind::GlobPattern)
    } else {
        None
    };

    kind.ok_or_else(|| SourceError::Unclassified {
        reference: reference.to_string(),
    })
}

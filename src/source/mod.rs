//! Source construction.
//!
//! `SourceFactory::create` resolves a descriptor and maps its kind onto
//! exactly one `Source` variant. The mapping is a single exhaustive match, so
//! a new `SourceKind` cannot compile until it has a source.
//!
//! Sources fall into three families:
//! - single unit: `ImageFileSource`, `PointCloudFileSource`
//! - enumerable: `DirectorySource`, `CsvSource`, `GlobSource`
//! - streaming: `VideoFileSource`, `VideoStreamSource`, `ScreenshotSource`

pub mod file;
pub mod iter;

use std::sync::Arc;

use crate::config::SourceConfig;
use crate::error::Result;
use crate::ingest::{ScreenshotSource, StreamSource, VideoFileSource, VideoStreamSource};
use crate::resolve::{ResolvedInput, Resolver, SourceKind};

pub use file::{ImageFileSource, PointCloudFileSource};
pub use iter::{Children, CsvSource, DirectorySource, GlobSource};

/// A constructed input of one of the supported kinds.
#[derive(Debug)]
pub enum Source {
    Image(ImageFileSource),
    PointCloud(PointCloudFileSource),
    Directory(DirectorySource),
    Csv(CsvSource),
    Glob(GlobSource),
    Video(VideoFileSource),
    VideoStream(VideoStreamSource),
    Screenshot(ScreenshotSource),
}

impl Source {
    pub fn resolved(&self) -> &ResolvedInput {
        match self {
            Source::Image(source) => source.resolved(),
            Source::PointCloud(source) => source.resolved(),
            Source::Directory(source) => source.resolved(),
            Source::Csv(source) => source.resolved(),
            Source::Glob(source) => source.resolved(),
            Source::Video(source) => source.resolved(),
            Source::VideoStream(source) => source.resolved(),
            Source::Screenshot(source) => source.resolved(),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.resolved().kind()
    }

    pub fn is_enumerable(&self) -> bool {
        matches!(
            self,
            Source::Directory(_) | Source::Csv(_) | Source::Glob(_)
        )
    }

    /// Streaming capability, for video files, network streams and screens.
    pub fn as_stream_mut(&mut self) -> Option<&mut dyn StreamSource> {
        match self {
            Source::Video(source) => Some(source),
            Source::VideoStream(source) => Some(source),
            Source::Screenshot(source) => Some(source),
            _ => None,
        }
    }

    /// Start enumerating children. `None` for sources that are not
    /// enumerable; `Some(Err(_))` when the listing cannot be opened.
    pub fn into_children(self) -> Option<Result<Children>> {
        match self {
            Source::Directory(source) => Some(source.into_children()),
            Source::Csv(source) => Some(source.into_children()),
            Source::Glob(source) => Some(source.into_children()),
            _ => None,
        }
    }

    /// Release any capture handle this source holds. No-op for sources
    /// without one; safe to call more than once.
    pub fn release(&mut self) {
        if let Some(stream) = self.as_stream_mut() {
            stream.release();
        }
    }
}

/// Builds sources from descriptors.
///
/// Cloning is cheap; enumerable sources keep a clone to build their children.
#[derive(Clone)]
pub struct SourceFactory {
    config: Arc<SourceConfig>,
    resolver: Resolver,
}

impl SourceFactory {
    pub fn new(config: SourceConfig) -> Self {
        let resolver = Resolver::new(&config);
        Self {
            config: Arc::new(config),
            resolver,
        }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolve `descriptor` and build its source with configured intervals.
    pub fn create(&self, descriptor: &str) -> Result<Source> {
        let resolved = self.resolver.resolve(descriptor)?;
        self.build(resolved)
    }

    /// Like `create`, with `interval` overriding the configured one for
    /// streaming sources. Ignored by other kinds.
    pub fn create_with_interval(&self, descriptor: &str, interval: i64) -> Result<Source> {
        let resolved = self.resolver.resolve(descriptor)?;
        self.build_with(resolved, Some(interval))
    }

    pub fn build(&self, resolved: ResolvedInput) -> Result<Source> {
        self.build_with(resolved, None)
    }

    fn build_with(&self, resolved: ResolvedInput, interval: Option<i64>) -> Result<Source> {
        let config = self.config.as_ref();
        log::debug!(
            "building {} source for {}",
            resolved.kind(),
            resolved.local_reference()
        );
        let source = match resolved.kind() {
            SourceKind::ImageFile => Source::Image(ImageFileSource::new(resolved)),
            SourceKind::PointCloudFile => Source::PointCloud(PointCloudFileSource::new(resolved)),
            SourceKind::Directory => Source::Directory(DirectorySource::new(resolved, self.clone())),
            SourceKind::CsvFile => Source::Csv(CsvSource::new(resolved, self.clone())),
            SourceKind::GlobPattern => Source::Glob(GlobSource::new(resolved, self.clone())),
            SourceKind::VideoFile => Source::Video(VideoFileSource::open(
                resolved,
                interval.unwrap_or(config.frame_interval),
                config,
            )?),
            SourceKind::VideoStream => Source::VideoStream(VideoStreamSource::open(
                resolved,
                interval.unwrap_or(config.live_interval_ms),
                config,
            )?),
            SourceKind::Screenshot => Source::Screenshot(ScreenshotSource::open(
                resolved,
                interval.unwrap_or(config.live_interval_ms),
                config,
            )?),
        };
        Ok(source)
    }
}

impl std::fmt::Debug for SourceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFactory")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use image::RgbImage;

    fn factory(root: &std::path::Path) -> SourceFactory {
        SourceFactory::new(SourceConfig::isolated(root))
    }

    #[test]
    fn create_maps_each_static_kind() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("a.png");
        RgbImage::new(2, 2).save(&image).unwrap();
        let cloud = dir.path().join("b.pcd");
        std::fs::write(&cloud, b"VERSION .7").unwrap();
        let listing = dir.path().join("c.csv");
        std::fs::write(&listing, b"a.png\n").unwrap();
        let factory = factory(dir.path());

        let cases = [
            (image.to_str().unwrap().to_string(), SourceKind::ImageFile),
            (cloud.to_str().unwrap().to_string(), SourceKind::PointCloudFile),
            (listing.to_str().unwrap().to_string(), SourceKind::CsvFile),
            (dir.path().to_str().unwrap().to_string(), SourceKind::Directory),
            ("glob(*.png)".to_string(), SourceKind::GlobPattern),
        ];
        for (descriptor, kind) in cases {
            let source = factory.create(&descriptor).unwrap();
            assert_eq!(source.kind(), kind, "{}", descriptor);
            assert_eq!(source.resolved().raw().as_str(), descriptor);
        }
    }

    #[test]
    fn unclassified_descriptor_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        assert!(matches!(
            factory.create("definitely/not/here.xyz"),
            Err(SourceError::Unclassified { .. })
        ));
    }

    #[test]
    fn invalid_interval_fails_before_opening() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        for descriptor in ["rtsp://127.0.0.1/cam", "screen:0"] {
            assert!(matches!(
                factory.create_with_interval(descriptor, 0),
                Err(SourceError::InvalidInterval(0))
            ));
        }
    }

    #[test]
    fn non_streaming_sources_have_no_stream_view() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path());
        let mut source = factory.create(dir.path().to_str().unwrap()).unwrap();
        assert!(source.is_enumerable());
        assert!(source.as_stream_mut().is_none());
        source.release();
        assert!(source.into_children().is_some());
    }
}

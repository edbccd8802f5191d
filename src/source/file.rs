//! Single-unit sources: image files and point cloud files.

use std::path::PathBuf;
use std::time::Duration;

use image::ImageError;

use crate::error::{Result, SourceError};
use crate::frame::Frame;
use crate::resolve::{ResolvedInput, SourceKind};

/// A still image, decoded on first access and kept for the source's lifetime.
#[derive(Debug)]
pub struct ImageFileSource {
    resolved: ResolvedInput,
    decoded: Option<Frame>,
}

impl ImageFileSource {
    pub fn new(resolved: ResolvedInput) -> Self {
        Self {
            resolved,
            decoded: None,
        }
    }

    pub fn resolved(&self) -> &ResolvedInput {
        &self.resolved
    }

    pub fn path(&self) -> PathBuf {
        self.resolved.local_path()
    }

    pub fn is_decoded(&self) -> bool {
        self.decoded.is_some()
    }

    /// The decoded image. Decodes once; later calls return the cached frame.
    pub fn data(&mut self) -> Result<&Frame> {
        if self.decoded.is_none() {
            let frame = decode_image(self.path())?;
            log::debug!(
                "decoded {} ({}x{})",
                self.resolved.local_reference(),
                frame.width,
                frame.height
            );
            self.decoded = Some(frame);
        }
        self.decoded
            .as_ref()
            .ok_or_else(|| SourceError::read_failure("decoded image missing from cache"))
    }
}

fn decode_image(path: PathBuf) -> Result<Frame> {
    if !path.is_file() {
        return Err(SourceError::NotFound(path));
    }
    match image::open(&path) {
        Ok(image) => Ok(Frame::from_rgb_image(image.to_rgb8(), Duration::ZERO)),
        Err(ImageError::IoError(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(SourceError::NotFound(path))
        }
        Err(err) => Err(SourceError::Decode {
            path,
            reason: err.to_string(),
        }),
    }
}

/// Point cloud file. Recognised so that `.pcd` inputs classify, but no
/// decoder exists; every access fails with `UnsupportedKind`.
#[derive(Debug)]
pub struct PointCloudFileSource {
    resolved: ResolvedInput,
}

impl PointCloudFileSource {
    pub fn new(resolved: ResolvedInput) -> Self {
        Self { resolved }
    }

    pub fn resolved(&self) -> &ResolvedInput {
        &self.resolved
    }

    pub fn data(&mut self) -> Result<&Frame> {
        Err(SourceError::UnsupportedKind {
            kind: SourceKind::PointCloudFile,
            reference: self.resolved.local_reference().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::resolve::Resolver;
    use image::{Rgb, RgbImage};

    #[test]
    fn image_decodes_once_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.png");
        RgbImage::from_pixel(3, 2, Rgb([9, 8, 7])).save(&path).unwrap();
        let config = SourceConfig::isolated(dir.path());
        let resolved = Resolver::new(&config)
            .resolve(path.to_str().unwrap())
            .unwrap();

        let mut source = ImageFileSource::new(resolved);
        assert!(!source.is_decoded());
        let frame = source.data().unwrap().clone();
        assert_eq!((frame.width, frame.height), (3, 2));
        assert_eq!(&frame.pixels()[..3], &[9, 8, 7]);

        // Removing the file does not matter once decoded.
        std::fs::remove_file(&path).unwrap();
        assert_eq!(source.data().unwrap(), &frame);
    }

    #[test]
    fn image_removed_before_decode_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.png");
        RgbImage::new(1, 1).save(&path).unwrap();
        let config = SourceConfig::isolated(dir.path());
        let resolved = Resolver::new(&config)
            .resolve(path.to_str().unwrap())
            .unwrap();
        std::fs::remove_file(&path).unwrap();

        let mut source = ImageFileSource::new(resolved);
        assert!(matches!(source.data(), Err(SourceError::NotFound(_))));
    }

    #[test]
    fn truncated_image_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        let mut bytes = std::io::Cursor::new(Vec::new());
        RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 7 + y * 13) as u8, (x * y) as u8, (x ^ y) as u8]))
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        let bytes = bytes.into_inner();
        // Header intact so it classifies as an image; pixel data cut short.
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        let config = SourceConfig::isolated(dir.path());
        let resolved = Resolver::new(&config)
            .resolve(path.to_str().unwrap())
            .unwrap();

        let mut source = ImageFileSource::new(resolved);
        assert!(matches!(source.data(), Err(SourceError::Decode { .. })));
    }

    #[test]
    fn point_cloud_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pcd");
        std::fs::write(&path, b"VERSION .7").unwrap();
        let config = SourceConfig::isolated(dir.path());
        let resolved = Resolver::new(&config)
            .resolve(path.to_str().unwrap())
            .unwrap();

        let mut source = PointCloudFileSource::new(resolved);
        assert!(matches!(
            source.data(),
            Err(SourceError::UnsupportedKind {
                kind: SourceKind::PointCloudFile,
                ..
            })
        ));
    }
}

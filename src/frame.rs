//! Decoded frame container.
//!
//! - `Frame`: packed RGB8 pixels plus dimensions and a capture timestamp.
//!
//! Frames are produced by static image sources and streaming sources. This
//! layer never persists them, except when a slice is taken with `save`
//! requested; see `Frame::save_jpeg`.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use image::{ImageFormat, RgbImage};

use crate::error::{Result, SourceError};

/// Bytes per packed RGB pixel.
pub const RGB_CHANNELS: usize = 3;

/// One decoded image unit.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Media time for file sources, time since the Unix epoch for live sources.
    timestamp: Duration,
}

impl Frame {
    /// Build a frame from packed RGB8 pixels.
    ///
    /// Fails with `ReadFailure` when the buffer length does not match the
    /// dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp: Duration) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(RGB_CHANNELS))
            .ok_or_else(|| SourceError::read_failure("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(SourceError::read_failure(format!(
                "frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            timestamp,
        })
    }

    pub(crate) fn from_rgb_image(image: RgbImage, timestamp: Duration) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            timestamp,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.data
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Copy into an `image` buffer for callers that want the `image` API.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Encode the frame as JPEG at `path`.
    pub fn save_jpeg(&self, path: &Path) -> Result<()> {
        let image = self.to_rgb_image().ok_or_else(|| SourceError::Persist {
            path: path.to_path_buf(),
            reason: "pixel buffer does not match dimensions".to_string(),
        })?;
        image
            .save_with_format(path, ImageFormat::Jpeg)
            .map_err(|e| SourceError::Persist {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

// Pixel data is left out so logging a frame stays cheap.
impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("timestamp", &self.timestamp)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Wall-clock timestamp for live captures.
pub(crate) fn wall_clock_now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

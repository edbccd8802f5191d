//! Synthetic capture device.
//!
//! Generates patterned frames in memory. A clip has a fixed frame count and
//! frame rate, so it carries a media clock like a decoded video file; a live
//! feed never ends and stamps frames with wall-clock time. Raw buffers are
//! produced in the configured `PixelFormat` and normalised to RGB, the way a
//! real grabber's output is.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::normalize::PixelFormat;
use super::CaptureDevice;
use crate::error::{Result, SourceError};
use crate::frame::{wall_clock_now, Frame};

#[derive(Clone, Copy, Debug)]
enum Mode {
    Clip { frame_count: u64, fps: u32 },
    Live,
}

pub struct SyntheticCapture {
    mode: Mode,
    width: u32,
    height: u32,
    format: PixelFormat,
    next_index: u64,
    /// Simulated scene state, changes every 50 frames.
    scene_state: u8,
    fail_after: Option<u64>,
    releases: Arc<AtomicUsize>,
}

impl SyntheticCapture {
    /// Finite clip of `frame_count` frames at `fps` (minimum 1).
    pub fn clip(frame_count: u64, fps: u32, width: u32, height: u32) -> Self {
        Self::new(
            Mode::Clip {
                frame_count,
                fps: fps.max(1),
            },
            width,
            height,
        )
    }

    /// Endless feed without a media clock.
    pub fn live(width: u32, height: u32) -> Self {
        Self::new(Mode::Live, width, height)
    }

    fn new(mode: Mode, width: u32, height: u32) -> Self {
        Self {
            mode,
            width,
            height,
            format: PixelFormat::Rgb24,
            next_index: 0,
            scene_state: 0,
            fail_after: None,
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Produce raw buffers in `format` instead of packed RGB.
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Fail every read once `frames` frames have been produced.
    pub fn failing_after(mut self, frames: u64) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Number of times `release` has run on this device.
    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.releases)
    }

    fn media_time(&self, index: u64) -> Option<Duration> {
        match self.mode {
            Mode::Clip { fps, .. } => Some(Duration::from_nanos(
                index.saturating_mul(1_000_000_000) / u64::from(fps),
            )),
            Mode::Live => None,
        }
    }

    fn generate_pixels(&mut self) -> Result<Vec<u8>> {
        let byte_count = self.format.buffer_len(self.width, self.height)?;
        if self.next_index > 0 && self.next_index % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; byte_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.next_index + self.scene_state as u64) % 256) as u8;
        }
        Ok(pixels)
    }
}

impl CaptureDevice for SyntheticCapture {
    fn describe(&self) -> String {
        match self.mode {
            Mode::Clip { frame_count, fps } => {
                format!("synthetic clip, {} frames at {} fps", frame_count, fps)
            }
            Mode::Live => "synthetic live feed".to_string(),
        }
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        if self.fail_after.is_some_and(|limit| self.next_index >= limit) {
            return Err(SourceError::read_failure("synthetic capture failure"));
        }
        let timestamp = match self.mode {
            Mode::Clip { frame_count, .. } if self.next_index >= frame_count => return Ok(None),
            Mode::Clip { .. } => self.media_time(self.next_index).unwrap_or_default(),
            Mode::Live => wall_clock_now(),
        };
        let raw = self.generate_pixels()?;
        self.next_index += 1;
        Frame::from_pixel_format(&raw, self.width, self.height, self.format, timestamp).map(Some)
    }

    fn position(&self) -> Option<Duration> {
        self.media_time(self.next_index)
    }

    fn skip(&mut self, frames: u32) -> Result<()> {
        let target = self.next_index.saturating_add(u64::from(frames));
        self.next_index = match self.mode {
            Mode::Clip { frame_count, .. } => target.min(frame_count),
            Mode::Live => target,
        };
        Ok(())
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

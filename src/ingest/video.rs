//! Local video file source.
//!
//! `VideoFileSource` decodes a local file through a seekable capture device.
//! Slicing and continuous iteration advance by `interval` frames, so the
//! number of frames returned for a window depends only on the window, the
//! interval and the file's frame rate.

use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "video-ffmpeg")]
use super::file_ffmpeg::FfmpegCapture;
use super::{
    slice_media_time, CaptureDevice, CaptureHandle, CaptureStats, Interval, StreamSource,
    StreamState,
};
use crate::config::SourceConfig;
use crate::error::Result;
use crate::frame::Frame;
use crate::resolve::ResolvedInput;

pub struct VideoFileSource {
    resolved: ResolvedInput,
    interval: Interval,
    capture_dir: PathBuf,
    handle: CaptureHandle,
}

impl VideoFileSource {
    /// Open the file with the compiled-in decoder.
    pub fn open(resolved: ResolvedInput, interval: i64, config: &SourceConfig) -> Result<Self> {
        let interval = Interval::new(interval)?;
        let device = open_decoder(&resolved)?;
        Ok(Self::assemble(resolved, interval, config, device))
    }

    /// Use a caller-provided capture device instead of the built-in decoder.
    pub fn with_device(
        resolved: ResolvedInput,
        interval: i64,
        config: &SourceConfig,
        device: Box<dyn CaptureDevice>,
    ) -> Result<Self> {
        let interval = Interval::new(interval)?;
        Ok(Self::assemble(resolved, interval, config, device))
    }

    fn assemble(
        resolved: ResolvedInput,
        interval: Interval,
        config: &SourceConfig,
        device: Box<dyn CaptureDevice>,
    ) -> Self {
        let handle = CaptureHandle::open(resolved.local_reference(), false, device);
        Self {
            resolved,
            interval,
            capture_dir: config.capture_dir.clone(),
            handle,
        }
    }

    /// Media time of the next frame.
    pub fn position(&self) -> Option<Duration> {
        self.handle.position()
    }
}

#[cfg(feature = "video-ffmpeg")]
fn open_decoder(resolved: &ResolvedInput) -> Result<Box<dyn CaptureDevice>> {
    Ok(Box::new(FfmpegCapture::open(resolved.local_reference())?))
}

#[cfg(not(feature = "video-ffmpeg"))]
fn open_decoder(resolved: &ResolvedInput) -> Result<Box<dyn CaptureDevice>> {
    Err(crate::error::SourceError::acquisition(
        resolved.local_reference(),
        "video decoding requires the video-ffmpeg feature",
    ))
}

impl StreamSource for VideoFileSource {
    fn resolved(&self) -> &ResolvedInput {
        &self.resolved
    }

    fn interval(&self) -> Interval {
        self.interval
    }

    fn set_interval(&mut self, value: i64) -> Result<()> {
        self.interval = Interval::new(value)?;
        Ok(())
    }

    fn state(&self) -> StreamState {
        self.handle.state()
    }

    fn capture(&mut self) -> Result<Frame> {
        self.handle.capture()
    }

    fn advance(&mut self) -> Result<()> {
        self.handle.skip(self.interval.get() - 1)
    }

    fn slice(&mut self, duration: Duration, save: bool) -> Result<Vec<Frame>> {
        let save_dir = save.then_some(self.capture_dir.as_path());
        slice_media_time(&mut self.handle, self.interval, duration, save_dir)
    }

    fn release(&mut self) {
        self.handle.release();
    }

    fn stats(&self) -> CaptureStats {
        self.handle.stats()
    }
}

impl std::fmt::Debug for VideoFileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFileSource")
            .field("reference", &self.resolved.local_reference())
            .field("interval", &self.interval)
            .field("state", &self.handle.state())
            .finish()
    }
}

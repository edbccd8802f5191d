//! Network video stream source.
//!
//! `VideoStreamSource` reads `rtsp://` and `rtmp://` streams. A live stream
//! has no reliable media clock, so slices are bounded by wall-clock time and
//! the interval is a pause in milliseconds between captures. A read failure
//! ends the slice with that error; no reconnection is attempted.

use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "stream-gstreamer")]
use super::stream_gstreamer::GstreamerCapture;
use super::{
    slice_wall_clock, CaptureDevice, CaptureHandle, CaptureStats, Interval, StreamSource,
    StreamState,
};
use crate::config::SourceConfig;
use crate::error::Result;
use crate::frame::Frame;
use crate::resolve::ResolvedInput;

pub struct VideoStreamSource {
    resolved: ResolvedInput,
    interval: Interval,
    capture_dir: PathBuf,
    handle: CaptureHandle,
}

impl VideoStreamSource {
    /// Connect to the stream. Fails fast if the pipeline cannot be started.
    pub fn open(resolved: ResolvedInput, interval: i64, config: &SourceConfig) -> Result<Self> {
        let interval = Interval::new(interval)?;
        let device = connect(&resolved, config)?;
        Ok(Self::assemble(resolved, interval, config, device))
    }

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
        let handle = CaptureHandle::open(resolved.local_reference(), true, device);
        Self {
            resolved,
            interval,
            capture_dir: config.capture_dir.clone(),
            handle,
        }
    }
}

#[cfg(feature = "stream-gstreamer")]
fn connect(resolved: &ResolvedInput, config: &SourceConfig) -> Result<Box<dyn CaptureDevice>> {
    Ok(Box::new(GstreamerCapture::open_uri(
        resolved.local_reference(),
        config.read_timeout,
    )?))
}

#[cfg(not(feature = "stream-gstreamer"))]
fn connect(resolved: &ResolvedInput, _config: &SourceConfig) -> Result<Box<dyn CaptureDevice>> {
    Err(crate::error::SourceError::acquisition(
        resolved.local_reference(),
        "network streams require the stream-gstreamer feature",
    ))
}

impl StreamSource for VideoStreamSource {
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
        std::thread::sleep(self.interval.as_millis());
        Ok(())
    }

    fn slice(&mut self, duration: Duration, save: bool) -> Result<Vec<Frame>> {
        let save_dir = save.then_some(self.capture_dir.as_path());
        slice_wall_clock(&mut self.handle, self.interval.as_millis(), duration, save_dir)
    }

    fn release(&mut self) {
        self.handle.release();
    }

    fn stats(&self) -> CaptureStats {
        self.handle.stats()
    }
}

impl std::fmt::Debug for VideoStreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoStreamSource")
            .field("reference", &self.resolved.local_reference())
            .field("interval", &self.interval)
            .field("state", &self.handle.state())
            .finish()
    }
}

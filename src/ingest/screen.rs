//! Periodic screenshot source for `screen:<index>` tokens.

use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "stream-gstreamer")]
use super::stream_gstreamer::GstreamerCapture;
use super::{
    slice_wall_clock, CaptureDevice, CaptureHandle, CaptureStats, Interval, StreamSource,
    StreamState,
};
use crate::classify;
use crate::config::SourceConfig;
use crate::error::{Result, SourceError};
use crate::frame::Frame;
use crate::resolve::ResolvedInput;

pub struct ScreenshotSource {
    resolved: ResolvedInput,
    monitor: u32,
    interval: Interval,
    capture_dir: PathBuf,
    handle: CaptureHandle,
}

impl ScreenshotSource {
    pub fn open(resolved: ResolvedInput, interval: i64, config: &SourceConfig) -> Result<Self> {
        let interval = Interval::new(interval)?;
        let monitor = monitor_index(&resolved)?;
        let device = grab_monitor(&resolved, monitor, config)?;
        Ok(Self::assemble(resolved, monitor, interval, config, device))
    }

    pub fn with_device(
        resolved: ResolvedInput,
        interval: i64,
        config: &SourceConfig,
        device: Box<dyn CaptureDevice>,
    ) -> Result<Self> {
        let interval = Interval::new(interval)?;
        let monitor = monitor_index(&resolved)?;
        Ok(Self::assemble(resolved, monitor, interval, config, device))
    }

    fn assemble(
        resolved: ResolvedInput,
        monitor: u32,
        interval: Interval,
        config: &SourceConfig,
        device: Box<dyn CaptureDevice>,
    ) -> Self {
        let handle = CaptureHandle::open(resolved.local_reference(), true, device);
        Self {
            resolved,
            monitor,
            interval,
            capture_dir: config.capture_dir.clone(),
            handle,
        }
    }

    pub fn monitor(&self) -> u32 {
        self.monitor
    }
}

fn monitor_index(resolved: &ResolvedInput) -> Result<u32> {
    classify::screen_index(resolved.local_reference()).ok_or_else(|| {
        SourceError::acquisition(resolved.local_reference(), "not a screen:<index> token")
    })
}

#[cfg(feature = "stream-gstreamer")]
fn grab_monitor(
    _resolved: &ResolvedInput,
    monitor: u32,
    config: &SourceConfig,
) -> Result<Box<dyn CaptureDevice>> {
    Ok(Box::new(GstreamerCapture::open_screen(
        monitor,
        config.read_timeout,
    )?))
}

#[cfg(not(feature = "stream-gstreamer"))]
fn grab_monitor(
    resolved: &ResolvedInput,
    _monitor: u32,
    _config: &SourceConfig,
) -> Result<Box<dyn CaptureDevice>> {
    Err(SourceError::acquisition(
        resolved.local_reference(),
        "screen capture requires the stream-gstreamer feature",
    ))
}

impl StreamSource for ScreenshotSource {
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

impl std::fmt::Debug for ScreenshotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenshotSource")
            .field("monitor", &self.monitor)
            .field("interval", &self.interval)
            .field("state", &self.handle.state())
            .finish()
    }
}

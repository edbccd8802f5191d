//! Streaming sources.
//!
//! This module provides the sources backed by a capture handle:
//! - `VideoFileSource`: local video files (feature: video-ffmpeg)
//! - `VideoStreamSource`: `rtsp://` / `rtmp://` streams (feature: stream-gstreamer)
//! - `ScreenshotSource`: periodic monitor capture (feature: stream-gstreamer)
//! - `SyntheticCapture`: in-memory device for tests and dry runs
//!
//! Every streaming source owns exactly one `CaptureDevice`. The handle is
//! acquired at construction (failing fast), and released exactly once:
//! either by `release()` or when the source is dropped, whichever comes
//! first. Releasing twice is a no-op.
//!
//! State machine: `Open` → `Exhausted` when a finite capture runs out of
//! frames (video files only), and `Open`/`Exhausted` → `Closed` on release.
//! Live captures never become `Exhausted`; an unexpected end is a read
//! failure.

#[cfg(feature = "video-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod normalize;
pub mod screen;
pub mod stream;
#[cfg(feature = "stream-gstreamer")]
pub(crate) mod stream_gstreamer;
pub mod synthetic;
pub mod video;

use std::iter::FusedIterator;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{Result, SourceError};
use crate::frame::Frame;
use crate::resolve::ResolvedInput;

pub use normalize::PixelFormat;
pub use screen::ScreenshotSource;
pub use stream::VideoStreamSource;
pub use synthetic::SyntheticCapture;
pub use video::VideoFileSource;

/// Strictly positive capture step.
///
/// Video files read it as a frame count; live sources as milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval(NonZeroU32);

impl Interval {
    pub fn new(value: i64) -> Result<Self> {
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Interval)
            .ok_or(SourceError::InvalidInterval(value))
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    pub(crate) fn as_millis(self) -> Duration {
        Duration::from_millis(u64::from(self.get()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Exhausted,
    Closed,
}

/// Statistics for a streaming source.
#[derive(Clone, Debug)]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub reference: String,
}

/// External capture handle (decoder, pipeline, screen grabber).
///
/// Implementations are owned by exactly one source and are never shared.
pub trait CaptureDevice {
    /// Short identity for logs.
    fn describe(&self) -> String;

    /// Read the next frame. `Ok(None)` means the capture has no more frames.
    fn read(&mut self) -> Result<Option<Frame>>;

    /// Media time of the next frame, for captures that have one.
    fn position(&self) -> Option<Duration> {
        None
    }

    /// Drop `frames` frames without returning them.
    fn skip(&mut self, frames: u32) -> Result<()> {
        for _ in 0..frames {
            if self.read()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Release the underlying handle. Called at most once.
    fn release(&mut self);
}

/// Capability shared by video files, network streams and screens.
pub trait StreamSource {
    fn resolved(&self) -> &ResolvedInput;

    fn interval(&self) -> Interval;

    /// Change the capture step. Zero or negative values fail with
    /// `InvalidInterval` and leave the current step in place.
    fn set_interval(&mut self, value: i64) -> Result<()>;

    fn state(&self) -> StreamState;

    /// Capture the next frame.
    ///
    /// Fails with `EndOfStream` once a video file is exhausted, `Closed`
    /// after release, or `ReadFailure` when the device errors.
    fn capture(&mut self) -> Result<Frame>;

    /// Step taken between two captures of continuous iteration.
    fn advance(&mut self) -> Result<()>;

    /// Capture frames for a bounded window. With `save`, every frame is also
    /// written to the capture directory as `<timestamp-ms>.jpg`.
    fn slice(&mut self, duration: Duration, save: bool) -> Result<Vec<Frame>>;

    /// Release the capture handle. Idempotent.
    fn release(&mut self);

    fn stats(&self) -> CaptureStats;

    /// Continuous iteration. Not restartable.
    fn frames(&mut self) -> Frames<'_>
    where
        Self: Sized,
    {
        Frames::new(self)
    }
}

/// Blocking pull over a streaming source.
///
/// Yields `Ok(frame)` per capture and ends with `None` at end of stream. A
/// read failure is yielded once as `Err` and ends the iteration; the source
/// itself stays releasable.
pub struct Frames<'a> {
    source: &'a mut dyn StreamSource,
    started: bool,
    finished: bool,
}

impl<'a> Frames<'a> {
    pub fn new(source: &'a mut dyn StreamSource) -> Self {
        Self {
            source,
            started: false,
            finished: false,
        }
    }
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.started {
            if let Err(err) = self.source.advance() {
                self.finished = true;
                if err.is_end_of_stream() {
                    return None;
                }
                return Some(Err(err));
            }
        }
        self.started = true;

        match self.source.capture() {
            Ok(frame) => Some(Ok(frame)),
            Err(err) => {
                self.finished = true;
                if err.is_end_of_stream() {
                    None
                } else {
                    Some(Err(err))
                }
            }
        }
    }
}

impl FusedIterator for Frames<'_> {}

/// Owned capture device plus the open/exhausted/closed state machine.
pub(crate) struct CaptureHandle {
    reference: String,
    live: bool,
    device: Option<Box<dyn CaptureDevice>>,
    state: StreamState,
    frames_captured: u64,
}

impl CaptureHandle {
    pub(crate) fn open(reference: &str, live: bool, device: Box<dyn CaptureDevice>) -> Self {
        log::info!("capture opened: {} ({})", reference, device.describe());
        Self {
            reference: reference.to_string(),
            live,
            device: Some(device),
            state: StreamState::Open,
            frames_captured: 0,
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        self.state
    }

    pub(crate) fn capture(&mut self) -> Result<Frame> {
        match self.state {
            StreamState::Closed => return Err(SourceError::Closed),
            StreamState::Exhausted => return Err(SourceError::EndOfStream),
            StreamState::Open => {}
        }
        let device = self.device.as_mut().ok_or(SourceError::Closed)?;
        match device.read()? {
            Some(frame) => {
                self.frames_captured += 1;
                Ok(frame)
            }
            None if self.live => Err(SourceError::read_failure(format!(
                "live capture {} ended unexpectedly",
                self.reference
            ))),
            None => {
                self.state = StreamState::Exhausted;
                log::info!(
                    "capture exhausted: {} after {} frames",
                    self.reference,
                    self.frames_captured
                );
                Err(SourceError::EndOfStream)
            }
        }
    }

    pub(crate) fn skip(&mut self, frames: u32) -> Result<()> {
        if frames == 0 {
            return Ok(());
        }
        match self.state {
            StreamState::Closed => Err(SourceError::Closed),
            StreamState::Exhausted => Ok(()),
            StreamState::Open => self
                .device
                .as_mut()
                .ok_or(SourceError::Closed)?
                .skip(frames),
        }
    }

    pub(crate) fn position(&self) -> Option<Duration> {
        self.device.as_ref().and_then(|device| device.position())
    }

    pub(crate) fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
            log::info!(
                "capture released: {} after {} frames",
                self.reference,
                self.frames_captured
            );
        }
        self.state = StreamState::Closed;
    }

    pub(crate) fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frames_captured,
            reference: self.reference.clone(),
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Media-time window: capture, then skip `interval - 1` frames, until the
/// next frame would fall outside `duration`.
pub(crate) fn slice_media_time(
    handle: &mut CaptureHandle,
    interval: Interval,
    duration: Duration,
    save_dir: Option<&Path>,
) -> Result<Vec<Frame>> {
    if handle.state() == StreamState::Closed {
        return Err(SourceError::Closed);
    }
    let start = handle
        .position()
        .ok_or_else(|| SourceError::read_failure("capture reports no media position"))?;
    let end = start + duration;

    let mut frames = Vec::new();
    while handle.position().is_some_and(|pos| pos < end) {
        let frame = match handle.capture() {
            Ok(frame) => frame,
            Err(SourceError::EndOfStream) => break,
            Err(err) => return Err(err),
        };
        if let Some(dir) = save_dir {
            save_frame(dir, &frame)?;
        }
        frames.push(frame);
        handle.skip(interval.get() - 1)?;
    }
    Ok(frames)
}

/// Wall-clock window: capture, then pause, until `duration` has elapsed.
///
/// A read failure aborts the slice; there is no reconnection.
pub(crate) fn slice_wall_clock(
    handle: &mut CaptureHandle,
    pause: Duration,
    duration: Duration,
    save_dir: Option<&Path>,
) -> Result<Vec<Frame>> {
    let deadline = Instant::now() + duration;
    let mut frames = Vec::new();
    while Instant::now() < deadline {
        let frame = handle.capture()?;
        if let Some(dir) = save_dir {
            save_frame(dir, &frame)?;
        }
        frames.push(frame);

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        std::thread::sleep(pause.min(remaining));
    }
    Ok(frames)
}

/// Write `frame` as `<timestamp-ms>.jpg` under `dir`.
pub(crate) fn save_frame(dir: &Path, frame: &Frame) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| SourceError::Persist {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    let path = dir.join(format!("{}.jpg", frame.timestamp().as_millis()));
    frame.save_jpeg(&path)?;
    log::debug!("saved frame to {}", path.display());
    Ok(path)
}

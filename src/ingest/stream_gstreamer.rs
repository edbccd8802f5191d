//! Live capture using GStreamer.
//!
//! Network streams go through `uridecodebin`, which handles both `rtsp://`
//! and `rtmp://`. Screens go through `ximagesrc` on the X display named by
//! `DISPLAY`, negotiated as BGRx (the server's native layout) and converted
//! to RGB per frame. Either way the appsink keeps a single buffer and drops
//! older ones, so every read returns the most recent frame rather than a
//! backlog.

use std::time::Duration;

use super::normalize::{pack_rows, PixelFormat};
use super::CaptureDevice;
use crate::error::{Result, SourceError};
use crate::frame::{wall_clock_now, Frame};
use gstreamer::prelude::*;
use gstreamer_video::VideoFormat;

/// Default X display when `DISPLAY` is unset.
const DEFAULT_DISPLAY: &str = ":0";

pub(crate) struct GstreamerCapture {
    reference: String,
    pipeline: Option<gstreamer::Pipeline>,
    appsink: gstreamer_app::AppSink,
    read_timeout: Duration,
}

impl GstreamerCapture {
    /// Network stream at `uri`.
    pub(crate) fn open_uri(uri: &str, read_timeout: Duration) -> Result<Self> {
        Self::launch(
            uri,
            &format!("uridecodebin uri={}", uri),
            VideoFormat::Rgb,
            read_timeout,
        )
    }

    /// Screen `index` of the current X display.
    pub(crate) fn open_screen(index: u32, read_timeout: Duration) -> Result<Self> {
        let display = std::env::var("DISPLAY").unwrap_or_else(|_| DEFAULT_DISPLAY.to_string());
        let source = format!(
            "ximagesrc display-name={} use-damage=false",
            screen_display_name(&display, index)
        );
        Self::launch(
            &format!("screen:{}", index),
            &source,
            VideoFormat::Bgrx,
            read_timeout,
        )
    }

    fn launch(
        reference: &str,
        source: &str,
        format: VideoFormat,
        read_timeout: Duration,
    ) -> Result<Self> {
        let fail = |reason: String| SourceError::acquisition(reference, reason);

        gstreamer::init().map_err(|e| fail(format!("initialize gstreamer: {}", e)))?;

        let pipeline_description = format!(
            "{} ! videoconvert ! video/x-raw,format={} ! \
             appsink name=appsink sync=false max-buffers=1 drop=true",
            source,
            format.to_str().as_str()
        );
        let pipeline = gstreamer::parse::launch(&pipeline_description)
            .map_err(|e| fail(format!("build capture pipeline: {}", e)))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| fail("capture pipeline is not a Pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("appsink")
            .ok_or_else(|| fail("appsink element missing from pipeline".to_string()))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| fail("appsink element has unexpected type".to_string()))?;

        let caps = gstreamer_video::VideoCapsBuilder::new()
            .format(format)
            .build();
        appsink.set_caps(Some(&caps));

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(fail(format!("set capture pipeline to Playing: {}", e)));
        }

        let mut capture = Self {
            reference: reference.to_string(),
            pipeline: Some(pipeline),
            appsink,
            read_timeout,
        };
        // Errors already posted while starting (bad host, missing plugin) fail the open.
        if let Err(e) = capture.poll_bus() {
            capture.release();
            return Err(fail(e.to_string()));
        }
        Ok(capture)
    }

    fn poll_bus(&self) -> Result<()> {
        let Some(bus) = self.pipeline.as_ref().and_then(|p| p.bus()) else {
            return Ok(());
        };
        while let Some(message) = bus.pop() {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    return Err(SourceError::read_failure(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    )));
                }
                MessageView::Eos(..) => {
                    return Err(SourceError::read_failure("capture pipeline reached end of stream"));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl CaptureDevice for GstreamerCapture {
    fn describe(&self) -> String {
        format!("gstreamer pipeline for {}", self.reference)
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        if self.pipeline.is_none() {
            return Err(SourceError::Closed);
        }
        self.poll_bus()?;

        let timeout = gstreamer::ClockTime::from_mseconds(self.read_timeout.as_millis() as u64);
        let sample = self
            .appsink
            .try_pull_sample(timeout)
            .ok_or_else(|| SourceError::read_failure("capture stalled"))?;

        sample_to_frame(&sample).map(Some)
    }

    fn release(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.set_state(gstreamer::State::Null) {
                log::warn!("GstreamerCapture: failed to stop {}: {}", self.reference, e);
            }
        }
    }
}

/// `host:display.screen` with the screen number replaced by `index`.
fn screen_display_name(display: &str, index: u32) -> String {
    let base = match display.rfind(':') {
        Some(colon) => match display[colon..].find('.') {
            Some(dot) => &display[..colon + dot],
            None => display,
        },
        None => DEFAULT_DISPLAY,
    };
    format!("{}.{}", base, index)
}

fn pixel_format(format: VideoFormat) -> Result<PixelFormat> {
    match format {
        VideoFormat::Rgb => Ok(PixelFormat::Rgb24),
        VideoFormat::Rgba | VideoFormat::Rgbx => Ok(PixelFormat::Rgba32),
        VideoFormat::Bgra | VideoFormat::Bgrx => Ok(PixelFormat::Bgra32),
        other => Err(SourceError::read_failure(format!(
            "unsupported stream pixel format {:?}",
            other
        ))),
    }
}

fn sample_to_frame(sample: &gstreamer::Sample) -> Result<Frame> {
    let buffer = sample
        .buffer()
        .ok_or_else(|| SourceError::read_failure("stream sample missing buffer"))?;
    let caps = sample
        .caps()
        .ok_or_else(|| SourceError::read_failure("stream sample missing caps"))?;
    let info = gstreamer_video::VideoInfo::from_caps(caps)
        .map_err(|e| SourceError::read_failure(format!("parse stream caps: {}", e)))?;

    let format = pixel_format(info.format())?;
    let channels = format
        .packed_channels()
        .ok_or_else(|| SourceError::read_failure("planar stream layouts are not negotiated"))?;
    let width = info.width();
    let height = info.height();
    let stride = info.stride()[0] as usize;

    let map = buffer
        .map_readable()
        .map_err(|e| SourceError::read_failure(format!("map stream buffer: {}", e)))?;
    let packed = pack_rows(
        map.as_slice(),
        stride,
        width as usize * channels,
        height as usize,
    )?;

    Frame::from_pixel_format(&packed, width, height, format, wall_clock_now())
}

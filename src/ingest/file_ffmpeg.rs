//! Local video decoding using FFmpeg.
//!
//! Frames are decoded in order and scaled to RGB24. Media time is derived
//! from the stream's average frame rate and the number of frames read, so
//! skipping ahead decodes and discards.

use ffmpeg_next as ffmpeg;
use std::time::Duration;

use super::CaptureDevice;
use crate::error::{Result, SourceError};
use crate::frame::{Frame, RGB_CHANNELS};

/// Used when the container reports no usable frame rate.
const FALLBACK_FPS: (u64, u64) = (25, 1);

struct Decoding {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    eof_sent: bool,
}

pub(crate) struct FfmpegCapture {
    path: String,
    decoding: Option<Decoding>,
    /// Frames per second as `num / den`.
    rate: (u64, u64),
    frames_read: u64,
}

impl FfmpegCapture {
    pub(crate) fn open(path: &str) -> Result<Self> {
        let fail = |reason: String| SourceError::acquisition(path, reason);

        ffmpeg::init().map_err(|e| fail(format!("initialize ffmpeg: {}", e)))?;
        let input = ffmpeg::format::input(&path)
            .map_err(|e| fail(format!("open input with ffmpeg: {}", e)))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| fail("file has no video track".to_string()))?;
        let stream_index = input_stream.index();
        let avg = input_stream.avg_frame_rate();
        let rate = match (u64::try_from(avg.numerator()), u64::try_from(avg.denominator())) {
            (Ok(num), Ok(den)) if num > 0 && den > 0 => (num, den),
            _ => FALLBACK_FPS,
        };
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|e| fail(format!("load video decoder parameters: {}", e)))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| fail(format!("open ffmpeg video decoder: {}", e)))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| fail(format!("create ffmpeg scaler: {}", e)))?;

        log::debug!(
            "FfmpegCapture: {} at {}/{} fps",
            path,
            rate.0,
            rate.1
        );

        Ok(Self {
            path: path.to_string(),
            decoding: Some(Decoding {
                input,
                stream_index,
                decoder,
                scaler,
                eof_sent: false,
            }),
            rate,
            frames_read: 0,
        })
    }

    fn media_time(&self, index: u64) -> Duration {
        let (num, den) = self.rate;
        Duration::from_nanos(index.saturating_mul(1_000_000_000).saturating_mul(den) / num)
    }
}

impl Decoding {
    /// Next decoded RGB frame, or `None` once the decoder is drained.
    fn decode_next(&mut self) -> Result<Option<(Vec<u8>, u32, u32)>> {
        let mut decoded = ffmpeg::frame::Video::empty();

        if self.decoder.receive_frame(&mut decoded).is_ok() {
            return self.scale(&decoded).map(Some);
        }

        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .map_err(|e| SourceError::read_failure(format!("send packet to decoder: {}", e)))?;
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.scale(&decoded).map(Some);
            }
        }

        if !self.eof_sent {
            self.eof_sent = true;
            self.decoder
                .send_eof()
                .map_err(|e| SourceError::read_failure(format!("flush decoder: {}", e)))?;
        }
        if self.decoder.receive_frame(&mut decoded).is_ok() {
            return self.scale(&decoded).map(Some);
        }
        Ok(None)
    }

    fn scale(&mut self, decoded: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .map_err(|e| SourceError::read_failure(format!("scale frame to RGB: {}", e)))?;
        frame_to_pixels(&rgb_frame)
    }
}

impl CaptureDevice for FfmpegCapture {
    fn describe(&self) -> String {
        format!("ffmpeg decoder for {}", self.path)
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        let timestamp = self.media_time(self.frames_read);
        let Some(decoding) = self.decoding.as_mut() else {
            return Err(SourceError::Closed);
        };
        match decoding.decode_next()? {
            Some((pixels, width, height)) => {
                self.frames_read += 1;
                Frame::new(pixels, width, height, timestamp).map(Some)
            }
            None => Ok(None),
        }
    }

    fn position(&self) -> Option<Duration> {
        Some(self.media_time(self.frames_read))
    }

    fn skip(&mut self, frames: u32) -> Result<()> {
        let Some(decoding) = self.decoding.as_mut() else {
            return Err(SourceError::Closed);
        };
        for _ in 0..frames {
            if decoding.decode_next()?.is_none() {
                break;
            }
            self.frames_read += 1;
        }
        Ok(())
    }

    fn release(&mut self) {
        self.decoding = None;
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * RGB_CHANNELS;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let packed = data
            .get(..row_bytes * height as usize)
            .ok_or_else(|| SourceError::read_failure("ffmpeg frame is truncated"))?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .ok_or_else(|| SourceError::read_failure("ffmpeg frame row is out of bounds"))?,
        );
    }

    Ok((pixels, width, height))
}

//! Pixel layout conversion into packed RGB24.
//!
//! Capture backends hand over whatever layout the device produces; frames
//! are always packed RGB8. Screen grabbers deliver 4-byte BGRx/BGRA,
//! decoders may deliver NV12.

use std::time::Duration;

use crate::error::{Result, SourceError};
use crate::frame::{Frame, RGB_CHANNELS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    /// RGBA or RGBx; the fourth byte is dropped.
    Rgba32,
    /// BGRA or BGRx; the fourth byte is dropped.
    Bgra32,
    Nv12,
}

impl PixelFormat {
    fn name(self) -> &'static str {
        match self {
            PixelFormat::Rgb24 => "RGB",
            PixelFormat::Rgba32 => "RGBA",
            PixelFormat::Bgra32 => "BGRA",
            PixelFormat::Nv12 => "NV12",
        }
    }

    /// Bytes per pixel for packed layouts. `None` for planar NV12.
    pub fn packed_channels(self) -> Option<usize> {
        match self {
            PixelFormat::Rgb24 => Some(3),
            PixelFormat::Rgba32 | PixelFormat::Bgra32 => Some(4),
            PixelFormat::Nv12 => None,
        }
    }

    /// Exact buffer length of one `width` x `height` image in this layout.
    pub fn buffer_len(self, width: u32, height: u32) -> Result<usize> {
        match self.packed_channels() {
            Some(channels) => packed_len(width, height, channels, self),
            None => {
                let y_plane = packed_len(width, height, 1, self)?;
                y_plane
                    .checked_add(y_plane / 2)
                    .ok_or_else(|| SourceError::read_failure("NV12 frame dimensions overflow"))
            }
        }
    }
}

pub fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    check_len(pixels, format.buffer_len(width, height)?, format)?;
    match format {
        PixelFormat::Rgb24 => Ok(pixels.to_vec()),
        PixelFormat::Rgba32 => Ok(pixels
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect()),
        PixelFormat::Bgra32 => Ok(pixels
            .chunks_exact(4)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect()),
        PixelFormat::Nv12 => nv12_to_rgb(pixels, width, height),
    }
}

impl Frame {
    /// Build a frame from a buffer in any supported layout.
    pub fn from_pixel_format(
        pixels: &[u8],
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp: Duration,
    ) -> Result<Self> {
        let rgb = normalize_to_rgb(pixels, width, height, format)?;
        Frame::new(rgb, width, height, timestamp)
    }
}

/// Copy `height` rows of `row_bytes` out of a buffer whose rows start every
/// `stride` bytes, dropping the padding.
pub(crate) fn pack_rows(
    data: &[u8],
    stride: usize,
    row_bytes: usize,
    height: usize,
) -> Result<Vec<u8>> {
    if stride < row_bytes {
        return Err(SourceError::read_failure(format!(
            "row stride {} is shorter than the row ({} bytes)",
            stride, row_bytes
        )));
    }
    let mut packed = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        packed.extend_from_slice(
            data.get(start..start + row_bytes)
                .ok_or_else(|| SourceError::read_failure("frame buffer row is out of bounds"))?,
        );
    }
    Ok(packed)
}

fn packed_len(width: u32, height: u32, channels: usize, format: PixelFormat) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(channels))
        .ok_or_else(|| {
            SourceError::read_failure(format!("{} frame dimensions overflow", format.name()))
        })
}

fn check_len(pixels: &[u8], expected: usize, format: PixelFormat) -> Result<()> {
    if pixels.len() != expected {
        return Err(SourceError::read_failure(format!(
            "{} frame length mismatch: expected {}, got {}",
            format.name(),
            expected,
            pixels.len()
        )));
    }
    Ok(())
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    // Chroma is subsampled 2x2; odd sizes would read past the UV plane.
    if width % 2 != 0 || height % 2 != 0 {
        return Err(SourceError::read_failure(format!(
            "NV12 frame needs even dimensions, got {}x{}",
            width, height
        )));
    }
    let w = width as usize;
    let h = height as usize;
    let y_plane = w * h;

    let mut rgb = vec![0u8; y_plane * RGB_CHANNELS];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;

            let r = y + 1.402_f32 * v;
            let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
            let b = y + 1.772_f32 * u;

            let offset = (j * w + i) * RGB_CHANNELS;
            rgb[offset] = clamp_to_u8(r);
            rgb[offset + 1] = clamp_to_u8(g);
            rgb[offset + 2] = clamp_to_u8(b);
        }
    }

    Ok(rgb)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

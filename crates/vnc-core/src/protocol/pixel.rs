//! Pixel format translation for raw framebuffer updates.
//!
//! The capture buffer is RGBA8888 (four bytes per pixel, red first).  A
//! viewer may ask for any true-colour format with 8, 16, or 32 bits per
//! pixel; each channel is rescaled to the requested maximum and shifted into
//! place, then the pixel value is written in the requested byte order.

use crate::protocol::codec::ProtocolError;
use crate::protocol::messages::{PixelFormat, Rectangle};

/// Bytes per pixel of the capture buffer.
pub const SOURCE_BYTES_PER_PIXEL: usize = 4;

/// Checks that the server can produce `format`.
///
/// # Errors
///
/// Returns [`ProtocolError::UnsupportedPixelFormat`] for colour-map formats,
/// bit depths other than 8/16/32, zero channel maxima, and channels whose
/// shifted maximum does not fit in the pixel.
pub fn validate_pixel_format(format: &PixelFormat) -> Result<(), ProtocolError> {
    if !format.true_colour {
        return Err(ProtocolError::UnsupportedPixelFormat(
            "colour-map formats are not supported".to_string(),
        ));
    }
    if !matches!(format.bits_per_pixel, 8 | 16 | 32) {
        return Err(ProtocolError::UnsupportedPixelFormat(format!(
            "{} bits per pixel",
            format.bits_per_pixel
        )));
    }
    if format.red_max == 0 || format.green_max == 0 || format.blue_max == 0 {
        return Err(ProtocolError::UnsupportedPixelFormat(
            "channel maximum of zero".to_string(),
        ));
    }
    let bits = u32::from(format.bits_per_pixel);
    for (name, max, shift) in [
        ("red", format.red_max, format.red_shift),
        ("green", format.green_max, format.green_shift),
        ("blue", format.blue_max, format.blue_shift),
    ] {
        let width = u16::BITS - max.leading_zeros();
        if u32::from(shift) + width > bits {
            return Err(ProtocolError::UnsupportedPixelFormat(format!(
                "{name} channel (max {max}, shift {shift}) exceeds {bits} bits per pixel"
            )));
        }
    }
    Ok(())
}

#[inline]
fn scale(channel: u8, max: u16) -> u32 {
    if max == 255 {
        u32::from(channel)
    } else {
        (u32::from(channel) * u32::from(max) + 127) / 255
    }
}

#[inline]
fn pack(rgba: &[u8], format: &PixelFormat) -> u32 {
    (scale(rgba[0], format.red_max) << format.red_shift)
        | (scale(rgba[1], format.green_max) << format.green_shift)
        | (scale(rgba[2], format.blue_max) << format.blue_shift)
}

/// Copies `region` out of an RGBA8888 buffer `fb_width` pixels wide,
/// translated into `format`.
///
/// `region` must lie inside the framebuffer; clip it first with
/// [`Rectangle::clip`].
pub fn encode_region(
    src: &[u8],
    fb_width: u16,
    region: Rectangle,
    format: &PixelFormat,
) -> Vec<u8> {
    let bpp = format.bytes_per_pixel();
    let mut out = Vec::with_capacity(region.area() * bpp);
    let stride = usize::from(fb_width) * SOURCE_BYTES_PER_PIXEL;
    let x0 = usize::from(region.x) * SOURCE_BYTES_PER_PIXEL;
    let row_len = usize::from(region.width) * SOURCE_BYTES_PER_PIXEL;

    for row in 0..usize::from(region.height) {
        let start = (usize::from(region.y) + row) * stride + x0;
        let Some(line) = src.get(start..start + row_len) else {
            break;
        };

        if *format == PixelFormat::rgba8888() {
            out.extend_from_slice(line);
            continue;
        }

        for rgba in line.chunks_exact(SOURCE_BYTES_PER_PIXEL) {
            let value = pack(rgba, format);
            match (bpp, format.big_endian) {
                (1, _) => out.push(value as u8),
                (2, true) => out.extend_from_slice(&(value as u16).to_be_bytes()),
                (2, false) => out.extend_from_slice(&(value as u16).to_le_bytes()),
                (_, true) => out.extend_from_slice(&value.to_be_bytes()),
                (_, false) => out.extend_from_slice(&value.to_le_bytes()),
            }
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

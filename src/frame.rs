//! Raw display buffers and the portable encode path.
//!
//! Mirrored-display buffers frequently carry hardware alignment padding: the
//! row stride exceeds `width * bytes_per_pixel`. The crop here reinterprets
//! the buffer with its true stride and copies rows losslessly; reshaping the
//! buffer naively would shear every row by the padding amount.

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder};
use tracing::debug;

use crate::error::ActionError;

/// One frame read from a bound display surface, in RGBA order.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Bytes per pixel. RGBA surfaces report 4.
    pub pixel_stride: u32,
    /// Bytes per buffer row, including any alignment padding.
    pub row_stride: u32,
}

impl RawFrame {
    /// Frame with tightly packed rows (no padding).
    pub fn packed(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            data,
            width,
            height,
            pixel_stride: 4,
            row_stride: width * 4,
        }
    }

    fn row_bytes(&self) -> usize {
        (self.width * self.pixel_stride) as usize
    }

    /// Returns the pixel data cropped to `width x height` with padding removed.
    ///
    /// Copies row by row using the true stride, so output rows are exact even
    /// when the buffer is padded.
    pub fn cropped(&self) -> Result<Vec<u8>, ActionError> {
        let row_bytes = self.row_bytes();
        let row_stride = self.row_stride as usize;

        if self.width == 0 || self.height == 0 {
            return Err(ActionError::CaptureFailed(format!(
                "degenerate frame dimensions {}x{}",
                self.width, self.height
            )));
        }
        if self.row_stride < self.width * self.pixel_stride {
            return Err(ActionError::CaptureFailed(format!(
                "row stride {} smaller than row width {} bytes",
                self.row_stride, row_bytes
            )));
        }
        // The final row may be delivered without its trailing padding.
        let needed = row_stride * (self.height as usize - 1) + row_bytes;
        if self.data.len() < needed {
            return Err(ActionError::CaptureFailed(format!(
                "buffer truncated: {} bytes, expected at least {}",
                self.data.len(),
                needed
            )));
        }

        if row_stride == row_bytes {
            return Ok(self.data[..row_bytes * self.height as usize].to_vec());
        }

        debug!(
            width = self.width,
            row_stride = self.row_stride,
            padding = row_stride - row_bytes,
            "cropping padded frame buffer"
        );
        let mut packed = Vec::with_capacity(row_bytes * self.height as usize);
        for row in 0..self.height as usize {
            let start = row * row_stride;
            packed.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        Ok(packed)
    }
}

/// Encodes a frame to PNG with fixed, lossless parameters so captures are
/// pixel-exact and reproducible.
pub fn encode_png(frame: &RawFrame) -> Result<Vec<u8>, ActionError> {
    let packed = frame.cropped()?;
    let mut out = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut out, CompressionType::Default, FilterType::NoFilter);
    encoder
        .write_image(&packed, frame.width, frame.height, ColorType::Rgba8)
        .map_err(|e| ActionError::CaptureFailed(format!("png encode failed: {e}")))?;
    debug!(
        width = frame.width,
        height = frame.height,
        bytes = out.len(),
        "encoded frame"
    );
    Ok(out)
}

//! Frame buffers flowing through the detection loop.
//!
//! - `Frame`: owned RGB24 pixel buffer with fixed dimensions for the session.
//!
//! Frames are produced by an `ingest::FrameSource`, read by a `detect::Detector`,
//! and copied before any overlay is drawn. The source frame is never mutated.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

/// Bytes per pixel for packed RGB24.
pub const RGB_CHANNELS: usize = 3;

/// Owned RGB24 frame.
///
/// Cloning a frame copies the pixel buffer. Annotation always happens on such a
/// copy so that detectors and overlays never see each other's drawing.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,

    /// Sequence number assigned by the source (1-based).
    pub sequence: u64,
}

impl Frame {
    /// Wrap packed RGB24 bytes. The length must be exactly `width * height * 3`.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = expected_rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| anyhow!("RGB buffer does not fit {}x{}", width, height))?;
        Ok(Self::from_image(image, sequence))
    }

    pub fn from_image(image: RgbImage, sequence: u64) -> Self {
        Self { image, sequence }
    }

    /// Uniform frame, mostly useful for synthetic sources and tests.
    pub fn filled(width: u32, height: u32, color: [u8; 3], sequence: u64) -> Self {
        Self::from_image(RgbImage::from_pixel(width, height, Rgb(color)), sequence)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Packed RGB24 bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

}

pub(crate) fn expected_rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

//! RGB frame buffer and whole-frame pixel operations.
//!
//! A [`Frame`] is one captured image: an owned RGB8 buffer plus dimensions.
//! Frames are produced once per tick and consumed immediately; nothing in the
//! pipeline retains them across ticks.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};

#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Build a frame from a raw RGB24 buffer. The buffer length must be
    /// exactly `width * height * 3`.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("failed to assemble {}x{} frame", width, height))?;
        Ok(Self { image })
    }

    /// A frame filled with one color. Used by the synthetic camera and tests.
    pub fn solid(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, Rgb(color)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    pub fn as_image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    /// Raw RGB24 bytes, row-major.
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Invert every channel of every pixel (`255 - value`). Applying the
    /// inversion twice restores the original frame.
    pub fn invert(&mut self) {
        for pixel in self.image.pixels_mut() {
            let Rgb([r, g, b]) = *pixel;
            *pixel = Rgb([255 - r, 255 - g, 255 - b]);
        }
    }

    /// Write the frame to `path` as PNG.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("failed to write PNG to {}", path.display()))
    }

    /// Encode the frame as one baseline JPEG image.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality)
            .encode_image(&self.image)
            .context("JPEG encoding failed")?;
        Ok(buf)
    }
}

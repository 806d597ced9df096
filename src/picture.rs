//! Display and inference image container.
//!
//! - `Picture`: an upright RGBA bitmap plus its device pixel scale.
//!
//! Pixels are shared behind an `Arc` and there is no mutable accessor. Anything
//! that wants to draw on a picture (the overlay renderer) must copy the pixels
//! into its own surface and produce a new `Picture`, so a picture handed to an
//! inference worker can never change underneath it.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use image::metadata::Orientation;
use image::{DynamicImage, RgbImage, RgbaImage};
use sha2::{Digest, Sha256};

/// Scale used when a caller does not specify one.
pub const DEFAULT_SCALE: f32 = 1.0;

#[derive(Clone, Debug)]
pub struct Picture {
    pixels: Arc<RgbaImage>,
    /// Device pixels per logical point.
    scale: f32,
}

impl Picture {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
            scale: DEFAULT_SCALE,
        }
    }

    /// Build an upright picture from a decoded image and its capture orientation.
    pub fn from_oriented(mut image: DynamicImage, orientation: Orientation) -> Result<Self> {
        image.apply_orientation(orientation);
        if image.width() == 0 || image.height() == 0 {
            return Err(anyhow!("image has no pixels"));
        }
        Ok(Self::new(image.into_rgba8()))
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Read-only view of the pixel buffer.
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Opaque RGB copy for model input. Alpha is discarded.
    pub fn to_rgb8(&self) -> RgbImage {
        DynamicImage::ImageRgba8(self.pixels.as_ref().clone()).into_rgb8()
    }

    /// True when both pictures share the same pixel allocation.
    pub fn shares_pixels_with(&self, other: &Picture) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// SHA-256 over dimensions and pixel bytes, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width().to_le_bytes());
        hasher.update(self.height().to_le_bytes());
        hasher.update(self.pixels.as_raw());
        hex::encode(hasher.finalize())
    }

    /// Short fingerprint prefix for log lines.
    pub fn short_id(&self) -> String {
        self.fingerprint()[..12].to_string()
    }

    pub fn save_png(&self, path: &std::path::Path) -> Result<()> {
        self.pixels
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| anyhow!("failed to write {}: {}", path.display(), e))
    }
}

impl PartialEq for Picture {
    /// Bitmap equality. Scale is presentation metadata and is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.shares_pixels_with(other) || *self.pixels == *other.pixels
    }
}

//! Camera source.
//!
//! Only the synthetic `stub://` camera is built in. It produces a gradient
//! test pattern that shifts on every capture, which is enough to drive the
//! whole pick → infer → overlay flow without hardware.

use anyhow::{anyhow, Result};
use image::{Rgba, RgbaImage};

use crate::picture::Picture;

#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Camera URL, e.g. "stub://front".
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            width: 640,
            height: 480,
        }
    }
}

pub struct CameraSource {
    config: CameraConfig,
    frames_captured: u64,
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if !config.url.starts_with("stub://") {
            return Err(anyhow!(
                "unsupported camera url '{}' (only stub:// cameras are available)",
                config.url
            ));
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("camera dimensions must be greater than zero"));
        }
        log::info!("CameraSource: using {} (synthetic)", config.url);
        Ok(Self {
            config,
            frames_captured: 0,
        })
    }

    pub fn capture(&mut self) -> Result<Picture> {
        self.frames_captured += 1;
        let shift = self.frames_captured;
        let pixels = RgbaImage::from_fn(self.config.width, self.config.height, |x, y| {
            let r = ((x as u64 + shift) % 256) as u8;
            let g = ((y as u64 + shift) % 256) as u8;
            Rgba([r, g, 128, 255])
        });
        Ok(Picture::new(pixels))
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }
}

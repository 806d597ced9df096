//! Model input preparation.
//!
//! Classification runs on a centered square crop of the picture. Detection runs
//! on the whole picture scaled to fit the model input, padded to a square
//! (letterbox), and boxes coming back are mapped through the same letterbox to
//! lower-left-origin normalized coordinates on the original picture.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::infer::result::NormalizedRect;
use crate::picture::Picture;

/// Fill used for letterbox padding.
const PAD_VALUE: u8 = 114;

/// How a picture is fitted into a square model input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropAndScale {
    /// Crop the largest centered square, then resize.
    CenterCrop,
    /// Resize preserving aspect ratio and pad the short side.
    ScaleFit,
}

/// Placement of the picture inside a letterboxed model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub source_width: u32,
    pub source_height: u32,
}

impl Letterbox {
    /// Map a model-space box (center x/y, width, height, in input pixels,
    /// top-left origin) onto the source picture as a lower-left-origin
    /// normalized rectangle. Returns `None` when nothing is left after clipping.
    pub fn to_normalized(&self, cx: f32, cy: f32, w: f32, h: f32) -> Option<NormalizedRect> {
        let sw = self.source_width as f32;
        let sh = self.source_height as f32;
        let x1 = ((cx - w / 2.0 - self.pad_x) / self.scale).clamp(0.0, sw);
        let y1 = ((cy - h / 2.0 - self.pad_y) / self.scale).clamp(0.0, sh);
        let x2 = ((cx + w / 2.0 - self.pad_x) / self.scale).clamp(0.0, sw);
        let y2 = ((cy + h / 2.0 - self.pad_y) / self.scale).clamp(0.0, sh);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(NormalizedRect::new(
            x1 / sw,
            1.0 - y2 / sh,
            (x2 - x1) / sw,
            (y2 - y1) / sh,
        ))
    }
}

/// A square RGB model input and, for scale-fit, the letterbox used to build it.
pub struct PreparedInput {
    pub rgb: RgbImage,
    pub letterbox: Option<Letterbox>,
}

pub fn prepare(picture: &Picture, size: u32, mode: CropAndScale) -> Result<PreparedInput> {
    if size == 0 {
        return Err(anyhow!("model input size must be greater than zero"));
    }
    let rgb = picture.to_rgb8();
    match mode {
        CropAndScale::CenterCrop => Ok(PreparedInput {
            rgb: center_crop(&rgb, size),
            letterbox: None,
        }),
        CropAndScale::ScaleFit => {
            let (rgb, letterbox) = scale_fit(&rgb, size);
            Ok(PreparedInput {
                rgb,
                letterbox: Some(letterbox),
            })
        }
    }
}

fn center_crop(rgb: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = rgb.dimensions();
    let side = w.min(h);
    let x = (w - side) / 2;
    let y = (h - side) / 2;
    let square = imageops::crop_imm(rgb, x, y, side, side).to_image();
    imageops::resize(&square, size, size, FilterType::Triangle)
}

fn scale_fit(rgb: &RgbImage, size: u32) -> (RgbImage, Letterbox) {
    let (w, h) = rgb.dimensions();
    let scale = (size as f32 / w as f32).min(size as f32 / h as f32);
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, size);
    let resized = imageops::resize(rgb, new_w, new_h, FilterType::Triangle);

    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
    imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    (
        canvas,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            source_width: w,
            source_height: h,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn picture(width: u32, height: u32) -> Picture {
        Picture::new(RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255])))
    }

    #[test]
    fn center_crop_yields_square_input() -> Result<()> {
        let input = prepare(&picture(300, 100), 32, CropAndScale::CenterCrop)?;
        assert_eq!(input.rgb.dimensions(), (32, 32));
        assert!(input.letterbox.is_none());
        Ok(())
    }

    #[test]
    fn scale_fit_pads_short_side() -> Result<()> {
        let input = prepare(&picture(200, 100), 100, CropAndScale::ScaleFit)?;
        let letterbox = input.letterbox.unwrap();
        assert_eq!(input.rgb.dimensions(), (100, 100));
        assert_eq!(letterbox.scale, 0.5);
        assert_eq!(letterbox.pad_x, 0.0);
        assert_eq!(letterbox.pad_y, 25.0);
        assert_eq!(input.rgb.get_pixel(50, 0), &Rgb([PAD_VALUE; 3]));
        assert_eq!(input.rgb.get_pixel(50, 50), &Rgb([10, 20, 30]));
        Ok(())
    }

    #[test]
    fn letterboxed_full_frame_maps_to_full_rect() {
        let letterbox = Letterbox {
            scale: 0.5,
            pad_x: 0.0,
            pad_y: 25.0,
            source_width: 200,
            source_height: 100,
        };
        let rect = letterbox.to_normalized(50.0, 50.0, 100.0, 50.0).unwrap();
        assert_eq!(rect, NormalizedRect::full());
    }

    #[test]
    fn top_left_model_box_lands_high_in_lower_left_space() {
        let letterbox = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            source_width: 100,
            source_height: 100,
        };
        // Top-left quarter of the picture.
        let rect = letterbox.to_normalized(25.0, 25.0, 50.0, 50.0).unwrap();
        assert_eq!(rect, NormalizedRect::new(0.0, 0.5, 0.5, 0.5));
    }

    #[test]
    fn box_inside_padding_is_dropped() {
        let letterbox = Letterbox {
            scale: 0.5,
            pad_x: 0.0,
            pad_y: 25.0,
            source_width: 200,
            source_height: 100,
        };
        assert!(letterbox.to_normalized(50.0, 10.0, 20.0, 10.0).is_none());
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(prepare(&picture(4, 4), 0, CropAndScale::CenterCrop).is_err());
    }
}

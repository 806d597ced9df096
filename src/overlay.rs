//! Detection overlay compositing.
//!
//! Boxes from the detector are normalized with a lower-left origin; the drawing
//! surface is in pixels with an upper-left origin, so the vertical axis is
//! flipped on the way in. Every box is filled with translucent red using
//! normal alpha blending, in detector order, with no merging of overlaps.

use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, Blend};
use imageproc::rect::Rect;

use crate::infer::{Detection, NormalizedRect};
use crate::picture::{Picture, DEFAULT_SCALE};

/// Red at 40% opacity.
pub const OVERLAY_COLOR: Rgba<u8> = Rgba([255, 0, 0, 102]);

#[derive(Clone, Copy, Debug, Default)]
pub struct OverlayOptions {
    /// Pixel scale of the produced picture. `None` means `DEFAULT_SCALE`.
    pub scale: Option<f32>,
}

/// Pixel rectangle on the drawing surface, upper-left origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// Convert a lower-left-origin normalized box to surface pixels.
///
/// The box is clipped to the image first. Returns `None` for non-finite
/// coordinates or when less than one pixel of the box lies on the image.
pub fn pixel_rect(rect: &NormalizedRect, image_width: u32, image_height: u32) -> Option<PixelRect> {
    let w = image_width as f32;
    let h = image_height as f32;
    let px = rect.x * w;
    let py = (1.0 - rect.y - rect.height) * h;
    let pw = rect.width * w;
    let ph = rect.height * h;
    if ![px, py, pw, ph, px + pw, py + ph].iter().all(|v| v.is_finite()) {
        return None;
    }

    let left = px.max(0.0).round();
    let top = py.max(0.0).round();
    let right = (px + pw).min(w).round();
    let bottom = (py + ph).min(h).round();
    let width = right - left;
    let height = bottom - top;
    if width < 1.0 || height < 1.0 {
        return None;
    }
    Some(PixelRect {
        left: left as i32,
        top: top as i32,
        width: width as u32,
        height: height as u32,
    })
}

/// Drawing surface for one compositing pass. Dropping it without calling
/// `finish` discards everything drawn so far.
struct Surface {
    canvas: Blend<RgbaImage>,
    scale: f32,
}

impl Surface {
    fn begin(width: u32, height: u32, scale: f32) -> Self {
        Self {
            canvas: Blend(RgbaImage::new(width, height)),
            scale,
        }
    }

    fn draw_at_origin(&mut self, picture: &Picture) {
        imageops::replace(&mut self.canvas.0, picture.pixels(), 0, 0);
    }

    fn fill(&mut self, rect: PixelRect, color: Rgba<u8>) {
        let rect = Rect::at(rect.left, rect.top).of_size(rect.width, rect.height);
        draw_filled_rect_mut(&mut self.canvas, rect, color);
    }

    fn finish(self) -> Picture {
        Picture::new(self.canvas.0).with_scale(self.scale)
    }
}

/// Composite `detections` onto a copy of `source`.
///
/// The source picture is left untouched; the returned picture owns new pixels
/// with the same dimensions.
pub fn render_overlay(source: &Picture, detections: &[Detection], options: OverlayOptions) -> Picture {
    let (width, height) = source.dimensions();
    let mut surface = Surface::begin(width, height, options.scale.unwrap_or(DEFAULT_SCALE));
    surface.draw_at_origin(source);

    for detection in detections {
        match pixel_rect(&detection.bounding_box, width, height) {
            Some(rect) => surface.fill(rect, OVERLAY_COLOR),
            None => log::debug!(
                "skipping empty overlay box for '{}': {:?}",
                detection.label,
                detection.bounding_box
            ),
        }
    }

    surface.finish()
}

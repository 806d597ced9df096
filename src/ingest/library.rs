//! Photo library source.
//!
//! Decodes a local image file and applies its EXIF orientation so the
//! resulting picture is upright. Only local paths are accepted.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, ImageDecoder, ImageReader};

use crate::picture::Picture;

pub fn load_picture(path: &Path) -> Result<Picture> {
    if !is_local_file_path(path) {
        return Err(anyhow!(
            "library source only supports local paths (no URL schemes)"
        ));
    }
    let reader = ImageReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut decoder = reader
        .into_decoder()
        .with_context(|| format!("{} is not a supported image", path.display()))?;
    let orientation = decoder
        .orientation()
        .with_context(|| format!("failed to read orientation of {}", path.display()))?;
    let image = DynamicImage::from_decoder(decoder)
        .with_context(|| format!("failed to decode {}", path.display()))?;

    let picture = Picture::from_oriented(image, orientation)?;
    log::info!(
        "loaded {} ({}x{}, {:?})",
        path.display(),
        picture.width(),
        picture.height(),
        orientation
    );
    Ok(picture)
}

fn is_local_file_path(path: &Path) -> bool {
    let text = path.to_string_lossy();
    !text.trim().is_empty() && !text.contains("://")
}

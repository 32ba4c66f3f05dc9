//! Team photo encoding
//!
//! Photos travel inline in `PLAYER_JOIN` and `TEAM_PHOTO_UPDATE` as PNG data
//! URLs, shrunk to fit the host's avatar slot.

use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tracing::debug;

/// Longest side of an encoded photo, in pixels
pub const PHOTO_MAX_SIDE: u32 = 256;

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("Failed to process photo: {0}")]
    Image(#[from] image::ImageError),
}

/// Load an image file and encode it as a data URL
pub fn load_photo(path: &Path) -> Result<String, PhotoError> {
    let img = image::open(path)?;
    debug!(
        path = %path.display(),
        width = img.width(),
        height = img.height(),
        "[PHOTO] Loaded"
    );
    encode_photo(&img)
}

pub fn encode_photo(img: &DynamicImage) -> Result<String, PhotoError> {
    let fitted = if img.width() > PHOTO_MAX_SIDE || img.height() > PHOTO_MAX_SIDE {
        img.thumbnail(PHOTO_MAX_SIDE, PHOTO_MAX_SIDE)
    } else {
        img.clone()
    };

    let mut png = Cursor::new(Vec::new());
    fitted.write_to(&mut png, ImageFormat::Png)?;
    Ok(format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(png.into_inner())))
}

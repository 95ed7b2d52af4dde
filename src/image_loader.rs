use crate::error::{AppError, Result};
use image::imageops::FilterType;
use slint::{Image, Rgba8Pixel, SharedPixelBuffer};
use std::path::Path;

/// Decoded image resampled to its display size.
#[derive(Debug, Clone)]
pub struct ScaledImage {
    /// RGBA8 pixels, row-major.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Size an image takes when fitted into `max_width` x `max_height`, keeping its aspect ratio.
///
/// The scale factor is `min(max_width / width, max_height / height)`.
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }

    let ratio = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );

    let fitted_width = ((width as f64 * ratio) as u32).max(1);
    let fitted_height = ((height as f64 * ratio) as u32).max(1);
    (fitted_width, fitted_height)
}

/// Decodes an image file and fits it into the given viewport.
///
/// Blocking; callers run this off the UI thread. Files still being written
/// usually fail here and should simply be retried later.
pub fn load_scaled(path: &Path, max_width: u32, max_height: u32) -> Result<ScaledImage> {
    let image = image::ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| AppError::ImageLoad(e.to_string()))?
        .decode()?;

    let (width, height) = fit_dimensions(image.width(), image.height(), max_width, max_height);
    if width == 0 || height == 0 {
        return Err(AppError::ImageLoad(format!(
            "{} has no pixels",
            path.display()
        )));
    }

    let resized = image.resize_exact(width, height, FilterType::Lanczos3).to_rgba8();

    Ok(ScaledImage {
        data: resized.into_raw(),
        width,
        height,
    })
}

/// Wraps RGBA8 pixel data in a Slint image. Must be called on the UI thread.
pub fn create_slint_image(data: &[u8], width: u32, height: u32) -> Image {
    let buffer = SharedPixelBuffer::<Rgba8Pixel>::clone_from_slice(data, width, height);
    Image::from_rgba8(buffer)
}

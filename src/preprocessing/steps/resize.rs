use crate::error::CaptchaError;
use image::{imageops::FilterType, DynamicImage, GenericImageView};

/// Scale the image to the captcha canvas so the glyph slots line up.
/// Images already at the canvas size pass through untouched.
pub fn apply(image: DynamicImage, width: u32, height: u32) -> Result<DynamicImage, CaptchaError> {
    if image.dimensions() == (width, height) {
        return Ok(image);
    }

    tracing::debug!(
        "Resizing captcha from {:?} to {}x{}",
        image.dimensions(),
        width,
        height
    );

    Ok(image.resize_exact(width, height, FilterType::Triangle))
}

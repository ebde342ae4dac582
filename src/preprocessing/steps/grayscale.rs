use crate::error::CaptchaError;
use image::DynamicImage;

/// Convert image to single-channel luma
pub fn apply(image: DynamicImage) -> Result<DynamicImage, CaptchaError> {
    Ok(DynamicImage::ImageLuma8(image.to_luma8()))
}

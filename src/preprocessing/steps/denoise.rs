use crate::error::CaptchaError;
use image::DynamicImage;
use imageproc::filter::median_filter;

/// 3x3 median filter; removes speckle noise sprinkled over captchas
pub fn apply(image: DynamicImage) -> Result<DynamicImage, CaptchaError> {
    let gray = image.to_luma8();
    Ok(DynamicImage::ImageLuma8(median_filter(&gray, 1, 1)))
}

//! Image preprocessing for captcha recognition
//!
//! Turns raw color captchas into binary images: glyph pixels are `0`,
//! background pixels are `255`.

pub mod decode;
pub mod pipeline;
pub mod steps;

pub use decode::{decode_captcha, DEFAULT_BACKGROUND_THRESHOLD};
pub use pipeline::{Pipeline, PreprocessingResult, Preset, StepTiming};
pub use steps::threshold::ThresholdMode;

use crate::error::CaptchaError;
use image::{DynamicImage, GrayImage};

/// Captcha canvas every recognizable image is brought to
pub const CANVAS_WIDTH: u32 = 150;
pub const CANVAS_HEIGHT: u32 = 50;

/// Convert to luma and cut at the midpoint of the intensity range.
///
/// The output has the input's dimensions and only contains `0` and `255`.
pub fn binarize(image: &DynamicImage) -> Result<GrayImage, CaptchaError> {
    ensure_non_empty(image)?;
    Ok(steps::threshold::binarize_gray(
        &image.to_luma8(),
        ThresholdMode::Fixed(steps::threshold::MIDPOINT),
    ))
}

pub(crate) fn ensure_non_empty(image: &DynamicImage) -> Result<(), CaptchaError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(CaptchaError::InvalidImage(format!(
            "image has zero area ({}x{})",
            image.width(),
            image.height()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::collections::BTreeSet;

    #[test]
    fn test_binarize_keeps_dimensions_and_two_levels() {
        let img = RgbImage::from_fn(37, 13, |x, y| {
            Rgb([(x * 7) as u8, (y * 19) as u8, ((x + y) * 5) as u8])
        });

        let binary = binarize(&DynamicImage::ImageRgb8(img)).unwrap();

        assert_eq!(binary.dimensions(), (37, 13));
        let levels: BTreeSet<u8> = binary.pixels().map(|p| p.0[0]).collect();
        assert!(levels.is_subset(&BTreeSet::from([0, 255])));
    }

    #[test]
    fn test_binarize_accepts_grayscale_and_rgba() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, image::Luma([10])));
        assert!(binarize(&gray).unwrap().pixels().all(|p| p.0[0] == 0));

        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([250, 250, 250, 255])));
        assert!(binarize(&rgba).unwrap().pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_binarize_rejects_empty_image() {
        for (w, h) in [(0, 0), (0, 10), (10, 0)] {
            let err = binarize(&DynamicImage::new_rgb8(w, h)).unwrap_err();
            assert!(matches!(err, CaptchaError::InvalidImage(_)));
        }
    }
}

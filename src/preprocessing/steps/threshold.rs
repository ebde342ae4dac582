use crate::error::CaptchaError;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use std::fmt;
use std::str::FromStr;

/// Midpoint of the 8-bit intensity range
pub const MIDPOINT: u8 = 128;

/// Output levels of every thresholding mode
pub const FOREGROUND: u8 = 0;
pub const BACKGROUND: u8 = 255;

/// Sauvola threshold parameters
const WINDOW_SIZE: u32 = 15;
const K: f32 = 0.2;
const R: f32 = 128.0; // Dynamic range / 2

/// Acceptable share of foreground pixels for the smart mode
const MIN_FOREGROUND_RATIO: f32 = 0.05;
const MAX_FOREGROUND_RATIO: f32 = 0.95;

/// How the binarization cutoff is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMode {
    /// Global cutoff: `pixel > level` becomes background
    Fixed(u8),
    /// Global cutoff derived from the image histogram
    Otsu,
    /// Locally adaptive cutoff, tolerant of uneven lighting
    Sauvola,
    /// Otsu with polarity correction and a fixed-midpoint fallback
    Smart,
}

impl Default for ThresholdMode {
    fn default() -> Self {
        Self::Fixed(MIDPOINT)
    }
}

impl FromStr for ThresholdMode {
    type Err = String;

    /// Accepts `fixed`, `fixed:<0-255>`, `otsu`, `sauvola` and `smart`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "fixed" => Ok(Self::Fixed(MIDPOINT)),
            "otsu" => Ok(Self::Otsu),
            "sauvola" => Ok(Self::Sauvola),
            "smart" => Ok(Self::Smart),
            other => match other.strip_prefix("fixed:") {
                Some(level) => level
                    .parse::<u8>()
                    .map(Self::Fixed)
                    .map_err(|_| format!("Invalid fixed threshold level: {}", level)),
                None => Err(format!(
                    "Unknown threshold mode '{}' (expected fixed[:N], otsu, sauvola or smart)",
                    s
                )),
            },
        }
    }
}

impl fmt::Display for ThresholdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(level) => write!(f, "fixed:{}", level),
            Self::Otsu => f.write_str("otsu"),
            Self::Sauvola => f.write_str("sauvola"),
            Self::Smart => f.write_str("smart"),
        }
    }
}

/// Binarize an image with the given mode
pub fn apply(image: DynamicImage, mode: ThresholdMode) -> Result<DynamicImage, CaptchaError> {
    let gray = image.to_luma8();
    Ok(DynamicImage::ImageLuma8(binarize_gray(&gray, mode)))
}

pub fn binarize_gray(gray: &GrayImage, mode: ThresholdMode) -> GrayImage {
    match mode {
        ThresholdMode::Fixed(level) => global_threshold(gray, level),
        ThresholdMode::Otsu => global_threshold(gray, otsu_level(gray)),
        ThresholdMode::Sauvola => sauvola_threshold(gray, WINDOW_SIZE, K),
        ThresholdMode::Smart => smart_threshold(gray),
    }
}

fn global_threshold(img: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y).0[0] > level {
            Luma([BACKGROUND])
        } else {
            Luma([FOREGROUND])
        }
    })
}

/// Otsu cutoff, flipped when most of the image comes out dark (light glyphs
/// on a dark background), with the fixed midpoint as the last resort.
fn smart_threshold(img: &GrayImage) -> GrayImage {
    let mut binary = global_threshold(img, otsu_level(img));
    let mut ratio = foreground_ratio(&binary);

    if ratio > 0.5 {
        invert(&mut binary);
        ratio = 1.0 - ratio;
    }

    if !(MIN_FOREGROUND_RATIO..=MAX_FOREGROUND_RATIO).contains(&ratio) {
        tracing::debug!(
            "Smart threshold foreground ratio {:.3} out of range, using midpoint",
            ratio
        );
        return global_threshold(img, MIDPOINT);
    }

    binary
}

/// Share of foreground pixels in a binary image
pub fn foreground_ratio(binary: &GrayImage) -> f32 {
    let total = binary.width() as usize * binary.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let foreground = binary.pixels().filter(|p| p.0[0] == FOREGROUND).count();
    foreground as f32 / total as f32
}

fn invert(binary: &mut GrayImage) {
    for pixel in binary.pixels_mut() {
        pixel.0[0] = if pixel.0[0] == FOREGROUND {
            BACKGROUND
        } else {
            FOREGROUND
        };
    }
}

/// Sauvola adaptive thresholding
///
/// For each pixel, threshold = mean * (1 + k * (std_dev / R - 1))
/// where R is max standard deviation (128 for 8-bit images)
fn sauvola_threshold(img: &GrayImage, window_size: u32, k: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    let half_window = window_size as i32 / 2;

    let (integral, integral_sq) = compute_integral_images(img);

    GrayImage::from_fn(width, height, |x, y| {
        let x1 = (x as i32 - half_window).max(0) as u32;
        let y1 = (y as i32 - half_window).max(0) as u32;
        let x2 = (x as i32 + half_window).min(width as i32 - 1) as u32;
        let y2 = (y as i32 + half_window).min(height as i32 - 1) as u32;

        let (mean, std_dev) = window_stats(&integral, &integral_sq, x1, y1, x2, y2);
        let threshold = mean * (1.0 + k * (std_dev / R - 1.0));

        if img.get_pixel(x, y).0[0] as f32 > threshold {
            Luma([BACKGROUND])
        } else {
            Luma([FOREGROUND])
        }
    })
}

/// Integral image and integral of squared values, one row/column of padding
fn compute_integral_images(img: &GrayImage) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let (width, height) = img.dimensions();
    let mut integral = vec![vec![0.0f64; width as usize + 1]; height as usize + 1];
    let mut integral_sq = vec![vec![0.0f64; width as usize + 1]; height as usize + 1];

    for y in 0..height as usize {
        for x in 0..width as usize {
            let val = img.get_pixel(x as u32, y as u32).0[0] as f64;
            integral[y + 1][x + 1] =
                val + integral[y][x + 1] + integral[y + 1][x] - integral[y][x];
            integral_sq[y + 1][x + 1] =
                val * val + integral_sq[y][x + 1] + integral_sq[y + 1][x] - integral_sq[y][x];
        }
    }

    (integral, integral_sq)
}

fn window_stats(
    integral: &[Vec<f64>],
    integral_sq: &[Vec<f64>],
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
) -> (f32, f32) {
    let (x1, y1, x2, y2) = (x1 as usize, y1 as usize, x2 as usize + 1, y2 as usize + 1);
    let area = ((x2 - x1) * (y2 - y1)) as f64;

    let sum = integral[y2][x2] - integral[y1][x2] - integral[y2][x1] + integral[y1][x1];
    let sum_sq =
        integral_sq[y2][x2] - integral_sq[y1][x2] - integral_sq[y2][x1] + integral_sq[y1][x1];

    let mean = sum / area;
    let variance = (sum_sq / area) - (mean * mean);

    (mean as f32, variance.max(0.0).sqrt() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_binary(img: &GrayImage) {
        for pixel in img.pixels() {
            assert!(
                pixel.0[0] == FOREGROUND || pixel.0[0] == BACKGROUND,
                "Expected binary pixel, got {}",
                pixel.0[0]
            );
        }
    }

    fn gradient() -> GrayImage {
        GrayImage::from_fn(50, 50, |x, _| Luma([(x as u8 * 5).min(255)]))
    }

    #[test]
    fn test_every_mode_binarizes_gradient() {
        for mode in [
            ThresholdMode::Fixed(MIDPOINT),
            ThresholdMode::Otsu,
            ThresholdMode::Sauvola,
            ThresholdMode::Smart,
        ] {
            let result = binarize_gray(&gradient(), mode);
            assert_eq!(result.dimensions(), (50, 50), "mode {}", mode);
            assert_binary(&result);
        }
    }

    #[test]
    fn test_fixed_threshold_cutoff_is_exclusive() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[127u8, 128, 129][x as usize]]));
        let result = binarize_gray(&img, ThresholdMode::Fixed(MIDPOINT));
        assert_eq!(result.get_pixel(0, 0).0[0], FOREGROUND);
        assert_eq!(result.get_pixel(1, 0).0[0], FOREGROUND);
        assert_eq!(result.get_pixel(2, 0).0[0], BACKGROUND);
    }

    #[test]
    fn test_sauvola_handles_text_pattern() {
        let mut img = GrayImage::from_pixel(50, 20, Luma([240]));
        for x in 10..40 {
            img.put_pixel(x, 10, Luma([20]));
        }

        let result = binarize_gray(&img, ThresholdMode::Sauvola);

        assert_eq!(result.get_pixel(25, 10).0[0], FOREGROUND);
        assert_eq!(result.get_pixel(25, 5).0[0], BACKGROUND);
    }

    #[test]
    fn test_smart_flips_light_text_on_dark_background() {
        let mut img = GrayImage::from_pixel(40, 20, Luma([30]));
        for y in 5..15 {
            for x in 10..20 {
                img.put_pixel(x, y, Luma([220]));
            }
        }

        let result = binarize_gray(&img, ThresholdMode::Smart);

        assert_eq!(result.get_pixel(15, 10).0[0], FOREGROUND);
        assert_eq!(result.get_pixel(2, 2).0[0], BACKGROUND);
        assert!(foreground_ratio(&result) < 0.5);
    }

    #[test]
    fn test_smart_falls_back_on_uniform_image() {
        let img = GrayImage::from_pixel(10, 10, Luma([200]));
        let result = binarize_gray(&img, ThresholdMode::Smart);
        assert_binary(&result);
        assert_eq!(foreground_ratio(&result), 0.0);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("fixed".parse::<ThresholdMode>(), Ok(ThresholdMode::Fixed(128)));
        assert_eq!("fixed:90".parse::<ThresholdMode>(), Ok(ThresholdMode::Fixed(90)));
        assert_eq!("OTSU".parse::<ThresholdMode>(), Ok(ThresholdMode::Otsu));
        assert_eq!("smart".parse::<ThresholdMode>(), Ok(ThresholdMode::Smart));
        assert!("fixed:300".parse::<ThresholdMode>().is_err());
        assert!("bogus".parse::<ThresholdMode>().is_err());
        assert_eq!(ThresholdMode::Fixed(90).to_string(), "fixed:90");
    }
}

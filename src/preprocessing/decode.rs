//! Captcha decoding
//!
//! Animated GIF captchas spread their glyphs over several frames; the frames
//! are merged into a single still image before recognition.

use crate::error::CaptchaError;
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Pixels with every RGB channel at or above this level are background
pub const DEFAULT_BACKGROUND_THRESHOLD: u8 = 220;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Decode raw captcha bytes into an image, merging animation frames
pub fn decode_captcha(bytes: &[u8], background_threshold: u8) -> Result<DynamicImage, CaptchaError> {
    if bytes.is_empty() {
        return Err(CaptchaError::InvalidImage("empty image data".to_string()));
    }

    let format = image::guess_format(bytes)
        .map_err(|e| CaptchaError::InvalidImage(format!("Unrecognized image format: {}", e)))?;

    if format == ImageFormat::Gif {
        return composite_gif(bytes, background_threshold);
    }

    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| CaptchaError::InvalidImage(format!("Failed to decode image: {}", e)))
}

/// Overlay the foreground of every GIF frame onto a white canvas
fn composite_gif(bytes: &[u8], background_threshold: u8) -> Result<DynamicImage, CaptchaError> {
    let decoder = GifDecoder::new(Cursor::new(bytes))
        .map_err(|e| CaptchaError::InvalidImage(format!("Failed to read GIF: {}", e)))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| CaptchaError::InvalidImage(format!("Failed to decode GIF frames: {}", e)))?;

    let first = frames
        .first()
        .ok_or_else(|| CaptchaError::InvalidImage("GIF has no frames".to_string()))?;
    let (width, height) = first.buffer().dimensions();

    tracing::debug!("Compositing {} GIF frame(s) of {}x{}", frames.len(), width, height);

    let mut canvas = RgbaImage::from_pixel(width, height, WHITE);
    for frame in &frames {
        overlay_foreground(&mut canvas, frame.buffer(), frame.left(), frame.top(), background_threshold);
    }

    Ok(DynamicImage::ImageRgba8(canvas).into_rgb8().into())
}

pub fn overlay_foreground(
    canvas: &mut RgbaImage,
    frame: &RgbaImage,
    left: u32,
    top: u32,
    background_threshold: u8,
) {
    for (x, y, pixel) in frame.enumerate_pixels() {
        let (cx, cy) = (x + left, y + top);
        if cx >= canvas.width() || cy >= canvas.height() {
            continue;
        }
        let [r, g, b, a] = pixel.0;
        if a == 0 {
            continue;
        }
        if r < background_threshold || g < background_threshold || b < background_threshold {
            canvas.put_pixel(cx, cy, Rgba([r, g, b, 255]));
        }
    }
}

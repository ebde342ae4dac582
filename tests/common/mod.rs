#![allow(dead_code)]

pub mod onnx_models;

use image::codecs::gif::GifEncoder;
use image::{
    imageops, Delay, DynamicImage, Frame, GrayImage, ImageFormat, Luma, Rgb, RgbImage, Rgba,
    RgbaImage,
};
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

pub const WIDTH: u32 = 150;
pub const HEIGHT: u32 = 50;
pub const SLOT: u32 = 30;

pub const OPERATOR_NAMES: [&str; 3] = ["plus", "minus", "times"];

/// Glyph for a pattern id: a dark 4-row bar whose height depends on the id.
/// Digits use ids 0-9, operators 10-12.
pub fn glyph(pattern: u32) -> GrayImage {
    GrayImage::from_fn(SLOT, HEIGHT, |x, y| {
        if in_glyph(pattern, x, y) {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

/// Whether slot pixel `(x, y)` is dark in the glyph of `pattern`
pub fn in_glyph(pattern: u32, x: u32, y: u32) -> bool {
    let top = 2 + pattern * 3;
    (top..top + 4).contains(&y) && (5..25).contains(&x)
}

/// Template directories for both models
pub struct ModelDirs {
    pub digits: TempDir,
    pub operators: TempDir,
}

impl ModelDirs {
    pub fn create() -> Self {
        let digits = tempfile::tempdir().expect("Failed to create digits dir");
        for d in 0..10 {
            glyph(d)
                .save(digits.path().join(format!("{}.png", d)))
                .expect("Failed to write digit template");
        }

        let operators = tempfile::tempdir().expect("Failed to create operators dir");
        for (i, name) in OPERATOR_NAMES.iter().enumerate() {
            glyph(10 + i as u32)
                .save(operators.path().join(format!("{}.png", name)))
                .expect("Failed to write operator template");
        }

        Self { digits, operators }
    }

    pub fn digits_path(&self) -> &Path {
        self.digits.path()
    }

    pub fn operators_path(&self) -> &Path {
        self.operators.path()
    }
}

/// Operator index: 0 = '+', 1 = '-', 2 = '*'
pub fn captcha_gray(left: u32, operator: u32, right: u32) -> GrayImage {
    let mut canvas = GrayImage::from_pixel(WIDTH, HEIGHT, Luma([255]));
    for (slot, pattern) in [left, 10 + operator, right].into_iter().enumerate() {
        imageops::replace(&mut canvas, &glyph(pattern), slot as i64 * SLOT as i64, 0);
    }
    canvas
}

/// Colored captcha: blue glyphs on an off-white background
pub fn captcha_rgb(left: u32, operator: u32, right: u32) -> RgbImage {
    let gray = captcha_gray(left, operator, right);
    RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        if gray.get_pixel(x, y).0[0] == 0 {
            Rgb([30, 40, 150])
        } else {
            Rgb([240, 238, 230])
        }
    })
}

pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("Failed to encode PNG");
    bytes
}

/// Animated captcha: each glyph appears in its own frame
pub fn gif_bytes(left: u32, operator: u32, right: u32) -> Vec<u8> {
    let full = captcha_gray(left, operator, right);
    let frames: Vec<RgbaImage> = (0..3)
        .map(|slot| {
            RgbaImage::from_fn(WIDTH, HEIGHT, |x, y| {
                let in_slot = x / SLOT == slot;
                if in_slot && full.get_pixel(x, y).0[0] == 0 {
                    Rgba([0, 0, 0, 255])
                } else {
                    Rgba([255, 255, 255, 255])
                }
            })
        })
        .collect();

    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut bytes);
        encoder
            .encode_frames(frames.into_iter().map(|buffer| {
                Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(100, 1))
            }))
            .expect("Failed to encode GIF");
    }
    bytes
}

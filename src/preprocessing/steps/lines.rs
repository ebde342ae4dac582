use super::threshold::{BACKGROUND, FOREGROUND};
use crate::error::CaptchaError;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

/// A component at most this thick...
const MAX_LINE_THICKNESS: u32 = 2;
/// ...and longer than this is treated as an interference line
const MIN_LINE_LENGTH: u32 = 10;

#[derive(Debug, Clone, Copy)]
struct BoundingBox {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl BoundingBox {
    fn new(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn extend(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    fn is_thin_line(&self) -> bool {
        let w = self.max_x - self.min_x + 1;
        let h = self.max_y - self.min_y + 1;
        (h <= MAX_LINE_THICKNESS && w > MIN_LINE_LENGTH)
            || (w <= MAX_LINE_THICKNESS && h > MIN_LINE_LENGTH)
    }
}

/// Remove thin, long strokes drawn across the captcha to confuse OCR.
/// Expects a binary image; the output is binary as well.
pub fn apply(image: DynamicImage) -> Result<DynamicImage, CaptchaError> {
    let binary = image.to_luma8();
    Ok(DynamicImage::ImageLuma8(remove_interference_lines(&binary)))
}

pub fn remove_interference_lines(binary: &GrayImage) -> GrayImage {
    let labels = connected_components(binary, Connectivity::Eight, Luma([BACKGROUND]));

    let mut boxes: Vec<Option<BoundingBox>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0] as usize;
        if label == 0 {
            continue;
        }
        if boxes.len() <= label {
            boxes.resize(label + 1, None);
        }
        match &mut boxes[label] {
            Some(bbox) => bbox.extend(x, y),
            slot => *slot = Some(BoundingBox::new(x, y)),
        }
    }

    let is_line: Vec<bool> = boxes
        .iter()
        .map(|bbox| bbox.map(|b| b.is_thin_line()).unwrap_or(false))
        .collect();
    let removed = is_line.iter().filter(|&&line| line).count();
    if removed > 0 {
        tracing::debug!("Removing {} interference line(s)", removed);
    }

    GrayImage::from_fn(binary.width(), binary.height(), |x, y| {
        let label = labels.get_pixel(x, y).0[0] as usize;
        if label != 0 && is_line[label] {
            Luma([BACKGROUND])
        } else if binary.get_pixel(x, y).0[0] == FOREGROUND {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}

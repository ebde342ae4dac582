//! Glyph segmentation
//!
//! Captchas are laid out as five equal-width slots on the canvas:
//! `digit operator digit = ?`.

use crate::error::CaptchaError;
use crate::preprocessing::{CANVAS_HEIGHT, CANVAS_WIDTH};
use image::{imageops, GrayImage};

pub const SLOT_COUNT: u32 = 5;
pub const SLOT_WIDTH: u32 = CANVAS_WIDTH / SLOT_COUNT;

/// What each slot holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRole {
    Digit,
    Operator,
    /// Fixed glyph that is never classified
    Literal(char),
}

pub const SLOT_ROLES: [SlotRole; SLOT_COUNT as usize] = [
    SlotRole::Digit,
    SlotRole::Operator,
    SlotRole::Digit,
    SlotRole::Literal('='),
    SlotRole::Literal('?'),
];

/// Cut a canvas-sized binary image into its slots
pub fn split_slots(binary: &GrayImage) -> Result<Vec<GrayImage>, CaptchaError> {
    if binary.dimensions() != (CANVAS_WIDTH, CANVAS_HEIGHT) {
        return Err(CaptchaError::InvalidImage(format!(
            "expected a {}x{} captcha, got {}x{}",
            CANVAS_WIDTH,
            CANVAS_HEIGHT,
            binary.width(),
            binary.height()
        )));
    }

    Ok((0..SLOT_COUNT)
        .map(|i| imageops::crop_imm(binary, i * SLOT_WIDTH, 0, SLOT_WIDTH, CANVAS_HEIGHT).to_image())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_split_yields_five_slots() {
        let img = GrayImage::from_fn(CANVAS_WIDTH, CANVAS_HEIGHT, |x, _| {
            Luma([(x / SLOT_WIDTH) as u8 * 10])
        });

        let slots = split_slots(&img).unwrap();

        assert_eq!(slots.len(), 5);
        for (i, slot) in slots.iter().enumerate() {
            assert_eq!(slot.dimensions(), (30, 50));
            assert!(slot.pixels().all(|p| p.0[0] == i as u8 * 10));
        }
    }

    #[test]
    fn test_split_rejects_wrong_size() {
        let err = split_slots(&GrayImage::new(100, 50)).unwrap_err();
        assert!(matches!(err, CaptchaError::InvalidImage(_)));
    }

    #[test]
    fn test_roles_match_layout() {
        assert_eq!(SLOT_ROLES.len(), SLOT_COUNT as usize);
        assert_eq!(SLOT_ROLES[1], SlotRole::Operator);
    }
}

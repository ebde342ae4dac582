//! Individual preprocessing steps

pub mod denoise;
pub mod grayscale;
pub mod lines;
pub mod resize;
pub mod threshold;

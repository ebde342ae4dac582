//! ONNX Runtime classifier
//!
//! Expects a single NCHW float input and a single `[1, classes]` output.
//! Glyph pixels are fed as `1.0`, background as `0.0`.

use crate::error::CaptchaError;
use crate::preprocessing::steps::threshold::FOREGROUND;
use crate::preprocessing::CANVAS_HEIGHT;
use image::{imageops, imageops::FilterType, GrayImage};
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;

use super::model::{best_prediction, Classifier, ModelKind, Prediction};
use super::segment::SLOT_WIDTH;

/// Input geometry of a glyph tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Default for InputShape {
    fn default() -> Self {
        Self {
            channels: 1,
            height: CANVAS_HEIGHT as usize,
            width: SLOT_WIDTH as usize,
        }
    }
}

impl InputShape {
    /// Take the static dimensions of an NCHW input, defaulting dynamic ones
    pub fn from_dims(dims: &[i64]) -> Option<Self> {
        if dims.len() != 4 {
            return None;
        }
        let fallback = Self::default();
        let pick = |d: i64, default: usize| if d > 0 { d as usize } else { default };
        Some(Self {
            channels: pick(dims[1], fallback.channels),
            height: pick(dims[2], fallback.height),
            width: pick(dims[3], fallback.width),
        })
    }
}

pub struct OnnxClassifier {
    kind: ModelKind,
    /// `Session::run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    input_shape: InputShape,
}

impl OnnxClassifier {
    pub fn load(kind: ModelKind, path: &Path) -> Result<Self, CaptchaError> {
        let load_err = |reason: String| CaptchaError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };

        tracing::info!("Loading {} ONNX model from {:?}", kind.name(), path);

        let session = Session::builder()
            .map_err(|e| load_err(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_err(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(1)
            .map_err(|e| load_err(format!("Failed to set intra threads: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| load_err(format!("Failed to load ONNX model: {}", e)))?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| load_err("model has no inputs".to_string()))?;
        if session.outputs.is_empty() {
            return Err(load_err("model has no outputs".to_string()));
        }

        let dims: Vec<i64> = input
            .input_type
            .tensor_shape()
            .map(|shape| shape.iter().copied().collect())
            .unwrap_or_default();
        let input_shape = InputShape::from_dims(&dims).ok_or_else(|| {
            load_err(format!("expected an NCHW input, got shape {:?}", dims))
        })?;
        let input_name = input.name.clone();

        tracing::info!(
            "{} model loaded. Input: {} {:?}, outputs: {}",
            kind.name(),
            input_name,
            input_shape,
            session.outputs.len()
        );

        Ok(Self {
            kind,
            session: Mutex::new(session),
            input_name,
            input_shape,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn backend(&self) -> &'static str {
        "onnx"
    }

    fn classify(&self, glyph: &GrayImage) -> Result<Prediction, CaptchaError> {
        let input = glyph_tensor(glyph, self.input_shape);
        let tensor = Tensor::from_array(input)
            .map_err(|e| CaptchaError::Inference(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| CaptchaError::Inference("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| CaptchaError::Inference(format!("{} inference failed: {}", self.kind.name(), e)))?;

        let scores: Vec<f32> = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| CaptchaError::Inference(format!("Failed to extract output tensor: {}", e)))?
            .iter()
            .copied()
            .collect();

        best_prediction(self.kind, &scores)
    }
}

/// Build a `[1, C, H, W]` tensor from a binary glyph
pub fn glyph_tensor(glyph: &GrayImage, shape: InputShape) -> Array4<f32> {
    let (width, height) = (shape.width as u32, shape.height as u32);
    let resized;
    let glyph = if glyph.dimensions() == (width, height) {
        glyph
    } else {
        resized = imageops::resize(glyph, width, height, FilterType::Nearest);
        &resized
    };

    Array4::from_shape_fn((1, shape.channels, shape.height, shape.width), |(_, _, y, x)| {
        if glyph.get_pixel(x as u32, y as u32).0[0] == FOREGROUND {
            1.0
        } else {
            0.0
        }
    })
}

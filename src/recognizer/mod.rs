//! Captcha recognizer
//!
//! Owns the digits and operators model handles and turns a raw captcha into
//! an arithmetic statement such as `8-6=2`.
//!
//! State machine: `Unloaded -> load_models() -> Ready`. A failed load always
//! ends in `Unloaded`. `recognize` only works in `Ready`.

pub mod expression;
pub mod model;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod segment;
pub mod templates;

pub use expression::{Expression, Operator};
pub use model::{load_model, Classifier, ModelKind, Prediction};

use crate::error::CaptchaError;
use crate::preprocessing::{Pipeline, CANVAS_HEIGHT, CANVAS_WIDTH};
use image::{imageops, imageops::FilterType, DynamicImage, GrayImage};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use segment::{split_slots, SlotRole, SLOT_ROLES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognizerState {
    Unloaded,
    Ready,
}

/// Outcome of a successful recognition
#[derive(Debug, Clone, Serialize)]
pub struct Recognition {
    /// `left op right = answer`, e.g. `8-6=2`
    pub expression: String,
    pub answer: i64,
    /// Mean probability of the classified slots, in `[0, 1]`
    pub confidence: f32,
    /// Raw tokens of every slot, e.g. `8-6=?`
    pub tokens: String,
    pub processing_time_ms: u64,
}

struct Models {
    digits: Box<dyn Classifier>,
    operators: Box<dyn Classifier>,
}

pub struct Recognizer {
    digits_model_path: PathBuf,
    operators_model_path: PathBuf,
    pipeline: Pipeline,
    models: Option<Models>,
}

impl Recognizer {
    /// Remember the model locations; nothing is read until `load_models`
    pub fn new(digits_model_path: impl Into<PathBuf>, operators_model_path: impl Into<PathBuf>) -> Self {
        Self {
            digits_model_path: digits_model_path.into(),
            operators_model_path: operators_model_path.into(),
            pipeline: Pipeline::default(),
            models: None,
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn digits_model_path(&self) -> &Path {
        &self.digits_model_path
    }

    pub fn operators_model_path(&self) -> &Path {
        &self.operators_model_path
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn state(&self) -> RecognizerState {
        if self.models.is_some() {
            RecognizerState::Ready
        } else {
            RecognizerState::Unloaded
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == RecognizerState::Ready
    }

    /// Load both models, replacing any previously held handles.
    ///
    /// Returns `true` only if both models loaded; the reason for a failure
    /// is logged. Use [`Recognizer::try_load_models`] to get it as an error.
    pub fn load_models(&mut self) -> bool {
        match self.try_load_models() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        }
    }

    pub fn try_load_models(&mut self) -> Result<(), CaptchaError> {
        // Old handles are released before the new ones are created
        self.models = None;

        let digits = load_model(ModelKind::Digits, &self.digits_model_path)?;
        let operators = load_model(ModelKind::Operators, &self.operators_model_path)?;

        tracing::info!(
            "Models ready (digits: {}, operators: {})",
            digits.backend(),
            operators.backend()
        );

        self.models = Some(Models { digits, operators });
        Ok(())
    }

    /// Preprocess the captcha, classify its slots and evaluate the statement
    pub fn recognize(&self, image: &DynamicImage) -> Result<Recognition, CaptchaError> {
        let start = Instant::now();

        let Some(models) = &self.models else {
            tracing::error!("recognize called before models were loaded");
            return Err(CaptchaError::ModelsNotLoaded);
        };

        let preprocessed = self.pipeline.process(image.clone())?;
        let slots = split_slots(&fit_to_canvas(preprocessed.image))?;

        let mut tokens = String::with_capacity(slots.len());
        let mut probabilities = Vec::with_capacity(slots.len());
        for (slot, role) in slots.iter().zip(SLOT_ROLES) {
            let prediction = match role {
                SlotRole::Digit => models.digits.classify(slot)?,
                SlotRole::Operator => models.operators.classify(slot)?,
                SlotRole::Literal(token) => {
                    tokens.push(token);
                    continue;
                }
            };
            tokens.push(prediction.token);
            probabilities.push(prediction.probability);
        }

        let mut classified = tokens.chars();
        let (left, operator, right) = match (classified.next(), classified.next(), classified.next()) {
            (Some(l), Some(op), Some(r)) => (l, op, r),
            _ => return Err(CaptchaError::Expression(format!("incomplete tokens '{}'", tokens))),
        };
        let expression = Expression::from_tokens(left, operator, right)?;
        let answer = expression.evaluate()?;

        let confidence = mean_confidence(&probabilities);
        let processing_time_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "Recognized '{}' as {}={} (confidence {:.3}) in {}ms",
            tokens,
            expression,
            answer,
            confidence,
            processing_time_ms
        );

        Ok(Recognition {
            expression: format!("{}={}", expression, answer),
            answer,
            confidence,
            tokens,
            processing_time_ms,
        })
    }
}

/// Presets that keep the input size leave segmentation to scale the image.
/// Nearest-neighbour keeps it binary.
fn fit_to_canvas(binary: GrayImage) -> GrayImage {
    if binary.dimensions() == (CANVAS_WIDTH, CANVAS_HEIGHT) {
        return binary;
    }
    tracing::debug!(
        "Scaling {}x{} binary image to the {}x{} canvas",
        binary.width(),
        binary.height(),
        CANVAS_WIDTH,
        CANVAS_HEIGHT
    );
    imageops::resize(&binary, CANVAS_WIDTH, CANVAS_HEIGHT, FilterType::Nearest)
}

fn mean_confidence(probabilities: &[f32]) -> f32 {
    if probabilities.is_empty() {
        return 0.0;
    }
    let mean = probabilities.iter().sum::<f32>() / probabilities.len() as f32;
    mean.clamp(0.0, 1.0)
}

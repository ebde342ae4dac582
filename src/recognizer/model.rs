//! Model handles
//!
//! A model maps one glyph slot to a token of its alphabet. Two backends are
//! available: ONNX Runtime graphs (`*.onnx` files) and template directories.

use crate::error::CaptchaError;
use image::GrayImage;
use std::path::Path;

use super::templates::TemplateClassifier;

const DIGITS: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];
const OPERATORS: [char; 3] = ['+', '-', '*'];

/// Which of the two classifiers a model is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Digits,
    Operators,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Digits => "digits",
            Self::Operators => "operators",
        }
    }

    /// Class labels in model output order
    pub fn alphabet(&self) -> &'static [char] {
        match self {
            Self::Digits => &DIGITS,
            Self::Operators => &OPERATORS,
        }
    }

    /// Map a template label (file stem) to its token
    pub fn token_for_label(&self, label: &str) -> Option<char> {
        let token = match (self, label) {
            (Self::Operators, "plus" | "add") => '+',
            (Self::Operators, "minus" | "sub") => '-',
            (Self::Operators, "times" | "mul") => '*',
            (_, label) => {
                let mut chars = label.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => return None,
                }
            }
        };
        self.alphabet().contains(&token).then_some(token)
    }
}

/// Most likely token for a glyph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub token: char,
    /// In `[0, 1]`
    pub probability: f32,
}

/// Trait that every loaded model handle implements
pub trait Classifier: Send + Sync {
    /// Backend identifier (e.g. "onnx", "templates")
    fn backend(&self) -> &'static str;

    /// Classify one binary glyph slot
    fn classify(&self, glyph: &GrayImage) -> Result<Prediction, CaptchaError>;
}

/// Load a model handle from `path`: directories are template sets, files
/// are ONNX graphs.
pub fn load_model(kind: ModelKind, path: &Path) -> Result<Box<dyn Classifier>, CaptchaError> {
    if !path.exists() {
        return Err(CaptchaError::ModelLoad {
            path: path.to_path_buf(),
            reason: "file not found".to_string(),
        });
    }

    if path.is_dir() {
        return Ok(Box::new(TemplateClassifier::load(kind, path)?));
    }

    load_onnx(kind, path)
}

#[cfg(feature = "onnx")]
fn load_onnx(kind: ModelKind, path: &Path) -> Result<Box<dyn Classifier>, CaptchaError> {
    Ok(Box::new(super::onnx::OnnxClassifier::load(kind, path)?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(_kind: ModelKind, path: &Path) -> Result<Box<dyn Classifier>, CaptchaError> {
    Err(CaptchaError::ModelLoad {
        path: path.to_path_buf(),
        reason: "built without ONNX support; rebuild with --features onnx or use a template directory"
            .to_string(),
    })
}

/// Turn raw model scores into a probability distribution.
///
/// Outputs that already form a distribution are kept, anything else goes
/// through a numerically stable softmax.
pub fn to_probabilities(scores: &[f32]) -> Vec<f32> {
    let sum: f32 = scores.iter().sum();
    let is_distribution = scores.iter().all(|s| (0.0..=1.0).contains(s)) && (sum - 1.0).abs() < 1e-3;
    if is_distribution {
        return scores.to_vec();
    }

    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.iter().map(|e| e / total).collect()
}

/// Pick the most probable class of `kind` from raw scores
pub fn best_prediction(kind: ModelKind, scores: &[f32]) -> Result<Prediction, CaptchaError> {
    let alphabet = kind.alphabet();
    if scores.len() != alphabet.len() {
        return Err(CaptchaError::Inference(format!(
            "{} model produced {} classes, expected {}",
            kind.name(),
            scores.len(),
            alphabet.len()
        )));
    }

    let probabilities = to_probabilities(scores);
    let (index, probability) = probabilities
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, p)| p.is_finite())
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or_else(|| CaptchaError::Inference(format!("{} model produced no scores", kind.name())))?;

    Ok(Prediction {
        token: alphabet[index],
        probability: probability.clamp(0.0, 1.0),
    })
}

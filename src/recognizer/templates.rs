//! Template-matching classifier
//!
//! A template set is a directory of glyph images named
//! `<label>[_<anything>].<ext>`, e.g. `7.png`, `7_bold.png`, `plus.png`.
//! Several templates may share a label.

use crate::error::CaptchaError;
use crate::preprocessing::steps::threshold::{binarize_gray, FOREGROUND, MIDPOINT};
use crate::preprocessing::ThresholdMode;
use image::{imageops, imageops::FilterType, GrayImage};
use std::path::Path;

use super::model::{Classifier, ModelKind, Prediction};

struct Template {
    token: char,
    glyph: GrayImage,
}

pub struct TemplateClassifier {
    kind: ModelKind,
    templates: Vec<Template>,
}

impl TemplateClassifier {
    pub fn load(kind: ModelKind, dir: &Path) -> Result<Self, CaptchaError> {
        let load_err = |reason: String| CaptchaError::ModelLoad {
            path: dir.to_path_buf(),
            reason,
        };

        let entries = std::fs::read_dir(dir)
            .map_err(|e| load_err(format!("Failed to read template directory: {}", e)))?;

        let mut templates = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| load_err(format!("Failed to read directory entry: {}", e)))?
                .path();
            if !path.is_file() {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let label = stem.split('_').next().unwrap_or(stem);
            let Some(token) = kind.token_for_label(label) else {
                tracing::warn!(
                    "Skipping template {:?}: '{}' is not a {} label",
                    path,
                    label,
                    kind.name()
                );
                continue;
            };

            let img = image::open(&path)
                .map_err(|e| load_err(format!("Failed to load template {:?}: {}", path, e)))?;
            if img.width() == 0 || img.height() == 0 {
                return Err(load_err(format!("Template {:?} is empty", path)));
            }

            templates.push(Template {
                token,
                glyph: binarize_gray(&img.to_luma8(), ThresholdMode::Fixed(MIDPOINT)),
            });
        }

        if templates.is_empty() {
            return Err(load_err(format!("no {} templates found", kind.name())));
        }

        // read_dir order is platform dependent
        templates.sort_by_key(|t| t.token);

        tracing::info!(
            "Loaded {} {} template(s) from {:?}",
            templates.len(),
            kind.name(),
            dir
        );

        Ok(Self { kind, templates })
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }
}

impl Classifier for TemplateClassifier {
    fn backend(&self) -> &'static str {
        "templates"
    }

    fn classify(&self, glyph: &GrayImage) -> Result<Prediction, CaptchaError> {
        let mut best: Option<Prediction> = None;

        for template in &self.templates {
            let score = match_score(glyph, &template.glyph);
            if best.map_or(true, |b| score > b.probability) {
                best = Some(Prediction {
                    token: template.token,
                    probability: score,
                });
            }
        }

        best.ok_or_else(|| {
            CaptchaError::Inference(format!("no {} templates to match against", self.kind.name()))
        })
    }
}

/// Fraction of pixels on which glyph and template agree
fn match_score(glyph: &GrayImage, template: &GrayImage) -> f32 {
    let resized;
    let glyph = if glyph.dimensions() == template.dimensions() {
        glyph
    } else {
        resized = imageops::resize(glyph, template.width(), template.height(), FilterType::Nearest);
        &resized
    };

    let total = template.width() as usize * template.height() as usize;
    let agreeing = glyph
        .pixels()
        .zip(template.pixels())
        .filter(|(a, b)| (a.0[0] == FOREGROUND) == (b.0[0] == FOREGROUND))
        .count();

    agreeing as f32 / total as f32
}

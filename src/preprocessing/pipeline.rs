use crate::error::CaptchaError;
use image::{DynamicImage, GrayImage};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use super::steps;
use super::steps::threshold::ThresholdMode;
use super::{ensure_non_empty, CANVAS_HEIGHT, CANVAS_WIDTH};

/// Preprocessing preset names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// Grayscale and threshold only; keeps the input size
    Minimal,
    /// Steps: grayscale, resize, threshold, line removal
    #[default]
    Default,
    /// Steps: grayscale, resize, denoise, threshold, line removal
    Aggressive,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Default => "default",
            Self::Aggressive => "aggressive",
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minimal" => Ok(Self::Minimal),
            "default" => Ok(Self::Default),
            "aggressive" => Ok(Self::Aggressive),
            _ => Err(format!(
                "Unknown preset '{}' (expected minimal, default or aggressive)",
                s
            )),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of preprocessing including timing stats
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingResult {
    /// Binary image (not serialized)
    #[serde(skip)]
    pub image: GrayImage,
    pub total_time_ms: u64,
    pub preset: String,
    pub steps: Vec<StepTiming>,
}

/// Preprocessing pipeline that applies steps based on preset
#[derive(Debug, Clone)]
pub struct Pipeline {
    preset: Preset,
    threshold: ThresholdMode,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Preset::default(), ThresholdMode::default())
    }
}

impl Pipeline {
    pub fn new(preset: Preset, threshold: ThresholdMode) -> Self {
        Self { preset, threshold }
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn threshold(&self) -> ThresholdMode {
        self.threshold
    }

    /// Turn a raw captcha into a binary image ready for segmentation
    pub fn process(&self, image: DynamicImage) -> Result<PreprocessingResult, CaptchaError> {
        ensure_non_empty(&image)?;

        let start = Instant::now();
        let mut steps_timing = Vec::new();
        let threshold = self.threshold;

        let mut img = self.run_step("grayscale", image, &mut steps_timing, steps::grayscale::apply)?;

        if self.preset != Preset::Minimal {
            img = self.run_step("resize", img, &mut steps_timing, |img| {
                steps::resize::apply(img, CANVAS_WIDTH, CANVAS_HEIGHT)
            })?;
        }

        if self.preset == Preset::Aggressive {
            img = self.run_step("denoise", img, &mut steps_timing, steps::denoise::apply)?;
        }

        img = self.run_step("threshold", img, &mut steps_timing, |img| {
            steps::threshold::apply(img, threshold)
        })?;

        if self.preset != Preset::Minimal {
            img = self.run_step("lines", img, &mut steps_timing, steps::lines::apply)?;
        }

        let total_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            "Preprocessing ({}, {}) finished in {}ms: {:?}",
            self.preset,
            threshold,
            total_time_ms,
            steps_timing
        );

        Ok(PreprocessingResult {
            image: img.into_luma8(),
            total_time_ms,
            preset: self.preset.as_str().to_string(),
            steps: steps_timing,
        })
    }

    fn run_step<F>(
        &self,
        name: &str,
        img: DynamicImage,
        timings: &mut Vec<StepTiming>,
        step_fn: F,
    ) -> Result<DynamicImage, CaptchaError>
    where
        F: FnOnce(DynamicImage) -> Result<DynamicImage, CaptchaError>,
    {
        let step_start = Instant::now();
        let result = step_fn(img)?;
        timings.push(StepTiming {
            name: name.to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });
        Ok(result)
    }
}

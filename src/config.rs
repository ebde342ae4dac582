use crate::preprocessing::{Pipeline, Preset, ThresholdMode};
use crate::cli::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub digits_model: PathBuf,
    pub operators_model: PathBuf,
    pub preset: Preset,
    pub threshold: ThresholdMode,
    pub background_threshold: u8,
    pub inference_timeout: Duration,
    pub download_timeout: Duration,
}

impl Config {
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.preset, self.threshold)
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            digits_model: args.digits_model,
            operators_model: args.operators_model,
            preset: args.preset,
            threshold: args.threshold,
            background_threshold: args.background_threshold,
            inference_timeout: Duration::from_millis(args.inference_timeout_ms),
            download_timeout: Duration::from_secs(args.download_timeout_secs),
        }
    }
}

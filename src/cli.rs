use crate::preprocessing::{Preset, ThresholdMode, DEFAULT_BACKGROUND_THRESHOLD};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "captcha-solver")]
#[command(about = "Arithmetic captcha recognizer")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Host address to bind to
    #[arg(long, env = "CAPTCHA_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "CAPTCHA_PORT", default_value = "9393")]
    pub port: u16,

    /// Maximum upload size in bytes (default: 1MB)
    #[arg(long, env = "CAPTCHA_MAX_FILE_SIZE", default_value = "1048576")]
    pub max_file_size: usize,

    /// Digits model: an .onnx file or a template directory
    #[arg(long, env = "CAPTCHA_DIGITS_MODEL", default_value = "models/digits.onnx")]
    pub digits_model: PathBuf,

    /// Operators model: an .onnx file or a template directory
    #[arg(long, env = "CAPTCHA_OPERATORS_MODEL", default_value = "models/operators.onnx")]
    pub operators_model: PathBuf,

    /// Preprocessing preset (minimal, default, aggressive)
    #[arg(long, env = "CAPTCHA_PRESET", default_value = "default")]
    pub preset: Preset,

    /// Threshold mode (fixed, fixed:<0-255>, otsu, sauvola, smart)
    #[arg(long, env = "CAPTCHA_THRESHOLD", default_value = "fixed")]
    pub threshold: ThresholdMode,

    /// GIF pixels with every channel at or above this level are background
    #[arg(long, env = "CAPTCHA_BACKGROUND_THRESHOLD", default_value_t = DEFAULT_BACKGROUND_THRESHOLD)]
    pub background_threshold: u8,

    /// Upper bound for a single recognition in milliseconds
    #[arg(long, env = "CAPTCHA_INFERENCE_TIMEOUT_MS", default_value = "5000")]
    pub inference_timeout_ms: u64,

    /// Timeout for captcha downloads in seconds
    #[arg(long, env = "CAPTCHA_DOWNLOAD_TIMEOUT_SECS", default_value = "10")]
    pub download_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Recognize one captcha from a file path or URL and print it as JSON
    Solve {
        /// Image path or http(s) URL
        input: String,
    },
}

//! Captcha retrieval
//!
//! Downloads captcha images and runs them through decoding and recognition.

use crate::error::CaptchaError;
use crate::preprocessing::decode_captcha;
use crate::recognizer::{Recognition, Recognizer};
use std::path::Path;
use std::time::Duration;

/// Captcha images are tiny; anything bigger is not a captcha
const MAX_DOWNLOAD_BYTES: u64 = 5 * 1024 * 1024;

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Fetch a captcha image over HTTP(S)
pub fn download_captcha(url: &str, timeout: Duration) -> Result<Vec<u8>, CaptchaError> {
    tracing::info!("Downloading captcha from {}", url);

    let response = ureq::get(url)
        .config()
        .timeout_global(Some(timeout))
        .build()
        .call()
        .map_err(|e| CaptchaError::Download(format!("{}: {}", url, e)))?;

    let bytes = response
        .into_body()
        .with_config()
        .limit(MAX_DOWNLOAD_BYTES)
        .read_to_vec()
        .map_err(|e| CaptchaError::Download(format!("Failed to read response body: {}", e)))?;

    tracing::debug!("Downloaded {} bytes", bytes.len());
    Ok(bytes)
}

/// Read a captcha from a local file or URL
pub fn read_captcha(input: &str, timeout: Duration) -> Result<Vec<u8>, CaptchaError> {
    if is_url(input) {
        return download_captcha(input, timeout);
    }
    std::fs::read(Path::new(input))
        .map_err(|e| CaptchaError::InvalidRequest(format!("Failed to read {}: {}", input, e)))
}

/// Decode raw captcha bytes (merging GIF frames) and recognize them
pub fn solve_bytes(
    recognizer: &Recognizer,
    bytes: &[u8],
    background_threshold: u8,
) -> Result<Recognition, CaptchaError> {
    let image = decode_captcha(bytes, background_threshold)?;
    recognizer.recognize(&image)
}

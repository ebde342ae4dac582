use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptchaError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Failed to load model {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Models are not loaded; call load_models first")]
    ModelsNotLoaded,

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unrecognized expression: {0}")]
    Expression(String),

    #[error("Failed to download captcha: {0}")]
    Download(String),

    #[error("Recognition timed out after {0}ms")]
    Timeout(u64),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CaptchaError {
    /// Stable machine-readable code used in HTTP error bodies
    pub fn code(&self) -> &'static str {
        match self {
            CaptchaError::InvalidImage(_) => "INVALID_IMAGE",
            CaptchaError::ModelLoad { .. } => "MODEL_LOAD_FAILURE",
            CaptchaError::ModelsNotLoaded => "MODELS_NOT_LOADED",
            CaptchaError::Inference(_) => "INFERENCE_ERROR",
            CaptchaError::Expression(_) => "EXPRESSION_ERROR",
            CaptchaError::Download(_) => "DOWNLOAD_ERROR",
            CaptchaError::Timeout(_) => "TIMEOUT",
            CaptchaError::ImageTooLarge { .. } => "IMAGE_TOO_LARGE",
            CaptchaError::MissingFile => "MISSING_FILE",
            CaptchaError::InvalidRequest(_) => "INVALID_REQUEST",
            CaptchaError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            CaptchaError::InvalidImage(_)
            | CaptchaError::MissingFile
            | CaptchaError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CaptchaError::ImageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CaptchaError::ModelsNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            CaptchaError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            CaptchaError::Download(_) => StatusCode::BAD_GATEWAY,
            CaptchaError::Expression(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CaptchaError::ModelLoad { .. }
            | CaptchaError::Inference(_)
            | CaptchaError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for CaptchaError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });

        (status, body).into_response()
    }
}

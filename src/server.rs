use crate::config::Config;
use crate::error::CaptchaError;
use crate::fetch::solve_bytes;
use crate::recognizer::{Recognition, Recognizer};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::{Arc, RwLock, TryLockError};
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recognizer: Arc<RwLock<Recognizer>>,
    pub config: Arc<Config>,
}

/// Recognition response
#[derive(Serialize)]
pub struct RecognizeResponse {
    pub expression: String,
    pub answer: i64,
    pub confidence: f32,
    pub processing_time_ms: u64,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub models_loaded: bool,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub digits_model: String,
    pub operators_model: String,
    pub preset: String,
    pub threshold: String,
    pub max_file_size_bytes: usize,
    pub inference_timeout_ms: u64,
}

/// Model reload response
#[derive(Serialize)]
pub struct ReloadResponse {
    pub models_loaded: bool,
}

/// Build a recognizer from the configuration and try to load its models.
/// A failed load is not fatal: the server reports it and `/models/reload`
/// can retry once the model files are in place.
pub fn build_recognizer(config: &Config) -> Recognizer {
    let mut recognizer = Recognizer::new(&config.digits_model, &config.operators_model)
        .with_pipeline(config.pipeline());

    if !recognizer.load_models() {
        tracing::warn!("Models not loaded; /recognize will fail until /models/reload succeeds");
    }

    recognizer
}

pub fn router(state: AppState) -> Router {
    let max_file_size = state.config.max_file_size;

    Router::new()
        .route("/recognize", post(handle_recognize))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .route("/models/reload", post(handle_reload))
        .layer(DefaultBodyLimit::max(max_file_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let recognizer = tokio::task::spawn_blocking({
        let config = config.clone();
        move || build_recognizer(&config)
    })
    .await?;

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState {
        recognizer: Arc::new(RwLock::new(recognizer)),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Handle recognition requests
async fn handle_recognize(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<RecognizeResponse>, CaptchaError> {
    let start = Instant::now();

    let mut file_data: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CaptchaError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
    {
        if field.name() == Some("file") {
            file_data = Some(field.bytes().await.map_err(|e| {
                CaptchaError::InvalidRequest(format!("Failed to read file data: {}", e))
            })?);
        }
    }

    let data = file_data.ok_or(CaptchaError::MissingFile)?;

    if data.len() > state.config.max_file_size {
        return Err(CaptchaError::ImageTooLarge {
            size: data.len(),
            max: state.config.max_file_size,
        });
    }

    let result = recognize_blocking(&state, data).await?;
    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "Recognized {} in {}ms, confidence: {:.2}",
        result.expression,
        processing_time_ms,
        result.confidence
    );

    Ok(Json(RecognizeResponse {
        expression: result.expression,
        answer: result.answer,
        confidence: result.confidence,
        processing_time_ms,
    }))
}

/// Run decoding and inference on the blocking pool, bounded by the
/// configured timeout
async fn recognize_blocking(state: &AppState, data: Bytes) -> Result<Recognition, CaptchaError> {
    let recognizer = state.recognizer.clone();
    let background_threshold = state.config.background_threshold;
    let timeout = state.config.inference_timeout;

    let task = tokio::task::spawn_blocking(move || {
        let recognizer = recognizer
            .read()
            .map_err(|_| CaptchaError::Internal("recognizer lock poisoned".to_string()))?;
        solve_bytes(&recognizer, &data, background_threshold)
    });

    // On timeout the blocking task is detached, not cancelled: it runs to
    // completion and holds the read lock until then, so a reload waits for it.
    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => joined
            .map_err(|e| CaptchaError::Internal(format!("Recognition task failed: {}", e)))?,
        Err(_) => {
            tracing::warn!("Recognition exceeded {:?}", timeout);
            Err(CaptchaError::Timeout(timeout.as_millis() as u64))
        }
    }
}

/// Handle health check requests. Never waits on the recognizer lock: a
/// reload in progress is reported as `reloading`.
async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let (status, models_loaded) = match state.recognizer.try_read() {
        Ok(recognizer) => ("ok", recognizer.is_ready()),
        Err(TryLockError::WouldBlock) => ("reloading", false),
        Err(TryLockError::Poisoned(_)) => ("error", false),
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        models_loaded,
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    let config = &state.config;

    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        digits_model: config.digits_model.display().to_string(),
        operators_model: config.operators_model.display().to_string(),
        preset: config.preset.to_string(),
        threshold: config.threshold.to_string(),
        max_file_size_bytes: config.max_file_size,
        inference_timeout_ms: config.inference_timeout.as_millis() as u64,
    })
}

/// Handle model reload requests
async fn handle_reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, CaptchaError> {
    let recognizer = state.recognizer.clone();

    let models_loaded = tokio::task::spawn_blocking(move || {
        recognizer
            .write()
            .map(|mut r| r.load_models())
            .map_err(|_| CaptchaError::Internal("recognizer lock poisoned".to_string()))
    })
    .await
    .map_err(|e| CaptchaError::Internal(format!("Reload task failed: {}", e)))??;

    tracing::info!("Model reload finished, models_loaded: {}", models_loaded);

    Ok(Json(ReloadResponse { models_loaded }))
}

//! The HTTP endpoint layer.
//!
//! One generation operation over multipart form data, a liveness probe, and
//! the static entry page. API routes are registered before the static mounts
//! so API paths take precedence. All validation happens here; the
//! orchestrator only ever sees well-formed requests.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::services::{ServeDir, ServeFile};

use crate::errors::ApiError;
use crate::imaging;
use crate::models;
use crate::orchestrator::{GenerationRequest, Orchestrator};
use crate::provider::ImageProvider;

/// Multipart bodies above this size are rejected outright.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

const DEFAULT_ASPECT_RATIO: &str = "1:1";

/// Shared, read-only application state.
///
/// `provider` is `None` when no API key was configured at startup; the
/// liveness probe reports that and generation requests fail with a
/// configuration error.
#[derive(Clone)]
pub struct AppState {
    pub provider: Option<Arc<dyn ImageProvider>>,
    pub static_dir: PathBuf,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let static_dir = state.static_dir.clone();
    Router::new()
        .route("/api/health", get(health))
        .route("/api/generate", post(generate))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    api_configured: bool,
}

/// Liveness probe: reports whether the provider API key is configured.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        api_configured: state.provider.is_some(),
    })
}

/// Success envelope for the generation endpoint.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    /// The generated image as a `data:image/png;base64,...` URI.
    pub image: String,
    pub message: String,
    pub model_used: String,
}

/// Collected multipart form fields.
#[derive(Debug, Default)]
struct GenerateForm {
    prompt: Option<String>,
    model: Option<String>,
    aspect_ratio: Option<String>,
    /// (filename, bytes) per kept upload slot.
    uploads: Vec<(String, Vec<u8>)>,
}

async fn read_form(mut multipart: Multipart) -> Result<GenerateForm, ApiError> {
    let mut form = GenerateForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Invalid multipart form: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("prompt") => {
                form.prompt = Some(read_text(field).await?);
            }
            Some("model") => {
                let value = read_text(field).await?;
                if !value.trim().is_empty() {
                    form.model = Some(value.trim().to_string());
                }
            }
            Some("aspect_ratio") => {
                let value = read_text(field).await?;
                if !value.trim().is_empty() {
                    form.aspect_ratio = Some(value.trim().to_string());
                }
            }
            Some("images") => {
                // Empty or unnamed upload slots are silently skipped.
                let Some(filename) = field.file_name().map(str::to_string) else {
                    continue;
                };
                if filename.is_empty() {
                    continue;
                }
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Failed to read upload: {e}")))?;
                if !data.is_empty() {
                    form.uploads.push((filename, data.to_vec()));
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::Validation(format!("Failed to read form field: {e}")))
}

/// `POST /api/generate` — the generation operation.
async fn generate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<GenerateResponse>, ApiError> {
    let provider = state.provider.clone().ok_or_else(|| {
        ApiError::Configuration(
            "API key not configured. Please set GOOGLE_API_KEY environment variable.".to_string(),
        )
    })?;

    let form = read_form(multipart).await?;

    let prompt = form.prompt.unwrap_or_default();
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::Validation("Prompt is required.".to_string()));
    }

    let model_id = form.model.as_deref().unwrap_or(models::DEFAULT_MODEL);
    let descriptor = models::lookup(model_id)
        .ok_or_else(|| ApiError::Validation(format!("Unknown model '{model_id}'.")))?;
    if form.uploads.len() > descriptor.max_reference_images {
        return Err(ApiError::Validation(format!(
            "Model '{}' accepts at most {} reference images, got {}.",
            descriptor.id,
            descriptor.max_reference_images,
            form.uploads.len()
        )));
    }

    // An undecodable upload fails the whole request; a silently dropped
    // reference would change what the model sees.
    let mut reference_images = Vec::with_capacity(form.uploads.len());
    for (filename, data) in &form.uploads {
        let normalized = imaging::normalize_image(data, imaging::DEFAULT_MAX_DIMENSION).map_err(
            |e| ApiError::Validation(format!("Could not read reference image '{filename}': {e}")),
        )?;
        reference_images.push(normalized);
    }

    tracing::info!(
        model = model_id,
        reference_images = reference_images.len(),
        prompt_chars = prompt.len(),
        "generation request accepted"
    );

    let request = GenerationRequest {
        prompt: prompt.to_string(),
        reference_images,
        aspect_ratio: form
            .aspect_ratio
            .unwrap_or_else(|| DEFAULT_ASPECT_RATIO.to_string()),
    };

    let outcome = Orchestrator::new(provider).generate(&request).await?;

    Ok(Json(GenerateResponse {
        success: true,
        image: format!("data:image/png;base64,{}", outcome.image_base64),
        message: outcome.message,
        model_used: outcome.model_used,
    }))
}

//! The generative-image provider boundary.
//!
//! [`ImageProvider`] is the seam between the orchestration logic and the
//! outside world: the live [`GeminiClient`] implements it against the Google
//! Generative Language API, and tests substitute in-process fakes. Everything
//! the rest of the crate knows about the provider flows through this module's
//! wire types and error taxonomy.

mod gemini;
pub mod wire;

pub use gemini::{API_KEY_HEADER, DEFAULT_BASE_URL, GeminiClient, GeminiClientBuilder};

use async_trait::async_trait;
use thiserror::Error;

use wire::{
    GenerateContentRequest, GenerateContentResponse, GenerateImagesRequest, GenerateImagesResponse,
};

/// Errors that can occur when talking to the generation provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// The API returned a non-success status; the body is surfaced verbatim.
    #[error("API error (HTTP {status_code}): {message}")]
    Api {
        /// HTTP status code (e.g., 400, 429, 500)
        status_code: u16,
        /// Error message from the API response body
        message: String,
    },
    /// The call succeeded but no content part carried an image.
    #[error("no image in model response")]
    NoImage,
    /// An image payload (ours or the model's) could not be encoded or decoded.
    #[error("invalid image payload: {0}")]
    ImagePayload(String),
    /// Failed to build the underlying HTTP client. This typically only occurs
    /// on TLS backend initialization failures.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// A provider capable of the two generation calls the pipeline needs.
///
/// `generate_content` is the multimodal call: a content list mixing text and
/// inline images, returning zero or more content parts. `generate_images` is
/// the text-to-image call: a prompt plus image parameters, returning zero or
/// more generated-image artifacts. Implementations must be cheap to share
/// behind an `Arc` across request tasks.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Invokes the multimodal generation endpoint.
    async fn generate_content(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ProviderError>;

    /// Invokes the text-to-image generation endpoint.
    async fn generate_images(
        &self,
        model: &str,
        request: GenerateImagesRequest,
    ) -> Result<GenerateImagesResponse, ProviderError>;
}

//! The generation pipeline and its fallback policy.
//!
//! Per request the orchestrator runs a small state machine: build a
//! multimodal content list (prompt plus normalized reference images), call
//! the multimodal endpoint, and inspect the decoded parts. If no image comes
//! back — or the call fails outright — it retries once on the text-to-image
//! endpoint, but only when the request carried zero reference images; the
//! fallback endpoint cannot accept them, so with references present the
//! primary failure is terminal.

use std::sync::Arc;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use image::DynamicImage;

use crate::imaging;
use crate::models::{GEMINI_IMAGE_MODEL, IMAGEN_MODEL};
use crate::provider::wire::{
    Content, GenerateContentRequest, GenerateImagesRequest, GenerationConfig, ImageInstance,
    ImageParameters, OutputOptions, Part, ResponsePart,
};
use crate::provider::{ImageProvider, ProviderError};

const PNG_MIME: &str = "image/png";
const DEFAULT_SUCCESS_MESSAGE: &str = "Image generated successfully!";
const FALLBACK_SUCCESS_MESSAGE: &str = "Image generated successfully with Imagen 3!";

/// One generation request, built per incoming HTTP call and discarded after.
#[derive(Debug)]
pub struct GenerationRequest {
    /// Prompt text; trimmed before use.
    pub prompt: String,
    /// Normalized reference images, owned exclusively by this request.
    pub reference_images: Vec<DynamicImage>,
    /// Aspect ratio hint for the text-to-image fallback (e.g. "1:1").
    pub aspect_ratio: String,
}

/// A successful generation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    /// Base64-encoded PNG of the generated image.
    pub image_base64: String,
    /// Caption from the model, or a fixed confirmation string.
    pub message: String,
    /// Identifier of the model that actually produced the image.
    pub model_used: String,
}

/// Decides which provider calls to make and reconciles their results.
pub struct Orchestrator {
    provider: Arc<dyn ImageProvider>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(provider: Arc<dyn ImageProvider>) -> Self {
        Self { provider }
    }

    /// Runs the generation pipeline for one request.
    ///
    /// # Errors
    ///
    /// Returns the terminal [`ProviderError`]: the secondary call's error
    /// when the fallback ran, or the primary call's error when reference
    /// images made the fallback ineligible.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, ProviderError> {
        let prompt = request.prompt.trim();

        match self.primary_call(prompt, &request.reference_images).await {
            Ok(outcome) => Ok(outcome),
            Err(primary_error) => {
                // Fallback is defined only for the zero-image case.
                if !request.reference_images.is_empty() {
                    tracing::warn!(
                        error = %primary_error,
                        "multimodal call failed with reference images present; not falling back"
                    );
                    return Err(primary_error);
                }
                tracing::warn!(
                    error = %primary_error,
                    fallback_model = IMAGEN_MODEL,
                    "multimodal call produced no image; falling back to text-to-image"
                );
                self.secondary_call(prompt, &request.aspect_ratio).await
            }
        }
    }

    /// The multimodal generation call, requesting image and text modalities.
    async fn primary_call(
        &self,
        prompt: &str,
        reference_images: &[DynamicImage],
    ) -> Result<GenerationOutcome, ProviderError> {
        let mut parts = Vec::with_capacity(1 + reference_images.len());
        parts.push(Part::text(prompt));
        for img in reference_images {
            let encoded = imaging::to_base64_png(img)
                .map_err(|e| ProviderError::ImagePayload(e.to_string()))?;
            parts.push(Part::inline_data(PNG_MIME, encoded));
        }

        let request = GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: Some(GenerationConfig::image_and_text()),
        };

        let response = self
            .provider
            .generate_content(GEMINI_IMAGE_MODEL, request)
            .await?;

        // First inline-data part wins; first non-empty text part becomes the
        // caption.
        let mut generated = None;
        let mut caption: Option<&str> = None;
        for part in response.parts() {
            match part {
                ResponsePart::InlineData { inline_data } if generated.is_none() => {
                    generated = Some(inline_data);
                }
                ResponsePart::Text { text } if caption.is_none() && !text.trim().is_empty() => {
                    caption = Some(text.as_str());
                }
                ResponsePart::Unknown(value) => {
                    tracing::debug!(part = %value, "skipping unrecognized response part");
                }
                _ => {}
            }
        }

        let blob = generated.ok_or(ProviderError::NoImage)?;
        let image_base64 = reencode_as_png(&blob.data)?;

        Ok(GenerationOutcome {
            image_base64,
            message: caption.unwrap_or(DEFAULT_SUCCESS_MESSAGE).to_string(),
            model_used: GEMINI_IMAGE_MODEL.to_string(),
        })
    }

    /// The text-to-image fallback call: exactly one output image at the
    /// requested aspect ratio.
    async fn secondary_call(
        &self,
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<GenerationOutcome, ProviderError> {
        let request = GenerateImagesRequest {
            instances: vec![ImageInstance {
                prompt: prompt.to_string(),
            }],
            parameters: ImageParameters {
                sample_count: 1,
                aspect_ratio: Some(aspect_ratio.to_string()),
                output_options: Some(OutputOptions {
                    mime_type: PNG_MIME.to_string(),
                }),
            },
        };

        let response = self.provider.generate_images(IMAGEN_MODEL, request).await?;

        let data = response
            .predictions
            .iter()
            .find_map(|prediction| prediction.bytes_base64_encoded.as_deref())
            .ok_or(ProviderError::NoImage)?;
        let image_base64 = reencode_as_png(data)?;

        Ok(GenerationOutcome {
            image_base64,
            message: FALLBACK_SUCCESS_MESSAGE.to_string(),
            model_used: IMAGEN_MODEL.to_string(),
        })
    }
}

/// Decodes a provider image payload and re-encodes it as PNG, so the response
/// format does not depend on what MIME type the model happened to return.
fn reencode_as_png(base64_data: &str) -> Result<String, ProviderError> {
    let bytes = BASE64_STANDARD
        .decode(base64_data)
        .map_err(|e| ProviderError::ImagePayload(format!("invalid base64 image data: {e}")))?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| ProviderError::ImagePayload(format!("undecodable image data: {e}")))?;
    imaging::to_base64_png(&img).map_err(|e| ProviderError::ImagePayload(e.to_string()))
}

//! Wire types for the Gemini generation endpoints.
//!
//! Request bodies serialize to the camelCase JSON the API expects; response
//! bodies decode into a closed set of part variants before any orchestration
//! logic runs, so the pipeline never probes loosely-typed JSON at runtime.
//! Parts the API may grow in the future land in [`ResponsePart::Unknown`]
//! rather than failing deserialization.

use serde::{Deserialize, Serialize};

// --- generateContent (multimodal) ---

/// Request body for `models/{model}:generateContent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// A single content entry: an ordered list of parts.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

/// A request content part: prompt text or inline binary data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

impl Part {
    /// A text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    /// An inline-data part carrying base64-encoded bytes.
    #[must_use]
    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(Blob {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
        }
    }
}

/// Inline binary payload: base64 data plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

/// Generation configuration for the multimodal call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

impl GenerationConfig {
    /// Requests both image and text modalities in the response.
    #[must_use]
    pub fn image_and_text() -> Self {
        Self {
            response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
        }
    }
}

/// Response body for `models/{model}:generateContent`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// The content parts of the first candidate, in response order.
    #[must_use]
    pub fn parts(&self) -> &[ResponsePart] {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map_or(&[], |content| content.parts.as_slice())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

/// A decoded response content part.
///
/// Deserialization tries the variants in order, so a part is classified
/// exactly once at the wire boundary: inline binary data, then text, then
/// anything unrecognized.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ResponsePart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    Text {
        text: String,
    },
    Unknown(serde_json::Value),
}

// --- predict (text-to-image) ---

/// Request body for `models/{model}:predict`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateImagesRequest {
    pub instances: Vec<ImageInstance>,
    pub parameters: ImageParameters,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageInstance {
    pub prompt: String,
}

/// Generation parameters for the text-to-image call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageParameters {
    pub sample_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_options: Option<OutputOptions>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputOptions {
    pub mime_type: String,
}

/// Response body for `models/{model}:predict`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateImagesResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

/// A single generated-image artifact.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub bytes_base64_encoded: Option<String>,
    pub mime_type: Option<String>,
}

//! Static model descriptor table.
//!
//! Process-wide, immutable metadata about the models this backend is willing
//! to drive. The table is consulted at the endpoint layer to reject unknown
//! model ids and requests carrying more reference images than the selected
//! model accepts.

/// Model used for the primary multimodal (image + text) generation call.
pub const GEMINI_IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

/// Model used for the text-to-image fallback call.
pub const IMAGEN_MODEL: &str = "imagen-3.0-generate-002";

/// Default model when the request does not select one.
pub const DEFAULT_MODEL: &str = GEMINI_IMAGE_MODEL;

/// Capability metadata for a generation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    /// Provider-facing model identifier.
    pub id: &'static str,
    /// Human-readable name for display.
    pub display_name: &'static str,
    /// Maximum number of reference images a request may carry.
    pub max_reference_images: usize,
    /// Whether the model can return generated images.
    pub supports_image_output: bool,
}

/// All models this backend accepts in the `model` form field.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: GEMINI_IMAGE_MODEL,
        display_name: "Gemini 2.0 Flash (Preview)",
        max_reference_images: 3,
        supports_image_output: true,
    },
    ModelInfo {
        id: IMAGEN_MODEL,
        display_name: "Imagen 3",
        max_reference_images: 4,
        supports_image_output: true,
    },
];

/// Looks up a model descriptor by identifier.
#[must_use]
pub fn lookup(id: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|model| model.id == id)
}

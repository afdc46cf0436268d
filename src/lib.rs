//! Monkee: an AI image generation backend for the Google Gemini API.
//!
//! The crate exposes a small HTTP surface (see [`server`]) in front of a
//! two-tier generation pipeline: a multimodal `generateContent` call that
//! accepts a prompt plus optional reference images, with a text-to-image
//! Imagen `predict` fallback when the multimodal call produces no image.
//! Uploaded reference images are normalized (orientation, alpha flattening,
//! size bound) before they are sent upstream, and generated images come back
//! to the caller as inline base64 PNG data URIs.
//!
//! Module layout:
//!
//! - [`imaging`] — image normalization and PNG/base64 encoding
//! - [`provider`] — the Gemini wire boundary ([`provider::ImageProvider`]
//!   trait, wire types, and the live [`provider::GeminiClient`])
//! - [`models`] — the static model descriptor table
//! - [`orchestrator`] — the fallback policy between the two provider calls
//! - [`server`] — axum routes, input validation, and error mapping
//! - [`config`] — process environment configuration

pub mod config;
pub mod errors;
pub mod imaging;
pub mod models;
pub mod orchestrator;
pub mod provider;
pub mod server;

pub use errors::ApiError;
pub use orchestrator::{GenerationOutcome, GenerationRequest, Orchestrator};
pub use provider::{GeminiClient, ImageProvider, ProviderError};
pub use server::AppState;

//! End-to-end tests for the HTTP surface, with the provider mocked out.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat};
use serde_json::Value;
use tower::ServiceExt;

use monkee::provider::wire::{
    Blob, Candidate, CandidateContent, GenerateContentRequest, GenerateContentResponse,
    GenerateImagesRequest, GenerateImagesResponse, Prediction, ResponsePart,
};
use monkee::provider::{ImageProvider, ProviderError};
use monkee::server::{self, AppState};

// --- provider fake ---

enum Reply<T> {
    Ok(T),
    ApiError(&'static str),
}

impl<T: Clone> Reply<T> {
    fn produce(&self) -> Result<T, ProviderError> {
        match self {
            Self::Ok(value) => Ok(value.clone()),
            Self::ApiError(message) => Err(ProviderError::Api {
                status_code: 500,
                message: (*message).to_string(),
            }),
        }
    }
}

struct MockProvider {
    content_reply: Reply<GenerateContentResponse>,
    images_reply: Reply<GenerateImagesResponse>,
    content_calls: AtomicUsize,
    images_calls: AtomicUsize,
}

impl MockProvider {
    fn new(
        content_reply: Reply<GenerateContentResponse>,
        images_reply: Reply<GenerateImagesResponse>,
    ) -> Arc<Self> {
        Arc::new(Self {
            content_reply,
            images_reply,
            content_calls: AtomicUsize::new(0),
            images_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ImageProvider for MockProvider {
    async fn generate_content(
        &self,
        _model: &str,
        _request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ProviderError> {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        self.content_reply.produce()
    }

    async fn generate_images(
        &self,
        _model: &str,
        _request: GenerateImagesRequest,
    ) -> Result<GenerateImagesResponse, ProviderError> {
        self.images_calls.fetch_add(1, Ordering::SeqCst);
        self.images_reply.produce()
    }
}

// --- fixtures ---

fn tiny_png_bytes() -> Vec<u8> {
    let img = DynamicImage::new_rgb8(8, 8);
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn tiny_png_base64() -> String {
    BASE64_STANDARD.encode(tiny_png_bytes())
}

fn content_response_with_image() -> GenerateContentResponse {
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(CandidateContent {
                parts: vec![
                    ResponsePart::Text {
                        text: "Here you go".to_string(),
                    },
                    ResponsePart::InlineData {
                        inline_data: Blob {
                            mime_type: "image/png".to_string(),
                            data: tiny_png_base64(),
                        },
                    },
                ],
            }),
        }],
    }
}

fn content_response_text_only() -> GenerateContentResponse {
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(CandidateContent {
                parts: vec![ResponsePart::Text {
                    text: "I cannot draw that".to_string(),
                }],
            }),
        }],
    }
}

fn images_response() -> GenerateImagesResponse {
    GenerateImagesResponse {
        predictions: vec![Prediction {
            bytes_base64_encoded: Some(tiny_png_base64()),
            mime_type: Some("image/png".to_string()),
        }],
    }
}

fn app(provider: Option<Arc<MockProvider>>) -> Router {
    server::router(AppState {
        provider: provider.map(|p| p as Arc<dyn ImageProvider>),
        static_dir: PathBuf::from("static"),
    })
}

// --- multipart form builder ---

const BOUNDARY: &str = "monkee-test-boundary";

#[derive(Default)]
struct FormBuilder {
    body: Vec<u8>,
}

impl FormBuilder {
    fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    fn file(mut self, name: &str, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

fn generate_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// --- health ---

#[tokio::test]
async fn health_reports_configured_provider() {
    let provider = MockProvider::new(
        Reply::Ok(content_response_with_image()),
        Reply::Ok(images_response()),
    );
    let app = app(Some(provider));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["api_configured"], true);
}

#[tokio::test]
async fn health_reports_missing_api_key() {
    let response = app(None)
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["api_configured"], false);
}

// --- generate: validation and configuration ---

#[tokio::test]
async fn generate_without_api_key_is_500() {
    let body = FormBuilder::default()
        .text("prompt", "a red circle")
        .finish();

    let response = app(None).oneshot(generate_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .contains("API key not configured")
    );
}

#[tokio::test]
async fn blank_prompt_is_400() {
    let provider = MockProvider::new(
        Reply::Ok(content_response_with_image()),
        Reply::Ok(images_response()),
    );
    let body = FormBuilder::default().text("prompt", "   ").finish();

    let response = app(Some(provider))
        .oneshot(generate_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("Prompt is required"));
}

#[tokio::test]
async fn missing_prompt_field_is_400() {
    let provider = MockProvider::new(
        Reply::Ok(content_response_with_image()),
        Reply::Ok(images_response()),
    );
    let body = FormBuilder::default().text("model", "").finish();

    let response = app(Some(provider))
        .oneshot(generate_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_model_is_400() {
    let provider = MockProvider::new(
        Reply::Ok(content_response_with_image()),
        Reply::Ok(images_response()),
    );
    let body = FormBuilder::default()
        .text("prompt", "a red circle")
        .text("model", "dall-e-3")
        .finish();

    let response = app(Some(provider))
        .oneshot(generate_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("dall-e-3"));
}

#[tokio::test]
async fn too_many_reference_images_is_400() {
    let provider = MockProvider::new(
        Reply::Ok(content_response_with_image()),
        Reply::Ok(images_response()),
    );
    let png = tiny_png_bytes();
    // Default model accepts at most 3 reference images.
    let body = FormBuilder::default()
        .text("prompt", "combine these")
        .file("images", "a.png", &png)
        .file("images", "b.png", &png)
        .file("images", "c.png", &png)
        .file("images", "d.png", &png)
        .finish();

    let response = app(Some(provider.clone()))
        .oneshot(generate_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.content_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn undecodable_reference_image_is_400_naming_the_file() {
    let provider = MockProvider::new(
        Reply::Ok(content_response_with_image()),
        Reply::Ok(images_response()),
    );
    let body = FormBuilder::default()
        .text("prompt", "turn this into a painting")
        .file("images", "broken.png", b"this is not an image")
        .finish();

    let response = app(Some(provider.clone()))
        .oneshot(generate_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("broken.png"));
    assert_eq!(provider.content_calls.load(Ordering::SeqCst), 0);
}

// --- generate: pipeline outcomes ---

#[tokio::test]
async fn generate_success_with_primary_model() {
    let provider = MockProvider::new(
        Reply::Ok(content_response_with_image()),
        Reply::Ok(images_response()),
    );
    let body = FormBuilder::default()
        .text("prompt", "a red circle")
        .finish();

    let response = app(Some(provider.clone()))
        .oneshot(generate_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(
        body["model_used"],
        "gemini-2.0-flash-preview-image-generation"
    );
    assert_eq!(body["message"], "Here you go");
    assert!(
        body["image"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,")
    );
    assert_eq!(provider.content_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.images_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn generate_falls_back_to_imagen_without_references() {
    let provider = MockProvider::new(
        Reply::Ok(content_response_text_only()),
        Reply::Ok(images_response()),
    );
    let body = FormBuilder::default()
        .text("prompt", "a red circle")
        .text("aspect_ratio", "16:9")
        .finish();

    let response = app(Some(provider.clone()))
        .oneshot(generate_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["model_used"], "imagen-3.0-generate-002");
    assert_eq!(
        body["message"],
        "Image generated successfully with Imagen 3!"
    );
    assert_eq!(provider.content_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.images_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn primary_failure_with_reference_image_is_500_without_fallback() {
    let provider = MockProvider::new(
        Reply::ApiError("upstream exploded"),
        Reply::Ok(images_response()),
    );
    let png = tiny_png_bytes();
    let body = FormBuilder::default()
        .text("prompt", "turn this into a painting")
        .file("images", "photo.png", &png)
        .finish();

    let response = app(Some(provider.clone()))
        .oneshot(generate_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .contains("upstream exploded")
    );
    assert_eq!(provider.images_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn both_calls_failing_is_500_with_secondary_detail() {
    let provider = MockProvider::new(
        Reply::ApiError("primary down"),
        Reply::ApiError("imagen down too"),
    );
    let body = FormBuilder::default()
        .text("prompt", "a red circle")
        .finish();

    let response = app(Some(provider))
        .oneshot(generate_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("imagen down too"));
}

#[tokio::test]
async fn empty_upload_slots_are_silently_skipped() {
    let provider = MockProvider::new(
        Reply::Ok(content_response_with_image()),
        Reply::Ok(images_response()),
    );
    // One slot with no filename, one named slot with an empty body: neither
    // counts as a reference image, so the no-references success path applies.
    let body = FormBuilder::default()
        .text("prompt", "a red circle")
        .file("images", "", b"ignored")
        .file("images", "empty.png", b"")
        .finish();

    let response = app(Some(provider.clone()))
        .oneshot(generate_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(provider.content_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reference_image_success_uses_primary_model() {
    let provider = MockProvider::new(
        Reply::Ok(content_response_with_image()),
        Reply::Ok(images_response()),
    );
    let png = tiny_png_bytes();
    let body = FormBuilder::default()
        .text("prompt", "turn this into a painting")
        .file("images", "photo.png", &png)
        .finish();

    let response = app(Some(provider.clone()))
        .oneshot(generate_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(
        body["model_used"],
        "gemini-2.0-flash-preview-image-generation"
    );
    assert_eq!(provider.images_calls.load(Ordering::SeqCst), 0);
}

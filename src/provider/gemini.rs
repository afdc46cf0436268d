//! Live client for the Google Generative Language API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::wire::{
    GenerateContentRequest, GenerateContentResponse, GenerateImagesRequest, GenerateImagesResponse,
};
use super::{ImageProvider, ProviderError};

/// Production endpoint for the Generative Language API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Header name for API key authentication.
///
/// Header-based authentication keeps the key out of server logs, proxy logs,
/// and error messages containing URLs.
pub const API_KEY_HEADER: &str = "X-Goog-Api-Key";

const API_VERSION: &str = "v1beta";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The live Gemini client.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    http_client: ReqwestClient,
    base_url: String,
}

/// Builder for [`GeminiClient`] instances.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use monkee::provider::GeminiClient;
///
/// let client = GeminiClient::builder("api-key".to_string())
///     .timeout(Duration::from_secs(60))
///     .build()
///     .expect("client construction");
/// ```
#[derive(Debug)]
pub struct GeminiClientBuilder {
    api_key: String,
    base_url: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl GeminiClientBuilder {
    /// Overrides the API base URL. Used by tests to point at a local mock.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the total request timeout.
    ///
    /// Image generation can take tens of seconds, so the default is a
    /// generous 120 seconds. The deadline bounds the whole request, from
    /// connection to the last response byte.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout (default 10 seconds).
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::ClientBuild`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn build(self) -> Result<GeminiClient, ProviderError> {
        let http_client = ReqwestClient::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
            .build()
            .map_err(|e| ProviderError::ClientBuild(e.to_string()))?;

        Ok(GeminiClient {
            api_key: self.api_key,
            http_client,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

impl GeminiClient {
    /// Creates a new builder for `GeminiClient` instances.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Your Google AI API key.
    #[must_use]
    pub const fn builder(api_key: String) -> GeminiClientBuilder {
        GeminiClientBuilder {
            api_key,
            base_url: None,
            timeout: None,
            connect_timeout: None,
        }
    }

    fn endpoint_url(&self, model: &str, verb: &str) -> String {
        format!("{}/{API_VERSION}/models/{model}:{verb}", self.base_url)
    }

    async fn post_json<Req, Resp>(&self, url: &str, body: &Req) -> Result<Resp, ProviderError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let response = self
            .http_client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(ProviderError::Api {
                status_code: status.as_u16(),
                message,
            });
        }

        let response_text = response.text().await?;
        Ok(serde_json::from_str(&response_text)?)
    }
}

#[async_trait]
impl ImageProvider for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ProviderError> {
        let url = self.endpoint_url(model, "generateContent");
        tracing::debug!(%model, "issuing multimodal generation call");
        self.post_json(&url, &request).await
    }

    async fn generate_images(
        &self,
        model: &str,
        request: GenerateImagesRequest,
    ) -> Result<GenerateImagesResponse, ProviderError> {
        let url = self.endpoint_url(model, "predict");
        tracing::debug!(%model, "issuing text-to-image generation call");
        self.post_json(&url, &request).await
    }
}

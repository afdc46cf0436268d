use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use monkee::config::AppConfig;
use monkee::provider::{GeminiClient, ImageProvider};
use monkee::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();

    let provider: Option<Arc<dyn ImageProvider>> = match &config.api_key {
        Some(api_key) => {
            let client = GeminiClient::builder(api_key.clone()).build()?;
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("GOOGLE_API_KEY is not set; generation requests will fail");
            None
        }
    };

    let state = AppState {
        provider,
        static_dir: config.static_dir.clone(),
    };
    let app = server::router(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

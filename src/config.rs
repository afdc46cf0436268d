//! Process configuration, read once at startup.

use std::env;
use std::path::PathBuf;

/// Default port when `PORT` is unset or unparsable.
pub const DEFAULT_PORT: u16 = 8000;

/// Immutable process-wide configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Google AI API key; `None` leaves the provider unconfigured and the
    /// generation endpoint failing with a configuration error.
    pub api_key: Option<String>,
    /// Port to bind the server to.
    pub port: u16,
    /// Directory the entry page and static assets are served from.
    pub static_dir: PathBuf,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    ///
    /// A blank `GOOGLE_API_KEY` counts as unset.
    #[must_use]
    pub fn from_env() -> Self {
        let api_key = env::var("GOOGLE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let static_dir = env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("static"));

        Self {
            api_key,
            port,
            static_dir,
        }
    }
}

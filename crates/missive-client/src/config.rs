//! Client configuration loaded from environment variables.
//!
//! All settings have defaults so the client can run against a local
//! backend with zero configuration.

use std::path::PathBuf;

use url::Url;

use missive_shared::constants::{DEFAULT_API_URL, DEFAULT_SOCKET_URL};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the HTTP API.
    /// Env: `MISSIVE_API_URL`
    /// Default: `http://localhost:4000/`
    pub api_url: Url,

    /// URL of the realtime WebSocket endpoint.
    /// Env: `MISSIVE_SOCKET_URL`
    /// Default: `ws://localhost:4000/ws`
    pub socket_url: Url,

    /// Directory holding the persisted session file.
    /// Env: `MISSIVE_DATA_DIR`
    /// Default: the platform data directory (e.g. `~/.local/share/missive`).
    pub data_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("valid default URL"),
            socket_url: Url::parse(DEFAULT_SOCKET_URL).expect("valid default URL"),
            data_dir: default_data_dir(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("MISSIVE_API_URL") {
            match Url::parse(&value) {
                Ok(url) => config.api_url = url,
                Err(e) => tracing::warn!(value = %value, error = %e, "Invalid MISSIVE_API_URL, using default"),
            }
        }

        if let Ok(value) = std::env::var("MISSIVE_SOCKET_URL") {
            match Url::parse(&value) {
                Ok(url) => config.socket_url = url,
                Err(e) => tracing::warn!(value = %value, error = %e, "Invalid MISSIVE_SOCKET_URL, using default"),
            }
        }

        if let Ok(value) = std::env::var("MISSIVE_DATA_DIR") {
            config.data_dir = PathBuf::from(value);
        }

        config
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "missive", "missive")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./missive-data"))
}

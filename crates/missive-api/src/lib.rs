//! Async REST client for the remote chat backend.
//!
//! All endpoint groups hang off [`ApiClient`]; each module adds one group
//! (auth, directory, message history, friend requests, QR sign-in). Every
//! response
//! funnels through [`ApiClient::handle`], which owns the HTTP status →
//! error mapping: a 401 from ANY endpoint becomes
//! [`MissiveError::Unauthorized`] so the session layer can apply the same
//! clear-and-return-to-login transition regardless of which call failed.

pub mod auth;
pub mod directory;
pub mod friends;
pub mod messages;
pub mod qr;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use url::Url;

use missive_shared::{MissiveError, Result};

pub use auth::{AuthOutcome, AuthPayload, FindQuery};
pub use friends::FriendRequest;
pub use qr::QrLoginStatus;

/// HTTP client for the backend REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client rooted at `base_url`. A missing trailing slash on
    /// the base path is corrected so endpoint joins behave.
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| MissiveError::Transport(e.to_string()))
    }

    pub(crate) fn get(&self, url: Url, token: Option<&str>) -> RequestBuilder {
        with_bearer(self.http.get(url), token)
    }

    pub(crate) fn post(&self, url: Url, token: Option<&str>) -> RequestBuilder {
        with_bearer(self.http.post(url), token)
    }

    pub(crate) fn put(&self, url: Url, token: Option<&str>) -> RequestBuilder {
        with_bearer(self.http.put(url), token)
    }

    /// Send a request and map the response to a JSON body or an error.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(transport)?;
        Self::handle(response).await
    }

    /// Status → error mapping shared by every endpoint.
    async fn handle(response: Response) -> Result<Value> {
        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(MissiveError::Unauthorized);
        }

        let body: Value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        };

        if !status.is_success() {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("The server rejected the request")
                .to_string();
            tracing::debug!(status = status.as_u16(), %message, "API request failed");
            return Err(MissiveError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }
}

fn with_bearer(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

pub(crate) fn transport(e: reqwest::Error) -> MissiveError {
    MissiveError::Transport(e.to_string())
}

//! Shared JSON-over-HTTP plumbing for the provider clients.
//!
//! Both the chat clients and the embedding clients talk to their services
//! through [`JsonClient`]. Failures come back as [`HttpError`] so each caller
//! can decide which domain error to raise and whether a retry makes sense.

use crate::types::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::trace;

/// How much of an error body is kept in messages.
const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Network(String),

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl HttpError {
    /// Rate limits, server errors and connection problems may clear up on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            HttpError::Status { status, .. } => *status == 429 || *status >= 500,
            HttpError::Network(_) => true,
            HttpError::Decode(_) => false,
        }
    }
}

/// A base URL plus an optional bearer token.
#[derive(Debug, Clone)]
pub struct JsonClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl JsonClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST `body` as JSON to `path` and decode the JSON reply.
    pub async fn post<B, R>(&self, path: &str, body: &B) -> std::result::Result<R, HttpError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        trace!(url = %url, "POST");

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                body: text.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        serde_json::from_str(&text).map_err(|e| HttpError::Decode(e.to_string()))
    }
}

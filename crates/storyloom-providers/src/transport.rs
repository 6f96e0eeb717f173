//! Generic request/response transport

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
}

/// Failed round-trip: network failure (no status) or a non-success status
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Sends one request and returns the parsed body
///
/// Implementations report non-success statuses as `TransportError`.
/// Cancellation is applied by dropping the returned future.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Common error body shapes (`{"message": ..}`, `{"error": ..}`, `{"rc": ..}`)
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(alias = "error", alias = "detail")]
    message: Option<String>,
    #[serde(alias = "code")]
    rc: Option<String>,
}

/// Extract a human-readable message from an error body
pub fn error_message(body: &Value) -> Option<String> {
    match body {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Object(_) => {
            let error = ErrorResponse::deserialize(body).ok()?;
            error.message.or(error.rc)
        }
        _ => None,
    }
}

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    /// Per-request timeout; the job deadline is enforced separately
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::new(None, e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::trace!(method = request.method.as_str(), url = %request.url, "Sending request");

        let response = builder.send().await.map_err(|e| {
            TransportError::new(e.status().map(|s| s.as_u16()), e.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::new(Some(status.as_u16()), e.to_string()))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if !status.is_success() {
            let message = error_message(&body)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(TransportError::new(Some(status.as_u16()), message));
        }

        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }
}

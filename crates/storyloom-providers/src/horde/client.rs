//! Remote queue API client

use super::catalog::{shape_models, shape_workers, ModelDescriptor, RawModel, RawWorker, WorkerDescriptor};
use crate::config::HordeConfig;
use crate::error::ProviderError;
use crate::error_classify::classify_error;
use crate::transport::{Transport, TransportError, TransportRequest};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Sampling parameters sent with a job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitParams {
    pub n: u32,
    pub max_length: u32,
    pub max_context_length: u32,
    pub temperature: f32,
    pub rep_pen: f32,
    pub rep_pen_range: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rep_pen_slope: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_a: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typical: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tfs: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f32>,
    pub sampler_order: Vec<u32>,
    pub use_default_badwordsids: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_sequence: Vec<String>,
}

/// Body of the async submission request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitPayload {
    pub prompt: String,
    pub params: SubmitParams,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trusted_workers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slow_workers: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: Option<String>,
}

/// One finished generation returned by a status poll
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HordeGeneration {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub worker_name: Option<String>,
    #[serde(default)]
    pub worker_id: Option<String>,
}

/// Job status as reported by one poll
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JobStatus {
    #[serde(default, rename = "done")]
    pub finished: bool,
    #[serde(default)]
    pub faulted: bool,
    #[serde(default)]
    pub queue_position: u64,
    #[serde(default)]
    pub wait_time: u64,
    #[serde(default)]
    pub kudos: f64,
    #[serde(default)]
    pub generations: Vec<HordeGeneration>,
}

/// Thin client over the queue endpoints
///
/// Cheap to clone; every catalog call fetches fresh data.
#[derive(Clone)]
pub struct HordeClient {
    transport: Arc<dyn Transport>,
    config: Arc<HordeConfig>,
}

impl HordeClient {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<HordeConfig>) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &HordeConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base(), path)
    }

    fn authorize(&self, request: TransportRequest) -> TransportRequest {
        request
            .header("apikey", self.config.api_key.expose_secret())
            .header("Client-Agent", self.config.client_agent.as_str())
            .header("Content-Type", "application/json")
    }

    fn decode<T: DeserializeOwned>(body: Value, what: &str) -> Result<T, ProviderError> {
        serde_json::from_value(body)
            .map_err(|e| ProviderError::InvalidResponse(format!("malformed {}: {}", what, e)))
    }

    fn transport_error(error: TransportError) -> ProviderError {
        classify_error(error.status, &error.message)
    }

    /// Submit a job and return its id
    pub async fn submit(&self, payload: &SubmitPayload) -> Result<String, ProviderError> {
        let body = serde_json::to_value(payload)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let request = self.authorize(TransportRequest::post(self.url("/generate/text/async"), body));

        let response = self.transport.request(request).await.map_err(|error| {
            match Self::transport_error(error) {
                ProviderError::Transport { status, message } => {
                    ProviderError::SubmitRejected { status, message }
                }
                classified => classified,
            }
        })?;

        let submitted: SubmitResponse = Self::decode(response.body, "submit response")?;
        submitted
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("submit response has no job id".to_string()))
    }

    pub async fn status(&self, job_id: &str) -> Result<JobStatus, ProviderError> {
        let request = self.authorize(TransportRequest::get(
            self.url(&format!("/generate/text/status/{}", job_id)),
        ));
        let response = self
            .transport
            .request(request)
            .await
            .map_err(Self::transport_error)?;
        Self::decode(response.body, "job status")
    }

    /// Text models currently served, busiest first
    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
        let request = self.authorize(TransportRequest::get(self.url("/status/models?type=text")));
        let response = self
            .transport
            .request(request)
            .await
            .map_err(Self::transport_error)?;
        let raw: Vec<RawModel> = Self::decode(response.body, "model list")?;
        Ok(shape_models(raw))
    }

    /// Online text workers
    pub async fn list_workers(&self) -> Result<Vec<WorkerDescriptor>, ProviderError> {
        let request = self.authorize(TransportRequest::get(self.url("/workers?type=text")));
        let response = self
            .transport
            .request(request)
            .await
            .map_err(Self::transport_error)?;
        let raw: Vec<RawWorker> = Self::decode(response.body, "worker list")?;
        Ok(shape_workers(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_uses_done_field() {
        let status: JobStatus = serde_json::from_value(json!({
            "done": true,
            "faulted": false,
            "queue_position": 0,
            "wait_time": 0,
            "kudos": 12.0,
            "generations": [{"text": "Hi", "model": "m", "worker_name": "w", "worker_id": "id"}]
        }))
        .unwrap();
        assert!(status.finished);
        assert_eq!(status.generations[0].worker_name.as_deref(), Some("w"));
    }

    #[test]
    fn test_payload_skips_empty_constraints() {
        let payload = SubmitPayload {
            prompt: "p".into(),
            params: SubmitParams {
                n: 1,
                max_length: 150,
                max_context_length: 2048,
                temperature: 0.7,
                rep_pen: 1.1,
                rep_pen_range: 320,
                rep_pen_slope: None,
                top_p: None,
                top_k: None,
                top_a: None,
                typical: None,
                tfs: None,
                min_p: None,
                sampler_order: vec![6, 0, 1, 3, 4, 2, 5],
                use_default_badwordsids: true,
                stop_sequence: Vec::new(),
            },
            models: Vec::new(),
            workers: Vec::new(),
            trusted_workers: None,
            slow_workers: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("models").is_none());
        assert!(json.get("slow_workers").is_none());
        assert!(json["params"].get("stop_sequence").is_none());
        assert_eq!(json["params"]["use_default_badwordsids"], true);
    }
}

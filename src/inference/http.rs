//! HTTP client for the lip-reading backend

use super::{InferenceClient, Prediction};
use crate::error::InferenceError;
use crate::sampler::EncodedFrame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const PROCESS_FRAME_PATH: &str = "api/process-frame";
const RESET_PATH: &str = "api/reset";
const HEALTH_PATH: &str = "health";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the backend's REST API
///
/// Frame requests have no overall timeout; only the health probe is bounded.
pub struct HttpInferenceClient {
    base_url: String,
    client: reqwest::Client,
    health_timeout: Duration,
}

/// Request body for `POST /api/process-frame`
#[derive(Debug, Serialize)]
struct FrameRequest<'a> {
    frame: &'a str,
}

/// Response from `POST /api/process-frame`
#[derive(Debug, Deserialize)]
struct FrameResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    frame_info: Option<serde_json::Value>,
}

impl From<FrameResponse> for Prediction {
    fn from(response: FrameResponse) -> Self {
        Prediction::new(
            response.text.unwrap_or_default(),
            response.confidence.unwrap_or(0.0),
        )
    }
}

/// Response from `GET /health`
#[derive(Debug, Clone, Deserialize)]
pub struct BackendHealth {
    pub status: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub version: String,
}

impl HttpInferenceClient {
    /// Create a client for the backend at `base_url`
    pub fn new(base_url: &str) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            health_timeout: HEALTH_TIMEOUT,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Ask the backend whether it is up and which model it serves
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn health(&self) -> Result<BackendHealth, InferenceError> {
        let response = self
            .client
            .get(self.endpoint(HEALTH_PATH))
            .timeout(self.health_timeout)
            .send()
            .await?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(format!("Failed to parse health: {e}")))
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    #[instrument(skip(self, frame), fields(frame_len = frame.as_data_url().len()))]
    async fn send(&self, frame: EncodedFrame) -> Result<Prediction, InferenceError> {
        let response = self
            .client
            .post(self.endpoint(PROCESS_FRAME_PATH))
            .json(&FrameRequest {
                frame: frame.as_data_url(),
            })
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: FrameResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(format!("Failed to parse prediction: {e}")))?;
        if let Some(info) = &body.frame_info {
            debug!(frame_info = %info, "Backend frame info");
        }
        Ok(body.into())
    }

    #[instrument(skip(self))]
    async fn reset(&self) -> Result<(), InferenceError> {
        let response = self.client.post(self.endpoint(RESET_PATH)).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into `ServerError`
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, InferenceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), body = %body, "Backend returned an error status");
    Err(InferenceError::ServerError {
        status: status.as_u16(),
        message: status.canonical_reason().unwrap_or("Unknown status").to_string(),
    })
}

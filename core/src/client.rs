//! HTTP client for the upstream content service.
//!
//! Two request types: chat completion (planning, research, assembly) and
//! speech synthesis. Both run under the bounded retry policy; the per-call
//! timeout is enforced by the underlying HTTP client and counts as a
//! transient failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::retry::{with_retry, RetryPolicy};
use crate::{Result, TourError};

/// One chat-completion request: a system framing plus the user prompt.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Seam between the pipeline and the upstream API. The HTTP implementation
/// below is the production one; tests substitute deterministic fakes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentService: Send + Sync {
    /// Generate text for the given prompt. Retries transient failures
    /// internally; exhaustion surfaces [`TourError::ServiceUnavailable`].
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Synthesize speech for `text` with the provider voice `voice`,
    /// returning raw audio bytes. Same retry contract as [`Self::complete`].
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>>;
}

/// Stateless reqwest-backed client. Network configuration is read-only after
/// construction; the client is shared across all pipeline stages.
pub struct HttpContentClient {
    http: Client,
    cfg: ServiceConfig,
    retry: RetryPolicy,
}

impl HttpContentClient {
    pub fn new(cfg: ServiceConfig, retry: RetryPolicy) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| TourError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg, retry })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.cfg.base_url.trim_end_matches('/'), path)
    }

    async fn try_complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = self.endpoint("chat/completions");
        debug!(target = "content_client", "POST {} via chat completions", url);

        let mut req = self
            .http
            .post(&url)
            .header("content-type", "application/json");
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let body = json!({
            "model": self.cfg.chat_model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let resp = req.json(&body).send().await.map_err(map_transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let val: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| TourError::MalformedResponse(format!("chat completions JSON: {e}")))?;
        extract_text_from_chat_completions(&val).ok_or_else(|| {
            TourError::MalformedResponse("missing choices[0].message.content".into())
        })
    }

    async fn try_synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let url = self.endpoint("audio/speech");
        debug!(
            target = "content_client",
            chars = text.len(),
            voice = voice,
            "POST {} via speech synthesis",
            url
        );

        let mut req = self
            .http
            .post(&url)
            .header("content-type", "application/json");
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let body = json!({
            "model": self.cfg.tts_model,
            "input": text,
            "voice": voice,
            "response_format": self.cfg.audio_format,
            "speed": self.cfg.tts_speed,
        });

        let resp = req.json(&body).send().await.map_err(map_transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let bytes = resp.bytes().await.map_err(map_transport_error)?;

        // The provider answers either with raw audio bytes or with a JSON
        // envelope pointing at a downloadable result.
        if content_type.starts_with("application/json") {
            let val: serde_json::Value = serde_json::from_slice(&bytes)
                .map_err(|e| TourError::MalformedResponse(format!("speech JSON: {e}")))?;
            let download_url = val
                .get("result_download_url")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    TourError::MalformedResponse(
                        "speech response missing result_download_url".into(),
                    )
                })?;
            debug!(target = "content_client", "GET {} audio download", download_url);
            let audio = self
                .http
                .get(download_url)
                .send()
                .await
                .map_err(map_transport_error)?;
            let status = audio.status();
            if !status.is_success() {
                return Err(classify_status(status, "audio download failed"));
            }
            return Ok(audio.bytes().await.map_err(map_transport_error)?.to_vec());
        }

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ContentService for HttpContentClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        with_retry(&self.retry, "chat.completions", || self.try_complete(request)).await
    }

    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        with_retry(&self.retry, "audio.speech", || self.try_synthesize(text, voice)).await
    }
}

fn map_transport_error(err: reqwest::Error) -> TourError {
    if err.is_decode() {
        TourError::MalformedResponse(err.to_string())
    } else {
        // Timeouts, connect failures, resets: all retryable.
        TourError::Upstream(err.to_string())
    }
}

fn classify_status(status: StatusCode, body: &str) -> TourError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TourError::Unauthorized,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            TourError::Upstream(format!("status {status}: {body}"))
        }
        s if s.is_server_error() => TourError::Upstream(format!("status {s}: {body}")),
        s => TourError::MalformedResponse(format!("upstream rejected request: status {s}: {body}")),
    }
}

fn extract_text_from_chat_completions(v: &serde_json::Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

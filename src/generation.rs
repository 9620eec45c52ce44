//! Generation-service abstraction and the Cohere client.
//!
//! Defines the [`GenerationService`] trait and two implementations:
//! - **[`DisabledGenerator`]**: fails every call; used when
//!   `generation.provider = "disabled"`.
//! - **[`CohereClient`]**: calls `POST /v1/generate` on a Cohere-compatible
//!   endpoint.
//!
//! # Failure Mapping
//!
//! | Condition | Error |
//! |-----------|-------|
//! | HTTP 401 / 403 | [`GenerationError::Authentication`] |
//! | HTTP 429 | [`GenerationError::RateLimited`] |
//! | HTTP 5xx, connection refused | [`GenerationError::ServiceUnavailable`] |
//! | `timeout_secs` elapsed | [`GenerationError::Timeout`] |
//! | Other HTTP 4xx | [`GenerationError::Rejected`] |
//! | Unparseable body | [`GenerationError::InvalidResponse`] |
//!
//! Nothing here retries. A failed call is reported once and the caller
//! decides what the user sees.

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GenerationConfig;

/// One call to the generation service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResponse {
    pub generated_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("authentication with the generation service failed: {0}")]
    Authentication(String),
    #[error("generation service rate limit reached: {0}")]
    RateLimited(String),
    #[error("generation service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("generation service timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("generation request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid response from generation service: {0}")]
    InvalidResponse(String),
}

/// A backend that turns a prompt into reply text.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Short identifier used in logs (e.g. `"cohere:command-xlarge"`).
    fn name(&self) -> &str;

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError>;
}

// ============ Disabled ============

pub struct DisabledGenerator;

#[async_trait]
impl GenerationService for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate(
        &self,
        _request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        Err(GenerationError::ServiceUnavailable(
            "generation provider is disabled".to_string(),
        ))
    }
}

// ============ Cohere ============

#[derive(Serialize)]
struct CohereGenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CohereGenerateReply {
    generations: Vec<CohereGeneration>,
}

#[derive(Deserialize)]
struct CohereGeneration {
    text: String,
}

#[derive(Deserialize)]
struct CohereErrorBody {
    message: String,
}

/// Client for the Cohere `generate` endpoint.
pub struct CohereClient {
    label: String,
    model: String,
    url: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl CohereClient {
    /// Build a client, reading the credential from the environment variable
    /// named by `config.api_key_env`.
    ///
    /// # Errors
    ///
    /// Fails when the variable is unset or empty.
    pub fn from_env(config: &GenerationConfig) -> anyhow::Result<Self> {
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => bail!("{} environment variable not set", config.api_key_env),
        };
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &GenerationConfig, api_key: String) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            label: format!("cohere:{}", config.model),
            model: config.model.clone(),
            url: format!("{}/v1/generate", config.endpoint.trim_end_matches('/')),
            api_key,
            timeout,
            client,
        })
    }

    fn classify_transport(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout(self.timeout)
        } else {
            GenerationError::ServiceUnavailable(err.to_string())
        }
    }
}

#[async_trait]
impl GenerationService for CohereClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let body = CohereGenerateBody {
            model: &self.model,
            prompt: &request.prompt,
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
        };

        tracing::debug!(
            service = %self.label,
            prompt_chars = request.prompt.len(),
            "sending generation request"
        );

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.classify_transport(e))?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &text));
        }

        let reply: CohereGenerateReply = serde_json::from_str(&text)
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        let first = reply.generations.into_iter().next().ok_or_else(|| {
            GenerationError::InvalidResponse("response contained no generations".to_string())
        })?;

        Ok(GenerationResponse {
            generated_text: first.text.trim().to_string(),
        })
    }
}

/// Map a non-success HTTP status (and its body) to an error kind.
fn classify_status(status: u16, body: &str) -> GenerationError {
    let message = serde_json::from_str::<CohereErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string());
    match status {
        401 | 403 => GenerationError::Authentication(message),
        429 => GenerationError::RateLimited(message),
        500..=599 => GenerationError::ServiceUnavailable(format!("HTTP {}: {}", status, message)),
        _ => GenerationError::Rejected { status, message },
    }
}

/// Create the [`GenerationService`] selected by `config.provider`.
///
/// | Config Value | Service |
/// |-------------|----------|
/// | `"cohere"` | [`CohereClient`] |
/// | `"disabled"` | [`DisabledGenerator`] |
pub fn create_generator(config: &GenerationConfig) -> anyhow::Result<Arc<dyn GenerationService>> {
    match config.provider.as_str() {
        "cohere" => Ok(Arc::new(CohereClient::from_env(config)?)),
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

//! Embedding provider and vector backfill.
//!
//! The provider speaks the OpenAI-compatible `/v1/embeddings` wire shape, so
//! it works against both hosted APIs and a local sentence-transformer server.

pub mod backfill;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::EmbeddingConfig;
use crate::error::AppError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f64>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

// ── Provider ─────────────────────────────────────────────────────────────────

pub struct Embedder {
    http: reqwest::Client,
    config: EmbeddingConfig,
}

impl Embedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, AppError> {
        Ok(Self {
            http: build_client()?,
            config: config.clone(),
        })
    }

    /// Drop the current connection pool and start fresh. The backfill loop
    /// calls this periodically; the hosted embedding endpoint misbehaves on
    /// very long-lived connections.
    pub fn refresh(&mut self) -> Result<(), AppError> {
        debug!("recreating embedding http client");
        self.http = build_client()?;
        Ok(())
    }

    /// Embed one text. Returns exactly `config.dimension` components.
    pub async fn embed(&self, text: &str) -> Result<Vec<f64>, AppError> {
        trace!(chars = text.len(), "embedding text");

        let mut request = self.http.post(&self.config.api_base_url).json(&EmbeddingRequest {
            model: &self.config.model,
            input: [text],
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("embedding request failed: {e}")))?;
        let response = check_status(response).await?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("malformed embedding response: {e}")))?;
        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AppError::Embedding("embedding response had no data".to_string()))?;

        if vector.len() != self.config.dimension {
            return Err(AppError::Embedding(format!(
                "dimension mismatch: got {}, index expects {}",
                vector.len(),
                self.config.dimension
            )));
        }
        Ok(vector)
    }
}

fn build_client() -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AppError::Embedding(format!("http client init failed: {e}")))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or(body);
    Err(AppError::Embedding(format!(
        "embedding service returned {status}: {message}"
    )))
}

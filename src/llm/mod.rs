//! OpenAI-compatible chat completion provider.
//!
//! One wire shape covers OpenAI itself plus the usual self-hosted gateways
//! (vLLM, Ollama, llama.cpp server). Wire types stay private; callers deal in
//! [`ChatMessage`] and plain strings.

use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::ChatConfig;
use crate::error::AppError;

// ── Public message model ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
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

pub struct ChatProvider {
    http: reqwest::Client,
    config: ChatConfig,
}

impl ChatProvider {
    pub fn new(config: &ChatConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Llm(format!("http client init failed: {e}")))?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    fn request(&self, body: &ChatRequest<'_>) -> reqwest::RequestBuilder {
        let mut request = self.http.post(&self.config.api_base_url).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        request
    }

    /// Single-shot completion.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AppError> {
        debug!(model = %self.config.model, messages = messages.len(), "chat request");

        let response = self
            .request(&ChatRequest {
                model: &self.config.model,
                messages,
                temperature: self.config.temperature,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("chat request failed: {e}")))?;
        let response = check_status(response).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("malformed chat response: {e}")))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::Llm("chat response had no content".to_string()))
    }

    /// Streaming completion. `on_token` fires once per content delta; the
    /// full answer is also returned for logging and reports.
    pub async fn complete_streaming<F>(
        &self,
        messages: &[ChatMessage],
        mut on_token: F,
    ) -> Result<String, AppError>
    where
        F: FnMut(&str),
    {
        debug!(model = %self.config.model, messages = messages.len(), "streaming chat request");

        let response = self
            .request(&ChatRequest {
                model: &self.config.model,
                messages,
                temperature: self.config.temperature,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("chat request failed: {e}")))?;
        let response = check_status(response).await?;

        let mut answer = String::new();
        let mut buffer = String::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AppError::Llm(format!("chat stream broke: {e}")))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // SSE events are newline-delimited; keep any partial line in the
            // buffer for the next chunk.
            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim().to_string();
                buffer.drain(..=newline);
                if let Some(token) = parse_sse_line(&line)? {
                    on_token(&token);
                    answer.push_str(&token);
                }
            }
        }

        trace!(chars = answer.len(), "stream complete");
        Ok(answer)
    }
}

/// Extract the content delta from one SSE line, if it carries one.
fn parse_sse_line(line: &str) -> Result<Option<String>, AppError> {
    let Some(data) = line.strip_prefix("data: ") else {
        return Ok(None);
    };
    if data == "[DONE]" {
        return Ok(None);
    }
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| AppError::Llm(format!("malformed stream chunk: {e}")))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content))
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
    Err(AppError::Llm(format!(
        "chat service returned {status}: {message}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_content_line_yields_token() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hola"}}]}"#;
        assert_eq!(parse_sse_line(line).unwrap(), Some("Hola".to_string()));
    }

    #[test]
    fn sse_done_and_noise_yield_nothing() {
        assert_eq!(parse_sse_line("data: [DONE]").unwrap(), None);
        assert_eq!(parse_sse_line("").unwrap(), None);
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), None);
    }

    #[test]
    fn sse_role_only_delta_yields_nothing() {
        let line = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(line).unwrap(), None);
    }

    #[test]
    fn sse_garbage_is_an_error() {
        assert!(parse_sse_line("data: {broken").is_err());
    }

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(ChatMessage::system("x").role, "system");
        assert_eq!(ChatMessage::user("y").role, "user");
    }
}

//! llama.cpp server completion backend.
//!
//! This module is only available when the `llama` feature is enabled.
//! It talks to the llama.cpp HTTP server's `POST /completion` endpoint,
//! in both single-shot and streaming (SSE) form.

use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{RagError, Result};
use crate::generation::{CompletionModel, TokenStream};

const BACKEND: &str = "llama.cpp";

/// Default timeout for single-shot completion requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// A [`CompletionModel`] backed by a llama.cpp HTTP server.
///
/// # Example
///
/// ```rust,ignore
/// use pdfrag::llama::LlamaCppClient;
///
/// let model = LlamaCppClient::new("http://127.0.0.1:8080")?;
/// let answer = model.complete("Hello", 64, 0.2).await?;
/// ```
pub struct LlamaCppClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl LlamaCppClient {
    /// Create a new client for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RagError::Generation {
                backend: BACKEND.to_string(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the single-shot request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn completion_url(&self) -> String {
        format!("{}/completion", self.base_url)
    }

    fn request_error(e: reqwest::Error) -> RagError {
        RagError::Generation { backend: BACKEND.to_string(), message: format!("request failed: {e}") }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    content: String,
}

/// One SSE payload from the streaming endpoint.
#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    content: String,
    #[serde(default)]
    stop: bool,
}

#[async_trait]
impl CompletionModel for LlamaCppClient {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        debug!(backend = BACKEND, prompt_len = prompt.len(), max_tokens, "completion request");

        let response = self
            .client
            .post(self.completion_url())
            .timeout(self.timeout)
            .json(&CompletionRequest { prompt, n_predict: max_tokens, temperature, stream: false })
            .send()
            .await
            .map_err(Self::request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(backend = BACKEND, %status, "completion request rejected");
            return Err(RagError::Generation {
                backend: BACKEND.to_string(),
                message: format!("server returned {status}: {body}"),
            });
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| RagError::Generation {
            backend: BACKEND.to_string(),
            message: format!("failed to parse response: {e}"),
        })?;
        Ok(parsed.content)
    }

    async fn complete_stream(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<TokenStream> {
        debug!(backend = BACKEND, prompt_len = prompt.len(), max_tokens, "streaming completion");

        let response = self
            .client
            .post(self.completion_url())
            .json(&CompletionRequest { prompt, n_predict: max_tokens, temperature, stream: true })
            .send()
            .await
            .map_err(Self::request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Generation {
                backend: BACKEND.to_string(),
                message: format!("server returned {status}: {body}"),
            });
        }

        let mut bytes = response.bytes_stream();
        let stream = try_stream! {
            let mut buffer = String::new();
            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| RagError::Generation {
                    backend: BACKEND.to_string(),
                    message: format!("stream read failed: {e}"),
                })?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // SSE frames are newline-delimited `data: {json}` lines.
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    let Some(payload) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let parsed: StreamChunk =
                        serde_json::from_str(payload).map_err(|e| RagError::Generation {
                            backend: BACKEND.to_string(),
                            message: format!("malformed stream payload: {e}"),
                        })?;
                    if !parsed.content.is_empty() {
                        yield parsed.content;
                    }
                    if parsed.stop {
                        break 'outer;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

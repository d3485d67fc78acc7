//! HTTP client for an Ollama-compatible inference server.
//!
//! One request per call, no retries. Streaming calls hand back the response body
//! as a lazy fragment stream; dropping that stream closes the connection but
//! sends no cancel message, so the server may finish the generation anyway.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::inference::ndjson::{decode_chat_line, decode_generate_line, frame_fragments};
use crate::inference::{
    ChatMessage, ChatRequest, FragmentStream, GenerateRequest, GenerationOptions,
    InferenceClient, InferenceError,
};

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerationOptions,
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: &'a GenerationOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponseBody {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    list_timeout: Duration,
}

impl OllamaClient {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        list_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
            list_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, InferenceError> {
        let url = self.url(path);
        debug!("POST {url}");

        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| classify(e, self.request_timeout))?;

        ensure_success(response).await
    }
}

/// Maps a transport error onto the inference taxonomy.
fn classify(error: reqwest::Error, timeout: Duration) -> InferenceError {
    if error.is_timeout() {
        InferenceError::Timeout(timeout.as_secs())
    } else if error.is_decode() {
        InferenceError::Malformed(error.to_string())
    } else {
        InferenceError::Unreachable(error.to_string())
    }
}

/// Non-2xx → `Backend`, preferring the server's `{"error": ...}` message.
async fn ensure_success(response: Response) -> Result<Response, InferenceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<BackendErrorBody>(&body)
        .map(|e| e.error)
        .unwrap_or(body);

    Err(InferenceError::Backend {
        status: status.as_u16(),
        message,
    })
}

fn body_stream(
    response: Response,
    timeout: Duration,
) -> impl futures::Stream<Item = Result<bytes::Bytes, InferenceError>> + Send {
    response
        .bytes_stream()
        .map(move |chunk| chunk.map_err(|e| classify(e, timeout)))
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, InferenceError> {
        let body = GenerateBody {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            options: &request.options,
        };

        let response = self.post_json("/api/generate", &body).await?;
        let parsed: GenerateResponseBody = response
            .json()
            .await
            .map_err(|e| InferenceError::Malformed(e.to_string()))?;

        if parsed.response.trim().is_empty() {
            return Err(InferenceError::EmptyResponse);
        }

        debug!(
            "generate succeeded: model={}, chars={}",
            request.model,
            parsed.response.len()
        );
        Ok(parsed.response)
    }

    async fn generate_stream(
        &self,
        request: &GenerateRequest,
    ) -> Result<FragmentStream, InferenceError> {
        let body = GenerateBody {
            model: &request.model,
            prompt: &request.prompt,
            stream: true,
            options: &request.options,
        };

        let response = self.post_json("/api/generate", &body).await?;
        let status = response.status().as_u16();
        Ok(frame_fragments(
            body_stream(response, self.request_timeout),
            status,
            decode_generate_line,
        ))
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<FragmentStream, InferenceError> {
        let body = ChatBody {
            model: &request.model,
            messages: &request.messages,
            stream: true,
            options: &request.options,
        };

        let response = self.post_json("/api/chat", &body).await?;
        let status = response.status().as_u16();
        Ok(frame_fragments(
            body_stream(response, self.request_timeout),
            status,
            decode_chat_line,
        ))
    }

    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .timeout(self.list_timeout)
            .send()
            .await
            .map_err(|e| classify(e, self.list_timeout))?;

        let response = ensure_success(response).await?;
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Malformed(e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

/// Inference Client — the boundary to the locally hosted model server.
///
/// ARCHITECTURAL RULE: analysis and route code never talk HTTP to the backend
/// directly. Every generate, chat, and model-listing call goes through
/// `InferenceClient`, so the analyzer can be driven by the scripted client in tests.
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(test)]
pub mod mock;
pub mod models;
pub mod ndjson;
pub mod ollama;

pub use ollama::OllamaClient;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Could not reach inference backend: {0}")]
    Unreachable(String),

    #[error("Inference backend timed out after {0}s")]
    Timeout(u64),

    #[error("Backend error (status {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Malformed backend response: {0}")]
    Malformed(String),

    #[error("Backend returned no content")]
    EmptyResponse,
}

/// Lazy sequence of text fragments from one streaming call.
/// Ends after the backend's `done` marker or the first error.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, InferenceError>> + Send>>;

/// Sampling options forwarded verbatim under the request's `options` key.
/// Fields missing from a deserialized object take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.9,
            num_predict: 800,
        }
    }
}

impl GenerationOptions {
    /// Type/range sanity only. The backend decides what the values mean.
    pub fn validate(&self) -> Result<(), String> {
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            ));
        }
        if !self.top_p.is_finite() || self.top_p <= 0.0 || self.top_p > 1.0 {
            return Err(format!("top_p must be in (0, 1], got {}", self.top_p));
        }
        if self.num_predict == 0 {
            return Err("num_predict must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub options: GenerationOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub options: GenerationOptions,
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Non-streaming generate. Returns the completed text.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, InferenceError>;

    /// Streaming generate. Fragments arrive in backend order.
    async fn generate_stream(
        &self,
        request: &GenerateRequest,
    ) -> Result<FragmentStream, InferenceError>;

    /// Streaming chat over a message history.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<FragmentStream, InferenceError>;

    /// Installed model identifiers. May be empty.
    async fn list_models(&self) -> Result<Vec<String>, InferenceError>;
}

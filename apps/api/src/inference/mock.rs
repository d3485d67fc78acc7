//! Scripted in-memory inference client for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::inference::{
    ChatRequest, FragmentStream, GenerateRequest, InferenceClient, InferenceError,
};

type StreamScript = Result<Vec<Result<String, InferenceError>>, InferenceError>;

/// Replays queued results in call order and records every prompt it sees.
/// An exhausted `generate` queue answers `"ok"`.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, InferenceError>>>,
    streams: Mutex<VecDeque<StreamScript>>,
    models: Option<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            models: Some(vec!["mistral:latest".to_string()]),
            ..Default::default()
        }
    }

    pub fn reply(self, text: &str) -> Self {
        self.push(Ok(text.to_string()))
    }

    pub fn fail(self, error: InferenceError) -> Self {
        self.push(Err(error))
    }

    pub fn stream(self, fragments: &[&str]) -> Self {
        let script = fragments.iter().map(|f| Ok(f.to_string())).collect();
        self.streams.lock().unwrap().push_back(Ok(script));
        self
    }

    pub fn stream_items(self, items: Vec<Result<String, InferenceError>>) -> Self {
        self.streams.lock().unwrap().push_back(Ok(items));
        self
    }

    pub fn stream_fails(self, error: InferenceError) -> Self {
        self.streams.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn models(mut self, models: &[&str]) -> Self {
        self.models = Some(models.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.models = None;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn push(self, reply: Result<String, InferenceError>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    fn next_stream(&self) -> Result<FragmentStream, InferenceError> {
        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![Ok("ok".to_string())]));
        let items = script?;
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, InferenceError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("ok".to_string()))
    }

    async fn generate_stream(
        &self,
        request: &GenerateRequest,
    ) -> Result<FragmentStream, InferenceError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.next_stream()
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<FragmentStream, InferenceError> {
        let transcript = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(transcript);
        self.next_stream()
    }

    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        self.models
            .clone()
            .ok_or_else(|| InferenceError::Unreachable("connection refused".to_string()))
    }
}

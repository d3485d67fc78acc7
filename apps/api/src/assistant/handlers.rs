use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::info;

use crate::assistant::{build_conversation, chat_events, ChatEvent, ConversationError};
use crate::errors::AppError;
use crate::inference::{ChatMessage, ChatRequest, GenerationOptions};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AssistantChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Store background for this conversation; the configured one otherwise.
    pub context: Option<String>,
    pub model: Option<String>,
    pub options: Option<GenerationOptions>,
}

impl From<ConversationError> for AppError {
    fn from(error: ConversationError) -> Self {
        match error {
            ConversationError::Prompt(e) => AppError::Prompt(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}

/// POST /api/v1/assistant/chat
///
/// Streams the assistant's reply as `snapshot` events holding the text so far,
/// then `done` (or `error`).
pub async fn handle_assistant_chat(
    State(state): State<AppState>,
    Json(request): Json<AssistantChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let options = request.options.unwrap_or_default();
    options.validate().map_err(AppError::Validation)?;

    let context = request
        .context
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(&state.config.store_context);
    let messages = build_conversation(
        &state.registry,
        &state.config.store_name,
        context,
        request.messages,
    )?;

    let model = state.resolve_model(request.model.as_deref()).await?;
    info!(
        "Assistant chat with {model} ({} turns)",
        messages.len() - 1
    );

    let fragments = state
        .client
        .chat_stream(&ChatRequest {
            model,
            messages,
            options,
        })
        .await?;

    let events = chat_events(fragments).map(|event| Ok(to_sse(&event)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &ChatEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|e| {
            Event::default()
                .event("error")
                .data(format!("could not encode event: {e}"))
        })
}

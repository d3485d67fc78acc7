// Store Assistant: streamed customer-service chat. A rendered system
// message carries the store's background; the caller's history follows it.

pub mod handlers;

use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::analysis::streaming::SnapshotStream;
use crate::inference::{ChatMessage, ChatRole, FragmentStream, InferenceError};
use crate::prompts::{PromptError, PromptRegistry};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChatEvent {
    Snapshot { text: String },
    Done { text: String },
    Error { message: String },
}

impl ChatEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::Snapshot { .. } => "snapshot",
            ChatEvent::Done { .. } => "done",
            ChatEvent::Error { .. } => "error",
        }
    }
}

/// Validates the caller's history and prepends the store system message.
///
/// History may only hold user and assistant turns and must end with a user turn.
pub fn build_conversation(
    registry: &PromptRegistry,
    store_name: &str,
    store_context: &str,
    history: Vec<ChatMessage>,
) -> Result<Vec<ChatMessage>, ConversationError> {
    match history.last() {
        None => return Err(ConversationError::Empty),
        Some(last) if last.role != ChatRole::User => return Err(ConversationError::NoQuestion),
        Some(_) => {}
    }
    if history.iter().any(|m| m.role == ChatRole::System) {
        return Err(ConversationError::SystemTurn);
    }
    if history.iter().any(|m| m.content.trim().is_empty()) {
        return Err(ConversationError::BlankTurn);
    }

    let system = registry.render(
        "store_assistant",
        &[("organization", store_name), ("context", store_context)],
    )?;

    let mut conversation = Vec::with_capacity(history.len() + 1);
    conversation.push(ChatMessage {
        role: ChatRole::System,
        content: system,
    });
    conversation.extend(history);
    Ok(conversation)
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConversationError {
    #[error("messages cannot be empty")]
    Empty,

    #[error("the last message must come from the user")]
    NoQuestion,

    #[error("system messages are not accepted from callers")]
    SystemTurn,

    #[error("messages cannot have blank content")]
    BlankTurn,

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Snapshot events for one streamed reply, closed by `done` or `error`.
pub fn chat_events(fragments: FragmentStream) -> impl Stream<Item = ChatEvent> + Send {
    futures::stream::unfold(Some(SnapshotStream::new(fragments)), |state| async move {
        let mut snapshots = state?;
        match snapshots.next().await {
            Some(Ok(text)) => Some((ChatEvent::Snapshot { text }, Some(snapshots))),
            Some(Err(e)) => Some((
                ChatEvent::Error {
                    message: e.to_string(),
                },
                None,
            )),
            None => {
                let text = snapshots.into_text();
                let event = if text.trim().is_empty() {
                    ChatEvent::Error {
                        message: InferenceError::EmptyResponse.to_string(),
                    }
                } else {
                    ChatEvent::Done { text }
                };
                Some((event, None))
            }
        }
    })
}

//! Member assistant chat, plain and streamed

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::error;

use crate::api::error::ApiError;
use crate::api::extract::Member;
use crate::api::state::AppState;
use crate::assistant::{AssistantEvent, AssistantReply, ThinkingStep};

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
}

/// Events on `POST /api/assistant/chat/stream`
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ChatStreamEvent {
    Step(ThinkingStep),
    Message { content: String },
    Error { message: String },
    Done(AssistantReply),
}

impl ChatStreamEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatStreamEvent::Step(_) => "step",
            ChatStreamEvent::Message { .. } => "message",
            ChatStreamEvent::Error { .. } => "error",
            ChatStreamEvent::Done(_) => "done",
        }
    }

    pub fn to_sse_event(&self) -> Result<Event, serde_json::Error> {
        let data = serde_json::to_string(self)?;
        Ok(Event::default().event(self.event_type()).data(data))
    }
}

impl From<AssistantEvent> for ChatStreamEvent {
    fn from(event: AssistantEvent) -> Self {
        match event {
            AssistantEvent::Step(step) => ChatStreamEvent::Step(step),
            AssistantEvent::Message(content) => ChatStreamEvent::Message { content },
        }
    }
}

fn validate(body: &ChatBody) -> Result<(), ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".into()));
    }
    Ok(())
}

/// `POST /api/assistant/chat` returns `{messages, steps}` once done
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Member(member): Member,
    Json(body): Json<ChatBody>,
) -> Result<Json<AssistantReply>, ApiError> {
    validate(&body)?;
    let reply = state.assistant.chat(&member, &body.message, None).await?;
    Ok(Json(reply))
}

/// `POST /api/assistant/chat/stream` emits `step` and `message` events as
/// the agent works, then `done` with the full reply
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Member(member): Member,
    Json(body): Json<ChatBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    validate(&body)?;
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(100);

    tokio::spawn(async move {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AssistantEvent>();

        let forward = {
            let tx = tx.clone();
            async move {
                while let Some(event) = event_rx.recv().await {
                    if let Ok(event) = ChatStreamEvent::from(event).to_sse_event() {
                        let _ = tx.send(Ok(event)).await;
                    }
                }
            }
        };
        // The sender is dropped when the chat returns, which ends `forward`
        let (result, ()) = tokio::join!(
            state.assistant.chat(&member, &body.message, Some(event_tx)),
            forward
        );

        let last = match result {
            Ok(reply) => ChatStreamEvent::Done(reply),
            Err(e) => {
                error!("Assistant stream error for {}: {}", member.email, e);
                ChatStreamEvent::Error {
                    message: e.to_string(),
                }
            }
        };
        if let Ok(event) = last.to_sse_event() {
            let _ = tx.send(Ok(event)).await;
        }
    });

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

/// `DELETE /api/assistant/session`
pub async fn clear_session(
    State(state): State<Arc<AppState>>,
    Member(member): Member,
) -> StatusCode {
    state.assistant.clear_session(member.id).await;
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_event_types() {
        let step = ChatStreamEvent::from(AssistantEvent::Step(ThinkingStep {
            phase: "thinking".into(),
            detail: "Looking at classes".into(),
        }));
        assert_eq!(step.event_type(), "step");
        assert_eq!(
            ChatStreamEvent::from(AssistantEvent::Message("Hi".into())).event_type(),
            "message"
        );
        assert_eq!(ChatStreamEvent::Done(AssistantReply::default()).event_type(), "done");
    }

    #[test]
    fn message_payload_shape() {
        let event = ChatStreamEvent::from(AssistantEvent::Message("Booked!".into()));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, serde_json::json!({"content": "Booked!"}));
    }

    #[test]
    fn blank_message_rejected() {
        let body = ChatBody {
            message: "   ".into(),
        };
        assert!(matches!(validate(&body), Err(ApiError::BadRequest(_))));
    }
}

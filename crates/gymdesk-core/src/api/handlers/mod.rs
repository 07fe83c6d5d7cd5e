//! HTTP request handlers

pub mod assistant;
pub mod directory;
pub mod functions;
pub mod health;
pub mod knowledge;
pub mod member;
pub mod session;
pub mod tickets;

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};

use crate::events::{ChangeEvent, EventBus};

/// One `change` SSE event per committed mutation on `table`
pub(crate) fn change_feed(
    events: &EventBus,
    table: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = events
        .table_stream(table)
        .map(|change| Ok(change_event(&change)));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub(crate) fn change_event(change: &ChangeEvent) -> Event {
    Event::default()
        .event("change")
        .data(serde_json::to_string(change).unwrap_or_default())
}

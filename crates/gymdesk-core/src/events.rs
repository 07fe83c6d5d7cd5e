//! Table change feed
//!
//! Stores publish a `ChangeEvent` after every committed mutation. Subscribers
//! treat an event as "something changed, refetch"; the event carries only the
//! table, the kind of change and the row id.

use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub table: &'static str,
    pub kind: ChangeKind,
    pub id: Uuid,
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, table: &'static str, kind: ChangeKind, id: Uuid) {
        let event = ChangeEvent { table, kind, id };
        // Err only means nobody is listening right now
        match self.tx.send(event) {
            Ok(n) => debug!("Published {:?} on {} to {} subscriber(s)", kind, table, n),
            Err(_) => debug!("Published {:?} on {} (no subscribers)", kind, table),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Events for one table. A lagging subscriber skips the events it missed.
    pub fn table_stream(&self, table: &'static str) -> impl Stream<Item = ChangeEvent> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(move |item| async move {
            match item {
                Ok(event) if event.table == table => Some(event),
                Ok(_) => None,
                Err(e) => {
                    warn!("Change feed subscriber for {} lagged: {}", table, e);
                    None
                }
            }
        })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let id = Uuid::new_v4();

        bus.publish("tickets", ChangeKind::Update, id);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.table, "tickets");
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.id, id);
    }

    #[tokio::test]
    async fn table_stream_filters_other_tables() {
        let bus = EventBus::new();
        let stream = bus.table_stream("knowledge_base");
        tokio::pin!(stream);

        let kb_id = Uuid::new_v4();
        bus.publish("tickets", ChangeKind::Insert, Uuid::new_v4());
        bus.publish("knowledge_base", ChangeKind::Delete, kb_id);

        let event = stream.next().await.unwrap();
        assert_eq!(event.id, kb_id);
        assert_eq!(event.kind, ChangeKind::Delete);
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish("tickets", ChangeKind::Insert, Uuid::new_v4());
    }

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_value(ChangeEvent {
            table: "tickets",
            kind: ChangeKind::Insert,
            id: Uuid::nil(),
        })
        .unwrap();
        assert_eq!(json["kind"], "insert");
    }
}

//! Domain event notifications
//!
//! Services hand events to a [`Notifier`] after their transaction commits.
//! Delivery is best effort: a failing sink is logged and never fails the
//! operation that produced the event.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Wire names of the events pushed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventName {
    ProductCreated,
    ProductUpdated,
    ProductRestocked,
    ProductDeleted,
    SaleCreated,
    StockAlertCreated,
    StockAlertUpdated,
    StockAlertRead,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::ProductCreated => "productCreated",
            EventName::ProductUpdated => "productUpdated",
            EventName::ProductRestocked => "productRestocked",
            EventName::ProductDeleted => "productDeleted",
            EventName::SaleCreated => "saleCreated",
            EventName::StockAlertCreated => "stockAlertCreated",
            EventName::StockAlertUpdated => "stockAlertUpdated",
            EventName::StockAlertRead => "stockAlertRead",
        }
    }
}

/// A notification for one owner
#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    pub name: EventName,
    pub owner_id: Uuid,
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to serialize event payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("notification transport failed: {0}")]
    Transport(String),
}

/// Destination for domain events
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, event: DomainEvent) -> Result<(), NotifyError>;
}

/// In-process fan-out to every live subscriber (the SSE stream)
#[derive(Debug)]
pub struct BroadcastSink {
    sender: broadcast::Sender<DomainEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    async fn emit(&self, event: DomainEvent) -> Result<(), NotifyError> {
        // No subscribers is not an error
        if self.sender.send(event).is_err() {
            tracing::trace!("event dropped, no subscribers");
        }
        Ok(())
    }
}

/// Publishes events without ever failing the caller
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    pub async fn publish<T: Serialize + ?Sized>(&self, name: EventName, owner: Uuid, payload: &T) {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(event = name.as_str(), error = %NotifyError::from(e), "dropping event");
                return;
            }
        };

        let event = DomainEvent {
            name,
            owner_id: owner,
            payload,
            emitted_at: Utc::now(),
        };

        if let Err(e) = self.sink.emit(event).await {
            tracing::warn!(event = name.as_str(), owner = %owner, error = %e, "failed to deliver notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_match_wire_format() {
        assert_eq!(EventName::SaleCreated.as_str(), "saleCreated");
        assert_eq!(
            serde_json::to_value(EventName::StockAlertRead).unwrap(),
            serde_json::json!("stockAlertRead")
        );
    }

    #[tokio::test]
    async fn test_broadcast_sink_delivers_to_subscribers() {
        let sink = Arc::new(BroadcastSink::new(8));
        let mut rx = sink.subscribe();
        let notifier = Notifier::new(sink.clone());
        let owner = Uuid::new_v4();

        notifier
            .publish(EventName::ProductDeleted, owner, &serde_json::json!({ "id": "x" }))
            .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, EventName::ProductDeleted);
        assert_eq!(event.owner_id, owner);
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_ok() {
        let sink = BroadcastSink::new(1);
        let event = DomainEvent {
            name: EventName::ProductCreated,
            owner_id: Uuid::new_v4(),
            payload: serde_json::Value::Null,
            emitted_at: Utc::now(),
        };
        assert!(sink.emit(event).await.is_ok());
    }
}

//! In-process event bus and the knowledge wire contract.

use chrono::{DateTime, Utc};
use knowledge_core::UpdateRequest;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::debug;

/// Envelope carried by every event on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub name: String,
    pub source: String,
    /// Correlates a response with the request that triggered it
    pub correlation_id: Option<String>,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            correlation_id: None,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn with_correlation(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

/// Topic-based event bus backed by one broadcast channel per event name.
///
/// Publishing never blocks; events published with no live subscriber are
/// dropped.
pub struct EventBus {
    topics: RwLock<HashMap<String, broadcast::Sender<EventEnvelope>>>,
    capacity: usize,
}

impl EventBus {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Publish an event, returning the number of live subscribers.
    pub fn publish(&self, event: EventEnvelope) -> usize {
        let sender = self.sender_for(&event.name);
        let receivers = sender.receiver_count();
        debug!(event = %event.name, receivers, "Publishing event");
        // A send error only means nobody is listening
        let _ = sender.send(event);
        receivers
    }

    /// Subscribe to all events published under a name.
    pub fn subscribe(&self, name: &str) -> broadcast::Receiver<EventEnvelope> {
        self.sender_for(name).subscribe()
    }

    fn sender_for(&self, name: &str) -> broadcast::Sender<EventEnvelope> {
        if let Some(sender) = self.topics.read().get(name) {
            return sender.clone();
        }

        let mut topics = self.topics.write();
        topics
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Event names the repository consumes and emits.
pub mod names {
    pub const KNOWLEDGE_QUERY: &str = "knowledge_query";
    pub const KNOWLEDGE_PUBLISH: &str = "knowledge_publish";
    pub const KNOWLEDGE_UPDATE: &str = "knowledge_update";
    pub const KNOWLEDGE_DELETE: &str = "knowledge_delete";

    pub const KNOWLEDGE_QUERY_RESPONSE: &str = "knowledge_query_response";
    pub const KNOWLEDGE_PUBLISH_RESPONSE: &str = "knowledge_publish_response";
    pub const KNOWLEDGE_UPDATE_RESPONSE: &str = "knowledge_update_response";
    pub const KNOWLEDGE_DELETE_RESPONSE: &str = "knowledge_delete_response";

    pub const KNOWLEDGE_ADDED: &str = "knowledge_added";
    pub const KNOWLEDGE_UPDATED: &str = "knowledge_updated";
    pub const KNOWLEDGE_DELETED: &str = "knowledge_deleted";
}

/// Query mode of a `knowledge_query` request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Text,
    Topic,
    Tag,
    Id,
}

/// Payload of a `knowledge_query` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub query_type: QueryMode,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Payload of a `knowledge_update` request: the target ID plus the
/// change set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub knowledge_id: String,
    #[serde(flatten)]
    pub changes: UpdateRequest,
}

/// Payload of a `knowledge_delete` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePayload {
    pub knowledge_id: String,
}

/// Parse a request payload, mapping malformed input to `BadRequest`.
pub fn parse_payload<T: serde::de::DeserializeOwned>(
    data: serde_json::Value,
) -> knowledge_core::Result<T> {
    serde_json::from_value(data)
        .map_err(|e| knowledge_core::KnowledgeError::bad_request(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_core::{KnowledgeStatus, PublishRequest};
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe("test_event");

        let delivered = bus.publish(EventEnvelope::new("test_event", "tests", json!({"k": 1})));
        assert_eq!(delivered, 1);

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.name, "test_event");
        assert_eq!(event.data["k"], 1);
        assert!(event.correlation_id.is_none());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(
            bus.publish(EventEnvelope::new("nobody_listening", "tests", json!({}))),
            0
        );
    }

    #[tokio::test]
    async fn test_correlation_id_carried() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe("correlated");

        bus.publish(
            EventEnvelope::new("correlated", "tests", json!({}))
                .with_correlation(Some("req-7".to_string())),
        );

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.correlation_id.as_deref(), Some("req-7"));
    }

    #[test]
    fn test_query_request_parsing() {
        let request: QueryRequest = parse_payload(json!({
            "query": "bitcoin",
            "query_type": "text",
            "limit": 5
        }))
        .unwrap();
        assert_eq!(request.query_type, QueryMode::Text);
        assert_eq!(request.limit, Some(5));

        let no_limit: QueryRequest =
            parse_payload(json!({"query": "t", "query_type": "topic"})).unwrap();
        assert_eq!(no_limit.limit, None);

        let bad = parse_payload::<QueryRequest>(json!({"query": "x", "query_type": "regex"}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_update_payload_flattens_changes() {
        let payload: UpdatePayload = parse_payload(json!({
            "knowledge_id": "00000000-0000-0000-0000-000000000000",
            "status": "ACTIVE",
            "content": {"price": 2}
        }))
        .unwrap();
        assert_eq!(payload.changes.status, Some(KnowledgeStatus::Active));
        assert!(payload.changes.tags.is_none());

        let request: PublishRequest = parse_payload(json!({
            "knowledge_type": "FACT",
            "topic": "t",
            "content": {}
        }))
        .unwrap();
        assert_eq!(request.topic, "t");
    }
}

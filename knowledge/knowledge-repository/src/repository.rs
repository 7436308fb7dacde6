//! The knowledge repository facade.

use crate::cache::{KnowledgeCache, LruKnowledgeCache};
use crate::events::{
    self, names, DeletePayload, EventBus, EventEnvelope, QueryMode, QueryRequest, UpdatePayload,
};
use crate::store::KnowledgeStore;
use crate::subscription::{
    KnowledgeHandler, SubscriptionId, SubscriptionInfo, SubscriptionRegistry,
};
use crate::validator::{KnowledgeValidator, SchemaValidator};
use chrono::{DateTime, Utc};
use knowledge_core::{
    KnowledgeError, KnowledgeId, KnowledgeItem, KnowledgeStatus, KnowledgeType, PublishRequest,
    QueryResult, RepositoryConfig, Result, SubscriptionFilter, UpdateRequest,
};
use knowledge_semantic::{
    content_excerpt, EmbeddingProvider, HashEmbedder, InMemoryVectorStorage, SemanticError,
    VectorMetadata, VectorStorage,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

enum Lifecycle {
    Added,
    Updated,
}

struct RepositoryInner {
    repository_id: String,
    config: RepositoryConfig,
    store: KnowledgeStore,
    vectors: Arc<dyn VectorStorage>,
    embedder: Arc<dyn EmbeddingProvider>,
    validator: Arc<dyn KnowledgeValidator>,
    cache: Arc<dyn KnowledgeCache>,
    subscriptions: SubscriptionRegistry,
    bus: Arc<EventBus>,
    write_lock: tokio::sync::Mutex<()>,
    listeners: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

/// The knowledge repository: versioned, typed knowledge items with
/// secondary indices, vector search, a bounded item cache, and filtered
/// change notifications.
///
/// All mutating operations serialize on a single write lock that covers
/// the store, its indices, the version chain, vector storage, and cache
/// membership. Reads never take the write lock. `start` attaches the
/// repository to the event bus; `stop` detaches it and drains pending
/// subscriber dispatches.
///
/// The type is a cheap handle: clones share one repository.
#[derive(Clone)]
pub struct KnowledgeRepository {
    inner: Arc<RepositoryInner>,
}

impl KnowledgeRepository {
    /// Create a repository with the reference components: hash embedder,
    /// in-memory vector storage, schema validator, LRU cache.
    pub fn new(
        repository_id: impl Into<String>,
        config: RepositoryConfig,
        bus: Arc<EventBus>,
    ) -> Self {
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(HashEmbedder::new(config.embedding.dimension));
        let vectors: Arc<dyn VectorStorage> =
            Arc::new(InMemoryVectorStorage::new(embedder.dimension()));
        let validator: Arc<dyn KnowledgeValidator> = Arc::new(SchemaValidator::new());
        let cache: Arc<dyn KnowledgeCache> = Arc::new(LruKnowledgeCache::new(config.cache.max_size));

        Self::with_components(repository_id, config, bus, embedder, vectors, validator, cache)
    }

    /// Create a repository from custom component implementations.
    pub fn with_components(
        repository_id: impl Into<String>,
        config: RepositoryConfig,
        bus: Arc<EventBus>,
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStorage>,
        validator: Arc<dyn KnowledgeValidator>,
        cache: Arc<dyn KnowledgeCache>,
    ) -> Self {
        Self {
            inner: Arc::new(RepositoryInner {
                repository_id: repository_id.into(),
                subscriptions: SubscriptionRegistry::new(config.dispatch.queue_capacity),
                config,
                store: KnowledgeStore::new(),
                vectors,
                embedder,
                validator,
                cache,
                bus,
                write_lock: tokio::sync::Mutex::new(()),
                listeners: parking_lot::Mutex::new(Vec::new()),
            }),
        }
    }

    /// The event bus this repository is attached to.
    pub fn event_bus(&self) -> Arc<EventBus> {
        self.inner.bus.clone()
    }

    /// Start consuming knowledge request events from the bus.
    pub fn start(&self) {
        let mut listeners = self.inner.listeners.lock();
        if !listeners.is_empty() {
            return;
        }

        for name in [
            names::KNOWLEDGE_QUERY,
            names::KNOWLEDGE_PUBLISH,
            names::KNOWLEDGE_UPDATE,
            names::KNOWLEDGE_DELETE,
        ] {
            listeners.push(self.spawn_listener(name));
        }

        info!(repository_id = %self.inner.repository_id, "Knowledge repository started");
    }

    /// Detach from the bus and drain pending subscriber dispatches.
    pub async fn stop(&self) {
        let listeners: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.listeners.lock());
        for listener in listeners {
            listener.abort();
        }

        self.inner.subscriptions.shutdown().await;

        info!(repository_id = %self.inner.repository_id, "Knowledge repository stopped");
    }

    // ------------------------------------------------------------------
    // Publish / update / delete
    // ------------------------------------------------------------------

    /// Publish a new knowledge item. Returns its ID.
    pub async fn publish(&self, request: PublishRequest) -> Result<KnowledgeId> {
        self.add_item(request.into_item(), Lifecycle::Added).await
    }

    /// Publish a pre-built item, e.g. one carrying a producer-supplied
    /// vector.
    pub async fn publish_item(&self, item: KnowledgeItem) -> Result<KnowledgeId> {
        self.add_item(item, Lifecycle::Added).await
    }

    /// Publish a batch as independent operations: one result per request,
    /// in request order. A failed entry never affects its neighbours.
    pub async fn publish_batch(
        &self,
        requests: Vec<PublishRequest>,
    ) -> Vec<Result<KnowledgeId>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let result = self.publish(request).await;
            if let Err(e) = &result {
                warn!("Failed to publish batch entry: {e}");
            }
            results.push(result);
        }
        results
    }

    /// Supersede an item with a new version. Returns the new item's ID.
    pub async fn update(&self, id: &KnowledgeId, changes: UpdateRequest) -> Result<KnowledgeId> {
        let current = self
            .get(id)
            .await
            .ok_or_else(|| KnowledgeError::not_found(id))?;
        self.add_item(current.next_version(changes), Lifecycle::Updated)
            .await
    }

    /// Delete an item, cascading to vector storage, indices, and cache.
    /// Returns false when the ID is unknown.
    pub async fn delete(&self, id: &KnowledgeId) -> Result<bool> {
        let _write = self.inner.write_lock.lock().await;

        let Some(item) = self.inner.store.remove(id) else {
            return Ok(false);
        };

        if !self.inner.vectors.delete_vector(id).await {
            warn!(%id, "No stored vector for deleted knowledge item");
        }
        if let Err(e) = self.inner.cache.remove(id).await {
            warn!(%id, "Failed to evict deleted item from cache: {e}");
        }

        self.inner.bus.publish(EventEnvelope::new(
            names::KNOWLEDGE_DELETED,
            &self.inner.repository_id,
            json!({
                "knowledge_id": item.knowledge_id,
                "knowledge_type": item.knowledge_type,
                "topic": item.topic,
                "source_id": item.source_id,
            }),
        ));

        info!(%id, topic = %item.topic, "Deleted knowledge item");
        Ok(true)
    }

    async fn add_item(&self, mut item: KnowledgeItem, lifecycle: Lifecycle) -> Result<KnowledgeId> {
        let id = item.knowledge_id;

        if item.topic.is_empty() {
            return Err(KnowledgeError::validation_field(
                "topic",
                "topic must not be empty",
            ));
        }

        self.inner.validator.validate(&item).await?;

        let vector = match item.vector.clone() {
            Some(vector) => vector,
            None => {
                let vector = self.inner.embedder.embed(&item.content).await.map_err(|e| {
                    KnowledgeError::embedding(format!(
                        "{e} (content: {})",
                        content_excerpt(&item.content, 100)
                    ))
                })?;
                item.vector = Some(vector.clone());
                vector
            }
        };

        let _write = self.inner.write_lock.lock().await;

        if self.inner.store.contains(&id) {
            return Err(KnowledgeError::already_exists(id));
        }
        if let Lifecycle::Updated = lifecycle {
            // The predecessor must still exist at commit time; it may
            // have been deleted since the caller read it
            if let Some(parent) = item.previous_version_id {
                if !self.inner.store.contains(&parent) {
                    return Err(KnowledgeError::not_found(parent));
                }
            }
        }

        self.inner
            .vectors
            .add_vector(id, vector, Self::vector_metadata(&item))
            .await
            .map_err(Self::vector_error)?;

        self.inner.store.insert(item.clone());

        if let Err(e) = self.inner.cache.add(item.clone()).await {
            warn!(%id, "Failed to cache knowledge item: {e}");
        }

        // Enqueued under the write lock so every subscriber sees commit
        // order; the queues never block this caller
        self.inner.subscriptions.notify(&item);
        self.emit_lifecycle(&item, lifecycle);

        info!(%id, topic = %item.topic, version = item.version, "Committed knowledge item");
        Ok(id)
    }

    fn vector_metadata(item: &KnowledgeItem) -> VectorMetadata {
        VectorMetadata {
            topic: item.topic.clone(),
            knowledge_type: item.knowledge_type.to_string(),
            source_id: item.source_id.clone(),
            tags: item.tags.iter().cloned().collect(),
        }
    }

    fn vector_error(error: SemanticError) -> KnowledgeError {
        match error {
            SemanticError::AlreadyExists(id) => KnowledgeError::already_exists(id),
            SemanticError::NotFound(id) => KnowledgeError::not_found(id),
            other => KnowledgeError::vector_store(other.to_string()),
        }
    }

    fn emit_lifecycle(&self, item: &KnowledgeItem, lifecycle: Lifecycle) {
        let event = match lifecycle {
            Lifecycle::Added => EventEnvelope::new(
                names::KNOWLEDGE_ADDED,
                &self.inner.repository_id,
                json!({
                    "knowledge_id": item.knowledge_id,
                    "knowledge_type": item.knowledge_type,
                    "topic": item.topic,
                    "source_id": item.source_id,
                    "created_at": item.created_at,
                }),
            ),
            Lifecycle::Updated => EventEnvelope::new(
                names::KNOWLEDGE_UPDATED,
                &self.inner.repository_id,
                json!({
                    "knowledge_id": item.knowledge_id,
                    "previous_version_id": item.previous_version_id,
                    "knowledge_type": item.knowledge_type,
                    "topic": item.topic,
                    "source_id": item.source_id,
                    "updated_at": item.updated_at,
                    "version": item.version,
                }),
            ),
        };
        self.inner.bus.publish(event);
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Get an item by ID, warming the cache on a store hit.
    pub async fn get(&self, id: &KnowledgeId) -> Option<KnowledgeItem> {
        match self.inner.cache.get(id).await {
            Ok(Some(item)) => return Some(item),
            Ok(None) => {}
            Err(e) => warn!(%id, "Cache lookup failed: {e}"),
        }

        let item = self.inner.store.get(id)?;

        if let Err(e) = self.inner.cache.add(item.clone()).await {
            warn!(%id, "Failed to cache knowledge item: {e}");
        }
        // The item may have been deleted while we warmed the cache; keep
        // cache contents a subset of the store
        if !self.inner.store.contains(id) {
            let _ = self.inner.cache.remove(id).await;
            return None;
        }

        Some(item)
    }

    pub async fn by_topic(&self, topic: &str) -> Vec<KnowledgeItem> {
        match self.inner.cache.get_by_topic(topic).await {
            Ok(items) if !items.is_empty() => return items,
            Ok(_) => {}
            Err(e) => warn!(topic, "Cache lookup failed: {e}"),
        }
        self.inner.store.by_topic(topic)
    }

    pub async fn by_type(&self, knowledge_type: KnowledgeType) -> Vec<KnowledgeItem> {
        match self.inner.cache.get_by_type(knowledge_type).await {
            Ok(items) if !items.is_empty() => return items,
            Ok(_) => {}
            Err(e) => warn!("Cache lookup failed: {e}"),
        }
        self.inner.store.by_type(knowledge_type)
    }

    /// The cache keeps no source view, so this always reads the store.
    pub async fn by_source(&self, source_id: &str) -> Vec<KnowledgeItem> {
        self.inner.store.by_source(source_id)
    }

    pub async fn by_tag(&self, tag: &str) -> Vec<KnowledgeItem> {
        match self.inner.cache.get_by_tag(tag).await {
            Ok(items) if !items.is_empty() => return items,
            Ok(_) => {}
            Err(e) => warn!(tag, "Cache lookup failed: {e}"),
        }
        self.inner.store.by_tag(tag)
    }

    pub async fn by_status(&self, status: KnowledgeStatus) -> Vec<KnowledgeItem> {
        match self.inner.cache.get_by_status(status).await {
            Ok(items) if !items.is_empty() => return items,
            Ok(_) => {}
            Err(e) => warn!("Cache lookup failed: {e}"),
        }
        self.inner.store.by_status(status)
    }

    /// Every item in the repository. Order is unspecified.
    pub async fn all(&self) -> Vec<KnowledgeItem> {
        self.inner.store.all()
    }

    /// Number of items in the repository.
    pub async fn count(&self) -> usize {
        self.inner.store.len()
    }

    // ------------------------------------------------------------------
    // Search & retrieval
    // ------------------------------------------------------------------

    /// Vector search: embed the query, take the top-k by cosine
    /// similarity, join with the store. Results whose item vanished
    /// between search and join are dropped.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<QueryResult>> {
        let query_vector = self
            .inner
            .embedder
            .embed(&json!(query))
            .await
            .map_err(|e| KnowledgeError::embedding(format!("{e} (query: {query})")))?;

        let hits = self
            .inner
            .vectors
            .search_by_vector(&query_vector, limit)
            .await
            .map_err(Self::vector_error)?;

        debug!(query, hits = hits.len(), "Vector search completed");
        Ok(self.join_hits(hits))
    }

    /// Items most similar to a stored item, excluding the item itself.
    pub async fn similar_to(&self, id: &KnowledgeId, limit: usize) -> Result<Vec<QueryResult>> {
        if self.get(id).await.is_none() {
            return Err(KnowledgeError::not_found(id));
        }

        let hits = self
            .inner
            .vectors
            .search_by_id(id, limit)
            .await
            .map_err(Self::vector_error)?;

        Ok(self.join_hits(hits))
    }

    /// Linear scan of the store for items matching a filter.
    pub async fn filter(
        &self,
        filter: &SubscriptionFilter,
        limit: Option<usize>,
    ) -> Vec<KnowledgeItem> {
        let mut items: Vec<KnowledgeItem> = self
            .inner
            .store
            .all()
            .into_iter()
            .filter(|item| filter.matches(item))
            .collect();
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        items
    }

    /// Vector search with an oversampled candidate set, filtered and
    /// truncated to `limit`.
    pub async fn search_and_filter(
        &self,
        query: &str,
        filter: &SubscriptionFilter,
        limit: usize,
    ) -> Result<Vec<QueryResult>> {
        let oversample =
            limit.saturating_mul(self.inner.config.search.filter_oversample.max(1));
        let mut results = self.search(query, oversample).await?;
        results.retain(|result| filter.matches(&result.item));
        results.truncate(limit);
        Ok(results)
    }

    /// Every version linked to an item: predecessors via
    /// `previous_version_id`, successors via the successor map, sorted by
    /// version ascending.
    pub async fn version_history(&self, id: &KnowledgeId) -> Result<Vec<KnowledgeItem>> {
        let origin = self
            .get(id)
            .await
            .ok_or_else(|| KnowledgeError::not_found(id))?;

        let mut seen: HashSet<KnowledgeId> = HashSet::from([origin.knowledge_id]);
        let mut history = vec![origin.clone()];

        // Walk backwards; a deleted predecessor ends the walk
        let mut current = origin;
        while let Some(parent_id) = current.previous_version_id {
            if !seen.insert(parent_id) {
                break;
            }
            match self.get(&parent_id).await {
                Some(parent) => {
                    history.push(parent.clone());
                    current = parent;
                }
                None => break,
            }
        }

        // Walk forwards over the successor map
        let mut frontier = vec![*id];
        while let Some(node) = frontier.pop() {
            for child_id in self.inner.store.successors_of(&node) {
                if seen.insert(child_id) {
                    if let Some(child) = self.get(&child_id).await {
                        history.push(child);
                        frontier.push(child_id);
                    }
                }
            }
        }

        history.sort_by_key(|item| item.version);
        Ok(history)
    }

    /// Items updated strictly after the given instant.
    pub async fn updates_since(&self, since: DateTime<Utc>) -> Vec<KnowledgeItem> {
        self.inner.store.updated_since(since)
    }

    /// High-priority items updated since the given instant.
    ///
    /// Priority in [0, 1]: RULE +0.3 / PROCEDURE +0.2, ACTIVE +0.2 /
    /// DEPRECATED +0.1, `priority` metadata added directly (numbers,
    /// numeric strings, and booleans all coerce), and truthy `critical`
    /// metadata +0.3, clipped to 1. With no threshold the configured
    /// default applies.
    pub async fn critical_updates_since(
        &self,
        since: DateTime<Utc>,
        priority_threshold: Option<f64>,
    ) -> Vec<KnowledgeItem> {
        let threshold =
            priority_threshold.unwrap_or(self.inner.config.search.critical_threshold);
        self.inner
            .store
            .updated_since(since)
            .into_iter()
            .filter(|item| Self::priority_of(item) >= threshold)
            .collect()
    }

    fn priority_of(item: &KnowledgeItem) -> f64 {
        let mut priority = 0.0;

        match item.knowledge_type {
            KnowledgeType::Rule => priority += 0.3,
            KnowledgeType::Procedure => priority += 0.2,
            _ => {}
        }

        match item.status {
            KnowledgeStatus::Active => priority += 0.2,
            KnowledgeStatus::Deprecated => priority += 0.1,
            _ => {}
        }

        if let Some(value) = item.metadata.get("priority") {
            if let Some(number) = numeric(value) {
                priority += number;
            }
        }
        if let Some(value) = item.metadata.get("critical") {
            if truthy(value) {
                priority += 0.3;
            }
        }

        priority.min(1.0)
    }

    fn join_hits(&self, hits: Vec<(KnowledgeId, f32)>) -> Vec<QueryResult> {
        hits.into_iter()
            .filter_map(|(id, score)| {
                self.inner
                    .store
                    .get(&id)
                    .map(|item| QueryResult { item, score })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Register a change handler; `None` matches every item. Never blocks
    /// publishers.
    pub fn subscribe(
        &self,
        filter: Option<SubscriptionFilter>,
        handler: KnowledgeHandler,
    ) -> SubscriptionId {
        self.inner.subscriptions.subscribe(filter, handler)
    }

    /// Remove a subscription. Idempotent; unknown IDs return false.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscriptions.unsubscribe(id)
    }

    /// Summaries of the live subscriptions.
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.inner.subscriptions.subscriptions()
    }

    /// Notifications lost to queue overflow for one subscription.
    pub fn dropped_notifications(&self, id: SubscriptionId) -> Option<u64> {
        self.inner.subscriptions.dropped(id)
    }

    // ------------------------------------------------------------------
    // Event-bus bridge
    // ------------------------------------------------------------------

    fn spawn_listener(&self, name: &'static str) -> JoinHandle<()> {
        let repository = self.clone();
        let mut receiver = self.inner.bus.subscribe(name);

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => repository.handle_event(name, event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(event = name, skipped, "Event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn handle_event(&self, name: &str, event: EventEnvelope) {
        match name {
            names::KNOWLEDGE_QUERY => self.handle_query(event).await,
            names::KNOWLEDGE_PUBLISH => self.handle_publish(event).await,
            names::KNOWLEDGE_UPDATE => self.handle_update(event).await,
            names::KNOWLEDGE_DELETE => self.handle_delete(event).await,
            other => debug!(event = other, "Ignoring unexpected event"),
        }
    }

    async fn handle_query(&self, event: EventEnvelope) {
        let correlation_id = event.correlation_id;

        let data = match events::parse_payload::<QueryRequest>(event.data) {
            Ok(request) => {
                let limit = request
                    .limit
                    .unwrap_or(self.inner.config.search.default_limit);
                match self.run_query(&request, limit).await {
                    Ok(items) => {
                        let result_count = items.len();
                        json!({
                            "query": request.query,
                            "query_type": request.query_type,
                            "results": items,
                            "result_count": result_count,
                        })
                    }
                    Err(e) => json!({
                        "query": request.query,
                        "query_type": request.query_type,
                        "success": false,
                        "error": e.to_string(),
                    }),
                }
            }
            Err(e) => json!({"success": false, "error": e.to_string()}),
        };

        self.respond(names::KNOWLEDGE_QUERY_RESPONSE, correlation_id, data);
    }

    async fn run_query(&self, request: &QueryRequest, limit: usize) -> Result<Vec<KnowledgeItem>> {
        match request.query_type {
            QueryMode::Text => Ok(self
                .search(&request.query, limit)
                .await?
                .into_iter()
                .map(|result| result.item)
                .collect()),
            QueryMode::Topic => {
                let mut items = self.by_topic(&request.query).await;
                items.truncate(limit);
                Ok(items)
            }
            QueryMode::Tag => {
                let mut items = self.by_tag(&request.query).await;
                items.truncate(limit);
                Ok(items)
            }
            QueryMode::Id => {
                let mut items = Vec::new();
                if let Ok(id) = KnowledgeId::parse(&request.query) {
                    if let Some(item) = self.get(&id).await {
                        items.push(item);
                    }
                }
                Ok(items)
            }
        }
    }

    async fn handle_publish(&self, event: EventEnvelope) {
        let correlation_id = event.correlation_id;

        let data = match events::parse_payload::<PublishRequest>(event.data) {
            Ok(request) => match self.publish(request).await {
                Ok(id) => json!({"knowledge_id": id, "success": true}),
                Err(e) => json!({"success": false, "error": e.to_string()}),
            },
            Err(e) => json!({"success": false, "error": e.to_string()}),
        };

        self.respond(names::KNOWLEDGE_PUBLISH_RESPONSE, correlation_id, data);
    }

    async fn handle_update(&self, event: EventEnvelope) {
        let correlation_id = event.correlation_id;

        let data = match events::parse_payload::<UpdatePayload>(event.data) {
            Ok(payload) => match KnowledgeId::parse(&payload.knowledge_id) {
                Ok(id) => match self.update(&id, payload.changes).await {
                    Ok(updated_id) => json!({
                        "knowledge_id": payload.knowledge_id,
                        "updated_id": updated_id,
                        "success": true,
                    }),
                    Err(e) => json!({
                        "knowledge_id": payload.knowledge_id,
                        "success": false,
                        "error": e.to_string(),
                    }),
                },
                Err(e) => json!({
                    "knowledge_id": payload.knowledge_id,
                    "success": false,
                    "error": format!("invalid knowledge_id: {e}"),
                }),
            },
            Err(e) => json!({"success": false, "error": e.to_string()}),
        };

        self.respond(names::KNOWLEDGE_UPDATE_RESPONSE, correlation_id, data);
    }

    async fn handle_delete(&self, event: EventEnvelope) {
        let correlation_id = event.correlation_id;

        let data = match events::parse_payload::<DeletePayload>(event.data) {
            Ok(payload) => match KnowledgeId::parse(&payload.knowledge_id) {
                Ok(id) => match self.delete(&id).await {
                    Ok(deleted) => json!({
                        "knowledge_id": payload.knowledge_id,
                        "success": deleted,
                    }),
                    Err(e) => json!({
                        "knowledge_id": payload.knowledge_id,
                        "success": false,
                        "error": e.to_string(),
                    }),
                },
                Err(e) => json!({
                    "knowledge_id": payload.knowledge_id,
                    "success": false,
                    "error": format!("invalid knowledge_id: {e}"),
                }),
            },
            Err(e) => json!({"success": false, "error": e.to_string()}),
        };

        self.respond(names::KNOWLEDGE_DELETE_RESPONSE, correlation_id, data);
    }

    fn respond(&self, name: &str, correlation_id: Option<String>, data: serde_json::Value) {
        self.inner.bus.publish(
            EventEnvelope::new(name, &self.inner.repository_id, data)
                .with_correlation(correlation_id),
        );
    }
}

fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

/// Loose numeric coercion for metadata values: numbers pass through,
/// numeric strings parse, booleans count as 1/0. Anything else is not a
/// number.
fn numeric(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!("yes")));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!([])));
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(numeric(&json!(0.4)), Some(0.4));
        assert_eq!(numeric(&json!("0.9")), Some(0.9));
        assert_eq!(numeric(&json!(" 2 ")), Some(2.0));
        assert_eq!(numeric(&json!(true)), Some(1.0));
        assert_eq!(numeric(&json!(false)), Some(0.0));
        assert_eq!(numeric(&json!("not-a-number")), None);
        assert_eq!(numeric(&json!(null)), None);
        assert_eq!(numeric(&json!([1])), None);
    }

    #[test]
    fn test_priority_rule() {
        let mut item = KnowledgeItem::create(KnowledgeType::Rule, "t", json!({"v": 1}));
        item.status = KnowledgeStatus::Active;
        // RULE 0.3 + ACTIVE 0.2
        assert!((KnowledgeRepository::priority_of(&item) - 0.5).abs() < 1e-9);

        item.metadata.insert("critical".to_string(), json!(true));
        assert!((KnowledgeRepository::priority_of(&item) - 0.8).abs() < 1e-9);

        item.metadata.insert("priority".to_string(), json!(0.9));
        // Clipped to 1.0
        assert!((KnowledgeRepository::priority_of(&item) - 1.0).abs() < 1e-9);

        let plain = KnowledgeItem::create(KnowledgeType::Fact, "t", json!({"v": 1}));
        assert!(KnowledgeRepository::priority_of(&plain) < 0.5);
    }
}

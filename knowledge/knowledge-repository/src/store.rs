//! Primary knowledge store with secondary indices and the version chain.

use chrono::{DateTime, Utc};
use knowledge_core::{KnowledgeId, KnowledgeItem, KnowledgeStatus, KnowledgeType};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Default)]
struct StoreInner {
    items: HashMap<KnowledgeId, KnowledgeItem>,
    by_topic: HashMap<String, HashSet<KnowledgeId>>,
    by_type: HashMap<KnowledgeType, HashSet<KnowledgeId>>,
    by_source: HashMap<String, HashSet<KnowledgeId>>,
    by_tag: HashMap<String, HashSet<KnowledgeId>>,
    by_status: HashMap<KnowledgeStatus, HashSet<KnowledgeId>>,
    /// parent id -> direct successor ids (the forward half of the version
    /// chain; the backward half lives in each item's previous_version_id)
    successors: HashMap<KnowledgeId, Vec<KnowledgeId>>,
}

/// Authoritative mapping from ID to knowledge item.
///
/// The store owns the five inverted indices and the version-chain
/// successor map; every mutation keeps them in step with the primary map
/// under one write lock. Index keys with no remaining members are removed
/// so the maps do not grow without bound.
pub struct KnowledgeStore {
    inner: RwLock<StoreInner>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Insert an item, index it, and link it into the version chain.
    ///
    /// The caller is responsible for duplicate checks; inserting an
    /// existing ID would desynchronize the indices.
    pub fn insert(&self, item: KnowledgeItem) {
        let mut inner = self.inner.write();
        let id = item.knowledge_id;

        inner
            .by_topic
            .entry(item.topic.clone())
            .or_default()
            .insert(id);
        inner
            .by_type
            .entry(item.knowledge_type)
            .or_default()
            .insert(id);
        if let Some(source_id) = &item.source_id {
            inner
                .by_source
                .entry(source_id.clone())
                .or_default()
                .insert(id);
        }
        for tag in &item.tags {
            inner.by_tag.entry(tag.clone()).or_default().insert(id);
        }
        inner.by_status.entry(item.status).or_default().insert(id);

        if let Some(parent) = item.previous_version_id {
            inner.successors.entry(parent).or_default().push(id);
        }

        inner.items.insert(id, item);
        debug!(%id, "Inserted knowledge item");
    }

    /// Remove an item, unindex it, and unlink it from the version chain.
    ///
    /// Neighbouring versions are left in place; only the removed item's
    /// own chain entries go away.
    pub fn remove(&self, id: &KnowledgeId) -> Option<KnowledgeItem> {
        let mut inner = self.inner.write();
        let item = inner.items.remove(id)?;

        if let Some(ids) = inner.by_topic.get_mut(&item.topic) {
            ids.remove(id);
            if ids.is_empty() {
                inner.by_topic.remove(&item.topic);
            }
        }
        if let Some(ids) = inner.by_type.get_mut(&item.knowledge_type) {
            ids.remove(id);
            if ids.is_empty() {
                inner.by_type.remove(&item.knowledge_type);
            }
        }
        if let Some(source_id) = &item.source_id {
            if let Some(ids) = inner.by_source.get_mut(source_id) {
                ids.remove(id);
                if ids.is_empty() {
                    inner.by_source.remove(source_id);
                }
            }
        }
        for tag in &item.tags {
            if let Some(ids) = inner.by_tag.get_mut(tag) {
                ids.remove(id);
                if ids.is_empty() {
                    inner.by_tag.remove(tag);
                }
            }
        }
        if let Some(ids) = inner.by_status.get_mut(&item.status) {
            ids.remove(id);
            if ids.is_empty() {
                inner.by_status.remove(&item.status);
            }
        }

        inner.successors.remove(id);
        if let Some(parent) = item.previous_version_id {
            if let Some(children) = inner.successors.get_mut(&parent) {
                children.retain(|child| child != id);
                if children.is_empty() {
                    inner.successors.remove(&parent);
                }
            }
        }

        debug!(%id, "Removed knowledge item");
        Some(item)
    }

    pub fn get(&self, id: &KnowledgeId) -> Option<KnowledgeItem> {
        self.inner.read().items.get(id).cloned()
    }

    pub fn contains(&self, id: &KnowledgeId) -> bool {
        self.inner.read().items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }

    pub fn all(&self) -> Vec<KnowledgeItem> {
        self.inner.read().items.values().cloned().collect()
    }

    pub fn by_topic(&self, topic: &str) -> Vec<KnowledgeItem> {
        let inner = self.inner.read();
        Self::resolve(&inner, inner.by_topic.get(topic))
    }

    pub fn by_type(&self, knowledge_type: KnowledgeType) -> Vec<KnowledgeItem> {
        let inner = self.inner.read();
        Self::resolve(&inner, inner.by_type.get(&knowledge_type))
    }

    pub fn by_source(&self, source_id: &str) -> Vec<KnowledgeItem> {
        let inner = self.inner.read();
        Self::resolve(&inner, inner.by_source.get(source_id))
    }

    pub fn by_tag(&self, tag: &str) -> Vec<KnowledgeItem> {
        let inner = self.inner.read();
        Self::resolve(&inner, inner.by_tag.get(tag))
    }

    pub fn by_status(&self, status: KnowledgeStatus) -> Vec<KnowledgeItem> {
        let inner = self.inner.read();
        Self::resolve(&inner, inner.by_status.get(&status))
    }

    /// Items whose `updated_at` is strictly after the given instant
    pub fn updated_since(&self, since: DateTime<Utc>) -> Vec<KnowledgeItem> {
        self.inner
            .read()
            .items
            .values()
            .filter(|item| item.updated_at > since)
            .cloned()
            .collect()
    }

    /// Direct successors of an item in the version chain
    pub fn successors_of(&self, id: &KnowledgeId) -> Vec<KnowledgeId> {
        self.inner
            .read()
            .successors
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    fn resolve(inner: &StoreInner, ids: Option<&HashSet<KnowledgeId>>) -> Vec<KnowledgeItem> {
        ids.map(|ids| {
            ids.iter()
                .filter_map(|id| inner.items.get(id).cloned())
                .collect()
        })
        .unwrap_or_default()
    }
}

impl Default for KnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

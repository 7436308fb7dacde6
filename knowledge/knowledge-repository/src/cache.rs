//! Bounded LRU cache over knowledge items.

use async_trait::async_trait;
use knowledge_core::{KnowledgeError, KnowledgeId, KnowledgeItem, KnowledgeStatus, KnowledgeType, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Trait for knowledge item caches.
///
/// The cache is strictly a read accelerator: contents are always a subset
/// of the store, a miss falls through to the store, and a store-level
/// delete must evict the cached copy. Cache failures are non-fatal to the
/// calling operation.
#[async_trait]
pub trait KnowledgeCache: Send + Sync {
    /// Insert an item, promoting it to most recently used.
    async fn add(&self, item: KnowledgeItem) -> Result<()>;

    /// Look up an item, promoting it on a hit.
    async fn get(&self, id: &KnowledgeId) -> Result<Option<KnowledgeItem>>;

    /// Drop an item. Returns false when it was not cached.
    async fn remove(&self, id: &KnowledgeId) -> Result<bool>;

    /// Drop every cached item.
    async fn clear(&self) -> Result<()>;

    /// Cached items with the given topic.
    async fn get_by_topic(&self, topic: &str) -> Result<Vec<KnowledgeItem>>;

    /// Cached items of the given type.
    async fn get_by_type(&self, knowledge_type: KnowledgeType) -> Result<Vec<KnowledgeItem>>;

    /// Cached items carrying the given tag.
    async fn get_by_tag(&self, tag: &str) -> Result<Vec<KnowledgeItem>>;

    /// Cached items in the given status.
    async fn get_by_status(&self, status: KnowledgeStatus) -> Result<Vec<KnowledgeItem>>;

    /// Every cached item.
    async fn get_all(&self) -> Result<Vec<KnowledgeItem>>;

    /// Number of cached items.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Current capacity.
    async fn max_size(&self) -> usize;

    /// Change the capacity, evicting LRU items if the cache shrank.
    async fn set_max_size(&self, max_size: usize) -> Result<()>;
}

struct CacheSlot {
    item: KnowledgeItem,
    /// Monotonic access tick; the minimum across slots is the LRU victim
    tick: u64,
}

struct CacheInner {
    entries: HashMap<KnowledgeId, CacheSlot>,
    topic_index: HashMap<String, HashSet<KnowledgeId>>,
    type_index: HashMap<KnowledgeType, HashSet<KnowledgeId>>,
    tag_index: HashMap<String, HashSet<KnowledgeId>>,
    status_index: HashMap<KnowledgeStatus, HashSet<KnowledgeId>>,
    max_size: usize,
    next_tick: u64,
}

impl CacheInner {
    fn touch(&mut self, id: &KnowledgeId) -> Option<KnowledgeItem> {
        let tick = self.next_tick;
        let slot = self.entries.get_mut(id)?;
        slot.tick = tick;
        self.next_tick += 1;
        Some(slot.item.clone())
    }

    fn insert(&mut self, item: KnowledgeItem) {
        let id = item.knowledge_id;

        self.topic_index
            .entry(item.topic.clone())
            .or_default()
            .insert(id);
        self.type_index
            .entry(item.knowledge_type)
            .or_default()
            .insert(id);
        for tag in &item.tags {
            self.tag_index.entry(tag.clone()).or_default().insert(id);
        }
        self.status_index.entry(item.status).or_default().insert(id);

        let tick = self.next_tick;
        self.next_tick += 1;
        self.entries.insert(id, CacheSlot { item, tick });
    }

    fn remove(&mut self, id: &KnowledgeId) -> bool {
        let Some(slot) = self.entries.remove(id) else {
            return false;
        };
        let item = slot.item;

        if let Some(ids) = self.topic_index.get_mut(&item.topic) {
            ids.remove(id);
            if ids.is_empty() {
                self.topic_index.remove(&item.topic);
            }
        }
        if let Some(ids) = self.type_index.get_mut(&item.knowledge_type) {
            ids.remove(id);
            if ids.is_empty() {
                self.type_index.remove(&item.knowledge_type);
            }
        }
        for tag in &item.tags {
            if let Some(ids) = self.tag_index.get_mut(tag) {
                ids.remove(id);
                if ids.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
        if let Some(ids) = self.status_index.get_mut(&item.status) {
            ids.remove(id);
            if ids.is_empty() {
                self.status_index.remove(&item.status);
            }
        }

        true
    }

    fn evict_lru(&mut self) -> Option<KnowledgeId> {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, slot)| slot.tick)
            .map(|(id, _)| *id)?;
        self.remove(&victim);
        Some(victim)
    }
}

/// Least-recently-used knowledge cache with its own secondary views.
pub struct LruKnowledgeCache {
    inner: Mutex<CacheInner>,
}

impl LruKnowledgeCache {
    pub const DEFAULT_MAX_SIZE: usize = 1000;

    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                topic_index: HashMap::new(),
                type_index: HashMap::new(),
                tag_index: HashMap::new(),
                status_index: HashMap::new(),
                max_size,
                next_tick: 0,
            }),
        }
    }

    /// Collect and promote the cached items listed in one secondary view.
    fn collect(
        &self,
        ids_of: impl Fn(&CacheInner) -> Option<HashSet<KnowledgeId>>,
    ) -> Vec<KnowledgeItem> {
        let mut inner = self.inner.lock();
        let Some(ids) = ids_of(&inner) else {
            return Vec::new();
        };
        ids.iter().filter_map(|id| inner.touch(id)).collect()
    }
}

impl Default for LruKnowledgeCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_SIZE)
    }
}

#[async_trait]
impl KnowledgeCache for LruKnowledgeCache {
    async fn add(&self, item: KnowledgeItem) -> Result<()> {
        let mut inner = self.inner.lock();
        let id = item.knowledge_id;

        // Re-adding replaces the old copy and its index entries
        inner.remove(&id);

        while inner.entries.len() >= inner.max_size {
            if let Some(victim) = inner.evict_lru() {
                debug!(%victim, "Evicted LRU cache entry");
            } else {
                break;
            }
        }

        inner.insert(item);
        Ok(())
    }

    async fn get(&self, id: &KnowledgeId) -> Result<Option<KnowledgeItem>> {
        Ok(self.inner.lock().touch(id))
    }

    async fn remove(&self, id: &KnowledgeId) -> Result<bool> {
        Ok(self.inner.lock().remove(id))
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.topic_index.clear();
        inner.type_index.clear();
        inner.tag_index.clear();
        inner.status_index.clear();
        Ok(())
    }

    async fn get_by_topic(&self, topic: &str) -> Result<Vec<KnowledgeItem>> {
        Ok(self.collect(|inner| inner.topic_index.get(topic).cloned()))
    }

    async fn get_by_type(&self, knowledge_type: KnowledgeType) -> Result<Vec<KnowledgeItem>> {
        Ok(self.collect(|inner| inner.type_index.get(&knowledge_type).cloned()))
    }

    async fn get_by_tag(&self, tag: &str) -> Result<Vec<KnowledgeItem>> {
        Ok(self.collect(|inner| inner.tag_index.get(tag).cloned()))
    }

    async fn get_by_status(&self, status: KnowledgeStatus) -> Result<Vec<KnowledgeItem>> {
        Ok(self.collect(|inner| inner.status_index.get(&status).cloned()))
    }

    async fn get_all(&self) -> Result<Vec<KnowledgeItem>> {
        Ok(self
            .inner
            .lock()
            .entries
            .values()
            .map(|slot| slot.item.clone())
            .collect())
    }

    async fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    async fn max_size(&self) -> usize {
        self.inner.lock().max_size
    }

    async fn set_max_size(&self, max_size: usize) -> Result<()> {
        if max_size == 0 {
            return Err(KnowledgeError::bad_request(
                "cache capacity must be positive",
            ));
        }

        let mut inner = self.inner.lock();
        inner.max_size = max_size;
        while inner.entries.len() > inner.max_size {
            inner.evict_lru();
        }
        Ok(())
    }
}

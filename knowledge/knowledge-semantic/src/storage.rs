//! Vector storage with cosine-similarity search.

use crate::error::{Result, SemanticError};
use async_trait::async_trait;
use knowledge_core::KnowledgeId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Attribute row mirrored alongside each stored vector, so callers can
/// filter during search without touching the primary store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub topic: String,
    pub knowledge_type: String,
    pub source_id: Option<String>,
    pub tags: Vec<String>,
}

/// Trait for vector storage backends.
///
/// Vectors are unit-normalized on insert so that similarity is a single
/// dot product. `add_vector` refuses duplicates; upserts go through
/// `update_vector`.
#[async_trait]
pub trait VectorStorage: Send + Sync {
    /// Store a vector for a new item. Fails with `AlreadyExists` on
    /// duplicate IDs.
    async fn add_vector(
        &self,
        id: KnowledgeId,
        vector: Vec<f32>,
        metadata: VectorMetadata,
    ) -> Result<()>;

    /// Replace the vector (and optionally metadata) of an existing item.
    async fn update_vector(
        &self,
        id: &KnowledgeId,
        vector: Vec<f32>,
        metadata: Option<VectorMetadata>,
    ) -> Result<()>;

    /// Get the stored (normalized) vector for an item.
    async fn get_vector(&self, id: &KnowledgeId) -> Option<Vec<f32>>;

    /// Remove an item's vector. Returns false when the ID is unknown.
    async fn delete_vector(&self, id: &KnowledgeId) -> bool;

    /// Get the metadata row for an item.
    async fn get_metadata(&self, id: &KnowledgeId) -> Option<VectorMetadata>;

    /// Replace the metadata row for an existing item.
    async fn update_metadata(&self, id: &KnowledgeId, metadata: VectorMetadata) -> Result<()>;

    /// Top-k most similar items to a query vector, by descending cosine
    /// similarity. Ties break by insertion order.
    async fn search_by_vector(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(KnowledgeId, f32)>>;

    /// Top-k most similar items to a stored item, excluding the item
    /// itself.
    async fn search_by_id(&self, id: &KnowledgeId, limit: usize)
        -> Result<Vec<(KnowledgeId, f32)>>;

    /// All stored item IDs.
    async fn all_ids(&self) -> Vec<KnowledgeId>;

    /// Number of stored vectors.
    async fn count(&self) -> usize;

    /// Remove every stored vector.
    async fn clear(&self);
}

struct StorageInner {
    vectors: HashMap<KnowledgeId, Vec<f32>>,
    metadata: HashMap<KnowledgeId, VectorMetadata>,
    /// Insertion order; makes tie-breaking during search deterministic
    order: Vec<KnowledgeId>,
}

/// In-memory vector storage.
///
/// Search is a brute-force scan: one dot product per stored vector
/// against the pre-normalized query, O(N·D) per query. Intentionally the
/// reference design; an ANN index can replace it behind the same trait.
pub struct InMemoryVectorStorage {
    dimension: usize,
    inner: RwLock<StorageInner>,
}

impl InMemoryVectorStorage {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            inner: RwLock::new(StorageInner {
                vectors: HashMap::new(),
                metadata: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    fn validate(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(SemanticError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(SemanticError::Storage(
                "vector contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }

    /// L2-normalize; the zero vector is kept verbatim
    fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }
}

#[async_trait]
impl VectorStorage for InMemoryVectorStorage {
    async fn add_vector(
        &self,
        id: KnowledgeId,
        vector: Vec<f32>,
        metadata: VectorMetadata,
    ) -> Result<()> {
        self.validate(&vector)?;

        let mut inner = self.inner.write();
        if inner.vectors.contains_key(&id) {
            return Err(SemanticError::AlreadyExists(id.to_string()));
        }

        inner.vectors.insert(id, Self::normalize(vector));
        inner.metadata.insert(id, metadata);
        inner.order.push(id);

        debug!(%id, "Added vector");
        Ok(())
    }

    async fn update_vector(
        &self,
        id: &KnowledgeId,
        vector: Vec<f32>,
        metadata: Option<VectorMetadata>,
    ) -> Result<()> {
        self.validate(&vector)?;

        let mut inner = self.inner.write();
        if !inner.vectors.contains_key(id) {
            return Err(SemanticError::NotFound(id.to_string()));
        }

        inner.vectors.insert(*id, Self::normalize(vector));
        if let Some(metadata) = metadata {
            inner.metadata.insert(*id, metadata);
        }

        debug!(%id, "Updated vector");
        Ok(())
    }

    async fn get_vector(&self, id: &KnowledgeId) -> Option<Vec<f32>> {
        self.inner.read().vectors.get(id).cloned()
    }

    async fn delete_vector(&self, id: &KnowledgeId) -> bool {
        let mut inner = self.inner.write();
        if inner.vectors.remove(id).is_none() {
            return false;
        }
        inner.metadata.remove(id);
        inner.order.retain(|other| other != id);

        debug!(%id, "Deleted vector");
        true
    }

    async fn get_metadata(&self, id: &KnowledgeId) -> Option<VectorMetadata> {
        self.inner.read().metadata.get(id).cloned()
    }

    async fn update_metadata(&self, id: &KnowledgeId, metadata: VectorMetadata) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.vectors.contains_key(id) {
            return Err(SemanticError::NotFound(id.to_string()));
        }
        inner.metadata.insert(*id, metadata);
        Ok(())
    }

    async fn search_by_vector(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(KnowledgeId, f32)>> {
        self.validate(query)?;
        let query = Self::normalize(query.to_vec());

        let inner = self.inner.read();
        let mut scores: Vec<(KnowledgeId, f32)> = inner
            .order
            .iter()
            .map(|id| (*id, Self::dot(&query, &inner.vectors[id])))
            .collect();

        // Stable sort over the insertion-ordered scan keeps ties
        // deterministic
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scores.truncate(limit);

        Ok(scores)
    }

    async fn search_by_id(
        &self,
        id: &KnowledgeId,
        limit: usize,
    ) -> Result<Vec<(KnowledgeId, f32)>> {
        let vector = self
            .get_vector(id)
            .await
            .ok_or_else(|| SemanticError::NotFound(id.to_string()))?;

        let mut results = self.search_by_vector(&vector, limit + 1).await?;
        results.retain(|(other, _)| other != id);
        results.truncate(limit);
        Ok(results)
    }

    async fn all_ids(&self) -> Vec<KnowledgeId> {
        self.inner.read().order.clone()
    }

    async fn count(&self) -> usize {
        self.inner.read().vectors.len()
    }

    async fn clear(&self) {
        let mut inner = self.inner.write();
        inner.vectors.clear();
        inner.metadata.clear();
        inner.order.clear();
        debug!("Cleared vector storage");
    }
}

//! Semantic layer of the knowledge repository.
//!
//! This crate provides the two vector-facing capabilities the repository
//! composes:
//!
//! - **Embedding providers**: turn opaque knowledge content into
//!   fixed-dimension vectors. The reference [`HashEmbedder`] is a
//!   deterministic hash-plus-lexical-features provider; learned models
//!   plug in behind the same [`EmbeddingProvider`] trait.
//! - **Vector storage**: keyed storage of unit-normalized vectors with
//!   cosine top-k search and per-item metadata rows, behind the
//!   [`VectorStorage`] trait. [`InMemoryVectorStorage`] is the reference
//!   brute-force implementation.
//!
//! # Example
//!
//! ```
//! use knowledge_core::KnowledgeId;
//! use knowledge_semantic::{
//!     EmbeddingProvider, HashEmbedder, InMemoryVectorStorage, VectorMetadata, VectorStorage,
//! };
//!
//! # async fn example() -> knowledge_semantic::Result<()> {
//! let embedder = HashEmbedder::default();
//! let storage = InMemoryVectorStorage::new(embedder.dimension());
//!
//! let id = KnowledgeId::new();
//! let vector = embedder.embed(&serde_json::json!({"price": 50000})).await?;
//! storage.add_vector(id, vector.clone(), VectorMetadata::default()).await?;
//!
//! let hits = storage.search_by_vector(&vector, 5).await?;
//! assert_eq!(hits[0].0, id);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod providers;
pub mod storage;

pub use error::{Result, SemanticError};
pub use providers::{content_excerpt, EmbeddingProvider, HashEmbedder};
pub use storage::{InMemoryVectorStorage, VectorMetadata, VectorStorage};

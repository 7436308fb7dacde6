//! Knowledge repository for multi-agent systems.
//!
//! An in-process service that stores versioned, typed knowledge items
//! contributed by autonomous producers, indexes them by topic, type,
//! source, tag, and status, answers vector-similarity queries over their
//! content, and pushes filtered change notifications to subscribers.
//!
//! # Architecture
//!
//! The repository composes a small set of components, each replaceable
//! behind its trait:
//!
//! - [`KnowledgeStore`]: authoritative item map, five inverted indices,
//!   and the version chain
//! - [`VectorStorage`](knowledge_semantic::VectorStorage) + an
//!   [`EmbeddingProvider`](knowledge_semantic::EmbeddingProvider): cosine
//!   similarity search
//! - [`KnowledgeValidator`]: topic-pattern-keyed content schemas
//! - [`KnowledgeCache`]: bounded LRU read accelerator
//! - [`SubscriptionRegistry`]: per-subscriber filtered dispatch
//! - [`EventBus`]: the wire seam, consuming `knowledge_query` /
//!   `knowledge_publish` / `knowledge_update` / `knowledge_delete`
//!   requests and emitting correlated `*_response` events plus
//!   `knowledge_added` / `knowledge_updated` / `knowledge_deleted`
//!   lifecycle events
//!
//! # Example
//!
//! ```
//! use knowledge_core::{KnowledgeType, PublishRequest, RepositoryConfig};
//! use knowledge_repository::{EventBus, KnowledgeRepository};
//! use std::sync::Arc;
//!
//! # async fn example() -> knowledge_core::Result<()> {
//! let bus = Arc::new(EventBus::new());
//! let repository = KnowledgeRepository::new("repo-1", RepositoryConfig::default(), bus);
//! repository.start();
//!
//! let id = repository
//!     .publish(
//!         PublishRequest::new(
//!             KnowledgeType::Fact,
//!             "market/crypto/bitcoin",
//!             serde_json::json!({"price": 50000}),
//!         )
//!         .with_tags(["market", "crypto"]),
//!     )
//!     .await?;
//!
//! let results = repository.search("bitcoin price", 5).await?;
//! assert_eq!(results[0].item.knowledge_id, id);
//!
//! repository.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod events;
pub mod repository;
pub mod store;
pub mod subscription;
pub mod validator;

pub use cache::{KnowledgeCache, LruKnowledgeCache};
pub use events::{
    names, DeletePayload, EventBus, EventEnvelope, QueryMode, QueryRequest, UpdatePayload,
};
pub use repository::KnowledgeRepository;
pub use store::KnowledgeStore;
pub use subscription::{
    KnowledgeHandler, SubscriptionId, SubscriptionInfo, SubscriptionRegistry,
};
pub use validator::{ContentSchema, FieldType, KnowledgeValidator, SchemaValidator};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{KnowledgeCache, LruKnowledgeCache};
    pub use crate::events::{names, EventBus, EventEnvelope, QueryMode, QueryRequest};
    pub use crate::repository::KnowledgeRepository;
    pub use crate::subscription::{KnowledgeHandler, SubscriptionId, SubscriptionRegistry};
    pub use crate::validator::{ContentSchema, FieldType, SchemaValidator};
    pub use knowledge_core::{
        KnowledgeError, KnowledgeId, KnowledgeItem, KnowledgeStatus, KnowledgeType,
        PublishRequest, QueryResult, RepositoryConfig, SubscriptionFilter, UpdateRequest,
    };
    pub use knowledge_semantic::{EmbeddingProvider, HashEmbedder, VectorStorage};
}

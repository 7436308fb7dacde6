//! Core types for the knowledge repository.
//!
//! This crate defines the shared vocabulary of the knowledge system:
//!
//! - [`KnowledgeItem`] and its enums: the versioned record every other
//!   crate stores, indexes, and routes
//! - [`KnowledgeId`]: uuid-backed item identifier
//! - [`SubscriptionFilter`]: the predicate algebra used for notification
//!   routing and ad-hoc filtering
//! - [`KnowledgeError`]: the error categories surfaced by repository
//!   operations
//! - [`RepositoryConfig`]: configuration shared by the runtime crates

pub mod config;
pub mod error;
pub mod filter;
pub mod id;
pub mod types;

pub use config::{CacheConfig, DispatchConfig, EmbeddingConfig, RepositoryConfig, SearchConfig};
pub use error::{KnowledgeError, Result};
pub use filter::SubscriptionFilter;
pub use id::KnowledgeId;
pub use types::{
    KnowledgeItem, KnowledgeStatus, KnowledgeType, PublishRequest, QueryResult, UpdateRequest,
};

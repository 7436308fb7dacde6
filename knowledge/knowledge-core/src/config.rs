//! Configuration for the knowledge repository.

use serde::{Deserialize, Serialize};

/// Top-level repository configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub embedding: EmbeddingConfig,
    pub cache: CacheConfig,
    pub dispatch: DispatchConfig,
    pub search: SearchConfig,
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Vector dimension; fixed for the lifetime of the repository
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { dimension: 128 }
    }
}

/// Item cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached items before LRU eviction
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_size: 1000 }
    }
}

/// Subscriber dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Bounded per-subscriber queue; the oldest undelivered notification
    /// is dropped on overflow
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { queue_capacity: 64 }
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default result limit for searches
    pub default_limit: usize,

    /// Oversampling factor for search-then-filter queries
    pub filter_oversample: usize,

    /// Default priority threshold for critical-update queries
    pub critical_threshold: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            filter_oversample: 2,
            critical_threshold: 0.5,
        }
    }
}

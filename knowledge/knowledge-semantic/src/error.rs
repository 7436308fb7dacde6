//! Error types for embedding and vector storage.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SemanticError>;

#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector storage error: {0}")]
    Storage(String),

    #[error("Invalid dimension: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Vector not found: {0}")]
    NotFound(String),

    #[error("Vector already exists: {0}")]
    AlreadyExists(String),
}

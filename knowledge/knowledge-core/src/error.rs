//! Error types for the knowledge repository.

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, KnowledgeError>;

/// Main error type for the knowledge repository.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    /// The requested knowledge item is not in the store
    #[error("knowledge item not found: {id}")]
    NotFound { id: String },

    /// An item with this ID is already in the store
    #[error("knowledge item already exists: {id}")]
    AlreadyExists { id: String },

    /// The item's content violates the schema for its topic
    #[error("validation failed: {reason}")]
    ValidationFailed {
        field: Option<String>,
        reason: String,
    },

    /// The embedding provider could not produce a vector
    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    /// Vector storage rejected or lost a vector
    #[error("vector storage failed: {0}")]
    VectorStoreFailed(String),

    /// Cache errors are non-fatal; callers log and continue
    #[error("cache error: {0}")]
    CacheFailed(String),

    /// Malformed request payload (unknown enum name, missing field)
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Operation aborted by the caller
    #[error("operation cancelled")]
    Cancelled,

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Wrapped anyhow errors for compatibility
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KnowledgeError {
    /// Create a new not found error
    pub fn not_found(id: impl ToString) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    /// Create a new already exists error
    pub fn already_exists(id: impl ToString) -> Self {
        Self::AlreadyExists { id: id.to_string() }
    }

    /// Create a validation error for a specific field
    pub fn validation_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let field = field.into();
        let reason = reason.into();
        Self::ValidationFailed {
            reason: format!("{} (field: {})", reason, field),
            field: Some(field),
        }
    }

    /// Create a validation error without a field
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            field: None,
            reason: reason.into(),
        }
    }

    /// Create a new embedding error
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingFailed(msg.into())
    }

    /// Create a new vector storage error
    pub fn vector_store(msg: impl Into<String>) -> Self {
        Self::VectorStoreFailed(msg.into())
    }

    /// Create a new cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::CacheFailed(msg.into())
    }

    /// Create a new bad request error
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an already exists error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

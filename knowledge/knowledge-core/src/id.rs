//! Unique identifier type for knowledge items.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A unique identifier for a knowledge item.
///
/// Uses UUIDv4 for globally unique, collision-resistant IDs. A knowledge
/// item keeps its ID for its whole lifetime; updates produce a new item
/// with a new ID linked through `previous_version_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnowledgeId(Uuid);

impl KnowledgeId {
    /// Create a new random ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for KnowledgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for KnowledgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for KnowledgeId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<KnowledgeId> for Uuid {
    fn from(id: KnowledgeId) -> Self {
        id.0
    }
}

impl std::str::FromStr for KnowledgeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        let id1 = KnowledgeId::new();
        let id2 = KnowledgeId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_id_roundtrip() {
        let id = KnowledgeId::new();
        let s = id.to_string();
        let parsed = KnowledgeId::parse(&s).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_id_serialization() {
        let id = KnowledgeId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: KnowledgeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}

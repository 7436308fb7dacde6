//! Core data model for the knowledge repository.

use crate::error::KnowledgeError;
use crate::id::KnowledgeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// Kind of knowledge an item carries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KnowledgeType {
    Fact,
    Rule,
    Procedure,
    Concept,
    Relation,
    Metadata,
    Other,
}

impl KnowledgeType {
    /// Wire name of the variant
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "FACT",
            Self::Rule => "RULE",
            Self::Procedure => "PROCEDURE",
            Self::Concept => "CONCEPT",
            Self::Relation => "RELATION",
            Self::Metadata => "METADATA",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for KnowledgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KnowledgeType {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FACT" => Ok(Self::Fact),
            "RULE" => Ok(Self::Rule),
            "PROCEDURE" => Ok(Self::Procedure),
            "CONCEPT" => Ok(Self::Concept),
            "RELATION" => Ok(Self::Relation),
            "METADATA" => Ok(Self::Metadata),
            "OTHER" => Ok(Self::Other),
            other => Err(KnowledgeError::bad_request(format!(
                "unknown knowledge type: {other}"
            ))),
        }
    }
}

/// Lifecycle state of a knowledge item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KnowledgeStatus {
    Draft,
    Active,
    Deprecated,
    Archived,
    Invalid,
}

impl KnowledgeStatus {
    /// Wire name of the variant
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Active => "ACTIVE",
            Self::Deprecated => "DEPRECATED",
            Self::Archived => "ARCHIVED",
            Self::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for KnowledgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KnowledgeStatus {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "ACTIVE" => Ok(Self::Active),
            "DEPRECATED" => Ok(Self::Deprecated),
            "ARCHIVED" => Ok(Self::Archived),
            "INVALID" => Ok(Self::Invalid),
            other => Err(KnowledgeError::bad_request(format!(
                "unknown knowledge status: {other}"
            ))),
        }
    }
}

/// A versioned knowledge record.
///
/// Items are immutable once committed: an update produces a new item with
/// a fresh ID, `version + 1`, and `previous_version_id` pointing at the
/// superseded item. The version chain is expressed purely through IDs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeItem {
    pub knowledge_id: KnowledgeId,
    pub knowledge_type: KnowledgeType,
    pub status: KnowledgeStatus,
    pub topic: String,
    pub content: serde_json::Value,

    /// Unit-normalized embedding; computed by the repository when absent
    pub vector: Option<Vec<f32>>,

    pub metadata: HashMap<String, serde_json::Value>,
    pub source_id: Option<String>,

    /// Stored verbatim; the repository never interprets it
    pub access_control: HashMap<String, serde_json::Value>,

    pub tags: BTreeSet<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub version: u32,
    pub previous_version_id: Option<KnowledgeId>,
}

impl KnowledgeItem {
    /// Create a fresh item: new ID, version 1, DRAFT status
    pub fn create(
        knowledge_type: KnowledgeType,
        topic: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            knowledge_id: KnowledgeId::new(),
            knowledge_type,
            status: KnowledgeStatus::Draft,
            topic: topic.into(),
            content,
            vector: None,
            metadata: HashMap::new(),
            source_id: None,
            access_control: HashMap::new(),
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            version: 1,
            previous_version_id: None,
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_access_control(
        mut self,
        access_control: HashMap<String, serde_json::Value>,
    ) -> Self {
        self.access_control = access_control;
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }

    /// Build the successor version of this item.
    ///
    /// The successor gets a fresh ID, `version + 1`, and points back here
    /// through `previous_version_id`. New metadata is merged over the old.
    /// When the content changes without a replacement vector, the stale
    /// vector is dropped so the repository re-embeds.
    pub fn next_version(&self, changes: UpdateRequest) -> Self {
        let content_changed = changes.content.is_some();

        let mut metadata = self.metadata.clone();
        if let Some(new_metadata) = changes.metadata {
            metadata.extend(new_metadata);
        }

        Self {
            knowledge_id: KnowledgeId::new(),
            knowledge_type: self.knowledge_type,
            status: changes.status.unwrap_or(self.status),
            topic: self.topic.clone(),
            content: changes.content.unwrap_or_else(|| self.content.clone()),
            vector: if content_changed {
                None
            } else {
                self.vector.clone()
            },
            metadata,
            source_id: self.source_id.clone(),
            access_control: self.access_control.clone(),
            tags: changes.tags.unwrap_or_else(|| self.tags.clone()),
            created_at: self.created_at,
            updated_at: Utc::now(),
            version: self.version + 1,
            previous_version_id: Some(self.knowledge_id),
        }
    }

    /// Check if the item is in the ACTIVE state
    pub fn is_active(&self) -> bool {
        self.status == KnowledgeStatus::Active
    }
}

/// Parameters for publishing a new knowledge item.
///
/// Doubles as the `knowledge_publish` wire payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub knowledge_type: KnowledgeType,
    pub topic: String,
    pub content: serde_json::Value,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub access_control: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl PublishRequest {
    pub fn new(
        knowledge_type: KnowledgeType,
        topic: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self {
            knowledge_type,
            topic: topic.into(),
            content,
            metadata: HashMap::new(),
            source_id: None,
            access_control: HashMap::new(),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_access_control(
        mut self,
        access_control: HashMap<String, serde_json::Value>,
    ) -> Self {
        self.access_control = access_control;
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Materialize the request into a fresh knowledge item
    pub fn into_item(self) -> KnowledgeItem {
        let mut item = KnowledgeItem::create(self.knowledge_type, self.topic, self.content)
            .with_metadata(self.metadata)
            .with_access_control(self.access_control)
            .with_tags(self.tags);
        item.source_id = self.source_id;
        item
    }
}

/// Changes to apply when producing the next version of an item.
///
/// Doubles as the change set of the `knowledge_update` wire payload;
/// omitted fields carry over from the current version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub content: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub status: Option<KnowledgeStatus>,
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
}

impl UpdateRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: serde_json::Value) -> Self {
        self.content = Some(content);
        self
    }

    pub fn metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn status(mut self, status: KnowledgeStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }
}

/// A search hit: the item together with its cosine similarity score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub item: KnowledgeItem,
    pub score: f32,
}

//! Content-schema validation keyed by topic patterns.

use async_trait::async_trait;
use knowledge_core::{KnowledgeError, KnowledgeItem, Result};
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Scalar type constraint for a content field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    fn accepts(&self, value: &serde_json::Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Number => "a number",
            Self::Boolean => "a boolean",
            Self::Array => "an array",
            Self::Object => "an object",
        }
    }
}

/// Constraints on an item's content: required fields plus per-field
/// scalar types. Unlisted fields pass untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentSchema {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub properties: HashMap<String, FieldType>,
}

/// Trait for knowledge validators.
#[async_trait]
pub trait KnowledgeValidator: Send + Sync {
    /// Validate an item, returning the first violation found.
    async fn validate(&self, item: &KnowledgeItem) -> Result<()>;

    /// Validate a batch; one verdict per item.
    async fn validate_batch(&self, items: &[KnowledgeItem]) -> Vec<bool> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(self.validate(item).await.is_ok());
        }
        results
    }
}

/// Schema validator keyed by regular expressions over topics.
///
/// The first registered pattern that matches the item's topic supplies
/// the schema; an item whose topic matches no pattern is valid by
/// default.
pub struct SchemaValidator {
    schemas: RwLock<Vec<(String, Regex, ContentSchema)>>,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self {
            schemas: RwLock::new(Vec::new()),
        }
    }

    /// Register a schema for a topic pattern.
    pub fn add_schema(&self, topic_pattern: &str, schema: ContentSchema) -> Result<()> {
        let regex = Regex::new(topic_pattern).map_err(|e| {
            KnowledgeError::bad_request(format!("invalid topic pattern '{topic_pattern}': {e}"))
        })?;

        let mut schemas = self.schemas.write();
        if let Some(entry) = schemas
            .iter_mut()
            .find(|(pattern, _, _)| pattern == topic_pattern)
        {
            entry.2 = schema;
        } else {
            schemas.push((topic_pattern.to_string(), regex, schema));
        }

        debug!(pattern = topic_pattern, "Registered content schema");
        Ok(())
    }

    /// Remove the schema registered under a topic pattern.
    pub fn remove_schema(&self, topic_pattern: &str) -> bool {
        let mut schemas = self.schemas.write();
        let before = schemas.len();
        schemas.retain(|(pattern, _, _)| pattern != topic_pattern);
        schemas.len() != before
    }

    fn check(schema: &ContentSchema, item: &KnowledgeItem) -> Result<()> {
        // Only object content is structurally checked; scalars and arrays
        // have no fields to constrain
        let Some(content) = item.content.as_object() else {
            return Ok(());
        };

        for field in &schema.required {
            if !content.contains_key(field) {
                return Err(KnowledgeError::validation_field(
                    field,
                    format!("required field '{field}' is missing"),
                ));
            }
        }

        for (field, value) in content {
            if let Some(expected) = schema.properties.get(field) {
                if !expected.accepts(value) {
                    return Err(KnowledgeError::validation_field(
                        field,
                        format!("field '{}' should be {}", field, expected.label()),
                    ));
                }
            }
        }

        Ok(())
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeValidator for SchemaValidator {
    async fn validate(&self, item: &KnowledgeItem) -> Result<()> {
        if item.content.is_null() {
            return Err(KnowledgeError::validation_field(
                "content",
                "knowledge item has no content",
            ));
        }

        let schemas = self.schemas.read();
        let Some((_, _, schema)) = schemas
            .iter()
            .find(|(_, regex, _)| regex.is_match(&item.topic))
        else {
            return Ok(());
        };

        Self::check(schema, item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_core::KnowledgeType;
    use serde_json::json;

    fn price_schema() -> ContentSchema {
        ContentSchema {
            required: vec!["price".to_string()],
            properties: HashMap::from([
                ("price".to_string(), FieldType::Number),
                ("currency".to_string(), FieldType::String),
            ]),
        }
    }

    fn item(topic: &str, content: serde_json::Value) -> KnowledgeItem {
        KnowledgeItem::create(KnowledgeType::Fact, topic, content)
    }

    #[tokio::test]
    async fn test_no_matching_schema_is_valid() {
        let validator = SchemaValidator::new();
        validator.add_schema(r"^market/", price_schema()).unwrap();

        let unmatched = item("inventory/stock", json!({"anything": true}));
        assert!(validator.validate(&unmatched).await.is_ok());
    }

    #[tokio::test]
    async fn test_required_field_enforced() {
        let validator = SchemaValidator::new();
        validator.add_schema(r"^market/", price_schema()).unwrap();

        let valid = item("market/crypto", json!({"price": 50000}));
        assert!(validator.validate(&valid).await.is_ok());

        let invalid = item("market/crypto", json!({"volume": 10}));
        let err = validator.validate(&invalid).await.unwrap_err();
        match err {
            KnowledgeError::ValidationFailed { field, .. } => {
                assert_eq!(field.as_deref(), Some("price"));
            }
            other => panic!("expected ValidationFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_field_type_enforced() {
        let validator = SchemaValidator::new();
        validator.add_schema(r"^market/", price_schema()).unwrap();

        let wrong_type = item("market/crypto", json!({"price": "expensive"}));
        assert!(validator.validate(&wrong_type).await.is_err());

        let wrong_currency = item(
            "market/crypto",
            json!({"price": 1, "currency": 42}),
        );
        assert!(validator.validate(&wrong_currency).await.is_err());

        let ok = item(
            "market/crypto",
            json!({"price": 1, "currency": "USD", "extra": [1, 2]}),
        );
        assert!(validator.validate(&ok).await.is_ok());
    }

    #[tokio::test]
    async fn test_null_content_rejected() {
        let validator = SchemaValidator::new();
        let null_content = item("anything", json!(null));
        assert!(validator.validate(&null_content).await.is_err());
    }

    #[tokio::test]
    async fn test_first_matching_pattern_wins() {
        let validator = SchemaValidator::new();
        validator
            .add_schema(
                r"^market/",
                ContentSchema {
                    required: vec!["price".to_string()],
                    properties: HashMap::new(),
                },
            )
            .unwrap();
        validator
            .add_schema(
                r"^market/crypto",
                ContentSchema {
                    required: vec!["volume".to_string()],
                    properties: HashMap::new(),
                },
            )
            .unwrap();

        // The broader pattern was registered first, so "price" governs
        let missing_volume = item("market/crypto/btc", json!({"price": 1}));
        assert!(validator.validate(&missing_volume).await.is_ok());
    }

    #[tokio::test]
    async fn test_schema_management() {
        let validator = SchemaValidator::new();
        validator.add_schema(r"^a/", price_schema()).unwrap();

        // Re-registering replaces in place
        validator
            .add_schema(r"^a/", ContentSchema::default())
            .unwrap();
        assert!(validator
            .validate(&item("a/x", json!({"no": "price"})))
            .await
            .is_ok());

        assert!(validator.remove_schema(r"^a/"));
        assert!(!validator.remove_schema(r"^a/"));
        assert!(validator.add_schema("(", ContentSchema::default()).is_err());
    }

    #[tokio::test]
    async fn test_validate_batch() {
        let validator = SchemaValidator::new();
        validator.add_schema(r"^market/", price_schema()).unwrap();

        let items = vec![
            item("market/a", json!({"price": 1})),
            item("market/b", json!({})),
            item("other", json!({})),
        ];
        assert_eq!(
            validator.validate_batch(&items).await,
            vec![true, false, true]
        );
    }
}

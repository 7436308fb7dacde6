//! Edge cases and failure-path behavior of the repository.

use knowledge_repository::prelude::*;
use knowledge_repository::ContentSchema;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn test_repository() -> KnowledgeRepository {
    KnowledgeRepository::new(
        "edge-test",
        RepositoryConfig::default(),
        Arc::new(EventBus::new()),
    )
}

fn repository_with_validator(validator: Arc<SchemaValidator>) -> KnowledgeRepository {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder::default());
    let vectors: Arc<dyn VectorStorage> = Arc::new(
        knowledge_semantic::InMemoryVectorStorage::new(embedder.dimension()),
    );
    KnowledgeRepository::with_components(
        "edge-test",
        RepositoryConfig::default(),
        Arc::new(EventBus::new()),
        embedder,
        vectors,
        validator,
        Arc::new(LruKnowledgeCache::default()),
    )
}

#[tokio::test]
async fn test_republish_same_id_fails() {
    let repository = test_repository();

    let item = KnowledgeItem::create(KnowledgeType::Fact, "t", json!({"v": 1}));
    repository.publish_item(item.clone()).await.unwrap();

    let err = repository.publish_item(item).await.unwrap_err();
    assert!(err.is_already_exists());
    assert_eq!(repository.count().await, 1);
}

#[tokio::test]
async fn test_update_missing_item_fails() {
    let repository = test_repository();
    let err = repository
        .update(&KnowledgeId::new(), UpdateRequest::new().status(KnowledgeStatus::Active))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_failed_publish_is_a_no_op() {
    let validator = Arc::new(SchemaValidator::new());
    validator
        .add_schema(
            r"^market/",
            ContentSchema {
                required: vec!["price".to_string()],
                properties: HashMap::new(),
            },
        )
        .unwrap();
    let repository = repository_with_validator(validator);

    let err = repository
        .publish(
            PublishRequest::new(KnowledgeType::Fact, "market/crypto", json!({"volume": 2}))
                .with_tags(["crypto"]),
        )
        .await
        .unwrap_err();

    match &err {
        KnowledgeError::ValidationFailed { field, .. } => {
            assert_eq!(field.as_deref(), Some("price"));
        }
        other => panic!("expected ValidationFailed, got {other:?}"),
    }

    // Nothing leaked into any structure
    assert_eq!(repository.count().await, 0);
    assert!(repository.by_topic("market/crypto").await.is_empty());
    assert!(repository.by_tag("crypto").await.is_empty());
    assert!(repository.search("crypto", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_producer_vector_with_wrong_dimension_rolls_back() {
    let repository = test_repository();

    let item = KnowledgeItem::create(KnowledgeType::Fact, "t", json!({"v": 1}))
        .with_vector(vec![1.0; 32]);
    let err = repository.publish_item(item).await.unwrap_err();
    assert!(matches!(err, KnowledgeError::VectorStoreFailed(_)));

    assert_eq!(repository.count().await, 0);
    assert!(repository.by_topic("t").await.is_empty());
}

#[tokio::test]
async fn test_producer_vector_is_used_verbatim() {
    let repository = test_repository();

    let supplied = vec![1.0 / (128f32).sqrt(); 128];
    let item = KnowledgeItem::create(KnowledgeType::Fact, "t", json!({"v": 1}))
        .with_vector(supplied.clone());
    let id = repository.publish_item(item).await.unwrap();

    let stored = repository.get(&id).await.unwrap();
    assert_eq!(stored.vector, Some(supplied));
}

#[tokio::test]
async fn test_empty_topic_rejected() {
    let repository = test_repository();
    let err = repository
        .publish(PublishRequest::new(KnowledgeType::Fact, "", json!({"v": 1})))
        .await
        .unwrap_err();
    assert!(matches!(err, KnowledgeError::ValidationFailed { .. }));
}

#[tokio::test]
async fn test_publish_batch_isolates_failures() {
    let repository = test_repository();

    let duplicate = KnowledgeItem::create(KnowledgeType::Fact, "dup", json!({"v": 0}));
    repository.publish_item(duplicate.clone()).await.unwrap();

    let results = repository
        .publish_batch(vec![
            PublishRequest::new(KnowledgeType::Fact, "ok/one", json!({"v": 1})),
            PublishRequest::new(KnowledgeType::Fact, "", json!({"v": 2})),
            PublishRequest::new(KnowledgeType::Fact, "ok/two", json!({"v": 3})),
        ])
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert!(results[2].is_ok());
    // 1 pre-existing + 2 successful batch entries
    assert_eq!(repository.count().await, 3);
}

#[tokio::test]
async fn test_update_reembeds_changed_content() {
    let repository = test_repository();

    let id = repository
        .publish(PublishRequest::new(
            KnowledgeType::Fact,
            "t",
            json!({"price": 1}),
        ))
        .await
        .unwrap();
    let original_vector = repository.get(&id).await.unwrap().vector.unwrap();

    // Status-only update keeps the vector
    let same = repository
        .update(&id, UpdateRequest::new().status(KnowledgeStatus::Active))
        .await
        .unwrap();
    assert_eq!(
        repository.get(&same).await.unwrap().vector.unwrap(),
        original_vector
    );

    // Content update re-embeds
    let changed = repository
        .update(&same, UpdateRequest::new().content(json!({"price": 2})))
        .await
        .unwrap();
    assert_ne!(
        repository.get(&changed).await.unwrap().vector.unwrap(),
        original_vector
    );
}

#[tokio::test]
async fn test_version_history_survives_deleted_predecessor() {
    let repository = test_repository();

    let v1 = repository
        .publish(PublishRequest::new(KnowledgeType::Fact, "t", json!({"v": 1})))
        .await
        .unwrap();
    let v2 = repository
        .update(&v1, UpdateRequest::new().content(json!({"v": 2})))
        .await
        .unwrap();
    let v3 = repository
        .update(&v2, UpdateRequest::new().content(json!({"v": 3})))
        .await
        .unwrap();

    // Deleting the middle version leaves a hole; the walk stops there
    repository.delete(&v2).await.unwrap();

    let history = repository.version_history(&v3).await.unwrap();
    let ids: Vec<KnowledgeId> = history.iter().map(|item| item.knowledge_id).collect();
    assert_eq!(ids, vec![v3]);

    let from_root = repository.version_history(&v1).await.unwrap();
    let ids: Vec<KnowledgeId> = from_root.iter().map(|item| item.knowledge_id).collect();
    assert_eq!(ids, vec![v1]);

    let missing = repository.version_history(&v2).await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn test_similar_to_missing_item_fails() {
    let repository = test_repository();
    let err = repository
        .similar_to(&KnowledgeId::new(), 5)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_updates_since_excludes_boundary() {
    let repository = test_repository();

    let id = repository
        .publish(PublishRequest::new(KnowledgeType::Fact, "t", json!({"v": 1})))
        .await
        .unwrap();
    let updated_at = repository.get(&id).await.unwrap().updated_at;

    assert!(repository.updates_since(updated_at).await.is_empty());
    assert_eq!(
        repository
            .updates_since(updated_at - chrono::Duration::milliseconds(1))
            .await
            .len(),
        1
    );
}

#[tokio::test]
async fn test_metadata_priority_drives_critical_updates() {
    let repository = test_repository();
    let t0 = chrono::Utc::now() - chrono::Duration::seconds(1);

    let mut high = HashMap::new();
    high.insert("priority".to_string(), json!(0.9));
    let boosted = repository
        .publish(
            PublishRequest::new(KnowledgeType::Fact, "t", json!({"v": 1})).with_metadata(high),
        )
        .await
        .unwrap();

    // Numeric strings and booleans coerce like numbers
    let mut stringly = HashMap::new();
    stringly.insert("priority".to_string(), json!("0.9"));
    let stringly_boosted = repository
        .publish(
            PublishRequest::new(KnowledgeType::Fact, "t", json!({"v": 2})).with_metadata(stringly),
        )
        .await
        .unwrap();

    let mut flagged = HashMap::new();
    flagged.insert("priority".to_string(), json!(true));
    let flag_boosted = repository
        .publish(
            PublishRequest::new(KnowledgeType::Fact, "t", json!({"v": 3})).with_metadata(flagged),
        )
        .await
        .unwrap();

    let mut junk = HashMap::new();
    junk.insert("priority".to_string(), json!("not-a-number"));
    repository
        .publish(
            PublishRequest::new(KnowledgeType::Fact, "t", json!({"v": 4})).with_metadata(junk),
        )
        .await
        .unwrap();

    let critical = repository.critical_updates_since(t0, Some(0.5)).await;
    let ids: std::collections::HashSet<KnowledgeId> =
        critical.iter().map(|item| item.knowledge_id).collect();
    assert_eq!(critical.len(), 3);
    assert!(ids.contains(&boosted));
    assert!(ids.contains(&stringly_boosted));
    assert!(ids.contains(&flag_boosted));

    // The configured default threshold applies when none is given
    let default_threshold = repository.critical_updates_since(t0, None).await;
    assert_eq!(default_threshold.len(), 3);
}

#[tokio::test]
async fn test_subscriptions_listing_and_idempotent_unsubscribe() {
    let repository = test_repository();

    let handler: KnowledgeHandler = Arc::new(|_item| Box::pin(async { Ok(()) }));
    let a = repository.subscribe(Some(SubscriptionFilter::topics(["t"])), handler.clone());
    let b = repository.subscribe(None, handler);

    let listed = repository.subscriptions();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].subscription_id, a);
    assert_eq!(listed[0].filter, Some("topics"));
    assert_eq!(listed[1].filter, None);

    assert!(repository.unsubscribe(b));
    assert!(!repository.unsubscribe(b));
    assert_eq!(repository.subscriptions().len(), 1);
}

#[tokio::test]
async fn test_search_limit_zero_and_missing_store_entries() {
    let repository = test_repository();
    repository
        .publish(PublishRequest::new(KnowledgeType::Fact, "t", json!({"v": 1})))
        .await
        .unwrap();

    assert!(repository.search("anything", 0).await.unwrap().is_empty());

    let results = repository.search("anything", 10).await.unwrap();
    assert_eq!(results.len(), 1);
}

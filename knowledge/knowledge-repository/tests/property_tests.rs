//! Property-based tests over operation sequences.

use knowledge_repository::prelude::*;
use knowledge_semantic::InMemoryVectorStorage;
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime")
        .block_on(future)
}

#[derive(Debug, Clone)]
enum Op {
    Publish { topic: usize, tag: usize, value: u32 },
    Update { target: usize, value: u32 },
    Delete { target: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..4, 0usize..3, any::<u32>())
            .prop_map(|(topic, tag, value)| Op::Publish { topic, tag, value }),
        (any::<usize>(), any::<u32>()).prop_map(|(target, value)| Op::Update { target, value }),
        any::<usize>().prop_map(|target| Op::Delete { target }),
    ]
}

struct Harness {
    repository: KnowledgeRepository,
    vectors: Arc<InMemoryVectorStorage>,
}

fn harness() -> Harness {
    let embedder: Arc<HashEmbedder> = Arc::new(HashEmbedder::default());
    let vectors = Arc::new(InMemoryVectorStorage::new(embedder.dimension()));
    let repository = KnowledgeRepository::with_components(
        "prop-test",
        RepositoryConfig::default(),
        Arc::new(EventBus::new()),
        embedder,
        vectors.clone(),
        Arc::new(SchemaValidator::new()),
        Arc::new(LruKnowledgeCache::new(8)),
    );
    Harness { repository, vectors }
}

async fn check_invariants(harness: &Harness) {
    let repository = &harness.repository;
    let items = repository.all().await;

    // Every secondary index entry resolves to a stored item, and every
    // item is reachable through each of its index keys
    for item in &items {
        let id = item.knowledge_id;

        assert!(
            repository
                .by_topic(&item.topic)
                .await
                .iter()
                .any(|other| other.knowledge_id == id),
            "item missing from topic index"
        );
        assert!(
            repository
                .by_type(item.knowledge_type)
                .await
                .iter()
                .any(|other| other.knowledge_id == id),
            "item missing from type index"
        );
        assert!(
            repository
                .by_status(item.status)
                .await
                .iter()
                .any(|other| other.knowledge_id == id),
            "item missing from status index"
        );
        for tag in &item.tags {
            assert!(
                repository
                    .by_tag(tag)
                    .await
                    .iter()
                    .any(|other| other.knowledge_id == id),
                "item missing from tag index"
            );
        }
        if let Some(source) = &item.source_id {
            assert!(
                repository
                    .by_source(source)
                    .await
                    .iter()
                    .any(|other| other.knowledge_id == id),
                "item missing from source index"
            );
        }
    }

    // Vector storage mirrors the store exactly: same IDs, unit norms
    let stored_ids: HashSet<KnowledgeId> = items.iter().map(|item| item.knowledge_id).collect();
    let vector_ids: HashSet<KnowledgeId> = harness.vectors.all_ids().await.into_iter().collect();
    assert_eq!(stored_ids, vector_ids, "vector storage out of sync");

    for id in &stored_ids {
        let vector = harness
            .vectors
            .get_vector(id)
            .await
            .expect("vector missing for stored item");
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6, "stored vector not unit norm");
    }

    // The version chain increments by exactly one along surviving links
    for item in &items {
        if let Some(parent_id) = item.previous_version_id {
            if let Some(parent) = repository.get(&parent_id).await {
                assert_eq!(parent.version + 1, item.version, "broken version chain");
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_invariants_hold_after_any_op_sequence(ops in proptest::collection::vec(op_strategy(), 1..24)) {
        block_on(async move {
            let harness = harness();
            let repository = harness.repository.clone();
            let mut live: Vec<KnowledgeId> = Vec::new();

            let topics = ["market/crypto", "market/stocks", "inventory", "pricing"];
            let tags = ["hot", "cold", "stale"];

            for op in ops {
                match op {
                    Op::Publish { topic, tag, value } => {
                        let id = repository
                            .publish(
                                PublishRequest::new(
                                    KnowledgeType::Fact,
                                    topics[topic % topics.len()],
                                    json!({"value": value}),
                                )
                                .with_tags([tags[tag % tags.len()]])
                                .with_source("prop-agent"),
                            )
                            .await
                            .unwrap();
                        live.push(id);
                    }
                    Op::Update { target, value } => {
                        if live.is_empty() {
                            continue;
                        }
                        let target_id = live[target % live.len()];
                        let before = repository.get(&target_id).await.unwrap();
                        let new_id = repository
                            .update(&target_id, UpdateRequest::new().content(json!({"value": value})))
                            .await
                            .unwrap();
                        let after = repository.get(&new_id).await.unwrap();
                        prop_assert_eq!(after.version, before.version + 1);
                        prop_assert_eq!(after.previous_version_id, Some(target_id));
                        live.push(new_id);
                    }
                    Op::Delete { target } => {
                        if live.is_empty() {
                            continue;
                        }
                        let target_id = live.swap_remove(target % live.len());
                        prop_assert!(repository.delete(&target_id).await.unwrap());
                        prop_assert!(repository.get(&target_id).await.is_none());
                    }
                }

                check_invariants(&harness).await;
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_search_is_ordered_and_bounded(
        contents in proptest::collection::vec("[a-z ]{1,40}", 1..12),
        query in "[a-z ]{1,20}",
        limit in 1usize..8,
    ) {
        block_on(async move {
            let repository = KnowledgeRepository::new(
                "prop-search",
                RepositoryConfig::default(),
                Arc::new(EventBus::new()),
            );

            for content in &contents {
                repository
                    .publish(PublishRequest::new(KnowledgeType::Fact, "corpus", json!(content)))
                    .await
                    .unwrap();
            }

            let results = repository.search(&query, limit).await.unwrap();
            prop_assert!(results.len() <= limit);

            for result in &results {
                prop_assert!(result.score >= -1.0 - 1e-6);
                prop_assert!(result.score <= 1.0 + 1e-6);
            }
            for window in results.windows(2) {
                prop_assert!(window[0].score >= window[1].score);
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_embedding_deterministic_and_normalized(text in ".*") {
        block_on(async move {
            let embedder = HashEmbedder::default();
            let content = json!(text);

            let first = embedder.embed(&content).await.unwrap();
            let second = embedder.embed(&content).await.unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.len(), 128);

            let norm: f32 = first.iter().map(|x| x * x).sum::<f32>().sqrt();
            prop_assert!((norm - 1.0).abs() < 1e-6);
            Ok(())
        })?;
    }
}

//! Subscription filters over knowledge items.

use crate::error::{KnowledgeError, Result};
use crate::types::{KnowledgeItem, KnowledgeStatus, KnowledgeType};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

/// A predicate over knowledge items, used both for subscription routing
/// and for ad-hoc filtering of query results.
///
/// Filters form a small closed algebra: the leaf variants match a single
/// item attribute, and `And`/`Or`/`Not` compose them.
#[derive(Debug, Clone)]
pub enum SubscriptionFilter {
    /// Matches every item
    All,

    /// Matches by topic: exact members of `topics`, or any compiled pattern
    Topics {
        topics: BTreeSet<String>,
        patterns: Vec<Regex>,
    },

    /// Matches items of any listed type
    Types(HashSet<KnowledgeType>),

    /// Matches items in any listed status
    Statuses(HashSet<KnowledgeStatus>),

    /// Matches by tag; `match_all` requires every listed tag to be present
    Tags {
        tags: BTreeSet<String>,
        match_all: bool,
    },

    /// Matches items from any listed source
    Sources(BTreeSet<String>),

    And(Vec<SubscriptionFilter>),
    Or(Vec<SubscriptionFilter>),
    Not(Box<SubscriptionFilter>),
}

impl SubscriptionFilter {
    /// Filter on an exact set of topics
    pub fn topics(topics: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Topics {
            topics: topics.into_iter().map(Into::into).collect(),
            patterns: Vec::new(),
        }
    }

    /// Filter on topic regex patterns (in addition to any exact topics).
    ///
    /// Patterns are anchored at the start of the topic; `crypto` matches
    /// `crypto/btc` but not `market/crypto`.
    pub fn topic_patterns(patterns: impl IntoIterator<Item = impl AsRef<str>>) -> Result<Self> {
        let mut compiled = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let regex = Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
                KnowledgeError::bad_request(format!("invalid topic pattern '{pattern}': {e}"))
            })?;
            compiled.push(regex);
        }
        Ok(Self::Topics {
            topics: BTreeSet::new(),
            patterns: compiled,
        })
    }

    /// Filter on a set of knowledge types
    pub fn types(types: impl IntoIterator<Item = KnowledgeType>) -> Self {
        Self::Types(types.into_iter().collect())
    }

    /// Filter on a set of statuses
    pub fn statuses(statuses: impl IntoIterator<Item = KnowledgeStatus>) -> Self {
        Self::Statuses(statuses.into_iter().collect())
    }

    /// Filter on tags, matching items carrying any of them
    pub fn any_tag(tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Tags {
            tags: tags.into_iter().map(Into::into).collect(),
            match_all: false,
        }
    }

    /// Filter on tags, matching only items carrying all of them
    pub fn all_tags(tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Tags {
            tags: tags.into_iter().map(Into::into).collect(),
            match_all: true,
        }
    }

    /// Filter on a set of source IDs
    pub fn sources(sources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Sources(sources.into_iter().map(Into::into).collect())
    }

    /// Check whether an item satisfies this filter
    pub fn matches(&self, item: &KnowledgeItem) -> bool {
        match self {
            Self::All => true,
            Self::Topics { topics, patterns } => {
                topics.contains(&item.topic)
                    || patterns.iter().any(|pattern| pattern.is_match(&item.topic))
            }
            Self::Types(types) => types.contains(&item.knowledge_type),
            Self::Statuses(statuses) => statuses.contains(&item.status),
            Self::Tags { tags, match_all } => {
                if item.tags.is_empty() {
                    return false;
                }
                if *match_all {
                    tags.iter().all(|tag| item.tags.contains(tag))
                } else {
                    tags.iter().any(|tag| item.tags.contains(tag))
                }
            }
            Self::Sources(sources) => item
                .source_id
                .as_ref()
                .is_some_and(|source| sources.contains(source)),
            Self::And(filters) => filters.iter().all(|filter| filter.matches(item)),
            Self::Or(filters) => filters.iter().any(|filter| filter.matches(item)),
            Self::Not(filter) => !filter.matches(item),
        }
    }

    /// Short label for the filter shape, used in subscription listings
    pub fn kind(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Topics { .. } => "topics",
            Self::Types(_) => "types",
            Self::Statuses(_) => "statuses",
            Self::Tags { .. } => "tags",
            Self::Sources(_) => "sources",
            Self::And(_) => "and",
            Self::Or(_) => "or",
            Self::Not(_) => "not",
        }
    }
}

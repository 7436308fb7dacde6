//! Embedding providers for knowledge content.

use crate::error::Result;
use async_trait::async_trait;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Trait for embedding providers.
///
/// Providers turn opaque knowledge content into fixed-dimension vectors.
/// A provider must be deterministic: the same content always yields the
/// same vector, and the dimension never changes across calls.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single content value.
    async fn embed(&self, content: &serde_json::Value) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple content values (batched).
    async fn embed_batch(&self, contents: &[serde_json::Value]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(contents.len());
        for content in contents {
            embeddings.push(self.embed(content).await?);
        }
        Ok(embeddings)
    }

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// Truncated rendering of content for error messages and logs.
pub fn content_excerpt(content: &serde_json::Value, max_chars: usize) -> String {
    let rendered = content.to_string();
    if rendered.chars().count() <= max_chars {
        rendered
    } else {
        let prefix: String = rendered.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{prefix}...")
    }
}

/// Deterministic hash-based embedding provider.
///
/// The reference provider: content is flattened to text, normalized, and
/// hashed with SHA-256; the digest fills the first `min(32, D)` vector
/// positions, three positions carry simple lexical features (word count,
/// average word length, type-token ratio), and the result is
/// L2-normalized. Deterministic and cheap, with no semantic understanding;
/// swap in a learned model behind the same trait for real search quality.
pub struct HashEmbedder {
    dimension: usize,
    strip_punct: Regex,
    collapse_ws: Regex,
}

impl HashEmbedder {
    pub const DEFAULT_DIMENSION: usize = 128;

    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            strip_punct: Regex::new(r"[^\w\s]").expect("static pattern"),
            collapse_ws: Regex::new(r"\s+").expect("static pattern"),
        }
    }

    /// Flatten an arbitrary JSON value into embeddable text.
    ///
    /// Objects render as "key value" pairs, arrays as space-joined
    /// elements; serde_json keeps object keys sorted, so the rendering is
    /// deterministic.
    fn render(value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Array(items) => items
                .iter()
                .map(Self::render)
                .collect::<Vec<_>>()
                .join(" "),
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(key, value)| format!("{} {}", key, Self::render(value)))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    fn normalize_text(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let stripped = self.strip_punct.replace_all(&lowered, "");
        self.collapse_ws
            .replace_all(&stripped, " ")
            .trim()
            .to_string()
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());

        let mut embedding = vec![0.0f32; self.dimension];
        for (i, byte) in digest.iter().take(self.dimension).enumerate() {
            embedding[i] = *byte as f32 / 255.0;
        }

        // Lexical features in the leading positions
        let words: Vec<&str> = text.split_whitespace().collect();
        if !words.is_empty() {
            let total_len: usize = words.iter().map(|word| word.len()).sum();
            let avg_word_len = total_len as f32 / words.len() as f32;
            let unique: std::collections::HashSet<&&str> = words.iter().collect();

            if self.dimension > 0 {
                embedding[0] = (words.len() as f32 / 100.0).min(1.0);
            }
            if self.dimension > 1 {
                embedding[1] = (avg_word_len / 10.0).min(1.0);
            }
            if self.dimension > 2 {
                embedding[2] = unique.len() as f32 / words.len() as f32;
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|x| *x /= norm);
        }

        embedding
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, content: &serde_json::Value) -> Result<Vec<f32>> {
        let text = self.normalize_text(&Self::render(content));
        debug!(chars = text.len(), "Generating hash embedding");
        Ok(self.embed_text(&text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

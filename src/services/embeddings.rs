//! Embedding generation for query/passage similarity
//!
//! The vector index is queried with an embedding of the query text, and the
//! relevance scorer compares query and answer embeddings. Any embedding model
//! can be plugged in behind [`EmbeddingService`]; [`HashingEmbeddingService`]
//! is a deterministic local fallback that needs no model at all.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Embedding dimension of the hashing fallback
pub const HASHING_EMBEDDING_DIM: usize = 384;

/// Embedding service trait defining required operations
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get embedding dimensionality
    fn dimensions(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Feature-hashing embedding over character n-grams and words
///
/// Deterministic across runs and processes for a given build, which keeps
/// pipeline outputs reproducible in tests.
#[derive(Debug, Clone, Default)]
pub struct HashingEmbeddingService;

impl HashingEmbeddingService {
    pub fn new() -> Self {
        Self
    }

    /// Embed text synchronously
    pub fn embed_text(text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; HASHING_EMBEDDING_DIM];

        // Character n-grams hashing
        let text_lower = text.to_lowercase();
        let chars: Vec<char> = text_lower.chars().collect();

        for window_size in 3..=4 {
            for window in chars.windows(window_size) {
                if window.iter().all(|c| c.is_whitespace()) {
                    continue;
                }
                let dim = bucket(&window.iter().collect::<String>());
                embedding[dim] += 1.0;
            }
        }

        // Word-level hashing
        for word in crate::utils::text::tokenize(&text_lower) {
            embedding[bucket(&word)] += 2.0; // Words weighted more than character n-grams
        }

        // Normalize
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        }

        embedding
    }
}

fn bucket(feature: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    feature.hash(&mut hasher);
    (hasher.finish() as usize) % HASHING_EMBEDDING_DIM
}

#[async_trait]
impl EmbeddingService for HashingEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::embed_text(text))
    }

    fn dimensions(&self) -> usize {
        HASHING_EMBEDDING_DIM
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

//! Vector index collaborator
//!
//! `search(queryEmbedding, topN)` returns candidates ordered by descending
//! cosine similarity. Production deployments point this at their own index;
//! [`InMemoryVectorIndex`] serves small corpora loaded from JSON.

use crate::error::{AletheiaError, Result};
use crate::services::embeddings::{cosine_similarity, EmbeddingService};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Candidate passage returned by the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub source_doc_id: String,
    pub text: String,
    /// Cosine similarity to the query embedding
    pub similarity: f64,
}

/// Vector index trait
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top `top_n` candidates by cosine similarity, best first
    async fn search(&self, query_embedding: &[f32], top_n: usize) -> Result<Vec<Candidate>>;
}

/// Passage as stored in a corpus file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusPassage {
    pub id: String,
    #[serde(default)]
    pub source_doc_id: String,
    pub text: String,
}

struct IndexedPassage {
    passage: CorpusPassage,
    embedding: Vec<f32>,
}

/// Brute-force cosine index held in memory
pub struct InMemoryVectorIndex {
    entries: Vec<IndexedPassage>,
}

impl InMemoryVectorIndex {
    /// Embed and index every passage
    pub async fn build(
        passages: Vec<CorpusPassage>,
        embeddings: Arc<dyn EmbeddingService>,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(passages.len());
        for passage in passages {
            let embedding = embeddings.embed(&passage.text).await?;
            entries.push(IndexedPassage { passage, embedding });
        }

        info!("Indexed {} passages with {}", entries.len(), embeddings.model_name());
        Ok(Self { entries })
    }

    /// Load a JSON array of passages and index it
    pub async fn from_json_file(
        path: &Path,
        embeddings: Arc<dyn EmbeddingService>,
    ) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AletheiaError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read corpus {:?}: {}", path, e),
            ))
        })?;
        let passages: Vec<CorpusPassage> = serde_json::from_str(&content)?;
        Self::build(passages, embeddings).await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn search(&self, query_embedding: &[f32], top_n: usize) -> Result<Vec<Candidate>> {
        let mut scored: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query_embedding, &entry.embedding) as f64))
            .collect();

        // Index order breaks ties so results are reproducible
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_n);

        debug!("Vector search returned {} candidates", scored.len());

        Ok(scored
            .into_iter()
            .map(|(i, similarity)| {
                let passage = &self.entries[i].passage;
                Candidate {
                    id: passage.id.clone(),
                    source_doc_id: passage.source_doc_id.clone(),
                    text: passage.text.clone(),
                    similarity,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::embeddings::HashingEmbeddingService;
    use tempfile::TempDir;

    fn corpus() -> Vec<CorpusPassage> {
        vec![
            CorpusPassage {
                id: "p-paris".to_string(),
                source_doc_id: "geo".to_string(),
                text: "Paris is the capital and largest city of France.".to_string(),
            },
            CorpusPassage {
                id: "p-soup".to_string(),
                source_doc_id: "food".to_string(),
                text: "Lentil soup simmers for forty minutes.".to_string(),
            },
            CorpusPassage {
                id: "p-berlin".to_string(),
                source_doc_id: "geo".to_string(),
                text: "Berlin is the capital of Germany.".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let embeddings: Arc<dyn EmbeddingService> = Arc::new(HashingEmbeddingService::new());
        let index = InMemoryVectorIndex::build(corpus(), embeddings.clone())
            .await
            .unwrap();

        let query = embeddings.embed("What is the capital of France?").await.unwrap();
        let results = index.search(&query, 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "p-paris");
        assert!(results[0].similarity >= results[1].similarity);
    }

    #[tokio::test]
    async fn test_load_from_json_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("corpus.json");
        std::fs::write(&path, serde_json::to_string(&corpus()).unwrap()).unwrap();

        let index = InMemoryVectorIndex::from_json_file(&path, Arc::new(HashingEmbeddingService))
            .await
            .unwrap();
        assert_eq!(index.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_corpus_file_is_io_error() {
        let result = InMemoryVectorIndex::from_json_file(
            Path::new("/nonexistent/corpus.json"),
            Arc::new(HashingEmbeddingService),
        )
        .await;
        assert!(matches!(result, Err(AletheiaError::Io(_))));
    }
}

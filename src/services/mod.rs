//! Services layer for the answer pipeline
//!
//! External collaborators the pipeline consumes: query embeddings, the vector
//! index, the re-ranker and the token-probability generation backend. Each is
//! a trait so deployments inject their own implementations; the concrete types
//! here are local reference implementations.

pub mod embeddings;
pub mod llm;
pub mod reranker;
pub mod vector_index;

pub use embeddings::{cosine_similarity, EmbeddingService, HashingEmbeddingService};
pub use llm::{
    GeneratedToken, GenerationOutput, GenerationRequest, HttpProviderConfig, HttpTokenProvider,
    TokenProbabilityProvider,
};
pub use reranker::{LexicalReranker, Reranker};
pub use vector_index::{Candidate, CorpusPassage, InMemoryVectorIndex, VectorIndex};

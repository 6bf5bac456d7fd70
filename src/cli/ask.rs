//! Answer a single question against a corpus file

use aletheia_core::{
    error::{AletheiaError, Result},
    services::{HashingEmbeddingService, HttpProviderConfig, HttpTokenProvider, InMemoryVectorIndex},
    Pipeline, PipelineConfig, Query,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::helpers::{load_registry, open_store, print_json};

/// Handle the ask command
pub async fn handle(
    config: PipelineConfig,
    question: String,
    corpus: PathBuf,
    endpoint: Option<String>,
    json_output: bool,
    db_path: Option<&Path>,
) -> Result<()> {
    let base_url = endpoint
        .or_else(|| config.generation.endpoint.clone())
        .ok_or_else(|| {
            AletheiaError::InvalidConfig(
                "no generation endpoint: pass --endpoint or set generation.endpoint".to_string(),
            )
        })?;
    let api_key = std::env::var(&config.generation.api_key_env).ok();
    let provider = HttpTokenProvider::new(HttpProviderConfig {
        base_url,
        api_key,
        request_timeout: config.generation.timeout(),
    })?;

    let embeddings = Arc::new(HashingEmbeddingService::new());
    let index = InMemoryVectorIndex::from_json_file(&corpus, embeddings.clone()).await?;
    debug!("Loaded {} passages from {:?}", index.len(), corpus);

    let store = open_store(db_path, &config).await?;
    let registry = load_registry(&config)?;

    let pipeline = Pipeline::builder(config)
        .embeddings(embeddings)
        .vector_index(Arc::new(index))
        .token_provider(Arc::new(provider))
        .feedback_store(store)
        .calibration_registry(registry)
        .build()?;

    let query = Query::new(question);
    let query_id = query.id;
    let decision = pipeline.answer_query(query).await;

    if json_output {
        print_json(&json!({
            "query_id": query_id,
            "decision": decision,
        }))?;
    } else {
        println!("{}", decision.rendered_answer);
        println!();
        println!(
            "[query {} | tier {} | strategy {}]",
            query_id, decision.tier, decision.strategy
        );
    }

    Ok(())
}

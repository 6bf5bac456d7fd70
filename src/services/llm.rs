//! Text generation with per-token probabilities
//!
//! Any backend (hosted API, local runtime) plugs in behind
//! [`TokenProbabilityProvider`] as long as it can return the completion text
//! together with the probability of each emitted token.

use crate::error::{AletheiaError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// A single emitted token and its probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedToken {
    /// Token text as emitted, including any leading whitespace
    pub text: String,
    /// Probability in `[0, 1]`
    pub probability: f64,
}

/// Request sent to the generation backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Completion plus its token trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub text: String,
    pub tokens: Vec<GeneratedToken>,
}

/// Generation backend trait
#[async_trait]
pub trait TokenProbabilityProvider: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput>;
}

/// Configuration for the HTTP provider
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Base URL of an OpenAI-compatible API, e.g. `http://localhost:8080/v1`
    pub base_url: String,
    pub api_key: Option<String>,
    /// Transport-level timeout; the generator applies its own deadline on top
    pub request_timeout: Duration,
}

/// OpenAI-compatible `/completions` client requesting `logprobs`
pub struct HttpTokenProvider {
    config: HttpProviderConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    logprobs: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    text: String,
    logprobs: Option<Logprobs>,
}

#[derive(Debug, Deserialize)]
struct Logprobs {
    tokens: Vec<String>,
    token_logprobs: Vec<Option<f64>>,
}

impl HttpTokenProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(AletheiaError::InvalidConfig(
                "generation endpoint cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { config, client })
    }

    fn parse_response(body: CompletionResponse) -> Result<GenerationOutput> {
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AletheiaError::GenerationFailed("Empty response from API".to_string()))?;

        let logprobs = choice.logprobs.ok_or_else(|| {
            AletheiaError::GenerationFailed("Response carries no logprobs".to_string())
        })?;

        if logprobs.tokens.len() != logprobs.token_logprobs.len() {
            return Err(AletheiaError::GenerationFailed(format!(
                "Misaligned logprobs: {} tokens, {} logprobs",
                logprobs.tokens.len(),
                logprobs.token_logprobs.len()
            )));
        }

        let tokens = logprobs
            .tokens
            .into_iter()
            .zip(logprobs.token_logprobs)
            .map(|(text, logprob)| GeneratedToken {
                text,
                // A missing logprob is treated as certainty-neutral
                probability: logprob.map(|lp| lp.exp().clamp(0.0, 1.0)).unwrap_or(1.0),
            })
            .collect();

        Ok(GenerationOutput {
            text: choice.text,
            tokens,
        })
    }
}

#[async_trait]
impl TokenProbabilityProvider for HttpTokenProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput> {
        debug!(
            "Calling completions API: model {}, max_tokens {}",
            request.model, request.max_tokens
        );

        let body = CompletionRequest {
            model: &request.model,
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
            temperature: 0.0,
            logprobs: 1,
        };

        let mut builder = self
            .client
            .post(format!(
                "{}/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .header("content-type", "application/json")
            .json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AletheiaError::GenerationFailed(format!(
                "API request failed with status {}: {}",
                status, error_text
            )));
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| {
            AletheiaError::GenerationFailed(format!("Failed to parse response: {}", e))
        })?;

        Self::parse_response(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_converts_logprobs() {
        let body: CompletionResponse = serde_json::from_str(
            r#"{"choices":[{"text":" Paris.","logprobs":{"tokens":[" Paris","."],"token_logprobs":[-0.01,null]}}]}"#,
        )
        .unwrap();

        let output = HttpTokenProvider::parse_response(body).unwrap();
        assert_eq!(output.text, " Paris.");
        assert_eq!(output.tokens.len(), 2);
        assert!((output.tokens[0].probability - (-0.01f64).exp()).abs() < 1e-12);
        assert_eq!(output.tokens[1].probability, 1.0);
    }

    #[test]
    fn test_parse_response_without_logprobs_fails() {
        let body: CompletionResponse =
            serde_json::from_str(r#"{"choices":[{"text":"Paris"}]}"#).unwrap();
        assert!(matches!(
            HttpTokenProvider::parse_response(body),
            Err(AletheiaError::GenerationFailed(_))
        ));
    }

    #[test]
    fn test_parse_empty_choices_fails() {
        let body: CompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(HttpTokenProvider::parse_response(body).is_err());
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let result = HttpTokenProvider::new(HttpProviderConfig {
            base_url: "  ".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(5),
        });
        assert!(matches!(result, Err(AletheiaError::InvalidConfig(_))));
    }
}

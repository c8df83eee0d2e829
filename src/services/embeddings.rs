//! Embedding generation for semantic session recall
//!
//! Wraps the OpenAI embeddings API behind the `EmbeddingService` trait and
//! provides the cosine similarity used to rank stored session embeddings.

use crate::error::{CoachError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Embedding dimension of the reference deployment (text-embedding-3-small)
pub const EMBEDDING_DIM: usize = 1536;

/// Request timeout duration
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Embedding service trait defining required operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get embedding dimensionality
    fn dimensions(&self) -> usize;
}

/// OpenAI embedding service
pub struct OpenAiEmbeddings {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimensions: usize,
}

/// OpenAI embeddings API request structure
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

/// OpenAI embeddings API response structure
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbeddings {
    /// Create a new embedding service
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `model` - Model name (e.g. "text-embedding-3-small")
    /// * `dimensions` - Expected vector dimensionality
    pub fn new(api_key: String, model: String, dimensions: usize) -> Result<Self> {
        if api_key.is_empty() {
            return Err(CoachError::Config(config::ConfigError::Message(
                "OpenAI API key not set".to_string(),
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: "https://api.openai.com/v1".to_string(),
            dimensions,
        })
    }

    /// Validate embedding dimensions and values
    fn validate_embedding(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(CoachError::Embedding(format!(
                "Expected {} dimensions, got {}",
                self.dimensions,
                embedding.len()
            )));
        }

        if embedding.iter().any(|&x| !x.is_finite()) {
            return Err(CoachError::Embedding(
                "Embedding contains invalid values (NaN or Inf)".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(CoachError::InvalidInput("Text cannot be empty".to_string()));
        }

        debug!("Generating embedding ({} chars, model: {})", text.len(), self.model);

        let request = EmbeddingRequest {
            input: text,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(CoachError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    CoachError::Embedding("Invalid or missing API key".to_string())
                }
                _ => CoachError::Embedding(format!(
                    "API error (status {}): {}",
                    status, error_text
                )),
            });
        }

        let api_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CoachError::Embedding(format!("Failed to parse response: {}", e)))?;

        let embedding = api_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| CoachError::Embedding("Empty response from API".to_string()))?;

        self.validate_embedding(&embedding)?;

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Calculate cosine similarity between two vectors
///
/// Returns a value in [-1, 1]; for the normalized embeddings the providers
/// return this is the "1 - cosine distance" similarity the retriever ranks
/// by. Mismatched lengths and zero vectors yield 0.0.
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

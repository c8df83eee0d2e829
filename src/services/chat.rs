//! Chat completion service
//!
//! Wraps the Anthropic messages API behind the `ChatService` trait. Every
//! generation call in the pipeline (coaching replies, summarization, level
//! classification, scoring, progress analysis) goes through `complete`,
//! each with its own maximum-output-token bound.

use crate::error::{CoachError, Result};
use crate::types::ChatMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Request timeout duration
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Chat completion service trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Generate text for a message list, optionally with a system prompt
    async fn complete<'a>(
        &self,
        system: Option<&'a str>,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<String>;
}

/// Anthropic-backed chat completion service
pub struct AnthropicChat {
    client: Client,
    api_key: String,
    model: String,
}

/// Anthropic API message format
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ChatMessage],
}

/// Anthropic API response format
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl AnthropicChat {
    /// Create a new chat service
    pub fn new(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(CoachError::Config(config::ConfigError::Message(
                "Anthropic API key not set".to_string(),
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl ChatService for AnthropicChat {
    async fn complete<'a>(
        &self,
        system: Option<&'a str>,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<String> {
        debug!(
            "Calling chat completion: {} messages, max_tokens={}",
            messages.len(),
            max_tokens
        );

        let request = AnthropicRequest {
            model: &self.model,
            max_tokens,
            system,
            messages,
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(CoachError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CoachError::LlmApi(format!(
                "API request failed with status {}: {}",
                status, error_text
            )));
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| CoachError::LlmApi(format!("Failed to parse response: {}", e)))?;

        api_response
            .content
            .into_iter()
            .map(|block| block.text)
            .find(|text| !text.is_empty())
            .ok_or_else(|| CoachError::LlmApi("Empty response from API".to_string()))
    }
}

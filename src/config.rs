//! Configuration for the Parla coaching backend
//!
//! Layered load: built-in defaults, then an optional `parla.toml`, then
//! `PARLA__`-prefixed environment variables (`__` separates nesting, e.g.
//! `PARLA__RETRIEVAL__RELEVANCE_THRESHOLD`). Provider API keys default to
//! the conventional `ANTHROPIC_API_KEY` / `OPENAI_API_KEY` variables.
//!
//! The retrieval tunables (recent-session window, similarity threshold,
//! relevance limit) are empirical values, so they live here rather than as
//! literals in the pipeline.

use crate::error::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CoachConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub providers: ProviderConfig,
    pub retrieval: RetrievalConfig,
    pub auth: AuthConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address, e.g. "127.0.0.1:8080"
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. "sqlite://parla.db"
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://parla.db".to_string()),
        }
    }
}

/// External AI provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Anthropic API key for chat completion
    pub anthropic_api_key: String,
    /// OpenAI API key for embeddings and speech
    pub openai_api_key: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub transcription_model: String,
    pub tts_model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            chat_model: "claude-sonnet-4-20250514".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            transcription_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
        }
    }
}

/// Context-retrieval tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// How many most-recent sessions feed the baseline context
    pub recent_window: usize,
    /// Minimum similarity (1 - cosine distance) for a relevance candidate
    pub relevance_threshold: f32,
    /// Maximum relevance candidates appended to the context
    pub relevance_limit: usize,
    /// How many trailing conversation turns form the similarity query
    pub query_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            recent_window: 3,
            relevance_threshold: 0.7,
            relevance_limit: 2,
            query_turns: 4,
        }
    }
}

/// Session-token verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for verifying session tokens
    pub token_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: env::var("PARLA_TOKEN_SECRET").unwrap_or_default(),
        }
    }
}

impl CoachConfig {
    /// Load configuration from defaults, an optional file, and environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        builder = match file {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("parla").required(false)),
        };

        let settings = builder
            .add_source(Environment::with_prefix("PARLA").separator("__"))
            .build()?;

        let config: CoachConfig = settings.try_deserialize()?;
        Ok(config)
    }
}

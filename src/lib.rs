//! Parla - Voice-First Italian Conversation Coach Backend
//!
//! Backend service for a spoken Italian practice application targeting
//! PLIDA B1 readiness:
//! - Conversational coaching with personality-driven system prompts
//! - End-of-session summarization into summary + skill notes
//! - Semantic recall over embedded session digests
//! - Coarse skill-level re-estimation from recent skill notes
//! - Rubric scoring of transcripts with per-session caching
//!
//! # Architecture
//!
//! The crate is organized into a few layers:
//! - **Types**: Core data structures (User, Session, SessionScores, etc.)
//! - **Storage**: SQLite persistence behind the `CoachStore` trait
//! - **Services**: Chat, embedding and speech provider clients
//! - **Pipeline**: Summarizer, skill estimator, context retriever,
//!   scoring engine and progress narrator
//! - **API**: Axum HTTP server exposing the routes
//!
//! All collaborators are trait objects injected at construction; nothing
//! is globally initialized.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod personality;
pub mod progress;
pub mod prompts;
pub mod scoring;
pub mod services;
pub mod skill;
pub mod storage;
pub mod summarize;
pub mod types;

// Re-export commonly used types
pub use config::CoachConfig;
pub use error::{CoachError, Result};
pub use personality::{Personality, PersonalityProfile};
pub use services::{
    AnthropicChat, ChatService, EmbeddingService, OpenAiEmbeddings, OpenAiSpeech, SpeechService,
    TranscriptionService,
};
pub use storage::{sqlite::SqliteStorage, CoachStore};
pub use types::{
    ChatMessage, ChatRole, NewSession, Session, SessionEmbedding, SessionId, SessionMatch,
    SessionScores, SkillLevel, User, UserId,
};

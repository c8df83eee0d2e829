//! Provider clients for the external AI services
//!
//! Chat completion (Anthropic), embeddings and speech (OpenAI). Each is a
//! trait seam with one remote implementation; components receive them as
//! explicit dependencies so tests can substitute collaborators.

pub mod chat;
pub mod embeddings;
pub mod speech;

pub use chat::{AnthropicChat, ChatService};
pub use embeddings::{cosine_similarity, EmbeddingService, OpenAiEmbeddings, EMBEDDING_DIM};
pub use speech::{OpenAiSpeech, SpeechService, TranscriptionService};

//! Storage layer for the Parla coaching backend
//!
//! Provides the `CoachStore` abstraction over users, sessions, and the
//! derived scores/embedding artifacts. Every session artifact access is
//! scoped by `(session_id, user_id)` so one user can never read or write
//! another user's rows.

pub mod sqlite;

pub use sqlite::SqliteStorage;

use crate::error::Result;
use crate::personality::Personality;
use crate::types::{
    NewSession, Session, SessionEmbedding, SessionId, SessionMatch, SessionScores, SkillLevel,
    User, UserId,
};
use async_trait::async_trait;

/// Storage backend trait defining all required operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CoachStore: Send + Sync {
    /// Create a user at registration time
    async fn create_user(&self, email: &str, name: &str) -> Result<User>;

    /// Fetch a user by id
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Overwrite the stored skill level (skill estimator only)
    async fn update_skill_level(&self, id: UserId, level: SkillLevel) -> Result<()>;

    /// Update the TTS playback speed preference
    async fn update_tts_speed(&self, id: UserId, speed: f64) -> Result<()>;

    /// Update the selected coach personality
    async fn update_personality(&self, id: UserId, personality: Personality) -> Result<()>;

    /// Store a completed conversation
    async fn create_session(&self, session: &NewSession) -> Result<Session>;

    /// Fetch a session, scoped to its owner
    async fn get_session(&self, id: SessionId, user_id: UserId) -> Result<Option<Session>>;

    /// List a user's sessions, most recent first
    async fn recent_sessions(&self, user_id: UserId, limit: usize) -> Result<Vec<Session>>;

    /// Count a user's sessions
    async fn session_count(&self, user_id: UserId) -> Result<usize>;

    /// List a user's sessions that have no scores artifact yet
    async fn sessions_without_scores(&self, user_id: UserId, limit: usize) -> Result<Vec<Session>>;

    /// Store a session embedding; insert-if-absent, never updated in place
    async fn store_embedding(&self, embedding: &SessionEmbedding) -> Result<()>;

    /// Rank a user's stored session embeddings by similarity to the query
    ///
    /// Returns up to `limit` matches in strictly descending similarity,
    /// ties broken by ascending session id.
    async fn similar_sessions(
        &self,
        user_id: UserId,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<SessionMatch>>;

    /// Insert or overwrite the scores artifact for a session
    async fn upsert_scores(
        &self,
        session_id: SessionId,
        user_id: UserId,
        scores: &SessionScores,
    ) -> Result<()>;

    /// Fetch the scores artifact, scoped to the session owner
    async fn get_scores(&self, session_id: SessionId, user_id: UserId)
        -> Result<Option<SessionScores>>;
}

//! Conversation context assembly
//!
//! Builds the per-turn user context injected into the coach's system
//! prompt. Two tiers: a recency tier that always runs (last few sessions,
//! most recent first) and a relevance tier that semantic-searches stored
//! session embeddings. The relevance tier is best-effort: any failure is
//! logged and the turn proceeds with recency-only context.

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::services::EmbeddingService;
use crate::storage::CoachStore;
use crate::types::{ChatMessage, Session, SessionMatch, User, UserId};
use std::sync::Arc;
use tracing::{debug, warn};

/// How much of the transcript feeds into the stored embedding text
const TRANSCRIPT_EXCERPT_CHARS: usize = 500;

/// Text embedded alongside a saved session for later retrieval
///
/// Empty sections are omitted entirely rather than left as bare labels.
pub fn embedding_content(summary: &str, skill_notes: &str, transcript: &str) -> String {
    let mut parts = Vec::new();

    if !summary.is_empty() {
        parts.push(format!("Summary: {summary}"));
    }
    if !skill_notes.is_empty() {
        parts.push(format!("Skills and patterns: {skill_notes}"));
    }
    if !transcript.is_empty() {
        let excerpt: String = transcript.chars().take(TRANSCRIPT_EXCERPT_CHARS).collect();
        parts.push(format!("Discussion excerpt: {excerpt}"));
    }

    parts.join("\n\n")
}

/// Assembles recency and relevance context for a chat turn
pub struct ContextRetriever {
    embeddings: Arc<dyn EmbeddingService>,
    store: Arc<dyn CoachStore>,
    cfg: RetrievalConfig,
}

impl ContextRetriever {
    pub fn new(
        embeddings: Arc<dyn EmbeddingService>,
        store: Arc<dyn CoachStore>,
        cfg: RetrievalConfig,
    ) -> Self {
        Self {
            embeddings,
            store,
            cfg,
        }
    }

    /// Build the user-context block for one chat turn
    ///
    /// Recency-tier failures propagate; the relevance tier never fails the
    /// turn. Greeting turns skip semantic search entirely.
    pub async fn build_user_context(
        &self,
        user: &User,
        history: &[ChatMessage],
        pending: &str,
        is_greeting: bool,
    ) -> Result<String> {
        let count = self.store.session_count(user.id).await?;

        let mut context = if count == 0 {
            first_session_context()
        } else {
            let recent = self
                .store
                .recent_sessions(user.id, self.cfg.recent_window)
                .await?;
            recency_context(count, &recent)
        };

        if !is_greeting && count > 0 {
            if let Some(relevant) = self.relevance_context(user.id, history, pending).await {
                context.push_str("\n\n");
                context.push_str(&relevant);
            }
        }

        Ok(context)
    }

    /// Semantic-search tier; returns `None` on any failure or empty result
    async fn relevance_context(
        &self,
        user_id: UserId,
        history: &[ChatMessage],
        pending: &str,
    ) -> Option<String> {
        let query = self.query_text(history, pending);
        if query.is_empty() {
            return None;
        }

        let query_vec = match self.embeddings.embed(&query).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Relevance retrieval skipped, embedding failed: {e}");
                return None;
            }
        };

        let matches = match self
            .store
            .similar_sessions(user_id, &query_vec, self.cfg.relevance_limit)
            .await
        {
            Ok(m) => m,
            Err(e) => {
                warn!("Relevance retrieval skipped, search failed: {e}");
                return None;
            }
        };

        let relevant: Vec<&SessionMatch> = matches
            .iter()
            .filter(|m| m.similarity > self.cfg.relevance_threshold)
            .collect();

        if relevant.is_empty() {
            debug!("No stored session above similarity threshold");
            return None;
        }

        let lines: Vec<String> = relevant
            .iter()
            .map(|m| {
                format!(
                    "[{}] {} {}",
                    m.date.format("%b %-d"),
                    m.summary,
                    m.skill_notes
                )
                .trim()
                .to_string()
            })
            .collect();

        Some(format!("RELEVANT PAST SESSIONS:\n{}", lines.join("\n")))
    }

    /// Query string for semantic search: recent turns plus the pending message
    fn query_text(&self, history: &[ChatMessage], pending: &str) -> String {
        let start = history.len().saturating_sub(self.cfg.query_turns);
        let mut parts: Vec<&str> = history[start..]
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        if !pending.is_empty() {
            parts.push(pending);
        }
        parts.join("\n")
    }
}

fn first_session_context() -> String {
    "This is their first session. Start fresh and assess their level through conversation."
        .to_string()
}

fn recency_context(count: usize, recent: &[Session]) -> String {
    let mut lines = vec![format!("This user has completed {count} previous session(s).")];

    if !recent.is_empty() {
        lines.push("\nRecent sessions:".to_string());
        for (i, session) in recent.iter().enumerate() {
            if !session.summary.is_empty() {
                lines.push(format!("\nSession {}: {}", i + 1, session.summary));
            }
            if !session.skill_notes.is_empty() {
                lines.push(format!("Notes: {}", session.skill_notes));
            }
        }
    }

    lines.push("\nUse this context to personalize the conversation and build on previous progress.".to_string());
    lines.join("\n")
}

//! Cross-session progress narrative
//!
//! Folds a learner's session history into one encouraging-but-honest
//! progress analysis. Zero history produces a fixed message without any
//! provider call.

use crate::error::Result;
use crate::prompts;
use crate::services::ChatService;
use crate::storage::CoachStore;
use crate::types::{ChatMessage, User};
use std::sync::Arc;
use tracing::debug;

/// Output-token bound for the progress analysis
const PROGRESS_MAX_TOKENS: u32 = 1500;

/// How much history feeds the analysis
const PROGRESS_SESSION_LIMIT: usize = 50;

/// Shown when a learner has no sessions yet
pub const NO_SESSIONS_MESSAGE: &str =
    "No sessions yet. Start a conversation to begin tracking your progress!";

#[derive(Debug, PartialEq)]
pub enum ProgressOutcome {
    NoSessions,
    Narrative {
        summary: String,
        session_count: usize,
    },
}

/// Generates the progress narrative from recent session history
pub struct ProgressNarrator {
    chat: Arc<dyn ChatService>,
    store: Arc<dyn CoachStore>,
}

impl ProgressNarrator {
    pub fn new(chat: Arc<dyn ChatService>, store: Arc<dyn CoachStore>) -> Self {
        Self { chat, store }
    }

    pub async fn narrate(&self, user: &User) -> Result<ProgressOutcome> {
        let sessions = self
            .store
            .recent_sessions(user.id, PROGRESS_SESSION_LIMIT)
            .await?;

        if sessions.is_empty() {
            return Ok(ProgressOutcome::NoSessions);
        }

        debug!(
            "Generating progress narrative for user {} from {} session(s)",
            user.id,
            sessions.len()
        );

        let prompt = prompts::progress_prompt(&user.name, &sessions);
        let summary = self
            .chat
            .complete(None, &[ChatMessage::user(prompt)], PROGRESS_MAX_TOKENS)
            .await?;

        Ok(ProgressOutcome::Narrative {
            summary,
            session_count: sessions.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personality::Personality;
    use crate::services::chat::MockChatService;
    use crate::storage::MockCoachStore;
    use crate::types::{Session, SessionId, SkillLevel, UserId};
    use chrono::Utc;

    fn sample_user() -> User {
        User {
            id: UserId(3),
            email: "elena@example.com".to_string(),
            name: "Elena".to_string(),
            skill_level: SkillLevel::Intermediate,
            personality: Personality::Sofia,
            tts_speed: 0.85,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_session(id: i64) -> Session {
        Session {
            id: SessionId(id),
            user_id: UserId(3),
            date: Utc::now(),
            transcript: "t".to_string(),
            summary: format!("Session {id} summary"),
            skill_notes: "notes".to_string(),
            duration_seconds: 420,
        }
    }

    #[tokio::test]
    async fn test_no_sessions_skips_provider() {
        let mut store = MockCoachStore::new();
        store.expect_recent_sessions().returning(|_, _| Ok(vec![]));

        let mut chat = MockChatService::new();
        chat.expect_complete().times(0);

        let narrator = ProgressNarrator::new(Arc::new(chat), Arc::new(store));
        let outcome = narrator.narrate(&sample_user()).await.unwrap();
        assert_eq!(outcome, ProgressOutcome::NoSessions);
    }

    #[tokio::test]
    async fn test_narrative_includes_history_and_count() {
        let mut store = MockCoachStore::new();
        store
            .expect_recent_sessions()
            .withf(|_, limit| *limit == 50)
            .returning(|_, _| Ok(vec![sample_session(1), sample_session(2)]));

        let mut chat = MockChatService::new();
        chat.expect_complete()
            .withf(|system, messages, max_tokens| {
                system.is_none()
                    && messages[0].content.contains("Elena")
                    && messages[0].content.contains("Session 1 summary")
                    && *max_tokens == 1500
            })
            .times(1)
            .returning(|_, _, _| Ok("You are making steady progress.".to_string()));

        let narrator = ProgressNarrator::new(Arc::new(chat), Arc::new(store));
        let outcome = narrator.narrate(&sample_user()).await.unwrap();
        assert_eq!(
            outcome,
            ProgressOutcome::Narrative {
                summary: "You are making steady progress.".to_string(),
                session_count: 2,
            }
        );
    }
}

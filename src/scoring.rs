//! Session scoring against the PLIDA B1 rubric
//!
//! One transcript in, one nine-field scores artifact out. Scores are
//! cached per session: a repeat request returns the stored artifact
//! without touching the provider unless `force` is set. A malformed
//! provider response is a hard error and persists nothing.

use crate::error::{CoachError, Result};
use crate::prompts;
use crate::services::ChatService;
use crate::storage::CoachStore;
use crate::types::{ChatMessage, SessionId, SessionScores, UserId};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Output-token bound for a scoring call
const SCORE_MAX_TOKENS: u32 = 1000;

/// Result of scoring one session
#[derive(Debug, Serialize)]
pub struct ScoreOutcome {
    pub scores: SessionScores,
    pub cached: bool,
}

/// Per-session result of a backfill run
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchOutcome {
    #[serde(rename_all = "camelCase")]
    Scored {
        session_id: SessionId,
        overall_score: u8,
    },
    #[serde(rename_all = "camelCase")]
    Skipped {
        session_id: SessionId,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        session_id: SessionId,
        message: String,
    },
}

/// Summary of a backfill run
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub scored: usize,
    pub total: usize,
    pub results: Vec<BatchOutcome>,
}

/// Scores transcripts and caches the artifacts per session
pub struct ScoringEngine {
    chat: Arc<dyn ChatService>,
    store: Arc<dyn CoachStore>,
}

impl ScoringEngine {
    pub fn new(chat: Arc<dyn ChatService>, store: Arc<dyn CoachStore>) -> Self {
        Self { chat, store }
    }

    /// Score one session, serving the cached artifact unless `force`
    ///
    /// The session must exist and belong to `user_id`; an empty transcript
    /// is rejected before any provider call.
    pub async fn score_session(
        &self,
        session_id: SessionId,
        user_id: UserId,
        force: bool,
    ) -> Result<ScoreOutcome> {
        let session = self
            .store
            .get_session(session_id, user_id)
            .await?
            .ok_or_else(|| CoachError::NotFound(format!("session {session_id}")))?;

        if session.transcript.is_empty() {
            return Err(CoachError::InvalidInput(
                "session has no transcript".to_string(),
            ));
        }

        if !force {
            if let Some(existing) = self.store.get_scores(session_id, user_id).await? {
                return Ok(ScoreOutcome {
                    scores: existing,
                    cached: true,
                });
            }
        }

        let scores = self.generate_scores(&session.transcript).await?;
        self.store.upsert_scores(session_id, user_id, &scores).await?;
        info!(
            "Scored session {} (overall {})",
            session_id, scores.overall_score
        );

        Ok(ScoreOutcome {
            scores,
            cached: false,
        })
    }

    /// Score every unscored session for a user, up to `limit`
    ///
    /// One failing session never aborts the run; it is reported in the
    /// per-session results and the loop moves on.
    pub async fn score_missing(&self, user_id: UserId, limit: usize) -> Result<BatchReport> {
        let pending = self.store.sessions_without_scores(user_id, limit).await?;
        let total = pending.len();
        let mut results = Vec::with_capacity(total);

        for session in pending {
            if session.transcript.is_empty() {
                results.push(BatchOutcome::Skipped {
                    session_id: session.id,
                    reason: "no transcript".to_string(),
                });
                continue;
            }

            match self.generate_and_store(session.id, user_id, &session.transcript).await {
                Ok(scores) => results.push(BatchOutcome::Scored {
                    session_id: session.id,
                    overall_score: scores.overall_score,
                }),
                Err(e) => {
                    warn!("Failed to score session {}: {e}", session.id);
                    results.push(BatchOutcome::Error {
                        session_id: session.id,
                        message: e.to_string(),
                    });
                }
            }
        }

        let scored = results
            .iter()
            .filter(|r| matches!(r, BatchOutcome::Scored { .. }))
            .count();
        info!("Backfill for user {user_id}: scored {scored} of {total}");

        Ok(BatchReport {
            scored,
            total,
            results,
        })
    }

    async fn generate_and_store(
        &self,
        session_id: SessionId,
        user_id: UserId,
        transcript: &str,
    ) -> Result<SessionScores> {
        let scores = self.generate_scores(transcript).await?;
        self.store.upsert_scores(session_id, user_id, &scores).await?;
        Ok(scores)
    }

    /// One provider call plus strict parse and range validation
    async fn generate_scores(&self, transcript: &str) -> Result<SessionScores> {
        let prompt = prompts::scoring_prompt(transcript);
        let response = self
            .chat
            .complete(None, &[ChatMessage::user(prompt)], SCORE_MAX_TOKENS)
            .await?;

        let scores: SessionScores = serde_json::from_str(response.trim()).map_err(|e| {
            CoachError::MalformedResponse(format!("scores are not valid JSON: {e}"))
        })?;
        scores.validate()?;
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::chat::MockChatService;
    use crate::storage::MockCoachStore;
    use crate::types::Session;
    use chrono::Utc;

    fn sample_session(id: i64, transcript: &str) -> Session {
        Session {
            id: SessionId(id),
            user_id: UserId(1),
            date: Utc::now(),
            transcript: transcript.to_string(),
            summary: "s".to_string(),
            skill_notes: "n".to_string(),
            duration_seconds: 600,
        }
    }

    fn sample_scores(overall: u8) -> SessionScores {
        SessionScores {
            fluency_coherence: 3,
            vocabulary_range: 3,
            grammar_accuracy: 3,
            grammar_range: 3,
            interaction: 4,
            overall_score: overall,
            feedback: "Solid session.".to_string(),
            strengths: "connectors, turn-taking".to_string(),
            areas_to_improve: "past tenses".to_string(),
        }
    }

    fn valid_scores_json() -> String {
        serde_json::to_string(&sample_scores(3)).unwrap()
    }

    fn engine(chat: MockChatService, store: MockCoachStore) -> ScoringEngine {
        ScoringEngine::new(Arc::new(chat), Arc::new(store))
    }

    #[tokio::test]
    async fn test_missing_session_is_not_found() {
        let mut store = MockCoachStore::new();
        store.expect_get_session().returning(|_, _| Ok(None));

        let e = engine(MockChatService::new(), store);
        let err = e
            .score_session(SessionId(42), UserId(1), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CoachError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_transcript_rejected_before_provider_call() {
        let mut store = MockCoachStore::new();
        store
            .expect_get_session()
            .returning(|_, _| Ok(Some(sample_session(1, ""))));

        let mut chat = MockChatService::new();
        chat.expect_complete().times(0);

        let e = engine(chat, store);
        let err = e
            .score_session(SessionId(1), UserId(1), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CoachError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_cached_scores_short_circuit_provider() {
        let mut store = MockCoachStore::new();
        store
            .expect_get_session()
            .returning(|_, _| Ok(Some(sample_session(1, "Ciao!"))));
        store
            .expect_get_scores()
            .returning(|_, _| Ok(Some(sample_scores(4))));
        store.expect_upsert_scores().times(0);

        let mut chat = MockChatService::new();
        chat.expect_complete().times(0);

        let e = engine(chat, store);
        let outcome = e.score_session(SessionId(1), UserId(1), false).await.unwrap();
        assert!(outcome.cached);
        assert_eq!(outcome.scores.overall_score, 4);
    }

    #[tokio::test]
    async fn test_force_rescoring_bypasses_cache() {
        let mut store = MockCoachStore::new();
        store
            .expect_get_session()
            .returning(|_, _| Ok(Some(sample_session(1, "Ciao!"))));
        store.expect_get_scores().times(0);
        store
            .expect_upsert_scores()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut chat = MockChatService::new();
        chat.expect_complete()
            .times(1)
            .returning(|_, _, _| Ok(valid_scores_json()));

        let e = engine(chat, store);
        let outcome = e.score_session(SessionId(1), UserId(1), true).await.unwrap();
        assert!(!outcome.cached);
    }

    #[tokio::test]
    async fn test_scoring_prompt_carries_transcript_and_token_bound() {
        let mut store = MockCoachStore::new();
        store
            .expect_get_session()
            .returning(|_, _| Ok(Some(sample_session(1, "Vorrei un caffè"))));
        store.expect_get_scores().returning(|_, _| Ok(None));
        store.expect_upsert_scores().returning(|_, _, _| Ok(()));

        let mut chat = MockChatService::new();
        chat.expect_complete()
            .withf(|system, messages, max_tokens| {
                system.is_none()
                    && messages.len() == 1
                    && messages[0].content.contains("Vorrei un caffè")
                    && *max_tokens == 1000
            })
            .times(1)
            .returning(|_, _, _| Ok(valid_scores_json()));

        let e = engine(chat, store);
        e.score_session(SessionId(1), UserId(1), false).await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_json_persists_nothing() {
        let mut store = MockCoachStore::new();
        store
            .expect_get_session()
            .returning(|_, _| Ok(Some(sample_session(1, "Ciao!"))));
        store.expect_get_scores().returning(|_, _| Ok(None));
        store.expect_upsert_scores().times(0);

        let mut chat = MockChatService::new();
        chat.expect_complete()
            .returning(|_, _, _| Ok("Sorry, I cannot score this.".to_string()));

        let e = engine(chat, store);
        let err = e
            .score_session(SessionId(1), UserId(1), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CoachError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_axis_persists_nothing() {
        let mut store = MockCoachStore::new();
        store
            .expect_get_session()
            .returning(|_, _| Ok(Some(sample_session(1, "Ciao!"))));
        store.expect_get_scores().returning(|_, _| Ok(None));
        store.expect_upsert_scores().times(0);

        let mut chat = MockChatService::new();
        chat.expect_complete().returning(|_, _, _| {
            let mut bad = sample_scores(3);
            bad.grammar_accuracy = 9;
            Ok(serde_json::to_string(&bad).unwrap())
        });

        let e = engine(chat, store);
        let err = e
            .score_session(SessionId(1), UserId(1), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CoachError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_backfill_continues_past_failures() {
        let mut store = MockCoachStore::new();
        store.expect_sessions_without_scores().returning(|_, _| {
            Ok(vec![
                sample_session(1, ""),
                sample_session(2, "good transcript"),
                sample_session(3, "another transcript"),
            ])
        });
        store
            .expect_upsert_scores()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut chat = MockChatService::new();
        let mut calls = 0;
        chat.expect_complete().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Ok(valid_scores_json())
            } else {
                Err(CoachError::LlmApi("rate limited".to_string()))
            }
        });

        let e = engine(chat, store);
        let report = e.score_missing(UserId(1), 10).await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.scored, 1);
        assert!(matches!(report.results[0], BatchOutcome::Skipped { .. }));
        assert!(matches!(report.results[1], BatchOutcome::Scored { .. }));
        assert!(matches!(report.results[2], BatchOutcome::Error { .. }));
    }

    #[tokio::test]
    async fn test_batch_outcome_serialization_shape() {
        let outcome = BatchOutcome::Scored {
            session_id: SessionId(5),
            overall_score: 4,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "scored");
        assert_eq!(json["sessionId"], 5);
        assert_eq!(json["overallScore"], 4);
    }
}

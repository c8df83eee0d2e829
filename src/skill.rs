//! Skill-level estimation
//!
//! Aggregates the skill notes of the last few sessions into one coarse
//! level. Cold start is always beginner; any classification output that is
//! not exactly one of the three labels after normalization also collapses
//! to beginner. No smoothing is applied between runs: a new estimate may
//! raise or lower the stored level each time.

use crate::error::Result;
use crate::prompts;
use crate::services::ChatService;
use crate::storage::CoachStore;
use crate::types::{ChatMessage, SkillLevel, User};
use std::sync::Arc;
use tracing::{debug, info};

/// Output-token bound for the classification call; one word expected
const CLASSIFY_MAX_TOKENS: u32 = 20;

/// Estimates a learner's level from recent skill notes
pub struct SkillEstimator {
    chat: Arc<dyn ChatService>,
    store: Arc<dyn CoachStore>,
    /// How many recent sessions contribute skill notes
    window: usize,
}

impl SkillEstimator {
    pub fn new(chat: Arc<dyn ChatService>, store: Arc<dyn CoachStore>, window: usize) -> Self {
        Self {
            chat,
            store,
            window,
        }
    }

    /// Classify a level from skill-notes history, most recent first
    ///
    /// An empty history is beginner without any provider call. A provider
    /// failure propagates; an unrecognized label does not.
    pub async fn estimate(&self, notes_history: &[String]) -> Result<SkillLevel> {
        if notes_history.is_empty() {
            return Ok(SkillLevel::Beginner);
        }

        let combined = notes_history.join("\n");
        debug!(
            "Classifying skill level from {} note(s)",
            notes_history.len()
        );

        let prompt = prompts::classification_prompt(&combined);
        let response = self
            .chat
            .complete(None, &[ChatMessage::user(prompt)], CLASSIFY_MAX_TOKENS)
            .await?;

        Ok(SkillLevel::parse_normalized(&response).unwrap_or(SkillLevel::Beginner))
    }

    /// Re-estimate after a session save and store the level if it changed
    ///
    /// Returns the effective level. When no recent session carries skill
    /// notes there is no signal; the stored level is left untouched.
    pub async fn refresh_user_level(&self, user: &User) -> Result<SkillLevel> {
        let recent = self.store.recent_sessions(user.id, self.window).await?;
        let notes: Vec<String> = recent
            .iter()
            .filter(|s| !s.skill_notes.is_empty())
            .map(|s| s.skill_notes.clone())
            .collect();

        if notes.is_empty() {
            return Ok(user.skill_level);
        }

        let estimate = self.estimate(&notes).await?;

        // Redundant-write avoidance, not a correctness requirement
        if estimate != user.skill_level {
            info!(
                "Skill level for user {} changed: {} -> {}",
                user.id, user.skill_level, estimate
            );
            self.store.update_skill_level(user.id, estimate).await?;
        }

        Ok(estimate)
    }
}

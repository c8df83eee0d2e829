//! Core data types for the Parla coaching backend
//!
//! Defines the entities the pipeline operates on: users, sessions, the
//! derived scores and embedding artifacts, and the chat wire types. ID
//! newtypes prevent mixing user and session identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoachError, Result};
use crate::personality::Personality;

/// Unique identifier for users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for practice sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse learner level used to calibrate coaching
///
/// Mutated only by the skill estimator; every unknown or malformed
/// classification collapses to `Beginner` (the system never invents a
/// higher starting level).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
        }
    }

    /// Strict parse of a stored or classifier-produced level
    ///
    /// Trims and lowercases first; anything that is not one of the three
    /// literals afterwards (extra words, hallucinated labels) is `None`.
    pub fn parse_normalized(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Some(SkillLevel::Beginner),
            "intermediate" => Some(SkillLevel::Intermediate),
            "advanced" => Some(SkillLevel::Advanced),
            _ => None,
        }
    }
}

impl std::fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered learner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub skill_level: SkillLevel,
    pub personality: Personality,
    pub tts_speed: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One completed conversation, immutable once created
///
/// Derived artifacts (scores, embedding) are keyed by `id` and stored
/// separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub date: DateTime<Utc>,
    pub transcript: String,
    pub summary: String,
    pub skill_notes: String,
    pub duration_seconds: i64,
}

/// Input for creating a session row at end-of-conversation
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: UserId,
    pub transcript: String,
    pub summary: String,
    pub skill_notes: String,
    pub duration_seconds: i64,
}

/// Five-axis rubric assessment of one transcript
///
/// Wire names are camelCase because the scoring prompt demands that exact
/// JSON shape from the provider and the HTTP API exposes the same fields.
/// Every field is mandatory: a response missing any of the nine fails to
/// deserialize, which is the required hard error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionScores {
    pub fluency_coherence: u8,
    pub vocabulary_range: u8,
    pub grammar_accuracy: u8,
    pub grammar_range: u8,
    pub interaction: u8,
    pub overall_score: u8,
    pub feedback: String,
    pub strengths: String,
    pub areas_to_improve: String,
}

impl SessionScores {
    /// Check every integer axis is within the 1-5 rubric scale
    pub fn validate(&self) -> Result<()> {
        let axes = [
            ("fluencyCoherence", self.fluency_coherence),
            ("vocabularyRange", self.vocabulary_range),
            ("grammarAccuracy", self.grammar_accuracy),
            ("grammarRange", self.grammar_range),
            ("interaction", self.interaction),
            ("overallScore", self.overall_score),
        ];

        for (name, value) in axes {
            if !(1..=5).contains(&value) {
                return Err(CoachError::MalformedResponse(format!(
                    "score field {} out of range: {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

/// Derived embedding artifact, one-to-one with a session
///
/// Best effort: absence is valid and never blocks any other operation.
#[derive(Debug, Clone)]
pub struct SessionEmbedding {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub embedding: Vec<f32>,
    /// Truncated textual digest of what was embedded, kept for reference
    pub content: String,
}

/// One similarity-ranked candidate from the embedding search
#[derive(Debug, Clone)]
pub struct SessionMatch {
    pub session_id: SessionId,
    pub date: DateTime<Utc>,
    pub summary: String,
    pub skill_notes: String,
    /// Similarity in [0,1], higher = more similar (1 - cosine distance)
    pub similarity: f32,
}

/// Speaker role in a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One conversation turn as exchanged with the chat provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// The ten discrete TTS playback speeds, slow to slightly fast
pub const TTS_SPEED_OPTIONS: [f64; 10] = [0.5, 0.6, 0.7, 0.8, 0.85, 0.9, 1.0, 1.1, 1.2, 1.3];

/// Default playback speed, slightly slowed for language learning
pub const DEFAULT_TTS_SPEED: f64 = 0.85;

/// Check a requested TTS speed against the discrete allowed steps
pub fn is_valid_tts_speed(speed: f64) -> bool {
    TTS_SPEED_OPTIONS.iter().any(|&s| (s - speed).abs() < 1e-9)
}

//! Post-session summarization
//!
//! One generation call turns a transcript into a short summary plus skill
//! notes, split on labeled markers. Parsing yields a tagged outcome so a
//! marker-less response is observable rather than a pair of silently empty
//! strings; the save flow degrades it to empty fields, while a provider
//! failure propagates so the transcript is never silently lost.

use crate::error::{CoachError, Result};
use crate::prompts;
use crate::services::ChatService;
use crate::types::ChatMessage;
use std::sync::Arc;
use tracing::{debug, warn};

const SUMMARY_MARKER: &str = "SUMMARY:";
const SKILL_NOTES_MARKER: &str = "SKILL NOTES:";

/// Output-token bound for the summarization call
const SUMMARY_MAX_TOKENS: u32 = 500;

/// Result of parsing the labeled summarization response
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryOutcome {
    /// Response carried the expected markers
    Parsed { summary: String, skill_notes: String },
    /// Response had no recognizable markers; kept verbatim for logging
    Unparsed { raw: String },
}

impl SummaryOutcome {
    /// Split a generated response on the section markers
    pub fn parse(text: &str) -> Self {
        if !text.contains(SUMMARY_MARKER) {
            return SummaryOutcome::Unparsed {
                raw: text.to_string(),
            };
        }

        let (summary_part, notes_part) = match text.split_once(SKILL_NOTES_MARKER) {
            Some((before, after)) => (before, after.trim()),
            None => (text, ""),
        };

        let summary = summary_part.replace(SUMMARY_MARKER, "").trim().to_string();

        SummaryOutcome::Parsed {
            summary,
            skill_notes: notes_part.to_string(),
        }
    }

    /// Collapse into (summary, skill_notes); an unparsed response degrades
    /// to empty fields, which the save flow tolerates
    pub fn into_fields(self) -> (String, String) {
        match self {
            SummaryOutcome::Parsed {
                summary,
                skill_notes,
            } => (summary, skill_notes),
            SummaryOutcome::Unparsed { raw } => {
                warn!(
                    "Summarization response had no section markers ({} chars), saving empty fields",
                    raw.len()
                );
                (String::new(), String::new())
            }
        }
    }
}

/// Turns transcripts into summaries and skill notes
pub struct SessionSummarizer {
    chat: Arc<dyn ChatService>,
}

impl SessionSummarizer {
    pub fn new(chat: Arc<dyn ChatService>) -> Self {
        Self { chat }
    }

    /// Summarize one completed session transcript
    pub async fn summarize(&self, transcript: &str, user_name: &str) -> Result<SummaryOutcome> {
        if transcript.trim().is_empty() {
            return Err(CoachError::InvalidInput(
                "No transcript provided".to_string(),
            ));
        }

        debug!("Summarizing session transcript ({} chars)", transcript.len());

        let prompt = prompts::summary_prompt(transcript, user_name);
        let response = self
            .chat
            .complete(None, &[ChatMessage::user(prompt)], SUMMARY_MAX_TOKENS)
            .await?;

        Ok(SummaryOutcome::parse(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::chat::MockChatService;

    #[test]
    fn test_parse_both_sections() {
        let text = "SUMMARY: Talked about food and travel.\n\nSKILL NOTES: Strong present tense, struggles with passato prossimo.";
        assert_eq!(
            SummaryOutcome::parse(text),
            SummaryOutcome::Parsed {
                summary: "Talked about food and travel.".to_string(),
                skill_notes: "Strong present tense, struggles with passato prossimo.".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_missing_notes_marker() {
        let text = "SUMMARY: Talked about food.";
        assert_eq!(
            SummaryOutcome::parse(text),
            SummaryOutcome::Parsed {
                summary: "Talked about food.".to_string(),
                skill_notes: String::new(),
            }
        );
    }

    #[test]
    fn test_parse_markerless_response() {
        let text = "The learner discussed food. They did well.";
        let outcome = SummaryOutcome::parse(text);
        assert_eq!(
            outcome,
            SummaryOutcome::Unparsed {
                raw: text.to_string()
            }
        );
        // Degrades to empty fields rather than failing the save
        assert_eq!(outcome.into_fields(), (String::new(), String::new()));
    }

    #[tokio::test]
    async fn test_summarize_uses_one_generation_call() {
        let mut chat = MockChatService::new();
        chat.expect_complete()
            .withf(|system, messages, max_tokens| {
                system.is_none()
                    && messages.len() == 1
                    && messages[0].content.contains("TRANSCRIPT:")
                    && *max_tokens == SUMMARY_MAX_TOKENS
            })
            .times(1)
            .returning(|_, _, _| {
                Ok("SUMMARY: Pasta talk.\n\nSKILL NOTES: Beginner level.".to_string())
            });

        let summarizer = SessionSummarizer::new(Arc::new(chat));
        let outcome = summarizer
            .summarize("Coach: Ciao!\nLearner: Mangio pasta.", "Anna")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SummaryOutcome::Parsed {
                summary: "Pasta talk.".to_string(),
                skill_notes: "Beginner level.".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_empty_transcript_rejected_without_call() {
        let chat = MockChatService::new(); // no expectations: any call panics

        let summarizer = SessionSummarizer::new(Arc::new(chat));
        let result = summarizer.summarize("   ", "Anna").await;
        assert!(matches!(result, Err(CoachError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let mut chat = MockChatService::new();
        chat.expect_complete()
            .returning(|_, _, _| Err(CoachError::LlmApi("boom".to_string())));

        let summarizer = SessionSummarizer::new(Arc::new(chat));
        let result = summarizer.summarize("Coach: Ciao!", "Anna").await;
        assert!(matches!(result, Err(CoachError::LlmApi(_))));
    }
}

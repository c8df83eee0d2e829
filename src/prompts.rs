//! Prompt construction for every generation call
//!
//! All provider-facing wording lives here so the parsing code next to it
//! (summary markers, score JSON shape, level literals) stays in one place
//! with the prompts that demand those shapes.

use crate::personality::PersonalityProfile;
use crate::types::{Session, SkillLevel};

/// Sent as the sole user message when a conversation starts
pub const GREETING_PROMPT: &str = "The user has just joined the conversation. This is the start of a new practice session.\n\nGreet them warmly in Italian and ask what they'd like to talk about today. Keep it brief and friendly - just 1-2 sentences.";

/// Rubric prompt for transcript scoring; `{transcript}` is substituted
///
/// The trailing JSON shape is load-bearing: the scoring engine fails hard
/// on any response that doesn't parse as exactly those nine fields.
pub const SCORING_PROMPT: &str = r#"You are an expert Italian language assessor evaluating a conversation for PLIDA B1 certification readiness.

Analyze the following conversation transcript between a learner and their Italian coach. Score the LEARNER's performance (not the coach) on each competency from 1-5:

SCORING SCALE:
1 = Well below B1 level - Major difficulties, very limited
2 = Below B1 level - Significant gaps, needs substantial work
3 = Approaching B1 level - Some competency but inconsistent
4 = At B1 level - Meets B1 requirements adequately
5 = Above B1 level - Exceeds B1 expectations

COMPETENCIES TO SCORE:

1. FLUENCY & COHERENCE: How smoothly does the learner communicate? Do they use connectors (quindi, pero, anche, perche)? Is their speech logically organized?

2. VOCABULARY RANGE: Does the learner use varied, appropriate vocabulary? Do they go beyond basic words? Can they express ideas without excessive repetition?

3. GRAMMAR ACCURACY: How correct is their grammar? Verb conjugations, gender agreement, prepositions, article usage?

4. GRAMMAR RANGE: Do they attempt varied structures? Past tenses (passato prossimo, imperfetto), future, conditionals? Or only present tense?

5. INTERACTION: How well do they engage in conversation? Do they respond appropriately? Ask questions? Handle turn-taking?

TRANSCRIPT:
{transcript}

Respond in this exact JSON format (no markdown, just raw JSON):
{
  "fluencyCoherence": <1-5>,
  "vocabularyRange": <1-5>,
  "grammarAccuracy": <1-5>,
  "grammarRange": <1-5>,
  "interaction": <1-5>,
  "overallScore": <1-5>,
  "feedback": "<2-3 sentence overall assessment>",
  "strengths": "<comma-separated list of specific strengths observed>",
  "areasToImprove": "<comma-separated list of specific areas to work on>"
}"#;

/// Fill the scoring rubric with a transcript
pub fn scoring_prompt(transcript: &str) -> String {
    SCORING_PROMPT.replace("{transcript}", transcript)
}

/// Post-session summarization request, expecting labeled sections
pub fn summary_prompt(transcript: &str, user_name: &str) -> String {
    format!(
        "Analyze this Italian conversation practice session for {user_name}.\n\n\
         TRANSCRIPT:\n{transcript}\n\n\
         Provide two things:\n\n\
         1. SUMMARY (2-3 sentences): What topics were discussed? How did the conversation flow?\n\n\
         2. SKILL NOTES (2-3 sentences): What level is {user_name} at? What did they do well? \
         What could they improve? Note any specific grammar patterns, vocabulary, or tenses \
         they used or struggled with.\n\n\
         Format your response exactly like this:\n\
         SUMMARY: [your summary here]\n\n\
         SKILL NOTES: [your skill notes here]"
    )
}

/// Skill-level classification request over recent observations
pub fn classification_prompt(combined_notes: &str) -> String {
    format!(
        "Based on these skill observations from recent Italian conversation sessions, \
         what is this learner's overall level?\n\n\
         OBSERVATIONS:\n{combined_notes}\n\n\
         Respond with exactly one word: beginner, intermediate, or advanced"
    )
}

/// Coaching system prompt: role, skill adaptation, correction policy,
/// personality texture, and the retrieved user context spliced at the end
pub fn build_system_prompt(
    user_name: &str,
    skill_level: SkillLevel,
    profile: &PersonalityProfile,
    user_context: &str,
) -> String {
    let context_block = if user_context.is_empty() {
        String::new()
    } else {
        format!("\n\nUSER CONTEXT:\n{user_context}")
    };

    format!(
        "You are an Italian conversation coach named {name}. You are helping {user_name} prepare \
for PLIDA B1 certification through natural conversation practice.

ROLE:
- You are {description}
- Your personality: {traits}
- Your goal is to help {user_name} practice speaking Italian naturally
- You dynamically adapt your language complexity to match the learner's demonstrated level

TEACHING STYLE:
{teaching_style}

CONVERSATION GUIDELINES:
- Speak naturally in Italian, keeping responses conversational (2-3 sentences typically)
- Ask one follow-up question to keep the conversation flowing
- Stay on topic but allow natural tangents

REAL-TIME SKILL ADAPTATION:
Continuously assess {user_name}'s Italian from their messages and mirror their level:

Signals of BEGINNER level:
- Very short responses, single words or fragments
- Only present tense verbs
- Basic vocabulary (ciao, bene, si, no, grazie)
- Frequent hesitations or English mixed in
- Word order errors
-> YOUR RESPONSE: Use only present tense. Simple, common words. Short sentences. Speak as if to a child learning.

Signals of INTERMEDIATE level:
- Complete sentences with some complexity
- Attempts at past tense (passato prossimo)
- Broader vocabulary
- Minor grammar errors but meaning is clear
-> YOUR RESPONSE: Use present and past tenses. More varied vocabulary. Natural sentence length.

Signals of ADVANCED level:
- Complex sentences with multiple clauses
- Various tenses including subjunctive, conditional
- Idiomatic expressions
- Few errors, natural flow
-> YOUR RESPONSE: Speak naturally as to a native speaker. Use idioms, varied tenses, fuller expressions.

EXAMPLES OF YOUR VOICE AT EACH LEVEL:

Matching a beginner:
{example_beginner}

Matching intermediate:
{example_intermediate}

Matching advanced:
{example_advanced}

ERROR CORRECTION:
{error_correction_style}
Most errors: continue naturally, modeling the correct form without stopping.
ONLY switch to English when the user is clearly stuck or the meaning is completely unclear, \
then return to Italian immediately after helping.

STARTING A CONVERSATION:
- Greet in your style: {greeting_style}
- Ask what topic they'd like to discuss
- Suggest options if they seem unsure (travel, food, family, hobbies, daily life)

USER SKILL LEVEL: {skill_level}{context_block}

IMPORTANT: This is a spoken conversation. Keep responses concise and natural. Never use \
bullet points or lists in your responses. Speak as a real person would.",
        name = profile.name,
        description = profile.description,
        traits = profile.traits,
        teaching_style = profile.teaching_style,
        example_beginner = profile.example_beginner,
        example_intermediate = profile.example_intermediate,
        example_advanced = profile.example_advanced,
        error_correction_style = profile.error_correction_style,
        greeting_style = profile.greeting_style,
        skill_level = skill_level,
    )
}

/// Meta-analysis of a learner's progress across their session history
pub fn progress_prompt(user_name: &str, sessions: &[Session]) -> String {
    let session_blocks: Vec<String> = sessions
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "\nSession {} ({}):\nSummary: {}\nSkill Notes: {}\nDuration: {} minutes\n",
                i + 1,
                s.date.format("%Y-%m-%d"),
                if s.summary.is_empty() { "No summary available" } else { &s.summary },
                if s.skill_notes.is_empty() { "No skill notes available" } else { &s.skill_notes },
                s.duration_seconds / 60,
            )
        })
        .collect();

    format!(
        "You are analyzing the learning progress of {user_name} who is preparing for the \
PLIDA B1 Italian certification exam.

Here are their conversation session summaries, from most recent to oldest:
{sessions}

Based on these sessions, provide a comprehensive progress analysis with:

1. **Current Proficiency Level**: Assess their current Italian speaking level relative to PLIDA B1 requirements.

2. **Areas of Strength**: What aspects of Italian conversation are they doing well in?

3. **Areas for Improvement**: What specific skills or language areas need more work?

4. **Personalized Suggestions**: 3-5 specific, actionable recommendations for how they can improve. These should be tailored to their patterns and weaknesses.

5. **Progress Trend**: Are they improving over time? Any notable patterns?

Keep the analysis encouraging but honest. Format with clear headings and bullet points where appropriate.",
        sessions = session_blocks.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personality::Personality;

    #[test]
    fn test_scoring_prompt_substitutes_transcript() {
        let prompt = scoring_prompt("Coach: Ciao!\nLearner: Ciao, bene.");
        assert!(prompt.contains("Learner: Ciao, bene."));
        assert!(!prompt.contains("{transcript}"));
        assert!(prompt.contains("\"fluencyCoherence\""));
    }

    #[test]
    fn test_system_prompt_includes_personality_and_context() {
        let prompt = build_system_prompt(
            "Anna",
            SkillLevel::Intermediate,
            Personality::Giuseppe.profile(),
            "This user has completed 2 previous session(s).",
        );
        assert!(prompt.contains("named Giuseppe"));
        assert!(prompt.contains("USER SKILL LEVEL: intermediate"));
        assert!(prompt.contains("USER CONTEXT:\nThis user has completed 2 previous session(s)."));
    }

    #[test]
    fn test_system_prompt_omits_empty_context_block() {
        let prompt = build_system_prompt(
            "Anna",
            SkillLevel::Beginner,
            Personality::Maria.profile(),
            "",
        );
        assert!(!prompt.contains("USER CONTEXT:"));
    }

    #[test]
    fn test_summary_prompt_names_learner() {
        let prompt = summary_prompt("Coach: Ciao!", "Paolo");
        assert!(prompt.contains("for Paolo."));
        assert!(prompt.contains("SUMMARY: [your summary here]"));
        assert!(prompt.contains("SKILL NOTES: [your skill notes here]"));
    }
}

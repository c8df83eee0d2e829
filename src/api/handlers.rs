//! Route handlers
//!
//! Every route except `/health` authenticates first: bearer token or
//! session cookie, verified before any provider or database work beyond
//! the user lookup itself.

use super::server::AppState;
use crate::context::embedding_content;
use crate::error::{CoachError, Result};
use crate::personality::Personality;
use crate::progress::{ProgressOutcome, NO_SESSIONS_MESSAGE};
use crate::prompts::{self, GREETING_PROMPT};
use crate::types::{
    is_valid_tts_speed, ChatMessage, NewSession, SessionEmbedding, SessionId, UserId,
    TTS_SPEED_OPTIONS,
};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

/// Output-token bound for a conversational turn
const CHAT_MAX_TOKENS: u32 = 1024;

/// How many sessions the history endpoints return
const SESSION_LIST_LIMIT: usize = 50;

/// Default batch size for score backfill
const BACKFILL_DEFAULT_LIMIT: usize = 10;

/// How much of the embedded text is kept as a stored digest
const EMBEDDING_CONTENT_DIGEST_CHARS: usize = 500;

/// Language hint passed to transcription
const TRANSCRIPTION_LANGUAGE: &str = "it";

const SESSION_COOKIE: &str = "parla_session";

fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        if let Some(token) = value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
            return Some(token.to_string());
        }
    }
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .find_map(|pair| pair.trim().strip_prefix(&format!("{SESSION_COOKIE}=")).map(String::from))
}

/// Resolve the calling user or fail with 401 before any other work
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<crate::types::User> {
    let token = session_token(headers)
        .ok_or_else(|| CoachError::Unauthorized("missing session token".to_string()))?;
    let user_id = state.auth.verify(&token)?;
    state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| CoachError::NotFound(format!("user {user_id}")))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    history: Vec<ChatMessage>,
    #[serde(default)]
    is_greeting: bool,
}

pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Value>> {
    let user = authenticate(&state, &headers).await?;

    let context = state
        .retriever
        .build_user_context(&user, &req.history, &req.message, req.is_greeting)
        .await?;
    let system = prompts::build_system_prompt(
        &user.name,
        user.skill_level,
        user.personality.profile(),
        &context,
    );

    let messages: Vec<ChatMessage> = if req.is_greeting {
        vec![ChatMessage::user(GREETING_PROMPT)]
    } else {
        let mut m = req.history;
        m.push(ChatMessage::user(req.message));
        m
    };

    let reply = state
        .chat
        .complete(Some(system.as_str()), &messages, CHAT_MAX_TOKENS)
        .await?;

    Ok(Json(json!({ "reply": reply })))
}

#[derive(Debug, Deserialize)]
pub struct SaveSessionRequest {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    duration_seconds: i64,
}

/// End-of-conversation save: summarize, persist, embed, re-estimate
///
/// Summarization must succeed before anything is written. Embedding is
/// best-effort and never fails the save.
pub async fn save_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SaveSessionRequest>,
) -> Result<Json<Value>> {
    let user = authenticate(&state, &headers).await?;

    let outcome = state
        .summarizer
        .summarize(&req.transcript, &user.name)
        .await?;
    let (summary, skill_notes) = outcome.into_fields();

    let session = state
        .store
        .create_session(&NewSession {
            user_id: user.id,
            transcript: req.transcript.clone(),
            summary: summary.clone(),
            skill_notes: skill_notes.clone(),
            duration_seconds: req.duration_seconds,
        })
        .await?;
    info!("Saved session {} for user {}", session.id, user.id);

    embed_session(&state, session.id, user.id, &summary, &skill_notes, &req.transcript).await;

    if !skill_notes.is_empty() {
        state.estimator.refresh_user_level(&user).await?;
    }

    Ok(Json(json!({
        "session": session,
        "summary": summary,
        "skill_notes": skill_notes,
    })))
}

/// Best-effort embedding of a freshly saved session
async fn embed_session(
    state: &AppState,
    session_id: SessionId,
    user_id: UserId,
    summary: &str,
    skill_notes: &str,
    transcript: &str,
) {
    let content = embedding_content(summary, skill_notes, transcript);
    if content.is_empty() {
        return;
    }

    let embedding = match state.embeddings.embed(&content).await {
        Ok(v) => v,
        Err(e) => {
            warn!("Skipping embedding for session {session_id}: {e}");
            return;
        }
    };

    let record = SessionEmbedding {
        session_id,
        user_id,
        embedding,
        content: content.chars().take(EMBEDDING_CONTENT_DIGEST_CHARS).collect(),
    };
    if let Err(e) = state.store.store_embedding(&record).await {
        warn!("Failed to store embedding for session {session_id}: {e}");
    }
}

pub async fn list_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let user = authenticate(&state, &headers).await?;
    let sessions = state.store.recent_sessions(user.id, SESSION_LIST_LIMIT).await?;
    Ok(Json(json!({ "sessions": sessions })))
}

pub async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let user = authenticate(&state, &headers).await?;
    let session = state
        .store
        .get_session(SessionId(id), user.id)
        .await?
        .ok_or_else(|| CoachError::NotFound(format!("session {id}")))?;
    Ok(Json(json!({ "session": session })))
}

pub async fn get_scores(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let user = authenticate(&state, &headers).await?;
    let scores = state
        .store
        .get_scores(SessionId(id), user.id)
        .await?
        .ok_or_else(|| CoachError::NotFound(format!("scores for session {id}")))?;
    Ok(Json(json!({ "scores": scores })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ScoreRequest {
    #[serde(default)]
    force: bool,
}

pub async fn score_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    body: Option<Json<ScoreRequest>>,
) -> Result<Json<Value>> {
    let user = authenticate(&state, &headers).await?;
    let force = body.map(|Json(b)| b.force).unwrap_or(false);

    let outcome = state.scoring.score_session(SessionId(id), user.id, force).await?;
    Ok(Json(json!({
        "scores": outcome.scores,
        "cached": outcome.cached,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct BackfillRequest {
    limit: Option<usize>,
}

pub async fn backfill_scores(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<BackfillRequest>>,
) -> Result<Json<Value>> {
    let user = authenticate(&state, &headers).await?;
    let limit = body
        .and_then(|Json(b)| b.limit)
        .unwrap_or(BACKFILL_DEFAULT_LIMIT);

    let report = state.scoring.score_missing(user.id, limit).await?;
    let message = if report.total == 0 {
        "All sessions already have scores".to_string()
    } else {
        format!("Scored {} of {} sessions", report.scored, report.total)
    };

    Ok(Json(json!({
        "message": message,
        "scored": report.scored,
        "total": report.total,
        "results": report.results,
    })))
}

pub async fn progress_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let user = authenticate(&state, &headers).await?;
    match state.progress.narrate(&user).await? {
        ProgressOutcome::NoSessions => Ok(Json(json!({
            "summary": null,
            "message": NO_SESSIONS_MESSAGE,
        }))),
        ProgressOutcome::Narrative {
            summary,
            session_count,
        } => Ok(Json(json!({
            "summary": summary,
            "session_count": session_count,
        }))),
    }
}

pub async fn transcribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    authenticate(&state, &headers).await?;

    let mut audio: Option<(Vec<u8>, String)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CoachError::InvalidInput(format!("bad multipart body: {e}")))?
    {
        if field.name() == Some("audio") {
            let filename = field.file_name().unwrap_or("audio.webm").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| CoachError::InvalidInput(format!("bad audio field: {e}")))?;
            audio = Some((bytes.to_vec(), filename));
        }
    }

    let (bytes, filename) =
        audio.ok_or_else(|| CoachError::InvalidInput("no audio file provided".to_string()))?;
    let text = state
        .transcription
        .transcribe(bytes, filename, TRANSCRIPTION_LANGUAGE)
        .await?;
    Ok(Json(json!({ "text": text })))
}

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    #[serde(default)]
    text: String,
}

/// Synthesize coach speech with the user's personality voice and pace
pub async fn speak(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SpeakRequest>,
) -> Result<Response> {
    let user = authenticate(&state, &headers).await?;

    if req.text.is_empty() {
        return Err(CoachError::InvalidInput("no text provided".to_string()));
    }

    let voice = user.personality.profile().voice;
    let audio = state.speech.synthesize(&req.text, voice, user.tts_speed).await?;

    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}

pub async fn get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let user = authenticate(&state, &headers).await?;
    Ok(Json(json!({
        "tts_speed": user.tts_speed,
        "tts_speed_options": TTS_SPEED_OPTIONS,
        "personality": user.personality,
        "skill_level": user.skill_level,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    tts_speed: Option<f64>,
    personality: Option<String>,
}

pub async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<Value>> {
    let user = authenticate(&state, &headers).await?;

    if let Some(speed) = req.tts_speed {
        if !is_valid_tts_speed(speed) {
            return Err(CoachError::InvalidInput("invalid speed setting".to_string()));
        }
        state.store.update_tts_speed(user.id, speed).await?;
    }

    if let Some(name) = &req.personality {
        let personality = Personality::ALL
            .into_iter()
            .find(|p| p.as_str() == name.trim().to_lowercase())
            .ok_or_else(|| CoachError::InvalidInput("unknown personality".to_string()))?;
        state.store.update_personality(user.id, personality).await?;
    }

    let updated = state
        .store
        .get_user(user.id)
        .await?
        .ok_or_else(|| CoachError::NotFound(format!("user {}", user.id)))?;

    Ok(Json(json!({
        "success": true,
        "tts_speed": updated.tts_speed,
        "personality": updated.personality,
    })))
}

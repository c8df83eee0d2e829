//! Axum server wiring

use super::handlers;
use crate::auth::SessionAuthenticator;
use crate::context::ContextRetriever;
use crate::progress::ProgressNarrator;
use crate::scoring::ScoringEngine;
use crate::services::{ChatService, EmbeddingService, SpeechService, TranscriptionService};
use crate::skill::SkillEstimator;
use crate::storage::CoachStore;
use crate::summarize::SessionSummarizer;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server address
    pub addr: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            addr: ([127, 0, 0, 1], 8080).into(),
        }
    }
}

/// Shared handler state; every collaborator sits behind a trait object
/// so handler tests can substitute mocks
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CoachStore>,
    pub chat: Arc<dyn ChatService>,
    pub embeddings: Arc<dyn EmbeddingService>,
    pub transcription: Arc<dyn TranscriptionService>,
    pub speech: Arc<dyn SpeechService>,
    pub auth: Arc<dyn SessionAuthenticator>,
    pub summarizer: Arc<SessionSummarizer>,
    pub estimator: Arc<SkillEstimator>,
    pub retriever: Arc<ContextRetriever>,
    pub scoring: Arc<ScoringEngine>,
    pub progress: Arc<ProgressNarrator>,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        // Conversation
        .route("/api/chat", post(handlers::chat))
        // Session lifecycle
        .route("/api/session", post(handlers::save_session))
        .route("/api/sessions", get(handlers::list_sessions))
        .route("/api/sessions/summary", get(handlers::progress_summary))
        .route("/api/sessions/backfill-scores", post(handlers::backfill_scores))
        .route("/api/sessions/:id", get(handlers::get_session))
        .route(
            "/api/sessions/:id/score",
            get(handlers::get_scores).post(handlers::score_session),
        )
        // Speech
        .route("/api/transcribe", post(handlers::transcribe))
        .route("/api/speak", post(handlers::speak))
        // Settings
        .route(
            "/api/settings",
            get(handlers::get_settings).put(handlers::update_settings),
        )
        // Health check
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let router = router(self.state);
        let listener = tokio::net::TcpListener::bind(self.config.addr).await?;
        info!("API server listening on http://{}", self.config.addr);
        axum::serve(listener, router).await?;
        Ok(())
    }
}

//! Parla server binary
//!
//! Wires configuration, storage, provider clients and the pipeline
//! components together and runs the HTTP API.

use clap::{Parser, Subcommand};
use parla::api::{ApiServer, ApiServerConfig, AppState};
use parla::auth::HmacTokenAuthenticator;
use parla::config::CoachConfig;
use parla::context::ContextRetriever;
use parla::progress::ProgressNarrator;
use parla::scoring::ScoringEngine;
use parla::services::{
    AnthropicChat, ChatService, EmbeddingService, OpenAiEmbeddings, OpenAiSpeech, SpeechService,
    TranscriptionService,
};
use parla::skill::SkillEstimator;
use parla::storage::{sqlite::SqliteStorage, CoachStore};
use parla::summarize::SessionSummarizer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "parla", about = "Italian conversation coach backend", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API server
    Serve {
        /// Bind address, overrides configuration
        #[arg(long)]
        addr: Option<SocketAddr>,
        /// Database URL, overrides configuration
        #[arg(long, env = "DATABASE_URL")]
        database: Option<String>,
        /// Path to a configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("parla=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            addr,
            database,
            config,
        } => serve(addr, database, config).await,
    }
}

async fn serve(
    addr: Option<SocketAddr>,
    database: Option<String>,
    config_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = CoachConfig::load(config_path.as_deref())?;
    if let Some(url) = database {
        config.database.url = url;
    }
    if let Some(addr) = addr {
        config.server.addr = addr.to_string();
    }

    let storage = SqliteStorage::new(&config.database.url).await?;
    storage.run_migrations().await?;
    info!("Database ready at {}", config.database.url);

    let store: Arc<dyn CoachStore> = Arc::new(storage);
    let chat: Arc<dyn ChatService> = Arc::new(AnthropicChat::new(
        config.providers.anthropic_api_key.clone(),
        config.providers.chat_model.clone(),
    )?);
    let embeddings: Arc<dyn EmbeddingService> = Arc::new(OpenAiEmbeddings::new(
        config.providers.openai_api_key.clone(),
        config.providers.embedding_model.clone(),
        config.providers.embedding_dimensions,
    )?);
    let speech = Arc::new(OpenAiSpeech::new(
        config.providers.openai_api_key.clone(),
        config.providers.transcription_model.clone(),
        config.providers.tts_model.clone(),
    )?);
    let auth = Arc::new(HmacTokenAuthenticator::new(&config.auth.token_secret)?);

    let state = AppState {
        store: store.clone(),
        chat: chat.clone(),
        embeddings: embeddings.clone(),
        transcription: speech.clone() as Arc<dyn TranscriptionService>,
        speech: speech as Arc<dyn SpeechService>,
        auth,
        summarizer: Arc::new(SessionSummarizer::new(chat.clone())),
        estimator: Arc::new(SkillEstimator::new(
            chat.clone(),
            store.clone(),
            config.retrieval.recent_window,
        )),
        retriever: Arc::new(ContextRetriever::new(
            embeddings,
            store.clone(),
            config.retrieval.clone(),
        )),
        scoring: Arc::new(ScoringEngine::new(chat.clone(), store.clone())),
        progress: Arc::new(ProgressNarrator::new(chat, store)),
    };

    let server_config = ApiServerConfig {
        addr: config.server.addr.parse()?,
    };
    ApiServer::new(server_config, state).serve().await
}

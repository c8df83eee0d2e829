//! SQLite storage backend implementation
//!
//! Persistent storage using sqlx with embedded migrations. Embeddings are
//! stored as little-endian f32 BLOBs next to their session id; similarity
//! ranking fetches the owner's vectors and scores them in process, which
//! is cheap at per-user session counts and avoids a native extension.

use crate::error::{CoachError, Result};
use crate::personality::Personality;
use crate::services::cosine_similarity;
use crate::storage::CoachStore;
use crate::types::{
    NewSession, Session, SessionEmbedding, SessionId, SessionMatch, SessionScores, SkillLevel,
    User, UserId, DEFAULT_TTS_SPEED,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{ConnectOptions, Row};
use std::cmp::Ordering;
use std::str::FromStr;
use tracing::{debug, info};

/// SQLite storage backend
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage backend
    ///
    /// # Arguments
    /// * `database_url` - sqlx connection URL (e.g. "sqlite://parla.db")
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Connecting to SQLite database: {}", database_url);

        let mut options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(30));

        // Per-query logging is too verbose
        options = options.disable_statement_logging();

        // Each pooled connection to ":memory:" would open its own empty
        // database, so in-memory URLs get a single-connection pool.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await?
        } else {
            SqlitePool::connect_with(options).await?
        };

        info!("SQLite connection established");

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        sqlx::migrate!("./migrations/sqlite").run(&self.pool).await?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Serialize f32 vector to bytes
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize bytes to f32 vector
    fn deserialize_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
        if bytes.len() % 4 != 0 {
            return Err(CoachError::Other(
                "Invalid embedding byte length".to_string(),
            ));
        }

        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().expect("chunks_exact yields 4 bytes");
                f32::from_le_bytes(arr)
            })
            .collect())
    }

    fn row_to_user(row: &SqliteRow) -> Result<User> {
        let skill_str: String = row.try_get("skill_level")?;
        let personality_str: String = row.try_get("personality")?;

        Ok(User {
            id: UserId(row.try_get("id")?),
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            skill_level: SkillLevel::parse_normalized(&skill_str).unwrap_or_default(),
            personality: Personality::parse_or_default(&personality_str),
            tts_speed: row.try_get("tts_speed")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_session(row: &SqliteRow) -> Result<Session> {
        Ok(Session {
            id: SessionId(row.try_get("id")?),
            user_id: UserId(row.try_get("user_id")?),
            date: row.try_get("date")?,
            transcript: row.try_get("transcript")?,
            summary: row.try_get("summary")?,
            skill_notes: row.try_get("skill_notes")?,
            duration_seconds: row.try_get("duration_seconds")?,
        })
    }

    fn row_to_scores(row: &SqliteRow) -> Result<SessionScores> {
        Ok(SessionScores {
            fluency_coherence: row.try_get::<i64, _>("fluency_coherence")? as u8,
            vocabulary_range: row.try_get::<i64, _>("vocabulary_range")? as u8,
            grammar_accuracy: row.try_get::<i64, _>("grammar_accuracy")? as u8,
            grammar_range: row.try_get::<i64, _>("grammar_range")? as u8,
            interaction: row.try_get::<i64, _>("interaction")? as u8,
            overall_score: row.try_get::<i64, _>("overall_score")? as u8,
            feedback: row.try_get("feedback")?,
            strengths: row.try_get("strengths")?,
            areas_to_improve: row.try_get("areas_to_improve")?,
        })
    }
}

#[async_trait]
impl CoachStore for SqliteStorage {
    async fn create_user(&self, email: &str, name: &str) -> Result<User> {
        debug!("Creating user: {}", email);

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, name, skill_level, personality, tts_speed, created_at, updated_at)
            VALUES (?, ?, 'beginner', 'maria', ?, ?, ?)
            "#,
        )
        .bind(email)
        .bind(name)
        .bind(DEFAULT_TTS_SPEED)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = UserId(result.last_insert_rowid());
        self.get_user(id)
            .await?
            .ok_or_else(|| CoachError::Other("User vanished after insert".to_string()))
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn update_skill_level(&self, id: UserId, level: SkillLevel) -> Result<()> {
        debug!("Updating skill level for user {}: {}", id, level);

        sqlx::query("UPDATE users SET skill_level = ?, updated_at = ? WHERE id = ?")
            .bind(level.as_str())
            .bind(Utc::now())
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_tts_speed(&self, id: UserId, speed: f64) -> Result<()> {
        sqlx::query("UPDATE users SET tts_speed = ?, updated_at = ? WHERE id = ?")
            .bind(speed)
            .bind(Utc::now())
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_personality(&self, id: UserId, personality: Personality) -> Result<()> {
        sqlx::query("UPDATE users SET personality = ?, updated_at = ? WHERE id = ?")
            .bind(personality.as_str())
            .bind(Utc::now())
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_session(&self, session: &NewSession) -> Result<Session> {
        debug!("Storing session for user {}", session.user_id);

        let date = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO sessions (user_id, date, transcript, summary, skill_notes, duration_seconds)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.user_id.0)
        .bind(date)
        .bind(&session.transcript)
        .bind(&session.summary)
        .bind(&session.skill_notes)
        .bind(session.duration_seconds)
        .execute(&self.pool)
        .await?;

        Ok(Session {
            id: SessionId(result.last_insert_rowid()),
            user_id: session.user_id,
            date,
            transcript: session.transcript.clone(),
            summary: session.summary.clone(),
            skill_notes: session.skill_notes.clone(),
            duration_seconds: session.duration_seconds,
        })
    }

    async fn get_session(&self, id: SessionId, user_id: UserId) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ? AND user_id = ?")
            .bind(id.0)
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn recent_sessions(&self, user_id: UserId, limit: usize) -> Result<Vec<Session>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM sessions
            WHERE user_id = ?
            ORDER BY date DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_session).collect()
    }

    async fn session_count(&self, user_id: UserId) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = ?")
            .bind(user_id.0)
            .fetch_one(&self.pool)
            .await?;

        Ok(count as usize)
    }

    async fn sessions_without_scores(&self, user_id: UserId, limit: usize) -> Result<Vec<Session>> {
        let rows = sqlx::query(
            r#"
            SELECT s.* FROM sessions s
            LEFT JOIN session_scores sc ON sc.session_id = s.id
            WHERE s.user_id = ? AND sc.session_id IS NULL
            ORDER BY s.date DESC, s.id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_session).collect()
    }

    async fn store_embedding(&self, embedding: &SessionEmbedding) -> Result<()> {
        debug!("Storing embedding for session {}", embedding.session_id);

        let bytes = Self::serialize_embedding(&embedding.embedding);
        let dimension = embedding.embedding.len() as i64;

        // Embeddings are never updated in place; a second attempt for the
        // same session is a no-op.
        sqlx::query(
            r#"
            INSERT INTO session_embeddings (session_id, user_id, embedding, dimension, content, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO NOTHING
            "#,
        )
        .bind(embedding.session_id.0)
        .bind(embedding.user_id.0)
        .bind(bytes)
        .bind(dimension)
        .bind(&embedding.content)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn similar_sessions(
        &self,
        user_id: UserId,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<SessionMatch>> {
        debug!("Similarity search for user {} (limit: {})", user_id, limit);

        let rows = sqlx::query(
            r#"
            SELECT e.session_id, e.embedding, s.date, s.summary, s.skill_notes
            FROM session_embeddings e
            JOIN sessions s ON s.id = e.session_id
            WHERE e.user_id = ?
            "#,
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in rows {
            let bytes: Vec<u8> = row.try_get("embedding")?;
            let stored = Self::deserialize_embedding(&bytes)?;
            let date: DateTime<Utc> = row.try_get("date")?;

            matches.push(SessionMatch {
                session_id: SessionId(row.try_get("session_id")?),
                date,
                summary: row.try_get("summary")?,
                skill_notes: row.try_get("skill_notes")?,
                similarity: cosine_similarity(query, &stored),
            });
        }

        // Descending similarity, session id as the deterministic tie-break
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then(a.session_id.cmp(&b.session_id))
        });
        matches.truncate(limit);

        Ok(matches)
    }

    async fn upsert_scores(
        &self,
        session_id: SessionId,
        user_id: UserId,
        scores: &SessionScores,
    ) -> Result<()> {
        debug!("Upserting scores for session {}", session_id);

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO session_scores (
                session_id, user_id,
                fluency_coherence, vocabulary_range, grammar_accuracy,
                grammar_range, interaction, overall_score,
                feedback, strengths, areas_to_improve,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                fluency_coherence = excluded.fluency_coherence,
                vocabulary_range = excluded.vocabulary_range,
                grammar_accuracy = excluded.grammar_accuracy,
                grammar_range = excluded.grammar_range,
                interaction = excluded.interaction,
                overall_score = excluded.overall_score,
                feedback = excluded.feedback,
                strengths = excluded.strengths,
                areas_to_improve = excluded.areas_to_improve,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(session_id.0)
        .bind(user_id.0)
        .bind(scores.fluency_coherence as i64)
        .bind(scores.vocabulary_range as i64)
        .bind(scores.grammar_accuracy as i64)
        .bind(scores.grammar_range as i64)
        .bind(scores.interaction as i64)
        .bind(scores.overall_score as i64)
        .bind(&scores.feedback)
        .bind(&scores.strengths)
        .bind(&scores.areas_to_improve)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_scores(
        &self,
        session_id: SessionId,
        user_id: UserId,
    ) -> Result<Option<SessionScores>> {
        let row = sqlx::query("SELECT * FROM session_scores WHERE session_id = ? AND user_id = ?")
            .bind(session_id.0)
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_scores).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_storage() -> SqliteStorage {
        let storage = SqliteStorage::new("sqlite::memory:").await.unwrap();
        storage.run_migrations().await.unwrap();
        storage
    }

    fn sample_scores(overall: u8) -> SessionScores {
        SessionScores {
            fluency_coherence: 3,
            vocabulary_range: 3,
            grammar_accuracy: 2,
            grammar_range: 3,
            interaction: 4,
            overall_score: overall,
            feedback: "Decent session".to_string(),
            strengths: "interaction".to_string(),
            areas_to_improve: "grammar accuracy".to_string(),
        }
    }

    /// Direction vector with a chosen cosine similarity to the unit x axis
    fn vector_with_similarity(cos: f32) -> Vec<f32> {
        vec![cos, (1.0 - cos * cos).sqrt()]
    }

    #[tokio::test]
    async fn test_user_lifecycle() {
        let storage = test_storage().await;

        let user = storage.create_user("anna@example.com", "Anna").await.unwrap();
        assert_eq!(user.skill_level, SkillLevel::Beginner);
        assert_eq!(user.personality, Personality::Maria);
        assert!((user.tts_speed - 0.85).abs() < 1e-9);

        storage
            .update_skill_level(user.id, SkillLevel::Intermediate)
            .await
            .unwrap();
        storage.update_tts_speed(user.id, 1.1).await.unwrap();
        storage
            .update_personality(user.id, Personality::Giuseppe)
            .await
            .unwrap();

        let updated = storage.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(updated.skill_level, SkillLevel::Intermediate);
        assert_eq!(updated.personality, Personality::Giuseppe);
        assert!((updated.tts_speed - 1.1).abs() < 1e-9);

        assert!(storage.get_user(UserId(9999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_lifecycle_and_scoping() {
        let storage = test_storage().await;
        let anna = storage.create_user("anna@example.com", "Anna").await.unwrap();
        let ben = storage.create_user("ben@example.com", "Ben").await.unwrap();

        let session = storage
            .create_session(&NewSession {
                user_id: anna.id,
                transcript: "Coach: Ciao!\nAnna: Ciao, bene.".to_string(),
                summary: "Greetings practice".to_string(),
                skill_notes: "Present tense only".to_string(),
                duration_seconds: 300,
            })
            .await
            .unwrap();

        // Owner can read, another user cannot
        assert!(storage.get_session(session.id, anna.id).await.unwrap().is_some());
        assert!(storage.get_session(session.id, ben.id).await.unwrap().is_none());

        assert_eq!(storage.session_count(anna.id).await.unwrap(), 1);
        assert_eq!(storage.session_count(ben.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_recent_sessions_most_recent_first() {
        let storage = test_storage().await;
        let user = storage.create_user("anna@example.com", "Anna").await.unwrap();

        for i in 0..4 {
            storage
                .create_session(&NewSession {
                    user_id: user.id,
                    transcript: format!("transcript {}", i),
                    summary: format!("summary {}", i),
                    skill_notes: String::new(),
                    duration_seconds: 60,
                })
                .await
                .unwrap();
        }

        let recent = storage.recent_sessions(user.id, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].summary, "summary 3");
        assert_eq!(recent[1].summary, "summary 2");
        assert_eq!(recent[2].summary, "summary 1");
    }

    #[tokio::test]
    async fn test_embedding_insert_if_absent() {
        let storage = test_storage().await;
        let user = storage.create_user("anna@example.com", "Anna").await.unwrap();
        let session = storage
            .create_session(&NewSession {
                user_id: user.id,
                transcript: "t".to_string(),
                summary: "first".to_string(),
                skill_notes: String::new(),
                duration_seconds: 0,
            })
            .await
            .unwrap();

        let first = SessionEmbedding {
            session_id: session.id,
            user_id: user.id,
            embedding: vec![1.0, 0.0],
            content: "original digest".to_string(),
        };
        storage.store_embedding(&first).await.unwrap();

        // A second write for the same session must not replace the first
        let second = SessionEmbedding {
            embedding: vec![0.0, 1.0],
            content: "replacement digest".to_string(),
            ..first.clone()
        };
        storage.store_embedding(&second).await.unwrap();

        let matches = storage
            .similar_sessions(user.id, &[1.0, 0.0], 10)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert!((matches[0].similarity - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_similarity_ranking_descending_with_limit() {
        let storage = test_storage().await;
        let user = storage.create_user("anna@example.com", "Anna").await.unwrap();

        let similarities = [0.9f32, 0.75, 0.71, 0.65, 0.4];
        for (i, &cos) in similarities.iter().enumerate() {
            let session = storage
                .create_session(&NewSession {
                    user_id: user.id,
                    transcript: format!("t{}", i),
                    summary: format!("s{}", i),
                    skill_notes: String::new(),
                    duration_seconds: 0,
                })
                .await
                .unwrap();

            storage
                .store_embedding(&SessionEmbedding {
                    session_id: session.id,
                    user_id: user.id,
                    embedding: vector_with_similarity(cos),
                    content: String::new(),
                })
                .await
                .unwrap();
        }

        let query = vec![1.0, 0.0];

        let top_two = storage.similar_sessions(user.id, &query, 2).await.unwrap();
        assert_eq!(top_two.len(), 2);
        assert!((top_two[0].similarity - 0.9).abs() < 0.01);
        assert!((top_two[1].similarity - 0.75).abs() < 0.01);

        let all = storage.similar_sessions(user.id, &query, 10).await.unwrap();
        assert_eq!(all.len(), 5);
        for pair in all.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[tokio::test]
    async fn test_similarity_search_scoped_to_user() {
        let storage = test_storage().await;
        let anna = storage.create_user("anna@example.com", "Anna").await.unwrap();
        let ben = storage.create_user("ben@example.com", "Ben").await.unwrap();

        let session = storage
            .create_session(&NewSession {
                user_id: anna.id,
                transcript: "t".to_string(),
                summary: "s".to_string(),
                skill_notes: String::new(),
                duration_seconds: 0,
            })
            .await
            .unwrap();
        storage
            .store_embedding(&SessionEmbedding {
                session_id: session.id,
                user_id: anna.id,
                embedding: vec![1.0, 0.0],
                content: String::new(),
            })
            .await
            .unwrap();

        let matches = storage.similar_sessions(ben.id, &[1.0, 0.0], 10).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_scores_upsert_overwrites() {
        let storage = test_storage().await;
        let user = storage.create_user("anna@example.com", "Anna").await.unwrap();
        let session = storage
            .create_session(&NewSession {
                user_id: user.id,
                transcript: "t".to_string(),
                summary: String::new(),
                skill_notes: String::new(),
                duration_seconds: 0,
            })
            .await
            .unwrap();

        storage
            .upsert_scores(session.id, user.id, &sample_scores(3))
            .await
            .unwrap();
        storage
            .upsert_scores(session.id, user.id, &sample_scores(4))
            .await
            .unwrap();

        let stored = storage.get_scores(session.id, user.id).await.unwrap().unwrap();
        assert_eq!(stored.overall_score, 4);

        // Scores are invisible to other users
        let other = storage.create_user("ben@example.com", "Ben").await.unwrap();
        assert!(storage.get_scores(session.id, other.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sessions_without_scores() {
        let storage = test_storage().await;
        let user = storage.create_user("anna@example.com", "Anna").await.unwrap();

        let mut ids = Vec::new();
        for i in 0..3 {
            let session = storage
                .create_session(&NewSession {
                    user_id: user.id,
                    transcript: format!("t{}", i),
                    summary: String::new(),
                    skill_notes: String::new(),
                    duration_seconds: 0,
                })
                .await
                .unwrap();
            ids.push(session.id);
        }

        storage
            .upsert_scores(ids[1], user.id, &sample_scores(3))
            .await
            .unwrap();

        let unscored = storage.sessions_without_scores(user.id, 10).await.unwrap();
        let unscored_ids: Vec<SessionId> = unscored.iter().map(|s| s.id).collect();
        assert_eq!(unscored.len(), 2);
        assert!(unscored_ids.contains(&ids[0]));
        assert!(unscored_ids.contains(&ids[2]));
        assert!(!unscored_ids.contains(&ids[1]));
    }

    #[test]
    fn test_embedding_roundtrip() {
        let embedding = vec![0.25f32, -1.5, 3.75];
        let bytes = SqliteStorage::serialize_embedding(&embedding);
        let back = SqliteStorage::deserialize_embedding(&bytes).unwrap();
        assert_eq!(embedding, back);

        assert!(SqliteStorage::deserialize_embedding(&[1, 2, 3]).is_err());
    }
}

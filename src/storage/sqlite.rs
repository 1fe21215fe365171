use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{
    PersistenceGateway, QuestionResult, RecordId, SessionOutcome, SessionSnapshot, SessionSummary,
};
use crate::config::DatabaseConfig;
use crate::error::{PersistError, PersistResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed persistence gateway
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if needed) the database at the configured path
    pub async fn new(config: &DatabaseConfig) -> PersistResult<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PersistError::Network {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| PersistError::Network {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| PersistError::Network {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Private in-memory database, used by tests
    pub async fn new_in_memory() -> PersistResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            PersistError::Network {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        // A second connection would see a different empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| PersistError::Network {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    async fn run_migrations(&self) -> PersistResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| PersistError::Network {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl PersistenceGateway for SqliteStorage {
    async fn save(&self, snapshot: &SessionSnapshot) -> PersistResult<RecordId> {
        snapshot.validate()?;

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO practice_sessions (
                id, user_id, outcome, aggregate_score, max_score,
                question_count, answered_count, started_at, finished_at, saved_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&snapshot.session_id)
        .bind(&snapshot.user_id)
        .bind(snapshot.outcome.as_str())
        .bind(snapshot.aggregate_score)
        .bind(snapshot.max_score as i64)
        .bind(snapshot.questions.len() as i64)
        .bind(snapshot.answered_count() as i64)
        .bind(snapshot.started_at.to_rfc3339())
        .bind(snapshot.finished_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(session_id = %snapshot.session_id, "Session already stored");
            return Ok(RecordId(snapshot.session_id.clone()));
        }

        for (position, result) in snapshot.questions.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO question_results (
                    session_id, position, question_id, question, response, evaluation, score
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&snapshot.session_id)
            .bind(position as i64)
            .bind(&result.question.id)
            .bind(to_json(&result.question)?)
            .bind(result.response.as_ref().map(to_json).transpose()?)
            .bind(result.evaluation.as_ref().map(to_json).transpose()?)
            .bind(result.evaluation.as_ref().map(|e| e.score))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            session_id = %snapshot.session_id,
            user_id = %snapshot.user_id,
            outcome = %snapshot.outcome,
            aggregate_score = snapshot.aggregate_score,
            "Session saved"
        );
        Ok(RecordId(snapshot.session_id.clone()))
    }

    async fn load(&self, id: &RecordId) -> PersistResult<Option<SessionSnapshot>> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, outcome, aggregate_score, max_score,
                   question_count, answered_count, started_at, finished_at
            FROM practice_sessions WHERE id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let results: Vec<ResultRow> = sqlx::query_as(
            r#"
            SELECT question, response, evaluation
            FROM question_results WHERE session_id = ? ORDER BY position ASC
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let questions = results
            .into_iter()
            .map(QuestionResult::try_from)
            .collect::<PersistResult<Vec<_>>>()?;

        let summary = SessionSummary::try_from(row)?;
        Ok(Some(SessionSnapshot {
            session_id: summary.session_id,
            user_id: summary.user_id,
            outcome: summary.outcome,
            questions,
            aggregate_score: summary.aggregate_score,
            max_score: summary.max_score,
            started_at: summary.started_at,
            finished_at: summary.finished_at,
        }))
    }

    async fn history(&self, user_id: &str, limit: u32) -> PersistResult<Vec<SessionSummary>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, outcome, aggregate_score, max_score,
                   question_count, answered_count, started_at, finished_at
            FROM practice_sessions
            WHERE user_id = ?
            ORDER BY finished_at DESC, saved_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SessionSummary::try_from).collect()
    }
}

// Row types for SQLx

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    outcome: String,
    aggregate_score: f64,
    max_score: i64,
    question_count: i64,
    answered_count: i64,
    started_at: String,
    finished_at: String,
}

#[derive(sqlx::FromRow)]
struct ResultRow {
    question: String,
    response: Option<String>,
    evaluation: Option<String>,
}

impl TryFrom<SessionRow> for SessionSummary {
    type Error = PersistError;

    fn try_from(row: SessionRow) -> PersistResult<Self> {
        Ok(SessionSummary {
            outcome: SessionOutcome::from_str(&row.outcome)?,
            started_at: parse_timestamp(&row.started_at)?,
            finished_at: parse_timestamp(&row.finished_at)?,
            session_id: row.id,
            user_id: row.user_id,
            aggregate_score: row.aggregate_score,
            max_score: row.max_score.max(0) as u32,
            question_count: row.question_count.max(0) as usize,
            answered_count: row.answered_count.max(0) as usize,
        })
    }
}

impl TryFrom<ResultRow> for QuestionResult {
    type Error = PersistError;

    fn try_from(row: ResultRow) -> PersistResult<Self> {
        Ok(QuestionResult {
            question: from_json(&row.question)?,
            response: row.response.as_deref().map(from_json).transpose()?,
            evaluation: row.evaluation.as_deref().map(from_json).transpose()?,
        })
    }
}

fn parse_timestamp(value: &str) -> PersistResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PersistError::Validation {
            message: format!("Corrupt timestamp '{}': {}", value, e),
        })
}

fn to_json<T: serde::Serialize>(value: &T) -> PersistResult<String> {
    serde_json::to_string(value).map_err(|e| PersistError::Validation {
        message: format!("Failed to serialize record: {}", e),
    })
}

fn from_json<T: DeserializeOwned>(value: &str) -> PersistResult<T> {
    serde_json::from_str(value).map_err(|e| PersistError::Validation {
        message: format!("Corrupt stored record: {}", e),
    })
}

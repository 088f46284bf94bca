//! SQLite session repository

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use std::time::Duration;

use super::SessionRepository;
use crate::document::{DraftSession, FilledValues, SessionStatus};
use crate::error::{DraftingError, Result};

/// Session row as stored in the database
#[derive(Debug, Clone, FromRow)]
struct DbSession {
    session_id: String,
    template_id: String,
    filled_values_json: String,
    status: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    final_draft: Option<String>,
}

impl TryFrom<DbSession> for DraftSession {
    type Error = DraftingError;

    fn try_from(row: DbSession) -> Result<Self> {
        let filled_values: FilledValues = serde_json::from_str(&row.filled_values_json)
            .map_err(|e| DraftingError::corrupted(&row.session_id, format!("filled values: {}", e)))?;
        let status = SessionStatus::from_str(&row.status)
            .map_err(|e| DraftingError::corrupted(&row.session_id, e))?;

        Ok(DraftSession {
            session_id: row.session_id,
            template_id: row.template_id,
            filled_values,
            status,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
            final_draft: row.final_draft,
        })
    }
}

/// Fixed-width timestamps so text ordering matches time ordering
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

const SELECT_SESSION: &str = r#"
    SELECT session_id, template_id, filled_values_json, status, version,
           created_at, updated_at, completed_at, final_draft
    FROM draft_sessions
"#;

pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    /// Open (creating if needed) the database at `url` and migrate it
    pub async fn connect(url: &str) -> Result<Self> {
        tracing::info!("Connecting to session database: {}", url);

        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        // SQLite creates the file but not its directory
        if let Some(parent) = options
            .get_filename()
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(sqlx::Error::Io)?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, running migrations first
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        tracing::info!("Running session migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS draft_sessions (
                session_id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL,
                filled_values_json TEXT NOT NULL DEFAULT '{}',
                status TEXT NOT NULL DEFAULT 'in_progress',
                version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT,
                final_draft TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        // Index for per-template listing
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_draft_sessions_template ON draft_sessions(template_id)
            "#,
        )
        .execute(pool)
        .await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    fn encode_values(session: &DraftSession) -> Result<String> {
        serde_json::to_string(&session.filled_values)
            .map_err(|e| DraftingError::Validation(format!("unserializable answers: {}", e)))
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn insert(&self, session: &DraftSession) -> Result<()> {
        let filled_values_json = Self::encode_values(session)?;

        sqlx::query(
            r#"
            INSERT INTO draft_sessions (session_id, template_id, filled_values_json, status, version, created_at, updated_at, completed_at, final_draft)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.session_id)
        .bind(&session.template_id)
        .bind(&filled_values_json)
        .bind(session.status.to_string())
        .bind(session.version)
        .bind(timestamp(&session.created_at))
        .bind(timestamp(&session.updated_at))
        .bind(session.completed_at.as_ref().map(timestamp))
        .bind(&session.final_draft)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<DraftSession>> {
        let row: Option<DbSession> =
            sqlx::query_as(&format!("{} WHERE session_id = ?", SELECT_SESSION))
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(DraftSession::try_from).transpose()
    }

    async fn compare_and_swap(
        &self,
        session: &DraftSession,
        expected_version: i64,
    ) -> Result<bool> {
        let filled_values_json = Self::encode_values(session)?;

        let result = sqlx::query(
            r#"
            UPDATE draft_sessions
            SET filled_values_json = ?, status = ?, version = ?, updated_at = ?,
                completed_at = ?, final_draft = ?
            WHERE session_id = ? AND version = ?
            "#,
        )
        .bind(&filled_values_json)
        .bind(session.status.to_string())
        .bind(session.version)
        .bind(timestamp(&session.updated_at))
        .bind(session.completed_at.as_ref().map(timestamp))
        .bind(&session.final_draft)
        .bind(&session.session_id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM draft_sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_by_template(&self, template_id: &str) -> Result<Vec<DraftSession>> {
        let rows: Vec<DbSession> = sqlx::query_as(&format!(
            "{} WHERE template_id = ? ORDER BY created_at DESC",
            SELECT_SESSION
        ))
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DraftSession::try_from).collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

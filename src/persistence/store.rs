//! SQLite-based session store

use crate::core::SessionState;
use crate::persistence::SessionBackend;
use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

/// SQLite session store
///
/// The full state record is stored as a JSON column; the extra columns exist
/// for listing and filtering without deserializing every row.
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Create a new SQLite store
    pub async fn new(db_path: &str) -> Result<Self> {
        let pool = SqlitePool::connect(&format!("sqlite:{}", db_path))
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("convoflow");
        std::fs::create_dir_all(&db_dir)?;

        let db_path = db_dir.join("sessions.db");
        let db_path = db_path
            .to_str()
            .context("Session database path is not valid UTF-8")?;
        Self::new(db_path).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                program_name TEXT NOT NULL,
                current_step TEXT NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_program_name ON sessions(program_name);
            CREATE INDEX IF NOT EXISTS idx_completed ON sessions(completed);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionBackend for SqliteSessionStore {
    async fn save_state(&self, state: &SessionState) -> Result<()> {
        let encoded = serde_json::to_string(state).context("Failed to encode session state")?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO sessions
            (session_id, program_name, current_step, completed, state, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&state.session_id)
        .bind(&state.program_name)
        .bind(&state.current_step)
        .bind(state.completed as i64)
        .bind(encoded)
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save session state")?;

        Ok(())
    }

    async fn load_state(&self, session_id: &str) -> Result<Option<SessionState>> {
        let row = sqlx::query("SELECT state FROM sessions WHERE session_id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load session state")?;

        match row {
            Some(row) => {
                let encoded: String = row.get("state");
                let state = serde_json::from_str(&encoded)
                    .context("Failed to decode stored session state")?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    async fn delete_state(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete session state")?;

        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT session_id FROM sessions ORDER BY session_id ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list sessions")?;

        Ok(rows.iter().map(|row| row.get("session_id")).collect())
    }
}

//! Thread-keyed turn storage

use std::path::PathBuf;

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tracing::debug;

use super::database::Database;
use super::{ConversationSummary, Turn, conversation_title};
use crate::error::Result;
use crate::llm::Message;

/// Conversation history backed by SQLite
#[derive(Debug, Clone)]
pub struct HistoryStore {
    db: Database,
}

impl HistoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open (and migrate) a history file
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        Ok(Self::new(Database::open(path).await?))
    }

    pub async fn in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(Database::in_memory().await?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Add a turn, creating the thread on first use
    pub async fn append(&self, thread_id: &str, turn: &Turn) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO conversations (thread_id, created_at, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(thread_id) DO UPDATE SET updated_at = excluded.updated_at
            "#,
        )
        .bind(thread_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO turns (thread_id, user_input, response, query, route, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(thread_id)
        .bind(&turn.user_input)
        .bind(&turn.response)
        .bind(&turn.query)
        .bind(&turn.route)
        .bind(turn.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(thread_id = %thread_id, "Turn stored");
        Ok(())
    }

    /// All turns of a thread in insertion order; unknown threads are empty
    pub async fn read(&self, thread_id: &str) -> Result<Vec<Turn>> {
        let rows = sqlx::query(
            "SELECT user_input, response, query, route, created_at FROM turns WHERE thread_id = ? ORDER BY seq ASC",
        )
        .bind(thread_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(row_to_turn).collect())
    }

    /// A thread as alternating user and assistant messages
    pub async fn messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .read(thread_id)
            .await?
            .into_iter()
            .flat_map(|turn| [Message::user(turn.user_input), Message::assistant(turn.response)])
            .collect())
    }

    /// Every thread, most recently updated first
    pub async fn list(&self) -> Result<Vec<ConversationSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT c.thread_id, c.updated_at,
                   (SELECT COUNT(*) FROM turns t WHERE t.thread_id = c.thread_id) AS turn_count,
                   (SELECT user_input FROM turns t WHERE t.thread_id = c.thread_id
                    ORDER BY t.seq ASC LIMIT 1) AS first_input
            FROM conversations c
            ORDER BY c.updated_at DESC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let first_input: Option<String> = row.get("first_input");
                ConversationSummary {
                    thread_id: row.get("thread_id"),
                    title: conversation_title(first_input.as_deref()),
                    turn_count: row.get("turn_count"),
                    updated_at: row.get("updated_at"),
                }
            })
            .collect())
    }

    /// Remove a thread and its turns; `false` if it did not exist
    pub async fn delete(&self, thread_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM conversations WHERE thread_id = ?")
            .bind(thread_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn exists(&self, thread_id: &str) -> Result<bool> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM conversations WHERE thread_id = ?")
            .bind(thread_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.is_some())
    }
}

fn row_to_turn(row: SqliteRow) -> Turn {
    Turn {
        user_input: row.get("user_input"),
        response: row.get("response"),
        query: row.get("query"),
        route: row.get("route"),
        created_at: row.get("created_at"),
    }
}

use crate::common::models::{ChatMessage, MessageAuthor, StoredMessage};
use crate::server::database::Database;
use sqlx::Row;
use std::sync::Arc;

/// Persist a batch of conversation messages. Inserts are idempotent on the
/// message id, so replaying an already-stored batch is a no-op. Returns the
/// number of rows actually written.
pub async fn save_messages(db: Arc<Database>, batch: &[StoredMessage]) -> anyhow::Result<usize> {
    let mut written = 0usize;
    for msg in batch {
        let result = sqlx::query(r#"
            INSERT OR IGNORE INTO messages (id, thread_id, author_id, content, created_at)
            VALUES (?, ?, ?, ?, ?)
        "#)
        .bind(&msg.id)
        .bind(&msg.thread_id)
        .bind(&msg.author_id)
        .bind(&msg.content)
        .bind(&msg.created_at)
        .execute(&db.pool)
        .await?;
        written += result.rows_affected() as usize;
    }
    if written > 0 {
        log::debug!("[MSG] Stored {} message(s)", written);
    }
    Ok(written)
}

/// Load a thread's history ascending by creation time, mapped to the shape the
/// live channel broadcasts.
pub async fn load_thread(db: Arc<Database>, thread_id: &str) -> anyhow::Result<Vec<ChatMessage>> {
    let rows = sqlx::query(r#"
        SELECT id, author_id, content, created_at
        FROM messages WHERE thread_id = ?
        ORDER BY created_at ASC
    "#)
    .bind(thread_id)
    .fetch_all(&db.pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ChatMessage {
            id: row.get("id"),
            content: row.get("content"),
            user: MessageAuthor { name: row.get("author_id") },
            created_at: row.get("created_at"),
        })
        .collect())
}

//! Idempotent schema setup for the DeepDive database.

use anyhow::Result;
use sqlx::SqlitePool;

/// Create all tables if they do not exist. Safe to run repeatedly.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            file_type TEXT NOT NULL,
            uploaded_at INTEGER NOT NULL,
            chunk_count INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            query TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            gap_questions TEXT NOT NULL DEFAULT '[]',
            final_answer TEXT NOT NULL DEFAULT '',
            citations TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_steps (
            session_id TEXT NOT NULL,
            step INTEGER NOT NULL,
            description TEXT NOT NULL,
            chunks_retrieved INTEGER,
            gaps_found INTEGER,
            citations_added INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_session_steps ON session_steps(session_id)")
        .execute(pool)
        .await?;

    Ok(())
}

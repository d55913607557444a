//! SQLite [`Store`] implementation backed by `sqlx`.
//!
//! Citations and gap questions are stored as JSON columns on the session
//! row; timeline steps get their own table so they can be appended as the
//! pipeline runs.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::models::{Chunk, Document, ResearchSession, SessionStatus, TimelineStep};

use super::Store;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_document(&self, doc: &Document, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO documents (id, filename, file_type, uploaded_at, chunk_count) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&doc.id)
        .bind(&doc.filename)
        .bind(&doc.file_type)
        .bind(doc.uploaded_at)
        .bind(doc.chunk_count)
        .execute(&mut *tx)
        .await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (id, document_id, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let deleted_chunks = sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted_chunks)
    }

    async fn delete_all_documents(&self) -> Result<(u64, u64)> {
        let mut tx = self.pool.begin().await?;

        let chunks = sqlx::query("DELETE FROM chunks")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let docs = sqlx::query("DELETE FROM documents")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM session_steps")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sessions").execute(&mut *tx).await?;

        tx.commit().await?;
        Ok((docs, chunks))
    }

    async fn load_corpus(&self) -> Result<Vec<(Document, Vec<Chunk>)>> {
        let doc_rows = sqlx::query(
            "SELECT id, filename, file_type, uploaded_at, chunk_count FROM documents ORDER BY uploaded_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(doc_rows.len());
        for row in doc_rows {
            let doc = Document {
                id: row.try_get("id")?,
                filename: row.try_get("filename")?,
                file_type: row.try_get("file_type")?,
                uploaded_at: row.try_get("uploaded_at")?,
                chunk_count: row.try_get("chunk_count")?,
            };

            let chunk_rows = sqlx::query(
                "SELECT id, document_id, chunk_index, text, hash FROM chunks WHERE document_id = ? ORDER BY chunk_index",
            )
            .bind(&doc.id)
            .fetch_all(&self.pool)
            .await?;

            let chunks = chunk_rows
                .into_iter()
                .map(|r| {
                    Ok(Chunk {
                        id: r.try_get("id")?,
                        document_id: r.try_get("document_id")?,
                        chunk_index: r.try_get("chunk_index")?,
                        text: r.try_get("text")?,
                        hash: r.try_get("hash")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            out.push((doc, chunks));
        }
        Ok(out)
    }

    async fn create(&self, session: &ResearchSession) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (id, query, status, created_at, gap_questions, final_answer, citations) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.query)
        .bind(session.status.as_str())
        .bind(session.created_at)
        .bind(serde_json::to_string(&session.gap_questions)?)
        .bind(&session.final_answer)
        .bind(serde_json::to_string(&session.citations)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_step(&self, session_id: &str, step: &TimelineStep) -> Result<()> {
        sqlx::query(
            "INSERT INTO session_steps (session_id, step, description, chunks_retrieved, gaps_found, citations_added) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(step.step as i64)
        .bind(&step.description)
        .bind(step.chunks_retrieved.map(|n| n as i64))
        .bind(step.gaps_found.map(|n| n as i64))
        .bind(step.citations_added.map(|n| n as i64))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finalize(&self, session: &ResearchSession) -> Result<()> {
        sqlx::query(
            "UPDATE sessions SET status = ?, gap_questions = ?, final_answer = ?, citations = ? WHERE id = ?",
        )
        .bind(session.status.as_str())
        .bind(serde_json::to_string(&session.gap_questions)?)
        .bind(&session.final_answer)
        .bind(serde_json::to_string(&session.citations)?)
        .bind(&session.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<ResearchSession>> {
        let row = sqlx::query(
            "SELECT id, query, status, created_at, gap_questions, final_answer, citations FROM sessions WHERE id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let status_raw: String = row.try_get("status")?;
        let status = SessionStatus::parse(&status_raw)
            .ok_or_else(|| anyhow::anyhow!("unknown session status: {status_raw}"))?;
        let gap_questions: Vec<String> =
            serde_json::from_str(&row.try_get::<String, _>("gap_questions")?)?;
        let citations = serde_json::from_str(&row.try_get::<String, _>("citations")?)?;

        let step_rows = sqlx::query(
            "SELECT step, description, chunks_retrieved, gaps_found, citations_added FROM session_steps WHERE session_id = ? ORDER BY step, rowid",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let timeline = step_rows
            .into_iter()
            .map(|r| {
                Ok(TimelineStep {
                    step: r.try_get::<i64, _>("step")? as u8,
                    description: r.try_get("description")?,
                    chunks_retrieved: r
                        .try_get::<Option<i64>, _>("chunks_retrieved")?
                        .map(|n| n as usize),
                    gaps_found: r.try_get::<Option<i64>, _>("gaps_found")?.map(|n| n as usize),
                    citations_added: r
                        .try_get::<Option<i64>, _>("citations_added")?
                        .map(|n| n as usize),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(ResearchSession {
            id: row.try_get("id")?,
            query: row.try_get("query")?,
            status,
            created_at: row.try_get("created_at")?,
            gap_questions,
            timeline,
            citations,
            final_answer: row.try_get("final_answer")?,
        }))
    }
}

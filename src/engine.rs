//! Caller-facing facade over the index, store, and generation client.
//!
//! The engine owns the only mutable shared state (the [`IndexManager`])
//! and keeps it consistent with the persistent registry: documents are
//! indexed and persisted together, and the persisted corpus is loaded
//! back into the index on startup.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::error::NotFoundError;
use crate::generation::GenerationClient;
use crate::index::{IndexManager, Snapshot};
use crate::models::{Chunk, Document, ResearchSession};
use crate::research;
use crate::store::Store;

/// Result of ingesting one document.
#[derive(Debug, Clone)]
pub struct IngestReceipt {
    pub document_id: String,
    pub chunk_ids: Vec<String>,
    pub chunk_count: usize,
}

pub struct Engine {
    index: IndexManager,
    store: Arc<dyn Store>,
    generator: Arc<dyn GenerationClient>,
    retrieval: RetrievalConfig,
}

impl Engine {
    /// Build an engine and load the persisted corpus into the index.
    pub async fn new(
        store: Arc<dyn Store>,
        generator: Arc<dyn GenerationClient>,
        retrieval: RetrievalConfig,
    ) -> Result<Self> {
        let index = IndexManager::new();
        let corpus = store.load_corpus().await?;
        for (doc, chunks) in &corpus {
            index
                .add_document(doc, chunks)
                .with_context(|| format!("corrupt corpus entry for document {}", doc.id))?;
        }
        if !corpus.is_empty() {
            info!(
                "loaded {} documents into the index",
                index.snapshot().documents().count()
            );
        }
        Ok(Self {
            index,
            store,
            generator,
            retrieval,
        })
    }

    /// Pin the current index snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.index.snapshot()
    }

    /// Index and persist a document from its ordered chunk texts.
    ///
    /// Chunk segmentation happens upstream (see [`crate::ingest`]); blank
    /// chunks are dropped here.
    pub async fn ingest_document(
        &self,
        filename: &str,
        file_type: &str,
        chunk_texts: Vec<String>,
    ) -> Result<IngestReceipt> {
        let document_id = Uuid::new_v4().to_string();
        let chunks: Vec<Chunk> = chunk_texts
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .enumerate()
            .map(|(i, text)| {
                let mut hasher = Sha256::new();
                hasher.update(text.as_bytes());
                Chunk {
                    id: Uuid::new_v4().to_string(),
                    document_id: document_id.clone(),
                    chunk_index: i as i64,
                    hash: format!("{:x}", hasher.finalize()),
                    text,
                }
            })
            .collect();
        anyhow::ensure!(!chunks.is_empty(), "document has no text content");

        let doc = Document {
            id: document_id.clone(),
            filename: filename.to_string(),
            file_type: file_type.to_string(),
            uploaded_at: Utc::now().timestamp(),
            chunk_count: chunks.len() as i64,
        };

        self.index.add_document(&doc, &chunks)?;
        if let Err(e) = self.store.insert_document(&doc, &chunks).await {
            // Keep index and registry in step: back out the in-memory add.
            let _ = self.index.remove_document(&doc.id);
            return Err(e).context("failed to persist document");
        }

        info!(
            "ingested {} ({} chunks) as document {}",
            filename,
            chunks.len(),
            document_id
        );
        Ok(IngestReceipt {
            document_id,
            chunk_ids: chunks.into_iter().map(|c| c.id).collect(),
            chunk_count: doc.chunk_count as usize,
        })
    }

    /// Delete a document and its chunks from the index and the registry.
    ///
    /// The registry is deleted first; if that fails the index is left
    /// untouched, so a later startup rebuild sees the same corpus.
    pub async fn delete_document(&self, document_id: &str) -> Result<u64> {
        if self.index.snapshot().document(document_id).is_none() {
            return Err(NotFoundError::document(document_id).into());
        }
        self.store
            .delete_document(document_id)
            .await
            .with_context(|| format!("failed to delete document {document_id}"))?;
        let removed = self.index.remove_document(document_id)?;
        Ok(removed.chunk_ids.len() as u64)
    }

    /// Drop the whole corpus, including persisted research sessions.
    ///
    /// Registry first, for the same reason as [`delete_document`](Engine::delete_document).
    pub async fn delete_all_documents(&self) -> Result<(u64, u64)> {
        let counts = self.store.delete_all_documents().await?;
        self.index.clear();
        Ok(counts)
    }

    /// Fetch an indexed document's metadata.
    pub fn get_document(&self, document_id: &str) -> Result<Document, NotFoundError> {
        self.index
            .snapshot()
            .document(document_id)
            .map(|d| d.meta.clone())
            .ok_or_else(|| NotFoundError::document(document_id))
    }

    /// Documents currently in the index, ordered by upload time.
    pub fn list_documents(&self) -> Vec<Document> {
        let snapshot = self.index.snapshot();
        let mut docs: Vec<Document> = snapshot.documents().map(|d| d.meta.clone()).collect();
        docs.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then(a.id.cmp(&b.id)));
        docs
    }

    /// Run one research session for a query.
    pub async fn run_research(&self, query: &str) -> Result<ResearchSession> {
        research::run_research(
            &self.index,
            self.generator.as_ref(),
            self.store.as_ref(),
            &self.retrieval,
            query,
            None,
        )
        .await
    }

    /// [`run_research`](Engine::run_research) with a cancellation flag,
    /// checked between pipeline steps.
    pub async fn run_research_with_cancel(
        &self,
        query: &str,
        cancel: &AtomicBool,
    ) -> Result<ResearchSession> {
        research::run_research(
            &self.index,
            self.generator.as_ref(),
            self.store.as_ref(),
            &self.retrieval,
            query,
            Some(cancel),
        )
        .await
    }

    /// Fetch a persisted research session.
    pub async fn get_session(&self, session_id: &str) -> Result<ResearchSession> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| NotFoundError::session(session_id).into())
    }
}

//! In-memory [`Store`] implementation for tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, Document, ResearchSession, TimelineStep};

use super::Store;

/// In-memory store for tests and ephemeral corpora.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Document>>,
    chunks: RwLock<Vec<Chunk>>,
    sessions: RwLock<HashMap<String, ResearchSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_document(&self, doc: &Document, chunks: &[Chunk]) -> Result<()> {
        self.docs
            .write()
            .unwrap()
            .insert(doc.id.clone(), doc.clone());
        self.chunks.write().unwrap().extend(chunks.iter().cloned());
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<u64> {
        self.docs.write().unwrap().remove(document_id);
        let mut chunks = self.chunks.write().unwrap();
        let before = chunks.len();
        chunks.retain(|c| c.document_id != document_id);
        Ok((before - chunks.len()) as u64)
    }

    async fn delete_all_documents(&self) -> Result<(u64, u64)> {
        let doc_count = {
            let mut docs = self.docs.write().unwrap();
            let n = docs.len() as u64;
            docs.clear();
            n
        };
        let chunk_count = {
            let mut chunks = self.chunks.write().unwrap();
            let n = chunks.len() as u64;
            chunks.clear();
            n
        };
        self.sessions.write().unwrap().clear();
        Ok((doc_count, chunk_count))
    }

    async fn load_corpus(&self) -> Result<Vec<(Document, Vec<Chunk>)>> {
        let docs = self.docs.read().unwrap();
        let chunks = self.chunks.read().unwrap();
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs.values() {
            let mut doc_chunks: Vec<Chunk> = chunks
                .iter()
                .filter(|c| c.document_id == doc.id)
                .cloned()
                .collect();
            doc_chunks.sort_by_key(|c| c.chunk_index);
            out.push((doc.clone(), doc_chunks));
        }
        Ok(out)
    }

    async fn create(&self, session: &ResearchSession) -> Result<()> {
        self.sessions
            .write()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn append_step(&self, session_id: &str, step: &TimelineStep) -> Result<()> {
        if let Some(stored) = self.sessions.write().unwrap().get_mut(session_id) {
            stored.timeline.push(step.clone());
        }
        Ok(())
    }

    async fn finalize(&self, session: &ResearchSession) -> Result<()> {
        self.sessions
            .write()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<ResearchSession>> {
        Ok(self.sessions.read().unwrap().get(session_id).cloned())
    }
}

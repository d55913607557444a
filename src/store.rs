//! Document registry and session persistence.
//!
//! The [`Store`] trait defines everything the engine and research pipeline
//! need from storage, enabling pluggable backends: [`SqliteStore`] for the
//! CLI and [`MemoryStore`] for tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, Document, ResearchSession, TimelineStep};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_document`](Store::insert_document) | Persist a document with its chunks |
/// | [`delete_document`](Store::delete_document) | Remove a document, cascading chunks |
/// | [`delete_all_documents`](Store::delete_all_documents) | Wipe documents, chunks, and sessions |
/// | [`load_corpus`](Store::load_corpus) | Read the full corpus for index rebuild |
/// | [`create`](Store::create) | Persist a new research session |
/// | [`append_step`](Store::append_step) | Record one timeline step |
/// | [`finalize`](Store::finalize) | Persist a session's terminal state |
/// | [`get`](Store::get) | Fetch a session with its timeline |
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a document and its chunks atomically.
    async fn insert_document(&self, doc: &Document, chunks: &[Chunk]) -> Result<()>;

    /// Delete a document and its chunks. Returns the number of chunks
    /// removed. Deleting an unknown id is a no-op returning 0; existence
    /// is the index's call to make.
    async fn delete_document(&self, document_id: &str) -> Result<u64>;

    /// Delete every document, chunk, and research session. Returns
    /// `(documents, chunks)` removed.
    async fn delete_all_documents(&self) -> Result<(u64, u64)>;

    /// Load all documents with their chunks, ordered by chunk index.
    async fn load_corpus(&self) -> Result<Vec<(Document, Vec<Chunk>)>>;

    /// Persist a freshly started session.
    async fn create(&self, session: &ResearchSession) -> Result<()>;

    /// Record one timeline step for a session.
    async fn append_step(&self, session_id: &str, step: &TimelineStep) -> Result<()>;

    /// Persist a session's terminal state (status, answer, citations).
    async fn finalize(&self, session: &ResearchSession) -> Result<()>;

    /// Fetch a session with its recorded timeline.
    async fn get(&self, session_id: &str) -> Result<Option<ResearchSession>>;
}

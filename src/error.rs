//! Typed errors for the core contracts.
//!
//! Application-level code (CLI, engine wiring) uses `anyhow`; these enums
//! cover the cases callers are expected to match on. Tokenization and
//! vector math never fail — degenerate inputs produce empty vectors or a
//! score of zero instead.

use thiserror::Error;

/// Internal inconsistency while mutating the vocabulary index.
///
/// Fatal for the mutating operation only; the index stays at its last
/// valid snapshot.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("document {0} is already indexed")]
    DuplicateDocument(String),
    #[error("chunk {0} is already indexed")]
    DuplicateChunk(String),
}

/// A lookup for an id that does not exist. No state is mutated.
#[derive(Debug, Error)]
#[error("{kind} not found: {id}")]
pub struct NotFoundError {
    pub kind: &'static str,
    pub id: String,
}

impl NotFoundError {
    pub fn document(id: impl Into<String>) -> Self {
        Self {
            kind: "document",
            id: id.into(),
        }
    }

    pub fn session(id: impl Into<String>) -> Self {
        Self {
            kind: "session",
            id: id.into(),
        }
    }
}

/// Failure talking to the text-generation collaborator.
///
/// The research pipeline retries a failed call exactly once before marking
/// the session failed.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generation provider returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed generation response: {0}")]
    Malformed(String),
    #[error("generation provider is disabled")]
    Disabled,
}

//! Core data models used throughout DeepDive.
//!
//! These types represent the documents, chunks, research sessions, and
//! citations that flow through the indexing and research pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata for an ingested document, as persisted in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub file_type: String,
    /// Unix timestamp of ingestion.
    pub uploaded_at: i64,
    pub chunk_count: i64,
}

/// A bounded slice of a document's text, the unit of indexing and citation.
///
/// Immutable once created; destroyed when its document is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    /// Ordinal position within the document, starting at 0.
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of the chunk text.
    pub hash: String,
}

/// Lifecycle of a research session. Transitions are monotonic: once a
/// session is `Completed` or `Failed` it never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SessionStatus::Pending),
            "running" => Some(SessionStatus::Running),
            "completed" => Some(SessionStatus::Completed),
            "failed" => Some(SessionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

/// One entry in a session's execution timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineStep {
    /// Pipeline step number, 1 through 5.
    pub step: u8,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks_retrieved: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gaps_found: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations_added: Option<usize>,
}

impl TimelineStep {
    pub fn new(step: u8, description: impl Into<String>) -> Self {
        Self {
            step,
            description: description.into(),
            chunks_retrieved: None,
            gaps_found: None,
            citations_added: None,
        }
    }

    pub fn with_chunks(mut self, n: usize) -> Self {
        self.chunks_retrieved = Some(n);
        self
    }

    pub fn with_gaps(mut self, n: usize) -> Self {
        self.gaps_found = Some(n);
        self
    }

    pub fn with_citations(mut self, n: usize) -> Self {
        self.citations_added = Some(n);
        self
    }
}

/// A cited chunk with its stable, session-scoped source number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    /// 1-based, assigned in first-seen order, never reassigned.
    pub source_number: usize,
    pub chunk_id: String,
    pub filename: String,
    /// Highest similarity score seen for this chunk across rounds.
    pub score: f64,
    /// Snapshot of the chunk text at citation time.
    pub text: String,
}

/// One research run: query, timeline, citations, and final answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSession {
    pub id: String,
    pub query: String,
    pub status: SessionStatus,
    pub created_at: i64,
    pub gap_questions: Vec<String>,
    pub timeline: Vec<TimelineStep>,
    pub citations: Vec<Citation>,
    pub final_answer: String,
}

impl ResearchSession {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            query: query.into(),
            status: SessionStatus::Pending,
            created_at: chrono::Utc::now().timestamp(),
            gap_questions: Vec::new(),
            timeline: Vec::new(),
            citations: Vec::new(),
            final_answer: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in [
            SessionStatus::Pending,
            SessionStatus::Running,
            SessionStatus::Completed,
            SessionStatus::Failed,
        ] {
            assert_eq!(SessionStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(SessionStatus::parse("bogus"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(!SessionStatus::Running.is_terminal());
        assert!(!SessionStatus::Pending.is_terminal());
    }

    #[test]
    fn test_timeline_step_builder() {
        let step = TimelineStep::new(3, "retrieved gap chunks").with_chunks(7);
        assert_eq!(step.step, 3);
        assert_eq!(step.chunks_retrieved, Some(7));
        assert!(step.gaps_found.is_none());
    }
}

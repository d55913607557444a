//! Stable source numbering for cited chunks.
//!
//! [`CitationMapper`] is the single authority for which `[Source N]` maps
//! to which chunk within a research session. A chunk gets its 1-based
//! source number the first time it is accepted and keeps it for the rest
//! of the session; repeat acceptance only raises the stored score.
//!
//! The final answer's `[Source N]` marker format is a formal output
//! contract: downstream renderers may rely on exactly `[Source <integer>]`.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::models::Citation;
use crate::retrieve::ScoredChunk;

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[Source (\d+)\]").expect("marker regex is valid"))
}

/// Session-scoped chunk id → source number mapping.
#[derive(Debug, Default)]
pub struct CitationMapper {
    by_chunk: HashMap<String, usize>,
    citations: Vec<Citation>,
}

impl CitationMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a retrieved chunk into the citation set.
    ///
    /// First acceptance assigns the next source number; repeat acceptance
    /// keeps the number and stores `max(existing, new)` as the score.
    /// Returns the chunk's stable source number.
    pub fn accept(&mut self, chunk: &ScoredChunk) -> usize {
        if let Some(&slot) = self.by_chunk.get(&chunk.chunk_id) {
            let existing = &mut self.citations[slot];
            if chunk.score > existing.score {
                existing.score = chunk.score;
            }
            existing.source_number
        } else {
            let source_number = self.citations.len() + 1;
            self.by_chunk.insert(chunk.chunk_id.clone(), self.citations.len());
            self.citations.push(Citation {
                id: Uuid::new_v4().to_string(),
                source_number,
                chunk_id: chunk.chunk_id.clone(),
                filename: chunk.filename.clone(),
                score: chunk.score,
                text: chunk.text.clone(),
            });
            source_number
        }
    }

    pub fn source_number(&self, chunk_id: &str) -> Option<usize> {
        self.by_chunk
            .get(chunk_id)
            .map(|&slot| self.citations[slot].source_number)
    }

    pub fn len(&self) -> usize {
        self.citations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }

    /// The ordered citation list, in source-number order.
    pub fn into_citations(self) -> Vec<Citation> {
        self.citations
    }
}

/// Rewrite generation-local `[Source i]` markers to stable source numbers.
///
/// The generation collaborator references chunks by their position in the
/// context it was given; `local_to_stable[i-1]` is the stable number for
/// local index `i`. Markers outside the known range are a collaborator
/// contract issue: they are logged and left as-is.
pub fn renumber_markers(text: &str, local_to_stable: &[usize]) -> String {
    marker_regex()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let local: usize = caps[1].parse().unwrap_or(0);
            if local >= 1 && local <= local_to_stable.len() {
                format!("[Source {}]", local_to_stable[local - 1])
            } else {
                log::warn!("final answer references unknown marker {}", &caps[0]);
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// All source numbers referenced by `[Source N]` markers in `text`.
pub fn referenced_sources(text: &str) -> Vec<usize> {
    marker_regex()
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(chunk_id: &str, score: f64) -> ScoredChunk {
        ScoredChunk {
            chunk_id: chunk_id.to_string(),
            document_id: "d1".to_string(),
            filename: "d1.txt".to_string(),
            chunk_index: 0,
            text: format!("text of {chunk_id}"),
            score,
        }
    }

    #[test]
    fn test_first_seen_numbering_across_rounds() {
        // Round 1 cites [A, B]; round 2 cites [B, C].
        let mut mapper = CitationMapper::new();
        mapper.accept(&scored("A", 0.9));
        mapper.accept(&scored("B", 0.5));
        mapper.accept(&scored("B", 0.8));
        mapper.accept(&scored("C", 0.7));

        assert_eq!(mapper.source_number("A"), Some(1));
        assert_eq!(mapper.source_number("B"), Some(2));
        assert_eq!(mapper.source_number("C"), Some(3));

        let citations = mapper.into_citations();
        assert_eq!(citations.len(), 3);
        // B keeps its number and the max of its two scores.
        assert_eq!(citations[1].chunk_id, "B");
        assert!((citations[1].score - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_repeat_accept_never_lowers_score() {
        let mut mapper = CitationMapper::new();
        mapper.accept(&scored("A", 0.9));
        mapper.accept(&scored("A", 0.2));
        let citations = mapper.into_citations();
        assert!((citations[0].score - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_renumber_markers() {
        let out = renumber_markers("see [Source 1] and [Source 3]", &[4, 5, 2]);
        assert_eq!(out, "see [Source 4] and [Source 2]");
    }

    #[test]
    fn test_unknown_markers_left_as_is() {
        let out = renumber_markers("see [Source 7]", &[1, 2]);
        assert_eq!(out, "see [Source 7]");
    }

    #[test]
    fn test_malformed_markers_ignored() {
        let text = "see [Source x] and [source 1] and Source 2";
        assert_eq!(renumber_markers(text, &[9]), text);
        assert!(referenced_sources(text).is_empty());
    }

    #[test]
    fn test_referenced_sources() {
        let refs = referenced_sources("[Source 2] then [Source 10]");
        assert_eq!(refs, vec![2, 10]);
    }
}

//! Cosine-similarity top-K retrieval over an index snapshot.
//!
//! Stateless: given the same snapshot and query vector, results are
//! identical across calls. Ties are broken by ascending chunk id so that
//! ranking is fully deterministic.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::index::Snapshot;

/// Caller-supplied retrieval bounds for one round.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalParams {
    /// Maximum number of chunks to return.
    pub k: usize,
    /// Strict lower bound: only chunks with `score > min_score` are kept.
    pub min_score: f64,
}

/// A chunk ranked against a query, with enough context for citation.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub filename: String,
    pub chunk_index: i64,
    pub text: String,
    pub score: f64,
}

/// Cosine similarity between two sparse weight vectors.
///
/// `dot(a,b) / (|a|·|b|)`, defined as 0.0 when either norm is zero.
pub fn cosine_similarity(a: &BTreeMap<String, f64>, b: &BTreeMap<String, f64>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(term, w)| large.get(term).map(|v| w * v))
        .sum();

    let norm_a: f64 = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|w| w * w).sum::<f64>().sqrt();
    let denom = norm_a * norm_b;
    if denom <= 0.0 {
        return 0.0;
    }
    dot / denom
}

/// Score a set of candidate chunks against a query vector and return the
/// top `k` above `min_score`, sorted by descending score then ascending
/// chunk id.
///
/// Unknown candidate ids are skipped; an empty candidate set yields an
/// empty result, never an error.
pub fn retrieve<'a>(
    snapshot: &Snapshot,
    query_vec: &BTreeMap<String, f64>,
    candidates: impl IntoIterator<Item = &'a str>,
    params: RetrievalParams,
) -> Vec<ScoredChunk> {
    let mut results: Vec<ScoredChunk> = candidates
        .into_iter()
        .filter_map(|chunk_id| {
            let chunk = snapshot.chunk(chunk_id)?;
            let weights = snapshot.weight_vector(chunk_id)?;
            let score = cosine_similarity(query_vec, &weights);
            if score > params.min_score {
                let filename = snapshot
                    .document(&chunk.document_id)
                    .map(|d| d.meta.filename.clone())
                    .unwrap_or_default();
                Some(ScoredChunk {
                    chunk_id: chunk.id.clone(),
                    document_id: chunk.document_id.clone(),
                    filename,
                    chunk_index: chunk.chunk_index,
                    text: chunk.text.clone(),
                    score,
                })
            } else {
                None
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    results.truncate(params.k);
    results
}

/// [`retrieve`] over every chunk in the snapshot.
pub fn retrieve_all(
    snapshot: &Snapshot,
    query_vec: &BTreeMap<String, f64>,
    params: RetrievalParams,
) -> Vec<ScoredChunk> {
    let ids: Vec<&str> = snapshot.chunk_ids().collect();
    retrieve(snapshot, query_vec, ids, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexManager;
    use crate::models::{Chunk, Document};

    fn corpus(chunks: &[(&str, &str)]) -> IndexManager {
        let index = IndexManager::new();
        let meta = Document {
            id: "d1".to_string(),
            filename: "d1.txt".to_string(),
            file_type: "txt".to_string(),
            uploaded_at: 0,
            chunk_count: chunks.len() as i64,
        };
        let chunks: Vec<Chunk> = chunks
            .iter()
            .enumerate()
            .map(|(i, (id, text))| Chunk {
                id: id.to_string(),
                document_id: "d1".to_string(),
                chunk_index: i as i64,
                text: text.to_string(),
                hash: String::new(),
            })
            .collect();
        index.add_document(&meta, &chunks).unwrap();
        index
    }

    #[test]
    fn test_self_similarity() {
        let index = corpus(&[
            ("c1", "quantum bits use qubits for computation"),
            ("c2", "classical bits hold zero one values"),
        ]);
        let snap = index.snapshot();
        let qvec = snap.query_vector("quantum bits use qubits for computation");
        let weights = snap.weight_vector("c1").unwrap();
        let sim = cosine_similarity(&qvec, &weights);
        assert!((sim - 1.0).abs() < 1e-6, "self-similarity was {sim}");
    }

    #[test]
    fn test_retrieve_deterministic() {
        let index = corpus(&[
            ("c1", "rust systems programming"),
            ("c2", "rust memory safety"),
            ("c3", "python scripting"),
        ]);
        let snap = index.snapshot();
        let qvec = snap.query_vector("rust programming");
        let params = RetrievalParams {
            k: 10,
            min_score: 0.0,
        };
        let a = retrieve_all(&snap, &qvec, params);
        let b = retrieve_all(&snap, &qvec, params);
        let ids_a: Vec<&str> = a.iter().map(|c| c.chunk_id.as_str()).collect();
        let ids_b: Vec<&str> = b.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.score, y.score);
        }
    }

    #[test]
    fn test_ties_broken_by_ascending_chunk_id() {
        // Identical chunks score identically; order must fall back to id.
        let index = corpus(&[("z9", "orbital mechanics"), ("a1", "orbital mechanics")]);
        let snap = index.snapshot();
        let qvec = snap.query_vector("orbital mechanics");
        let results = retrieve_all(
            &snap,
            &qvec,
            RetrievalParams {
                k: 10,
                min_score: 0.0,
            },
        );
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, "a1");
        assert_eq!(results[1].chunk_id, "z9");
    }

    #[test]
    fn test_min_score_strict() {
        let index = corpus(&[("c1", "whales migrate"), ("c2", "compiler design")]);
        let snap = index.snapshot();
        let qvec = snap.query_vector("whales");
        let results = retrieve_all(
            &snap,
            &qvec,
            RetrievalParams {
                k: 10,
                min_score: 0.0,
            },
        );
        // The unrelated chunk scores exactly 0 and is excluded.
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, "c1");
    }

    #[test]
    fn test_k_truncation() {
        let index = corpus(&[
            ("c1", "storage engine"),
            ("c2", "storage layout"),
            ("c3", "storage format"),
        ]);
        let snap = index.snapshot();
        let qvec = snap.query_vector("storage");
        let results = retrieve_all(
            &snap,
            &qvec,
            RetrievalParams {
                k: 2,
                min_score: 0.0,
            },
        );
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_empty_index_and_zero_norm_query() {
        let empty = IndexManager::new();
        let snap = empty.snapshot();
        let qvec = snap.query_vector("anything");
        assert!(retrieve_all(
            &snap,
            &qvec,
            RetrievalParams {
                k: 10,
                min_score: 0.0
            }
        )
        .is_empty());

        let index = corpus(&[("c1", "alpha beta")]);
        let snap = index.snapshot();
        // Query entirely out of vocabulary: zero-norm vector, score 0.
        let qvec = snap.query_vector("zzz unseen");
        assert!(qvec.is_empty());
        assert!(retrieve_all(
            &snap,
            &qvec,
            RetrievalParams {
                k: 10,
                min_score: 0.0
            }
        )
        .is_empty());
    }

    #[test]
    fn test_cosine_zero_norm_is_zero_not_nan() {
        let a = BTreeMap::new();
        let mut b = BTreeMap::new();
        b.insert("term".to_string(), 1.0);
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert_eq!(cosine_similarity(&a, &a), 0.0);
    }
}

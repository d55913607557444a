//! Versioned TF-IDF vocabulary index.
//!
//! [`IndexManager`] is the exclusive owner of the in-memory corpus: the
//! document registry, per-chunk term-frequency maps, and the global
//! document-frequency table. All mutation goes through
//! [`add_document`](IndexManager::add_document) /
//! [`remove_document`](IndexManager::remove_document), serialized behind a
//! single writer lock. Every mutation publishes a fresh immutable
//! [`Snapshot`] with a bumped version; readers pin one `Arc<Snapshot>` for
//! the duration of an operation and are never exposed to partial state.
//!
//! Weight vectors use smoothed idf, `ln((N+1)/(df+1)) + 1`, which is
//! strictly positive and defined even for an empty index, and are
//! L2-normalized. Term maps are `BTreeMap`s so that identical inputs
//! against the same snapshot produce bit-identical vectors.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{IndexError, NotFoundError};
use crate::models::{Chunk, Document};
use crate::tokenize;

/// A chunk as stored in the index: text plus its cached term counts.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    /// Term → occurrence count within this chunk.
    pub term_counts: BTreeMap<String, usize>,
}

/// Registry entry for an indexed document with its ordered chunk ids.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub meta: Document,
    pub chunk_ids: Vec<String>,
}

/// An immutable, versioned view of the vocabulary index.
///
/// All vector math happens against a snapshot, so scores computed within
/// one research session stay internally comparable even while the live
/// index moves on.
#[derive(Debug)]
pub struct Snapshot {
    version: u64,
    total_chunks: usize,
    doc_freq: BTreeMap<String, usize>,
    chunks: BTreeMap<String, Arc<IndexedChunk>>,
    documents: BTreeMap<String, IndexedDocument>,
}

impl Snapshot {
    fn empty(version: u64) -> Self {
        Self {
            version,
            total_chunks: 0,
            doc_freq: BTreeMap::new(),
            chunks: BTreeMap::new(),
            documents: BTreeMap::new(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Live chunk count N at this version.
    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    pub fn is_empty(&self) -> bool {
        self.total_chunks == 0
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.doc_freq.get(term).copied().unwrap_or(0)
    }

    pub fn chunk(&self, chunk_id: &str) -> Option<&Arc<IndexedChunk>> {
        self.chunks.get(chunk_id)
    }

    pub fn chunk_ids(&self) -> impl Iterator<Item = &str> {
        self.chunks.keys().map(String::as_str)
    }

    pub fn document(&self, document_id: &str) -> Option<&IndexedDocument> {
        self.documents.get(document_id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &IndexedDocument> {
        self.documents.values()
    }

    /// Smoothed inverse document frequency: `ln((N+1)/(df+1)) + 1`.
    ///
    /// Strictly positive and defined for unseen terms and an empty index.
    pub fn idf(&self, term: &str) -> f64 {
        let n = self.total_chunks as f64;
        let df = self.document_frequency(term) as f64;
        ((n + 1.0) / (df + 1.0)).ln() + 1.0
    }

    /// L2-normalized sparse TF-IDF weight vector for an indexed chunk.
    pub fn weight_vector(&self, chunk_id: &str) -> Option<BTreeMap<String, f64>> {
        let chunk = self.chunks.get(chunk_id)?;
        let weights = chunk
            .term_counts
            .iter()
            .map(|(term, &tf)| (term.clone(), tf as f64 * self.idf(term)))
            .collect();
        Some(l2_normalize(weights))
    }

    /// L2-normalized sparse TF-IDF weight vector for free query text.
    ///
    /// Terms absent from this snapshot's vocabulary are dropped; empty or
    /// fully out-of-vocabulary text yields an empty vector, never an error.
    pub fn query_vector(&self, text: &str) -> BTreeMap<String, f64> {
        let weights = tokenize::term_counts(text)
            .into_iter()
            .filter(|(term, _)| self.document_frequency(term) > 0)
            .map(|(term, tf)| {
                let idf = self.idf(&term);
                (term, tf as f64 * idf)
            })
            .collect();
        l2_normalize(weights)
    }
}

fn l2_normalize(mut weights: BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for w in weights.values_mut() {
            *w /= norm;
        }
    }
    weights
}

/// Single-writer, multi-reader owner of the vocabulary index.
///
/// Writers clone the current snapshot's tables, apply incremental df/N
/// updates, and swap in a new `Arc<Snapshot>`; a failed mutation leaves
/// the published snapshot untouched.
pub struct IndexManager {
    current: RwLock<Arc<Snapshot>>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty(0))),
        }
    }

    /// Pin the current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().unwrap().clone()
    }

    /// Index a document and its chunks, publishing a new snapshot.
    ///
    /// A term's document frequency increments once per chunk that contains
    /// it, not once per occurrence. Duplicate document or chunk ids are an
    /// internal inconsistency and fail without publishing.
    pub fn add_document(&self, meta: &Document, chunks: &[Chunk]) -> Result<(), IndexError> {
        let mut current = self.current.write().unwrap();

        if current.documents.contains_key(&meta.id) {
            return Err(IndexError::DuplicateDocument(meta.id.clone()));
        }
        for chunk in chunks {
            if current.chunks.contains_key(&chunk.id) {
                return Err(IndexError::DuplicateChunk(chunk.id.clone()));
            }
        }

        let mut doc_freq = current.doc_freq.clone();
        let mut chunk_map = current.chunks.clone();
        let mut documents = current.documents.clone();

        let mut chunk_ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let term_counts = tokenize::term_counts(&chunk.text);
            for term in term_counts.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            chunk_map.insert(
                chunk.id.clone(),
                Arc::new(IndexedChunk {
                    id: chunk.id.clone(),
                    document_id: chunk.document_id.clone(),
                    chunk_index: chunk.chunk_index,
                    text: chunk.text.clone(),
                    term_counts,
                }),
            );
            chunk_ids.push(chunk.id.clone());
        }

        documents.insert(
            meta.id.clone(),
            IndexedDocument {
                meta: meta.clone(),
                chunk_ids,
            },
        );

        *current = Arc::new(Snapshot {
            version: current.version + 1,
            total_chunks: current.total_chunks + chunks.len(),
            doc_freq,
            chunks: chunk_map,
            documents,
        });
        Ok(())
    }

    /// Remove a document and all its chunks, publishing a new snapshot.
    ///
    /// Unknown ids leave the index unchanged.
    pub fn remove_document(&self, document_id: &str) -> Result<IndexedDocument, NotFoundError> {
        let mut current = self.current.write().unwrap();

        let removed = current
            .documents
            .get(document_id)
            .cloned()
            .ok_or_else(|| NotFoundError::document(document_id))?;

        let mut doc_freq = current.doc_freq.clone();
        let mut chunk_map = current.chunks.clone();
        let mut documents = current.documents.clone();

        for chunk_id in &removed.chunk_ids {
            if let Some(chunk) = chunk_map.remove(chunk_id) {
                for term in chunk.term_counts.keys() {
                    if let Some(df) = doc_freq.get_mut(term) {
                        *df -= 1;
                        if *df == 0 {
                            doc_freq.remove(term);
                        }
                    }
                }
            }
        }
        documents.remove(document_id);

        *current = Arc::new(Snapshot {
            version: current.version + 1,
            total_chunks: current.total_chunks - removed.chunk_ids.len(),
            doc_freq,
            chunks: chunk_map,
            documents,
        });
        Ok(removed)
    }

    /// Drop the whole corpus, publishing an empty snapshot.
    pub fn clear(&self) {
        let mut current = self.current.write().unwrap();
        *current = Arc::new(Snapshot::empty(current.version + 1));
    }
}

impl Default for IndexManager {
    fn default() -> Self {
        Self::new()
    }
}

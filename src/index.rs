//! In-memory vector index with exact cosine k-NN.
//!
//! Maps record ids to embedding vectors, with a side cache of display
//! records for snippet rendering. The index is a derived cache: it is
//! rebuilt from the durable store at startup and mutated in lockstep with
//! every store insert/update/delete, so it can be discarded at any time
//! without data loss.
//!
//! Queries are a brute-force linear scan — O(N·D) per query — which is the
//! right trade-off for a personal corpus of thousands of fragments. An
//! approximate structure could replace the internals behind the same `knn`
//! contract if a corpus outgrows that.
//!
//! Reads may run concurrently with writes (interior `RwLock`); each
//! upsert/remove is atomic and visible as soon as it returns.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::embedding::cosine_similarity;
use crate::models::Document;

#[derive(Default)]
struct IndexInner {
    vectors: HashMap<i64, Vec<f32>>,
    records: HashMap<i64, Document>,
}

/// Thread-safe in-memory similarity index.
pub struct VectorIndex {
    inner: RwLock<IndexInner>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(IndexInner::default()),
        }
    }

    /// Insert or replace the vector (and optional display record) for `id`.
    pub fn upsert(&self, id: i64, vector: Vec<f32>, record: Option<Document>) {
        let mut inner = self.inner.write().unwrap();
        inner.vectors.insert(id, vector);
        match record {
            Some(doc) => {
                inner.records.insert(id, doc);
            }
            None => {
                inner.records.remove(&id);
            }
        }
    }

    /// Remove `id` from the index. Removing an absent id is a no-op.
    pub fn remove(&self, id: i64) {
        let mut inner = self.inner.write().unwrap();
        inner.vectors.remove(&id);
        inner.records.remove(&id);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.vectors.clear();
        inner.records.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().vectors.is_empty()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.inner.read().unwrap().vectors.keys().copied().collect()
    }

    /// Exact k-nearest-neighbor query by cosine similarity.
    ///
    /// Scores below `min_similarity` are dropped; at most `k` results are
    /// returned, ordered by score descending with id ascending as the
    /// stable secondary key. Dimension mismatches score 0 rather than error.
    pub fn knn(&self, query: &[f32], k: usize, min_similarity: f32) -> Vec<(i64, f32)> {
        let inner = self.inner.read().unwrap();
        let mut scored: Vec<(i64, f32)> = inner
            .vectors
            .iter()
            .map(|(id, vector)| (*id, cosine_similarity(query, vector)))
            .filter(|(_, score)| *score >= min_similarity)
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    /// Like [`knn`](Self::knn), but resolves ids through the display cache.
    /// Ids missing from the cache are silently dropped from the results.
    pub fn search_with_display(
        &self,
        query: &[f32],
        k: usize,
        min_similarity: f32,
    ) -> Vec<(Document, f32)> {
        let ranked = self.knn(query, k, min_similarity);
        let inner = self.inner.read().unwrap();
        ranked
            .into_iter()
            .filter_map(|(id, score)| inner.records.get(&id).map(|doc| (doc.clone(), score)))
            .collect()
    }
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use serde_json::Value;
use slate_engine::{ChangeEvent, ChangeOp, Collection, Document};
use slate_store::{Store, Transaction};

use crate::distance::{self, DistanceMetric};
use crate::error::VectorError;

const KEY_PREFIX: &str = "vec:";

fn vector_key(id: &str) -> Vec<u8> {
    format!("{KEY_PREFIX}{id}").into_bytes()
}

fn encode_vector(v: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 8);
    for x in v {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

fn decode_vector(bytes: &[u8]) -> Vec<f64> {
    bytes.chunks_exact(8).map(|c| f64::from_le_bytes(c.try_into().expect("8-byte chunk"))).collect()
}

#[derive(Debug, Clone)]
struct ScoredEntry {
    id: String,
    distance: f64,
    score: f64,
}

impl PartialEq for ScoredEntry {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}
impl Eq for ScoredEntry {}
impl PartialOrd for ScoredEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.score.partial_cmp(&other.score)
    }
}
impl Ord for ScoredEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap_or(Ordering::Equal)
    }
}

/// Dense vector index over a fixed-dimension projection of collection
/// documents. Vectors are stored raw, little-endian `f64` components, one
/// entry per document under the identifier bucket; cosine search normalizes
/// at query time.
pub struct VectorIndex<S: Store> {
    store: S,
    identifier: String,
    dimensions: usize,
    metric: DistanceMetric,
    project: Box<dyn Fn(&Document) -> Option<Vec<f64>> + Send + Sync>,
}

impl<S: Store> VectorIndex<S> {
    pub fn open(
        store: S,
        identifier: impl Into<String>,
        dimensions: usize,
        metric: DistanceMetric,
        project: impl Fn(&Document) -> Option<Vec<f64>> + Send + Sync + 'static,
    ) -> Result<Self, VectorError> {
        let identifier = identifier.into();
        store.create_bucket(&identifier)?;
        Ok(Self { store, identifier, dimensions, metric, project: Box::new(project) })
    }

    pub fn reindex<CS: Store>(&self, collection: &Collection<CS>, batch_size: usize) -> Result<(), VectorError> {
        self.store.drop_bucket(&self.identifier)?;
        self.store.create_bucket(&self.identifier)?;

        let pk_field = collection.schema().primary_key_field.clone();
        let docs = collection.all().map_err(|e| VectorError::Serialization(e.to_string()))?;
        for chunk in docs.chunks(batch_size.max(1)) {
            for doc in chunk {
                if let Some(id) = doc.get(&pk_field).and_then(Value::as_str) {
                    self.index_one(id, doc)?;
                }
            }
            tracing::debug!(identifier = %self.identifier, indexed = chunk.len(), "vector reindex batch complete");
        }
        Ok(())
    }

    pub fn apply_change(&self, event: &ChangeEvent) -> Result<(), VectorError> {
        match event.op {
            ChangeOp::Insert => {
                if let Some(new) = &event.new {
                    self.index_one(&event.id, new)?;
                }
            }
            ChangeOp::Update => {
                self.remove_one(&event.id)?;
                if let Some(new) = &event.new {
                    self.index_one(&event.id, new)?;
                }
            }
            ChangeOp::Delete => {
                self.remove_one(&event.id)?;
            }
        }
        Ok(())
    }

    /// Index (or re-index) a single document. A projection that returns
    /// `None` (`NoEmbedding`) is skipped silently, matching the build-time
    /// contract in §4.4 — `NoEmbedding` only surfaces on an explicit
    /// `search_by_id` for that document.
    pub fn index_one(&self, id: &str, doc: &Document) -> Result<(), VectorError> {
        let Some(vector) = (self.project)(doc) else {
            return Ok(());
        };
        if vector.len() != self.dimensions {
            return Err(VectorError::DimensionMismatch { expected: self.dimensions, actual: vector.len() });
        }

        let txn = self.store.begin(false)?;
        txn.put(&self.identifier, &vector_key(id), &encode_vector(&vector))?;
        txn.commit()?;
        Ok(())
    }

    pub fn remove_one(&self, id: &str) -> Result<(), VectorError> {
        let txn = self.store.begin(false)?;
        txn.delete(&self.identifier, &vector_key(id))?;
        txn.commit()?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize, VectorError> {
        let txn = self.store.begin(true)?;
        let count = txn.scan_prefix(&self.identifier, KEY_PREFIX.as_bytes())?.count();
        Ok(count)
    }

    pub fn get_vector(&self, id: &str) -> Result<Option<Vec<f64>>, VectorError> {
        let txn = self.store.begin(true)?;
        match txn.get(&self.identifier, &vector_key(id))? {
            Some(bytes) => Ok(Some(decode_vector(&bytes))),
            None => Ok(None),
        }
    }

    /// Linear scan with a bounded min-heap: keeps only the best `limit`
    /// candidates seen so far instead of sorting the whole corpus.
    pub fn search(
        &self,
        query: &[f64],
        limit: Option<usize>,
        threshold: Option<f64>,
    ) -> Result<Vec<(String, f64, f64)>, VectorError> {
        if query.len() != self.dimensions {
            return Err(VectorError::DimensionMismatch { expected: self.dimensions, actual: query.len() });
        }

        let txn = self.store.begin(true)?;
        let mut heap: BinaryHeap<Reverse<ScoredEntry>> = BinaryHeap::new();

        for entry in txn.scan_prefix(&self.identifier, KEY_PREFIX.as_bytes())? {
            let (key, value) = entry?;
            let id = String::from_utf8_lossy(&key[KEY_PREFIX.len()..]).into_owned();
            let vector = decode_vector(&value);
            let (dist, score) = distance::distance_and_score(self.metric, query, &vector);

            if let Some(threshold) = threshold {
                if score < threshold {
                    continue;
                }
            }

            let candidate = ScoredEntry { id, distance: dist, score };
            match limit {
                Some(limit) if limit > 0 => {
                    if heap.len() < limit {
                        heap.push(Reverse(candidate));
                    } else if let Some(Reverse(worst)) = heap.peek() {
                        if candidate.score > worst.score {
                            heap.pop();
                            heap.push(Reverse(candidate));
                        }
                    }
                }
                Some(_) => {}
                None => heap.push(Reverse(candidate)),
            }
        }

        let mut results: Vec<(String, f64, f64)> =
            heap.into_iter().map(|Reverse(e)| (e.id, e.distance, e.score)).collect();
        results.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));
        Ok(results)
    }

    pub fn search_by_id(
        &self,
        id: &str,
        limit: Option<usize>,
        threshold: Option<f64>,
    ) -> Result<Vec<(String, f64, f64)>, VectorError> {
        let vector = self.get_vector(id)?.ok_or_else(|| VectorError::NoEmbedding(id.to_string()))?;
        self.search(&vector, limit, threshold)
    }

    pub fn knn(&self, query: &[f64], k: usize) -> Result<Vec<(String, f64, f64)>, VectorError> {
        self.search(query, Some(k), None)
    }

    pub fn range_search(&self, query: &[f64], max_distance: f64) -> Result<Vec<(String, f64, f64)>, VectorError> {
        let mut results = self.search(query, None, None)?;
        results.retain(|(_, distance, _)| *distance <= max_distance);
        results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        Ok(results)
    }

    /// Like `search`, but hydrates full documents from `collection` and
    /// drops distance/score. Ids no longer present in the collection are
    /// skipped.
    pub fn search_docs<CS: Store>(
        &self,
        collection: &Collection<CS>,
        query: &[f64],
        limit: Option<usize>,
        threshold: Option<f64>,
    ) -> Result<Vec<Document>, VectorError> {
        let ranked = self.search(query, limit, threshold)?;
        let mut docs = Vec::with_capacity(ranked.len());
        for (id, _, _) in ranked {
            if let Ok(Some(doc)) = collection.find_by_id(&id) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use slate_engine::Schema;
    use slate_store::MemoryStore;

    fn project(doc: &Document) -> Option<Vec<f64>> {
        doc.get("embedding")?.as_array()?.iter().map(|v| v.as_f64()).collect()
    }

    #[test]
    fn self_match_scores_one_for_cosine() {
        let index = VectorIndex::open(MemoryStore::new(), "products", 3, DistanceMetric::Cosine, project).unwrap();
        index.index_one("a", json!({"embedding": [1.0, 0.0, 0.0]}).as_object().unwrap()).unwrap();
        index.index_one("b", json!({"embedding": [0.0, 1.0, 0.0]}).as_object().unwrap()).unwrap();

        let results = index.search_by_id("a", Some(2), None).unwrap();
        assert_eq!(results[0].0, "a");
        assert!((results[0].2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let index = VectorIndex::open(MemoryStore::new(), "products", 3, DistanceMetric::Cosine, project).unwrap();
        let err = index.index_one("a", json!({"embedding": [1.0, 0.0]}).as_object().unwrap()).unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { expected: 3, actual: 2 }));
    }

    #[test]
    fn missing_embedding_is_skipped_not_errored() {
        let index = VectorIndex::open(MemoryStore::new(), "products", 3, DistanceMetric::Cosine, project).unwrap();
        index.index_one("a", json!({"name": "widget"}).as_object().unwrap()).unwrap();
        assert_eq!(index.count().unwrap(), 0);
    }

    #[test]
    fn search_by_id_without_embedding_errors() {
        let index = VectorIndex::open(MemoryStore::new(), "products", 3, DistanceMetric::Cosine, project).unwrap();
        let err = index.search_by_id("missing", None, None).unwrap_err();
        assert!(matches!(err, VectorError::NoEmbedding(_)));
    }

    #[test]
    fn range_search_sorts_ascending_by_distance() {
        let index = VectorIndex::open(MemoryStore::new(), "products", 2, DistanceMetric::Euclidean, project).unwrap();
        index.index_one("near", json!({"embedding": [1.0, 1.0]}).as_object().unwrap()).unwrap();
        index.index_one("far", json!({"embedding": [10.0, 10.0]}).as_object().unwrap()).unwrap();

        let results = index.range_search(&[0.0, 0.0], 5.0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "near");
    }

    #[test]
    fn reindex_rebuilds_from_collection() {
        let collection = Collection::open("products", MemoryStore::new(), Schema::new("_id")).unwrap();
        collection
            .insert_one(json!({"embedding": [1.0, 0.0, 0.0]}).as_object().unwrap().clone())
            .unwrap();
        let index = VectorIndex::open(MemoryStore::new(), "products", 3, DistanceMetric::Cosine, project).unwrap();
        index.reindex(&collection, 10).unwrap();
        assert_eq!(index.count().unwrap(), 1);
    }
}

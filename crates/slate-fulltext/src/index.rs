use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use slate_engine::{ChangeEvent, ChangeOp, Collection, Document};
use slate_store::{Store, Transaction};

use crate::error::FulltextError;
use crate::tokenize::{TokenizeOptions, tokenize};

const TERM_PREFIX: &str = "t:";
const DOC_PREFIX: &str = "doc:";
const META_KEY: &str = "meta";

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

/// A document id paired with its ranking score, descending order.
pub type ScoredId = (String, f64);

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct PostingEntry {
    freq: u32,
    weight: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Postings(HashMap<String, PostingEntry>);

#[derive(Debug, Serialize, Deserialize)]
struct DocMeta {
    length: u32,
    terms: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct IndexMeta {
    doc_count: u64,
    total_length: u64,
}

/// Full-text index over a projection of collection documents. Postings,
/// per-document term lists, and the length-normalization metadata all live
/// as ordinary entries in one KV bucket named after `identifier`, so the
/// index survives process restarts the same way the document store does.
pub struct FulltextIndex<S: Store> {
    store: S,
    identifier: String,
    tokenize: TokenizeOptions,
    project: Box<dyn Fn(&Document) -> String + Send + Sync>,
}

impl<S: Store> FulltextIndex<S> {
    pub fn open(
        store: S,
        identifier: impl Into<String>,
        tokenize: TokenizeOptions,
        project: impl Fn(&Document) -> String + Send + Sync + 'static,
    ) -> Result<Self, FulltextError> {
        let identifier = identifier.into();
        store.create_bucket(&identifier)?;
        Ok(Self { store, identifier, tokenize, project: Box::new(project) })
    }

    /// Rebuild from scratch over a collection's current documents, in
    /// chunks of `batch_size` (chunk size affects only how often progress
    /// is logged, not the result).
    pub fn reindex<CS: Store>(&self, collection: &Collection<CS>, batch_size: usize) -> Result<(), FulltextError> {
        self.store.drop_bucket(&self.identifier)?;
        self.store.create_bucket(&self.identifier)?;

        let pk_field = collection.schema().primary_key_field.clone();
        let docs = collection.all().map_err(|e| FulltextError::Serialization(e.to_string()))?;
        for chunk in docs.chunks(batch_size.max(1)) {
            for doc in chunk {
                if let Some(id) = doc.get(&pk_field).and_then(Value::as_str) {
                    self.index_one(id, doc)?;
                }
            }
            tracing::debug!(identifier = %self.identifier, indexed = chunk.len(), "reindex batch complete");
        }
        Ok(())
    }

    pub fn apply_change(&self, event: &ChangeEvent) -> Result<(), FulltextError> {
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

    pub fn index_one(&self, id: &str, doc: &Document) -> Result<(), FulltextError> {
        let text = (self.project)(doc);
        let tokens = tokenize(&text, &self.tokenize);
        if tokens.is_empty() {
            return Ok(());
        }

        let txn = self.store.begin(false)?;

        let mut per_term: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *per_term.entry(token.clone()).or_insert(0) += 1;
        }

        for (term, freq) in &per_term {
            let mut postings = self.load_postings(&txn, term)?;
            postings.0.insert(id.to_string(), PostingEntry { freq: *freq, weight: *freq as f64 });
            self.store_postings(&txn, term, &postings)?;
        }

        let doc_meta = DocMeta { length: tokens.len() as u32, terms: per_term.keys().cloned().collect() };
        txn.put(&self.identifier, format!("{DOC_PREFIX}{id}").as_bytes(), &serde_json::to_vec(&doc_meta)?)?;

        let mut meta = self.load_meta(&txn)?;
        meta.doc_count += 1;
        meta.total_length += doc_meta.length as u64;
        txn.put(&self.identifier, META_KEY.as_bytes(), &serde_json::to_vec(&meta)?)?;

        txn.commit()?;
        Ok(())
    }

    pub fn remove_one(&self, id: &str) -> Result<(), FulltextError> {
        let txn = self.store.begin(false)?;
        let doc_key = format!("{DOC_PREFIX}{id}");
        let existing = txn.get(&self.identifier, doc_key.as_bytes())?;
        let Some(bytes) = existing else {
            txn.rollback()?;
            return Ok(());
        };
        let doc_meta: DocMeta = serde_json::from_slice(&bytes)?;

        for term in &doc_meta.terms {
            let mut postings = self.load_postings(&txn, term)?;
            postings.0.remove(id);
            self.store_postings(&txn, term, &postings)?;
        }

        txn.delete(&self.identifier, doc_key.as_bytes())?;

        let mut meta = self.load_meta(&txn)?;
        meta.doc_count = meta.doc_count.saturating_sub(1);
        meta.total_length = meta.total_length.saturating_sub(doc_meta.length as u64);
        txn.put(&self.identifier, META_KEY.as_bytes(), &serde_json::to_vec(&meta)?)?;

        txn.commit()?;
        Ok(())
    }

    pub fn count(&self) -> Result<u64, FulltextError> {
        let txn = self.store.begin(true)?;
        Ok(self.load_meta(&txn)?.doc_count)
    }

    /// Rank `query` against the index and return `(docId, score)` pairs,
    /// descending by score. `threshold` compares against the final
    /// BM25-normalized score.
    pub fn find_with_scores(
        &self,
        query: &str,
        limit: Option<usize>,
        threshold: Option<f64>,
    ) -> Result<Vec<ScoredId>, FulltextError> {
        let terms = tokenize(query, &self.tokenize);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let txn = self.store.begin(true)?;
        let meta = self.load_meta(&txn)?;
        if meta.doc_count == 0 {
            return Ok(Vec::new());
        }
        let avg_length = meta.total_length as f64 / meta.doc_count as f64;

        let mut scores: HashMap<String, f64> = HashMap::new();
        for term in &terms {
            let postings = self.load_postings(&txn, term)?;
            if postings.0.is_empty() {
                continue;
            }
            let n_t = postings.0.len() as f64;
            let idf = ((meta.doc_count as f64 - n_t + 0.5) / (n_t + 0.5) + 1.0).ln();

            for (doc_id, entry) in &postings.0 {
                let doc_meta = self.load_doc_meta(&txn, doc_id)?;
                let length = doc_meta.map(|d| d.length as f64).unwrap_or(avg_length);
                let f = entry.freq as f64;
                let denom = f + BM25_K1 * (1.0 - BM25_B + BM25_B * length / avg_length);
                let tf_normalized = if denom == 0.0 { 0.0 } else { (f * (BM25_K1 + 1.0)) / denom };
                *scores.entry(doc_id.clone()).or_insert(0.0) += idf * tf_normalized;
            }
        }

        let mut ranked: Vec<ScoredId> = scores.into_iter().collect();
        if let Some(threshold) = threshold {
            ranked.retain(|(_, score)| *score >= threshold);
        }
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        if let Some(limit) = limit {
            ranked.truncate(limit);
        }
        Ok(ranked)
    }

    /// Like `find_with_scores`, but hydrates full documents from `collection`
    /// and drops scores. Ids no longer present in the collection are skipped.
    pub fn find<CS: Store>(
        &self,
        collection: &Collection<CS>,
        query: &str,
        limit: Option<usize>,
        threshold: Option<f64>,
    ) -> Result<Vec<Document>, FulltextError> {
        let ranked = self.find_with_scores(query, limit, threshold)?;
        let mut docs = Vec::with_capacity(ranked.len());
        for (id, _) in ranked {
            if let Ok(Some(doc)) = collection.find_by_id(&id) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    fn load_postings(&self, txn: &S::Txn<'_>, term: &str) -> Result<Postings, FulltextError> {
        match txn.get(&self.identifier, format!("{TERM_PREFIX}{term}").as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Postings::default()),
        }
    }

    fn store_postings(&self, txn: &S::Txn<'_>, term: &str, postings: &Postings) -> Result<(), FulltextError> {
        if postings.0.is_empty() {
            txn.delete(&self.identifier, format!("{TERM_PREFIX}{term}").as_bytes())?;
        } else {
            txn.put(&self.identifier, format!("{TERM_PREFIX}{term}").as_bytes(), &serde_json::to_vec(postings)?)?;
        }
        Ok(())
    }

    fn load_doc_meta(&self, txn: &S::Txn<'_>, id: &str) -> Result<Option<DocMeta>, FulltextError> {
        match txn.get(&self.identifier, format!("{DOC_PREFIX}{id}").as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn load_meta(&self, txn: &S::Txn<'_>) -> Result<IndexMeta, FulltextError> {
        match txn.get(&self.identifier, META_KEY.as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(IndexMeta::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use slate_engine::Schema;
    use slate_store::MemoryStore;

    fn project(doc: &Document) -> String {
        let title = doc.get("title").and_then(Value::as_str).unwrap_or("");
        let body = doc.get("body").and_then(Value::as_str).unwrap_or("");
        format!("{title} {title} {body}")
    }

    #[test]
    fn find_ranks_more_relevant_doc_higher() {
        let index = FulltextIndex::open(MemoryStore::new(), "articles", TokenizeOptions::default(), project).unwrap();
        index
            .index_one("a", json!({"title": "Superman", "body": "flies over Metropolis"}).as_object().unwrap())
            .unwrap();
        index
            .index_one("b", json!({"title": "Batman", "body": "Superman guest appearance"}).as_object().unwrap())
            .unwrap();

        let ranked = index.find_with_scores("superman", None, None).unwrap();
        assert_eq!(ranked[0].0, "a");
    }

    #[test]
    fn empty_query_returns_empty() {
        let index = FulltextIndex::open(MemoryStore::new(), "articles", TokenizeOptions::default(), project).unwrap();
        index.index_one("a", json!({"title": "Superman", "body": "flies"}).as_object().unwrap()).unwrap();
        assert_eq!(index.find_with_scores("", None, None).unwrap().len(), 0);
    }

    #[test]
    fn threshold_filters_low_scores() {
        let index = FulltextIndex::open(MemoryStore::new(), "articles", TokenizeOptions::default(), project).unwrap();
        index.index_one("a", json!({"title": "Superman", "body": "flies"}).as_object().unwrap()).unwrap();
        let ranked = index.find_with_scores("superman", None, Some(f64::MAX)).unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn remove_one_clears_postings_and_count() {
        let index = FulltextIndex::open(MemoryStore::new(), "articles", TokenizeOptions::default(), project).unwrap();
        index.index_one("a", json!({"title": "Superman", "body": "flies"}).as_object().unwrap()).unwrap();
        index.remove_one("a").unwrap();
        assert_eq!(index.count().unwrap(), 0);
        assert_eq!(index.find_with_scores("superman", None, None).unwrap().len(), 0);
    }

    #[test]
    fn apply_change_update_replaces_postings() {
        let index = FulltextIndex::open(MemoryStore::new(), "articles", TokenizeOptions::default(), project).unwrap();
        let old = json!({"_id": "a", "title": "Superman", "body": "flies"}).as_object().unwrap().clone();
        let new = json!({"_id": "a", "title": "Batman", "body": "broods"}).as_object().unwrap().clone();
        index.apply_change(&ChangeEvent::insert("articles", "a", old.clone())).unwrap();
        index.apply_change(&ChangeEvent::update("articles", "a", new, old)).unwrap();

        assert_eq!(index.find_with_scores("superman", None, None).unwrap().len(), 0);
        assert_eq!(index.find_with_scores("batman", None, None).unwrap().len(), 1);
    }

    #[test]
    fn reindex_rebuilds_from_collection() {
        let collection = Collection::open("articles", MemoryStore::new(), Schema::new("_id")).unwrap();
        collection
            .insert_one(json!({"title": "Superman", "body": "flies"}).as_object().unwrap().clone())
            .unwrap();
        let index = FulltextIndex::open(MemoryStore::new(), "articles", TokenizeOptions::default(), project).unwrap();
        index.reindex(&collection, 10).unwrap();
        assert_eq!(index.count().unwrap(), 1);
    }
}

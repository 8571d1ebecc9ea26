use serde_json::Value;
use slate_query::{FilterNode, LogicalOp, Operator, Query};
use slate_store::{Store, Transaction};
use uuid::Uuid;

use crate::bus::ChangeBus;
use crate::change::ChangeEvent;
use crate::document::{Document, get_path};
use crate::encoding;
use crate::error::EngineError;
use crate::revision::next_revision_tag;
use crate::schema::Schema;

/// A single collection of JSON documents, backed by one bucket of a `Store`.
///
/// Keyed by `schema.primary_key_field`. Every mutation bumps the document's
/// revision tag, maintains the declared secondary indexes, and publishes a
/// `ChangeEvent` to the collection's bus only once the underlying
/// transaction has committed.
pub struct Collection<S: Store> {
    name: String,
    store: S,
    schema: Schema,
    bus: ChangeBus,
}

impl<S: Store> Collection<S> {
    pub fn open(name: impl Into<String>, store: S, schema: Schema) -> Result<Self, EngineError> {
        let name = name.into();
        store.create_bucket(&name)?;
        Ok(Self { name, store, schema, bus: ChangeBus::new() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Subscribe to this collection's change stream. Lagging subscribers
    /// drop the oldest undelivered events rather than stall writers.
    pub fn changes(&self) -> tokio::sync::broadcast::Receiver<ChangeEvent> {
        self.bus.subscribe()
    }

    /// Insert a single document. Fails with `Conflict` if the primary key
    /// already exists. A missing primary key is generated as a UUID v4.
    pub fn insert_one(&self, mut doc: Document) -> Result<String, EngineError> {
        let id = self.take_or_generate_id(&mut doc)?;
        self.schema.validate(&doc)?;

        let mut txn = self.store.begin(false)?;
        let key = encoding::record_key(&id);
        if txn.get(&self.name, &key)?.is_some() {
            txn.rollback()?;
            return Err(EngineError::Conflict(format!("document `{id}` already exists")));
        }

        let tag = next_revision_tag(0, &serde_json::to_vec(&Value::Object(doc.clone()))?);
        doc.insert(self.schema.revision_field.clone(), Value::String(tag));

        txn.put(&self.name, &key, &serde_json::to_vec(&Value::Object(doc.clone()))?)?;
        self.put_index_entries(&mut txn, &id, &doc)?;
        txn.commit()?;

        self.bus.publish(ChangeEvent::insert(self.name.clone(), id.clone(), doc));
        Ok(id)
    }

    pub fn bulk_upsert(&self, docs: Vec<Document>) -> Result<Vec<String>, EngineError> {
        docs.into_iter().map(|doc| self.upsert(doc)).collect()
    }

    /// Insert or fully replace the document at `doc`'s primary key.
    pub fn upsert(&self, mut doc: Document) -> Result<String, EngineError> {
        let id = self.take_or_generate_id(&mut doc)?;
        self.schema.validate(&doc)?;

        let mut txn = self.store.begin(false)?;
        let key = encoding::record_key(&id);
        let existing = txn.get(&self.name, &key)?;

        let current_generation = existing
            .as_deref()
            .and_then(|bytes| serde_json::from_slice::<Value>(bytes).ok())
            .and_then(|v| v.as_object().cloned())
            .and_then(|old| current_generation_of(&old, &self.schema.revision_field))
            .unwrap_or(0);

        let tag = next_revision_tag(current_generation, &serde_json::to_vec(&Value::Object(doc.clone()))?);
        doc.insert(self.schema.revision_field.clone(), Value::String(tag));

        if let Some(bytes) = &existing {
            let old: Document = serde_json::from_slice::<Value>(bytes)?
                .as_object()
                .cloned()
                .unwrap_or_default();
            self.delete_index_entries(&mut txn, &id, &old)?;
        }

        txn.put(&self.name, &key, &serde_json::to_vec(&Value::Object(doc.clone()))?)?;
        self.put_index_entries(&mut txn, &id, &doc)?;
        txn.commit()?;

        let old_doc = existing
            .as_deref()
            .and_then(|bytes| serde_json::from_slice::<Value>(bytes).ok())
            .and_then(|v| v.as_object().cloned());

        match old_doc {
            Some(old) => self.bus.publish(ChangeEvent::update(self.name.clone(), id.clone(), doc, old)),
            None => self.bus.publish(ChangeEvent::insert(self.name.clone(), id.clone(), doc)),
        }
        Ok(id)
    }

    /// Merge `patch`'s fields into the document at `id`. Returns the merged
    /// document. A `patch` field set to `null` is stored as `null`, not
    /// removed — callers that want deletion use `remove`.
    pub fn update(&self, id: &str, patch: Document) -> Result<Document, EngineError> {
        let mut txn = self.store.begin(false)?;
        let key = encoding::record_key(id);

        let mut existing: Document = match txn.get(&self.name, &key)? {
            Some(bytes) => serde_json::from_slice::<Value>(&bytes)?.as_object().cloned().unwrap_or_default(),
            None => {
                txn.rollback()?;
                return Err(EngineError::NotFound(id.to_string()));
            }
        };

        let old = existing.clone();
        self.delete_index_entries(&mut txn, id, &old)?;

        for (field, value) in patch {
            if field == self.schema.primary_key_field {
                continue;
            }
            existing.insert(field, value);
        }
        self.schema.validate(&existing)?;

        let current_generation = current_generation_of(&existing, &self.schema.revision_field).unwrap_or(0);
        let tag = next_revision_tag(current_generation, &serde_json::to_vec(&Value::Object(existing.clone()))?);
        existing.insert(self.schema.revision_field.clone(), Value::String(tag));

        txn.put(&self.name, &key, &serde_json::to_vec(&Value::Object(existing.clone()))?)?;
        self.put_index_entries(&mut txn, id, &existing)?;
        txn.commit()?;

        self.bus.publish(ChangeEvent::update(self.name.clone(), id.to_string(), existing.clone(), old));
        Ok(existing)
    }

    /// Remove a document by id. Unconditionally idempotent: removing an
    /// id that doesn't exist is not an error.
    pub fn remove(&self, id: &str) -> Result<(), EngineError> {
        let mut txn = self.store.begin(false)?;
        let key = encoding::record_key(id);

        let existing = match txn.get(&self.name, &key)? {
            Some(bytes) => bytes,
            None => {
                txn.rollback()?;
                return Ok(());
            }
        };
        let old: Document = serde_json::from_slice::<Value>(&existing)?.as_object().cloned().unwrap_or_default();

        self.delete_index_entries(&mut txn, id, &old)?;
        txn.delete(&self.name, &key)?;
        txn.commit()?;

        self.bus.publish(ChangeEvent::delete(self.name.clone(), id.to_string(), old));
        Ok(())
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<Document>, EngineError> {
        let txn = self.store.begin(true)?;
        let key = encoding::record_key(id);
        match txn.get(&self.name, &key)? {
            Some(bytes) => Ok(serde_json::from_slice::<Value>(&bytes)?.as_object().cloned()),
            None => Ok(None),
        }
    }

    pub fn all(&self) -> Result<Vec<Document>, EngineError> {
        self.find(&Query::new())
    }

    /// Run a filter/sort/skip/take query. If the top-level conjunction has
    /// an equality condition on a declared index, the index range is
    /// scanned for candidate ids instead of the whole document bucket;
    /// `slate_query::execute` still re-applies the full filter afterward,
    /// so an index probe only narrows the scan, it never changes results.
    pub fn find(&self, query: &Query) -> Result<Vec<Document>, EngineError> {
        let txn = self.store.begin(true)?;
        let docs = match self.top_level_index_probe(query) {
            Some((field, value)) => {
                let prefix = encoding::index_scan_prefix(field, value);
                let mut ids = Vec::new();
                for entry in txn.scan_prefix(&self.name, &prefix)? {
                    let (key, _) = entry?;
                    if let Some((_, id)) = encoding::parse_index_key(&key) {
                        ids.push(id.to_string());
                    }
                }
                let mut docs = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(bytes) = txn.get(&self.name, &encoding::record_key(&id))? {
                        docs.push(serde_json::from_slice::<Value>(&bytes)?.as_object().cloned().unwrap_or_default());
                    }
                }
                docs
            }
            None => {
                let prefix = encoding::data_scan_prefix();
                let mut docs = Vec::new();
                for entry in txn.scan_prefix(&self.name, &prefix)? {
                    let (_, value) = entry?;
                    docs.push(serde_json::from_slice::<Value>(&value)?.as_object().cloned().unwrap_or_default());
                }
                docs
            }
        };
        Ok(slate_query::execute(docs, query))
    }

    /// Find an equality condition in the query's top-level `And` conjunction
    /// whose field is declared as an index, if any.
    fn top_level_index_probe<'q>(&self, query: &'q Query) -> Option<(&'q str, &'q Value)> {
        let group = query.filter.as_ref()?;
        if group.logical != LogicalOp::And {
            return None;
        }
        group.children.iter().find_map(|node| match node {
            FilterNode::Condition(filter)
                if filter.operator == Operator::Eq && self.schema.indexes.iter().any(|f| f == &filter.field) =>
            {
                Some((filter.field.as_str(), &filter.value))
            }
            _ => None,
        })
    }

    /// Count documents matching a query. Short-circuits: the count need not
    /// materialize beyond what the filter/take pipeline already walks.
    pub fn count(&self, query: &Query) -> Result<usize, EngineError> {
        Ok(self.find(query)?.len())
    }

    fn take_or_generate_id(&self, doc: &mut Document) -> Result<String, EngineError> {
        match doc.remove(&self.schema.primary_key_field) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(EngineError::SchemaViolation(format!(
                "primary key `{}` must be a string, got {other}",
                self.schema.primary_key_field
            ))),
            None => {
                let generated = Uuid::new_v4().to_string();
                doc.insert(self.schema.primary_key_field.clone(), Value::String(generated.clone()));
                Ok(generated)
            }
        }
    }

    fn put_index_entries(&self, txn: &mut S::Txn<'_>, id: &str, doc: &Document) -> Result<(), EngineError> {
        for field in &self.schema.indexes {
            if let Some(value) = get_path(doc, field) {
                let idx_key = encoding::index_key(field, value, id);
                txn.put(&self.name, &idx_key, &[])?;
            }
        }
        Ok(())
    }

    fn delete_index_entries(&self, txn: &mut S::Txn<'_>, id: &str, doc: &Document) -> Result<(), EngineError> {
        for field in &self.schema.indexes {
            if let Some(value) = get_path(doc, field) {
                let idx_key = encoding::index_key(field, value, id);
                txn.delete(&self.name, &idx_key)?;
            }
        }
        Ok(())
    }
}

fn current_generation_of(doc: &Document, revision_field: &str) -> Option<u64> {
    doc.get(revision_field).and_then(Value::as_str).and_then(crate::revision::parse_generation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use slate_query::{Filter, FilterGroup, Operator, Sort};

    fn collection() -> Collection<slate_store::MemoryStore> {
        let store = slate_store::MemoryStore::new();
        let schema = Schema::new("_id").with_index("status");
        Collection::open("heroes", store, schema).unwrap()
    }

    #[test]
    fn insert_generates_id_and_revision() {
        let c = collection();
        let id = c.insert_one(json!({"name": "Clark"}).as_object().unwrap().clone()).unwrap();
        let doc = c.find_by_id(&id).unwrap().unwrap();
        assert_eq!(doc.get("name"), Some(&json!("Clark")));
        assert!(doc.get("_rev").unwrap().as_str().unwrap().starts_with("1-"));
    }

    #[test]
    fn insert_with_duplicate_id_conflicts() {
        let c = collection();
        let doc = json!({"_id": "kal-el", "name": "Clark"}).as_object().unwrap().clone();
        c.insert_one(doc.clone()).unwrap();
        let err = c.insert_one(doc).unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[test]
    fn update_merges_fields_and_bumps_revision() {
        let c = collection();
        let id = c.insert_one(json!({"name": "Clark", "status": "active"}).as_object().unwrap().clone()).unwrap();
        let first_rev = c.find_by_id(&id).unwrap().unwrap().get("_rev").unwrap().as_str().unwrap().to_string();

        let updated = c.update(&id, json!({"status": "retired"}).as_object().unwrap().clone()).unwrap();
        assert_eq!(updated.get("status"), Some(&json!("retired")));
        assert_eq!(updated.get("name"), Some(&json!("Clark")));
        assert_ne!(updated.get("_rev").unwrap().as_str().unwrap(), first_rev);
    }

    #[test]
    fn update_missing_id_errors_not_found() {
        let c = collection();
        let err = c.update("missing", json!({}).as_object().unwrap().clone()).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn remove_is_idempotent() {
        let c = collection();
        let id = c.insert_one(json!({"name": "Clark"}).as_object().unwrap().clone()).unwrap();
        c.remove(&id).unwrap();
        c.remove(&id).unwrap();
        assert!(c.find_by_id(&id).unwrap().is_none());
    }

    #[test]
    fn remove_cleans_up_index_entries() {
        let c = collection();
        let id = c.insert_one(json!({"name": "Clark", "status": "active"}).as_object().unwrap().clone()).unwrap();
        c.remove(&id).unwrap();

        let query = Query::new().with_filter(FilterGroup::and(vec![slate_query::FilterNode::Condition(
            Filter::new("status", Operator::Eq, json!("active")),
        )]));
        assert_eq!(c.find(&query).unwrap().len(), 0);
    }

    #[test]
    fn find_applies_filter_sort_skip_take() {
        let c = collection();
        c.insert_one(json!({"_id": "a", "status": "active", "age": 40}).as_object().unwrap().clone()).unwrap();
        c.insert_one(json!({"_id": "b", "status": "active", "age": 20}).as_object().unwrap().clone()).unwrap();
        c.insert_one(json!({"_id": "c", "status": "retired", "age": 30}).as_object().unwrap().clone()).unwrap();

        let query = Query::new()
            .with_filter(FilterGroup::and(vec![slate_query::FilterNode::Condition(Filter::new(
                "status",
                Operator::Eq,
                json!("active"),
            ))]))
            .with_sort(vec![Sort::asc("age")]);
        let results = c.find(&query).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].get("_id"), Some(&json!("b")));
    }

    #[test]
    fn upsert_replaces_existing_document_entirely() {
        let c = collection();
        c.upsert(json!({"_id": "kal-el", "name": "Clark", "status": "active"}).as_object().unwrap().clone()).unwrap();
        c.upsert(json!({"_id": "kal-el", "name": "Superman"}).as_object().unwrap().clone()).unwrap();
        let doc = c.find_by_id("kal-el").unwrap().unwrap();
        assert_eq!(doc.get("name"), Some(&json!("Superman")));
        assert_eq!(doc.get("status"), None);
    }

    #[tokio::test]
    async fn subscribers_observe_committed_changes() {
        let c = collection();
        let mut rx = c.changes();
        let id = c.insert_one(json!({"name": "Clark"}).as_object().unwrap().clone()).unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.id, id);
    }

    #[test]
    fn schema_violation_rejects_bad_write() {
        let store = slate_store::MemoryStore::new();
        let schema = Schema::new("_id").require("name", crate::schema::FieldType::String);
        let c = Collection::open("heroes", store, schema).unwrap();
        let err = c.insert_one(json!({}).as_object().unwrap().clone()).unwrap_err();
        assert!(matches!(err, EngineError::SchemaViolation(_)));
    }
}

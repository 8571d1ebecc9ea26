use std::collections::HashSet;

use serde_json::Value;
use slate_engine::{ChangeEvent, ChangeOp, Document};
use slate_store::Store;

use crate::error::GraphError;
use crate::quad::QuadStore;

/// Declares how a single document field projects into graph edges.
pub struct RelationMapping {
    pub collection: String,
    pub field: String,
    pub relation: String,
    /// Field read off a nested-object element to find its target id, when
    /// the element isn't a bare string. Falls back to `id`/`_id`.
    pub target_field: Option<String>,
    pub auto_link: bool,
}

impl RelationMapping {
    pub fn new(collection: impl Into<String>, field: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
            relation: relation.into(),
            target_field: None,
            auto_link: true,
        }
    }

    pub fn with_target_field(mut self, field: impl Into<String>) -> Self {
        self.target_field = Some(field.into());
        self
    }

    pub fn with_auto_link(mut self, auto_link: bool) -> Self {
        self.auto_link = auto_link;
        self
    }

    fn extract_id(&self, element: &Value) -> Option<String> {
        match element {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => {
                if let Some(field) = &self.target_field {
                    if let Some(Value::String(s)) = map.get(field) {
                        return Some(s.clone());
                    }
                }
                map.get("id")
                    .or_else(|| map.get("_id"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            }
            _ => None,
        }
    }

    /// Extract the set of target ids a document's mapped field currently
    /// names: a bare string, every element of a sequence, or a single
    /// nested-mapping object.
    fn targets(&self, doc: &Document) -> HashSet<String> {
        match doc.get(&self.field) {
            Some(Value::String(s)) => HashSet::from([s.clone()]),
            Some(Value::Array(items)) => items.iter().filter_map(|item| self.extract_id(item)).collect(),
            Some(value @ Value::Object(_)) => self.extract_id(value).into_iter().collect(),
            _ => HashSet::new(),
        }
    }
}

/// Keeps a `QuadStore` in sync with a collection's change stream according
/// to a registered table of `RelationMapping`s.
pub struct GraphBridge<S: Store> {
    graph: QuadStore<S>,
    mappings: Vec<RelationMapping>,
}

impl<S: Store> GraphBridge<S> {
    pub fn new(graph: QuadStore<S>, mappings: Vec<RelationMapping>) -> Self {
        Self { graph, mappings }
    }

    pub fn graph(&self) -> &QuadStore<S> {
        &self.graph
    }

    pub fn apply_change(&self, event: &ChangeEvent) -> Result<(), GraphError> {
        for mapping in self.mappings.iter().filter(|m| m.collection == event.collection && m.auto_link) {
            match event.op {
                ChangeOp::Insert => {
                    if let Some(new) = &event.new {
                        for target in mapping.targets(new) {
                            self.graph.link(&event.id, &mapping.relation, &target)?;
                        }
                    }
                }
                ChangeOp::Update => {
                    let old_targets = event.old.as_ref().map(|d| mapping.targets(d)).unwrap_or_default();
                    let new_targets = event.new.as_ref().map(|d| mapping.targets(d)).unwrap_or_default();
                    for removed in old_targets.difference(&new_targets) {
                        self.graph.unlink(&event.id, &mapping.relation, removed)?;
                    }
                    for added in new_targets.difference(&old_targets) {
                        self.graph.link(&event.id, &mapping.relation, added)?;
                    }
                }
                ChangeOp::Delete => {
                    self.graph.remove_incident(&event.id)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use slate_store::MemoryStore;

    fn bridge() -> GraphBridge<MemoryStore> {
        let graph = QuadStore::open(MemoryStore::new(), "graph").unwrap();
        let mapping = RelationMapping::new("articles", "tags", "tagged_with");
        GraphBridge::new(graph, vec![mapping])
    }

    #[test]
    fn insert_links_sequence_of_string_targets() {
        let bridge = bridge();
        let doc = json!({"_id": "a1", "tags": ["rust", "databases"]}).as_object().unwrap().clone();
        bridge.apply_change(&ChangeEvent::insert("articles", "a1", doc)).unwrap();
        assert!(bridge.graph().has("a1", "tagged_with", "rust").unwrap());
        assert!(bridge.graph().has("a1", "tagged_with", "databases").unwrap());
    }

    #[test]
    fn update_diffs_target_sets() {
        let bridge = bridge();
        let old = json!({"_id": "a1", "tags": ["rust", "databases"]}).as_object().unwrap().clone();
        let new = json!({"_id": "a1", "tags": ["rust", "graphs"]}).as_object().unwrap().clone();
        bridge.apply_change(&ChangeEvent::insert("articles", "a1", old.clone())).unwrap();
        bridge.apply_change(&ChangeEvent::update("articles", "a1", new, old)).unwrap();

        assert!(bridge.graph().has("a1", "tagged_with", "rust").unwrap());
        assert!(!bridge.graph().has("a1", "tagged_with", "databases").unwrap());
        assert!(bridge.graph().has("a1", "tagged_with", "graphs").unwrap());
    }

    #[test]
    fn delete_removes_every_incident_edge() {
        let bridge = bridge();
        let doc = json!({"_id": "a1", "tags": ["rust"]}).as_object().unwrap().clone();
        bridge.apply_change(&ChangeEvent::insert("articles", "a1", doc.clone())).unwrap();
        bridge.apply_change(&ChangeEvent::delete("articles", "a1", doc)).unwrap();
        assert!(!bridge.graph().has("a1", "tagged_with", "rust").unwrap());
    }

    #[test]
    fn nested_mapping_extracts_target_field() {
        let graph = QuadStore::open(MemoryStore::new(), "graph").unwrap();
        let mapping = RelationMapping::new("articles", "author", "written_by").with_target_field("slug");
        let bridge = GraphBridge::new(graph, vec![mapping]);

        let doc = json!({"_id": "a1", "author": {"slug": "clark-kent", "name": "Clark Kent"}})
            .as_object()
            .unwrap()
            .clone();
        bridge.apply_change(&ChangeEvent::insert("articles", "a1", doc)).unwrap();
        assert!(bridge.graph().has("a1", "written_by", "clark-kent").unwrap());
    }
}

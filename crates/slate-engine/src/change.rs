use crate::document::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A single change, published to a collection's `ChangeBus` only after the
/// underlying KV transaction has committed.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: String,
    pub id: String,
    pub op: ChangeOp,
    pub new: Option<Document>,
    pub old: Option<Document>,
}

impl ChangeEvent {
    pub fn insert(collection: impl Into<String>, id: impl Into<String>, new: Document) -> Self {
        Self { collection: collection.into(), id: id.into(), op: ChangeOp::Insert, new: Some(new), old: None }
    }

    pub fn update(collection: impl Into<String>, id: impl Into<String>, new: Document, old: Document) -> Self {
        Self { collection: collection.into(), id: id.into(), op: ChangeOp::Update, new: Some(new), old: Some(old) }
    }

    pub fn delete(collection: impl Into<String>, id: impl Into<String>, old: Document) -> Self {
        Self { collection: collection.into(), id: id.into(), op: ChangeOp::Delete, new: None, old: Some(old) }
    }
}

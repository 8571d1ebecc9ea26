use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use slate_engine::Document;
use slate_store::{Store, Transaction};

use crate::error::ReplicationError;

const QUEUE_PREFIX: &str = "queue:";

fn now_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueOp {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub op: QueueOp,
    pub doc_id: String,
    pub doc: Option<Document>,
    pub retries: u32,
    pub created_at: i64,
    pub last_error: Option<String>,
}

impl QueueItem {
    pub fn new(op: QueueOp, doc_id: impl Into<String>, doc: Option<Document>) -> Self {
        Self { op, doc_id: doc_id.into(), doc, retries: 0, created_at: now_millis(), last_error: None }
    }

    /// `createdAt + (retries+1) * retryInterval`, per the durable retry
    /// contract — backoff widens with every failed attempt.
    pub fn next_attempt_at(&self, retry_interval_ms: i64) -> i64 {
        self.created_at + (self.retries as i64 + 1) * retry_interval_ms
    }
}

/// Persisted, restart-surviving push retry queue. Keyed by
/// `created_at_ms:doc_id` so iteration naturally visits the oldest item
/// first.
pub struct RetryQueue<S: Store> {
    store: S,
    identifier: String,
}

impl<S: Store> RetryQueue<S> {
    pub fn open(store: S, identifier: impl Into<String>) -> Result<Self, ReplicationError> {
        let identifier = identifier.into();
        store.create_bucket(&identifier)?;
        Ok(Self { store, identifier })
    }

    fn key(item: &QueueItem) -> Vec<u8> {
        format!("{QUEUE_PREFIX}{:020}:{}", item.created_at, item.doc_id).into_bytes()
    }

    pub fn enqueue(&self, item: &QueueItem) -> Result<(), ReplicationError> {
        let txn = self.store.begin(false)?;
        txn.put(&self.identifier, &Self::key(item), &serde_json::to_vec(item)?)?;
        txn.commit()?;
        Ok(())
    }

    /// All items whose next retry time has arrived, oldest first.
    pub fn due_items(&self, now_ms: i64, retry_interval_ms: i64) -> Result<Vec<(Vec<u8>, QueueItem)>, ReplicationError> {
        let txn = self.store.begin(true)?;
        let mut due = Vec::new();
        for entry in txn.scan_prefix(&self.identifier, QUEUE_PREFIX.as_bytes())? {
            let (key, value) = entry?;
            let item: QueueItem = serde_json::from_slice(&value)?;
            if item.next_attempt_at(retry_interval_ms) <= now_ms {
                due.push((key.to_vec(), item));
            }
        }
        Ok(due)
    }

    pub fn remove(&self, key: &[u8]) -> Result<(), ReplicationError> {
        let txn = self.store.begin(false)?;
        txn.delete(&self.identifier, key)?;
        txn.commit()?;
        Ok(())
    }

    pub fn requeue_with_failure(&self, key: &[u8], mut item: QueueItem, error: String) -> Result<(), ReplicationError> {
        let txn = self.store.begin(false)?;
        txn.delete(&self.identifier, key)?;
        item.retries += 1;
        item.last_error = Some(error);
        txn.put(&self.identifier, &Self::key(&item), &serde_json::to_vec(&item)?)?;
        txn.commit()?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize, ReplicationError> {
        let txn = self.store.begin(true)?;
        Ok(txn.scan_prefix(&self.identifier, QUEUE_PREFIX.as_bytes())?.count())
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use arc_swap::ArcSwap;
use imbl::OrdMap;

use crate::error::StoreError;
use crate::store::Store;

use super::transaction::MemoryTransaction;

pub(crate) type Bucket = OrdMap<Vec<u8>, Vec<u8>>;

/// Copy-on-write, in-RAM key-value store. Never shared across handles: each
/// `MemoryStore::new()` call is its own isolated world, per the KV adapter's
/// shared-handle policy (on-disk stores share by path; memory stores don't).
pub struct MemoryStore {
    buckets: RwLock<HashMap<String, Arc<ArcSwap<Bucket>>>>,
    write_lock: Mutex<()>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn acquire_write_lock(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))
    }

    pub(crate) fn snapshot(&self, name: &str) -> Option<Arc<Bucket>> {
        let buckets = self.buckets.read().unwrap();
        let slot = buckets.get(name)?;
        Some(slot.load_full())
    }

    /// Push dirty buckets back. Caller already holds the write lock, so no
    /// conflict detection is necessary.
    pub(crate) fn commit(&self, dirty: HashMap<String, Arc<Bucket>>) {
        let buckets = self.buckets.read().unwrap();
        for (name, data) in dirty {
            if let Some(slot) = buckets.get(&name) {
                slot.store(data);
            }
        }
    }
}

impl Store for MemoryStore {
    type Txn<'a> = MemoryTransaction<'a>;

    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError> {
        if read_only {
            Ok(MemoryTransaction::new_read_only(self))
        } else {
            let guard = self.acquire_write_lock()?;
            Ok(MemoryTransaction::new_writable(self, guard))
        }
    }

    fn create_bucket(&self, name: &str) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().unwrap();
        buckets
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::new(Arc::new(OrdMap::new()))));
        Ok(())
    }

    fn drop_bucket(&self, name: &str) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().unwrap();
        buckets.remove(name);
        Ok(())
    }

    fn backup(&self, path: &std::path::Path) -> Result<(), StoreError> {
        let buckets = self.buckets.read().unwrap();
        let mut flat: Vec<(String, Vec<u8>, Vec<u8>)> = Vec::new();
        for (name, slot) in buckets.iter() {
            let snap = slot.load_full();
            for (k, v) in snap.iter() {
                flat.push((name.clone(), k.clone(), v.clone()));
            }
        }
        let encoded = bincode::serialize(&flat)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        std::fs::write(path, encoded).map_err(|e| StoreError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Transaction;

    #[test]
    fn write_then_read_committed() {
        let store = MemoryStore::new();
        store.create_bucket("docs").unwrap();

        let mut txn = store.begin(false).unwrap();
        txn.put("docs", b"a", b"1").unwrap();
        txn.commit().unwrap();

        let txn = store.begin(true).unwrap();
        assert_eq!(txn.get("docs", b"a").unwrap().as_deref(), Some(&b"1"[..]));
    }

    #[test]
    fn rollback_does_not_persist() {
        let store = MemoryStore::new();
        store.create_bucket("docs").unwrap();

        let mut txn = store.begin(false).unwrap();
        txn.put("docs", b"a", b"1").unwrap();
        txn.rollback().unwrap();

        let txn = store.begin(true).unwrap();
        assert!(txn.get("docs", b"a").unwrap().is_none());
    }

    #[test]
    fn read_only_transaction_rejects_writes() {
        let store = MemoryStore::new();
        store.create_bucket("docs").unwrap();
        let txn = store.begin(true).unwrap();
        assert!(matches!(txn.put("docs", b"a", b"1"), Err(StoreError::ReadOnly)));
    }

    #[test]
    fn scan_prefix_is_lexicographic() {
        let store = MemoryStore::new();
        store.create_bucket("docs").unwrap();
        let mut txn = store.begin(false).unwrap();
        txn.put("docs", b"b", b"2").unwrap();
        txn.put("docs", b"a", b"1").unwrap();
        txn.put("docs", b"c", b"3").unwrap();
        txn.commit().unwrap();

        let txn = store.begin(true).unwrap();
        let keys: Vec<Vec<u8>> = txn
            .scan_prefix("docs", b"")
            .unwrap()
            .map(|r| r.unwrap().0.to_vec())
            .collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }
}

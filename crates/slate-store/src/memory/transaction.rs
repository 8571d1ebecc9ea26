use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, MutexGuard};

use crate::error::StoreError;
use crate::store::Transaction;

use super::store::{Bucket, MemoryStore};

struct Snapshot {
    data: HashMap<String, Arc<Bucket>>,
}

impl Snapshot {
    fn new() -> Self {
        Self { data: HashMap::new() }
    }

    fn ensure(&mut self, store: &MemoryStore, bucket: &str) -> Result<(), StoreError> {
        if !self.data.contains_key(bucket) {
            match store.snapshot(bucket) {
                Some(data) => {
                    self.data.insert(bucket.to_string(), data);
                }
                None => return Err(StoreError::BucketNotFound(bucket.to_string())),
            }
        }
        Ok(())
    }

    fn get(&self, bucket: &str) -> Result<&Arc<Bucket>, StoreError> {
        self.data
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))
    }

    fn get_mut(&mut self, bucket: &str) -> Result<&mut Bucket, StoreError> {
        let arc = self
            .data
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        Ok(Arc::make_mut(arc))
    }
}

pub struct MemoryTransaction<'a> {
    snapshot: RefCell<Option<Snapshot>>,
    dirty: RefCell<HashSet<String>>,
    store: &'a MemoryStore,
    read_only: bool,
    _write_guard: Option<MutexGuard<'a, ()>>,
}

impl<'a> MemoryTransaction<'a> {
    pub(crate) fn new_read_only(store: &'a MemoryStore) -> Self {
        Self {
            snapshot: RefCell::new(Some(Snapshot::new())),
            dirty: RefCell::new(HashSet::new()),
            store,
            read_only: true,
            _write_guard: None,
        }
    }

    pub(crate) fn new_writable(store: &'a MemoryStore, guard: MutexGuard<'a, ()>) -> Self {
        Self {
            snapshot: RefCell::new(Some(Snapshot::new())),
            dirty: RefCell::new(HashSet::new()),
            store,
            read_only: false,
            _write_guard: Some(guard),
        }
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }
}

impl<'a> Transaction for MemoryTransaction<'a> {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Box<[u8]>>, StoreError> {
        let mut snap = self.snapshot.borrow_mut();
        let snap = snap.as_mut().ok_or(StoreError::TransactionConsumed)?;
        snap.ensure(self.store, bucket)?;
        Ok(snap.get(bucket)?.get(key).map(|v| v.clone().into_boxed_slice()))
    }

    fn scan_prefix<'b>(
        &'b self,
        bucket: &str,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = Result<(Box<[u8]>, Box<[u8]>), StoreError>> + 'b>, StoreError>
    {
        let mut snap = self.snapshot.borrow_mut();
        let snap = snap.as_mut().ok_or(StoreError::TransactionConsumed)?;
        snap.ensure(self.store, bucket)?;
        let data = Arc::clone(snap.get(bucket)?);
        let prefix = prefix.to_vec();
        let entries: Vec<(Box<[u8]>, Box<[u8]>)> = data
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| (k.clone().into_boxed_slice(), v.clone().into_boxed_slice()))
            .collect();
        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut snap = self.snapshot.borrow_mut();
        let snap = snap.as_mut().ok_or(StoreError::TransactionConsumed)?;
        snap.ensure(self.store, bucket)?;
        snap.get_mut(bucket)?.insert(key.to_vec(), value.to_vec());
        self.dirty.borrow_mut().insert(bucket.to_string());
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut snap = self.snapshot.borrow_mut();
        let snap = snap.as_mut().ok_or(StoreError::TransactionConsumed)?;
        snap.ensure(self.store, bucket)?;
        snap.get_mut(bucket)?.remove(key);
        self.dirty.borrow_mut().insert(bucket.to_string());
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        let snapshot = self.snapshot.into_inner().ok_or(StoreError::TransactionConsumed)?;
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let dirty_set = self.dirty.into_inner();
        let dirty: HashMap<String, Arc<Bucket>> = snapshot
            .data
            .into_iter()
            .filter(|(name, _)| dirty_set.contains(name))
            .collect();
        if !dirty.is_empty() {
            self.store.commit(dirty);
        }
        Ok(())
    }

    fn rollback(self) -> Result<(), StoreError> {
        if self.snapshot.into_inner().is_none() {
            return Err(StoreError::TransactionConsumed);
        }
        Ok(())
    }
}

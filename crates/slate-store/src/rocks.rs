//! RocksDB-backed `Store`, behind the `rocksdb` feature. One column family
//! per bucket; the KV adapter's bucket abstraction maps directly onto
//! RocksDB's own column family concept instead of a key-prefix emulation.

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, MultiThreaded, Options};

use crate::error::StoreError;
use crate::store::{Store, Transaction};

type DB = rocksdb::OptimisticTransactionDB<MultiThreaded>;

pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let existing = DB::list_cf(&opts, path).unwrap_or_default();
        let db = if existing.is_empty() {
            DB::open(&opts, path)
        } else {
            let descriptors: Vec<_> = existing
                .into_iter()
                .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
                .collect();
            DB::open_cf_descriptors(&opts, path, descriptors)
        }
        .map_err(|e| StoreError::Storage(e.to_string()))?;

        Ok(Self { db })
    }

    fn ensure_cf(&self, name: &str) -> Result<(), StoreError> {
        if self.db.cf_handle(name).is_none() {
            self.db
                .create_cf(name, &Options::default())
                .map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}

impl Store for RocksStore {
    type Txn<'a> = RocksTransaction<'a>;

    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError> {
        Ok(RocksTransaction { txn: Some(self.db.transaction()), db: &self.db, read_only })
    }

    fn create_bucket(&self, name: &str) -> Result<(), StoreError> {
        self.ensure_cf(name)
    }

    fn drop_bucket(&self, name: &str) -> Result<(), StoreError> {
        if self.db.cf_handle(name).is_some() {
            self.db.drop_cf(name).map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    fn backup(&self, path: &Path) -> Result<(), StoreError> {
        let checkpoint = rocksdb::checkpoint::Checkpoint::new(&self.db)
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        checkpoint
            .create_checkpoint(path)
            .map_err(|e| StoreError::Storage(e.to_string()))
    }
}

pub struct RocksTransaction<'db> {
    txn: Option<rocksdb::Transaction<'db, DB>>,
    db: &'db DB,
    read_only: bool,
}

impl<'db> RocksTransaction<'db> {
    fn txn(&self) -> Result<&rocksdb::Transaction<'db, DB>, StoreError> {
        self.txn.as_ref().ok_or(StoreError::TransactionConsumed)
    }

    fn cf(&self, name: &str) -> Result<Arc<rocksdb::BoundColumnFamily<'db>>, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::BucketNotFound(name.to_string()))
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }
}

use std::sync::Arc;

impl<'db> Transaction for RocksTransaction<'db> {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Box<[u8]>>, StoreError> {
        let cf = self.cf(bucket)?;
        self.txn()?
            .get_cf(&cf, key)
            .map(|opt| opt.map(|v| v.into_boxed_slice()))
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn scan_prefix<'a>(
        &'a self,
        bucket: &str,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = Result<(Box<[u8]>, Box<[u8]>), StoreError>> + 'a>, StoreError>
    {
        let cf = self.cf(bucket)?;
        let prefix_owned = prefix.to_vec();
        let iter = self.txn()?.iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));
        Ok(Box::new(iter.map_while(move |item| match item {
            Ok((k, v)) if k.starts_with(&prefix_owned) => {
                Some(Ok((k.into_vec().into_boxed_slice(), v.into_vec().into_boxed_slice())))
            }
            Ok(_) => None,
            Err(e) => Some(Err(StoreError::Storage(e.to_string()))),
        })))
    }

    fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.check_writable()?;
        let cf = self.cf(bucket)?;
        self.txn()?.put_cf(&cf, key, value).map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<(), StoreError> {
        self.check_writable()?;
        let cf = self.cf(bucket)?;
        self.txn()?.delete_cf(&cf, key).map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn commit(self) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        self.txn.unwrap().commit().map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn rollback(self) -> Result<(), StoreError> {
        self.txn.unwrap().rollback().map_err(|e| StoreError::Storage(e.to_string()))
    }
}

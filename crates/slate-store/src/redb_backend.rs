//! `redb`-backed `Store`, behind the `redb` feature. One table per bucket.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::StoreError;
use crate::store::{Store, Transaction};

const REGISTRY_TABLE: TableDefinition<'static, &str, ()> = TableDefinition::new("_buckets");

pub struct RedbBackedStore {
    db: Database,
}

impl RedbBackedStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(|e| StoreError::Storage(e.to_string()))?;
        let txn = db.begin_write().map_err(|e| StoreError::Storage(e.to_string()))?;
        txn.open_table(REGISTRY_TABLE).map_err(|e| StoreError::Storage(e.to_string()))?;
        txn.commit().map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(Self { db })
    }

    fn table_def(name: &str) -> TableDefinition<'static, &'static [u8], &'static [u8]> {
        // SAFETY: redb table names are looked up by string content, not by the
        // lifetime of this particular `&str`; leaking a short, bucket-count-bounded
        // set of names is an acceptable tradeoff for a straightforward API here.
        let leaked: &'static str = Box::leak(name.to_string().into_boxed_str());
        TableDefinition::new(leaked)
    }
}

impl Store for RedbBackedStore {
    type Txn<'a> = RedbTransaction<'a>;

    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError> {
        if read_only {
            let txn = self.db.begin_read().map_err(|e| StoreError::Storage(e.to_string()))?;
            Ok(RedbTransaction::Read(txn))
        } else {
            let txn = self.db.begin_write().map_err(|e| StoreError::Storage(e.to_string()))?;
            Ok(RedbTransaction::Write(txn))
        }
    }

    fn create_bucket(&self, name: &str) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Storage(e.to_string()))?;
        txn.open_table(Self::table_def(name)).map_err(|e| StoreError::Storage(e.to_string()))?;
        {
            let mut registry = txn
                .open_table(REGISTRY_TABLE)
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            registry.insert(name, ()).map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn drop_bucket(&self, name: &str) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Storage(e.to_string()))?;
        txn.delete_table(Self::table_def(name)).map_err(|e| StoreError::Storage(e.to_string()))?;
        {
            let mut registry = txn
                .open_table(REGISTRY_TABLE)
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            registry.remove(name).map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn backup(&self, path: &Path) -> Result<(), StoreError> {
        std::fs::copy(self.db.path(), path)
            .map(|_| ())
            .map_err(|e| StoreError::Storage(e.to_string()))
    }
}

pub enum RedbTransaction<'db> {
    Read(redb::ReadTransaction),
    Write(redb::WriteTransaction),
    #[doc(hidden)]
    _Marker(std::marker::PhantomData<&'db ()>),
}

impl<'db> Transaction for RedbTransaction<'db> {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Box<[u8]>>, StoreError> {
        let def = RedbBackedStore::table_def(bucket);
        let value = match self {
            RedbTransaction::Read(txn) => {
                let table = txn.open_table(def).map_err(|e| StoreError::Storage(e.to_string()))?;
                table.get(key).map_err(|e| StoreError::Storage(e.to_string()))?
            }
            RedbTransaction::Write(txn) => {
                let table = txn.open_table(def).map_err(|e| StoreError::Storage(e.to_string()))?;
                table.get(key).map_err(|e| StoreError::Storage(e.to_string()))?
            }
            RedbTransaction::_Marker(_) => unreachable!(),
        };
        Ok(value.map(|v| v.value().to_vec().into_boxed_slice()))
    }

    fn scan_prefix<'a>(
        &'a self,
        bucket: &str,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = Result<(Box<[u8]>, Box<[u8]>), StoreError>> + 'a>, StoreError>
    {
        let def = RedbBackedStore::table_def(bucket);
        let prefix_owned = prefix.to_vec();
        let entries: Vec<(Box<[u8]>, Box<[u8]>)> = match self {
            RedbTransaction::Read(txn) => {
                let table = txn.open_table(def).map_err(|e| StoreError::Storage(e.to_string()))?;
                table
                    .range::<&[u8]>(prefix..)
                    .map_err(|e| StoreError::Storage(e.to_string()))?
                    .filter_map(|r| r.ok())
                    .take_while(|(k, _)| k.value().starts_with(&prefix_owned))
                    .map(|(k, v)| (k.value().to_vec().into_boxed_slice(), v.value().to_vec().into_boxed_slice()))
                    .collect()
            }
            RedbTransaction::Write(txn) => {
                let table = txn.open_table(def).map_err(|e| StoreError::Storage(e.to_string()))?;
                table
                    .range::<&[u8]>(prefix..)
                    .map_err(|e| StoreError::Storage(e.to_string()))?
                    .filter_map(|r| r.ok())
                    .take_while(|(k, _)| k.value().starts_with(&prefix_owned))
                    .map(|(k, v)| (k.value().to_vec().into_boxed_slice(), v.value().to_vec().into_boxed_slice()))
                    .collect()
            }
            RedbTransaction::_Marker(_) => unreachable!(),
        };
        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        match self {
            RedbTransaction::Write(txn) => {
                let mut table = txn
                    .open_table(RedbBackedStore::table_def(bucket))
                    .map_err(|e| StoreError::Storage(e.to_string()))?;
                table.insert(key, value).map_err(|e| StoreError::Storage(e.to_string()))?;
                Ok(())
            }
            _ => Err(StoreError::ReadOnly),
        }
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<(), StoreError> {
        match self {
            RedbTransaction::Write(txn) => {
                let mut table = txn
                    .open_table(RedbBackedStore::table_def(bucket))
                    .map_err(|e| StoreError::Storage(e.to_string()))?;
                table.remove(key).map_err(|e| StoreError::Storage(e.to_string()))?;
                Ok(())
            }
            _ => Err(StoreError::ReadOnly),
        }
    }

    fn commit(self) -> Result<(), StoreError> {
        match self {
            RedbTransaction::Write(txn) => txn.commit().map_err(|e| StoreError::Storage(e.to_string())),
            RedbTransaction::Read(_) => Err(StoreError::ReadOnly),
            RedbTransaction::_Marker(_) => unreachable!(),
        }
    }

    fn rollback(self) -> Result<(), StoreError> {
        match self {
            RedbTransaction::Write(txn) => {
                txn.abort().map_err(|e| StoreError::Storage(e.to_string()))
            }
            RedbTransaction::Read(_) => Ok(()),
            RedbTransaction::_Marker(_) => unreachable!(),
        }
    }
}

use crate::error::StoreError;

/// Options controlling how a store is opened.
///
/// Mirrors the embedder-supplied configuration pattern used throughout this
/// workspace: subsystems never read environment or files themselves, callers
/// always hand in an explicit options struct.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub in_memory: bool,
    pub sync_writes: bool,
    pub index_cache_size: usize,
    pub block_cache_size: usize,
    pub encryption_key: Option<Vec<u8>>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            in_memory: true,
            sync_writes: false,
            index_cache_size: 64 * 1024 * 1024,
            block_cache_size: 64 * 1024 * 1024,
            encryption_key: None,
        }
    }
}

/// A byte-key, byte-value transactional store. Buckets are logical
/// namespaces emulated by key prefixes; every higher-level entity (document
/// bodies, revision markers, index segments, queue items, watermarks) lives
/// in its own bucket.
pub trait Store: Send + Sync {
    type Txn<'a>: Transaction
    where
        Self: 'a;

    /// Start a new transaction. Read-only transactions never block writers;
    /// at most one write transaction is live at a time.
    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError>;

    /// Ensure a bucket exists. Idempotent.
    fn create_bucket(&self, name: &str) -> Result<(), StoreError>;

    /// Remove a bucket and everything in it. Idempotent.
    fn drop_bucket(&self, name: &str) -> Result<(), StoreError>;

    /// Snapshot the entire store to a single file.
    fn backup(&self, path: &std::path::Path) -> Result<(), StoreError>;
}

/// Cooperative cancellation signal threaded through iteration and backup.
pub trait CancelToken {
    fn is_cancelled(&self) -> bool;
}

/// A token that never cancels, for call sites with no cancellation source.
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

pub trait Transaction {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Box<[u8]>>, StoreError>;

    fn scan_prefix<'a>(
        &'a self,
        bucket: &str,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = Result<(Box<[u8]>, Box<[u8]>), StoreError>> + 'a>, StoreError>;

    /// Like `scan_prefix`, but stops early (yielding a final `Cancelled` item)
    /// once `cancel.is_cancelled()` is observed true.
    fn scan_prefix_cancellable<'a>(
        &'a self,
        bucket: &str,
        prefix: &[u8],
        cancel: &'a dyn CancelToken,
    ) -> Result<Box<dyn Iterator<Item = Result<(Box<[u8]>, Box<[u8]>), StoreError>> + 'a>, StoreError>
    {
        let inner = self.scan_prefix(bucket, prefix)?;
        Ok(Box::new(CancellableIter { inner, cancel, done: false }))
    }

    fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<(), StoreError>;

    fn commit(self) -> Result<(), StoreError>;

    fn rollback(self) -> Result<(), StoreError>;
}

/// Forwards to the wrapped store. Lets callers share one store across
/// multiple owners (e.g. one `Collection` per name inside a `Database`)
/// via a cheap `Arc` clone instead of a self-referential borrow.
impl<T: Store + ?Sized> Store for std::sync::Arc<T> {
    type Txn<'a>
        = T::Txn<'a>
    where
        Self: 'a;

    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError> {
        (**self).begin(read_only)
    }

    fn create_bucket(&self, name: &str) -> Result<(), StoreError> {
        (**self).create_bucket(name)
    }

    fn drop_bucket(&self, name: &str) -> Result<(), StoreError> {
        (**self).drop_bucket(name)
    }

    fn backup(&self, path: &std::path::Path) -> Result<(), StoreError> {
        (**self).backup(path)
    }
}

struct CancellableIter<'a, I> {
    inner: I,
    cancel: &'a dyn CancelToken,
    done: bool,
}

impl<'a, I> Iterator for CancellableIter<'a, I>
where
    I: Iterator<Item = Result<(Box<[u8]>, Box<[u8]>), StoreError>>,
{
    type Item = Result<(Box<[u8]>, Box<[u8]>), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.done = true;
            return Some(Err(StoreError::Cancelled));
        }
        self.inner.next()
    }
}

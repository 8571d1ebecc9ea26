use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use slate_engine::{ChangeBus, ChangeEvent, Collection, Document, Schema};
use slate_fulltext::{FulltextIndex, TokenizeOptions};
use slate_graph::{GraphBridge, QuadStore, RelationMapping};
use slate_replication::{DurableConfig, ReplicationConfig, ReplicationEngine};
use slate_store::Store;
use slate_vector::{DistanceMetric, VectorIndex};

use crate::error::DbError;

/// Opens a KV store and hands out collections over it. `collection(name,
/// schema)` is idempotent: the first call to open a given name wins and
/// every later call (even with a different `schema`) returns that same
/// instance. Change events from every collection are also fanned out on
/// one process-wide bus, so a subscriber that wants to watch everything
/// (an index registry, a replication supervisor) doesn't need to track
/// collections as they're created.
pub struct Database<S: Store> {
    store: Arc<S>,
    collections: RwLock<HashMap<String, Arc<Collection<Arc<S>>>>>,
    fulltext: RwLock<HashMap<String, Arc<FulltextIndex<Arc<S>>>>>,
    vector: RwLock<HashMap<String, Arc<VectorIndex<Arc<S>>>>>,
    graph: RwLock<Option<QuadStore<Arc<S>>>>,
    bridges: RwLock<HashMap<String, Arc<GraphBridge<Arc<S>>>>>,
    replication: RwLock<HashMap<String, Arc<ReplicationEngine<Arc<S>>>>>,
    bus: ChangeBus,
}

impl<S: Store + 'static> Database<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            collections: RwLock::new(HashMap::new()),
            fulltext: RwLock::new(HashMap::new()),
            vector: RwLock::new(HashMap::new()),
            graph: RwLock::new(None),
            bridges: RwLock::new(HashMap::new()),
            replication: RwLock::new(HashMap::new()),
            bus: ChangeBus::new(),
        }
    }

    /// Idempotent accessor: returns the existing collection if `name` was
    /// already opened, ignoring `schema` in that case, otherwise opens a
    /// fresh one against this database's store and wires its change stream
    /// into the process-wide bus.
    pub fn collection(&self, name: &str, schema: Schema) -> Result<Arc<Collection<Arc<S>>>, DbError> {
        if let Some(existing) = self.collections.read().unwrap().get(name) {
            return Ok(existing.clone());
        }

        let mut guard = self.collections.write().unwrap();
        if let Some(existing) = guard.get(name) {
            return Ok(existing.clone());
        }

        tracing::debug!(collection = name, "opening collection");
        let collection = Arc::new(Collection::open(name, self.store.clone(), schema)?);
        self.spawn_fanout(collection.clone());
        guard.insert(name.to_string(), collection.clone());
        Ok(collection)
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.collections.read().unwrap().keys().cloned().collect()
    }

    /// Subscribe to every collection's change events through one channel.
    pub fn changes(&self) -> tokio::sync::broadcast::Receiver<ChangeEvent> {
        self.bus.subscribe()
    }

    /// Idempotent full-text index accessor, attached to `collection`'s
    /// change stream: every insert/update/delete on `collection` is
    /// reflected into the index as it happens.
    pub fn fulltext_index(
        &self,
        identifier: &str,
        collection: &Arc<Collection<Arc<S>>>,
        tokenize: TokenizeOptions,
        project: impl Fn(&Document) -> String + Send + Sync + 'static,
    ) -> Result<Arc<FulltextIndex<Arc<S>>>, DbError> {
        if let Some(existing) = self.fulltext.read().unwrap().get(identifier) {
            return Ok(existing.clone());
        }
        let mut guard = self.fulltext.write().unwrap();
        if let Some(existing) = guard.get(identifier) {
            return Ok(existing.clone());
        }

        let index = Arc::new(FulltextIndex::open(self.store.clone(), identifier, tokenize, project)?);
        self.spawn_index_fanout(collection.clone(), index.clone(), FulltextIndex::apply_change);
        guard.insert(identifier.to_string(), index.clone());
        Ok(index)
    }

    /// Idempotent vector index accessor, attached to `collection`'s change
    /// stream the same way as `fulltext_index`.
    pub fn vector_index(
        &self,
        identifier: &str,
        collection: &Arc<Collection<Arc<S>>>,
        dimensions: usize,
        metric: DistanceMetric,
        project: impl Fn(&Document) -> Option<Vec<f64>> + Send + Sync + 'static,
    ) -> Result<Arc<VectorIndex<Arc<S>>>, DbError> {
        if let Some(existing) = self.vector.read().unwrap().get(identifier) {
            return Ok(existing.clone());
        }
        let mut guard = self.vector.write().unwrap();
        if let Some(existing) = guard.get(identifier) {
            return Ok(existing.clone());
        }

        let index = Arc::new(VectorIndex::open(self.store.clone(), identifier, dimensions, metric, project)?);
        self.spawn_index_fanout(collection.clone(), index.clone(), VectorIndex::apply_change);
        guard.insert(identifier.to_string(), index.clone());
        Ok(index)
    }

    /// The database's one shared quadstore. Created on first reference;
    /// every `graph_bridge` call links into this same store.
    pub fn graph(&self, identifier: &str) -> Result<QuadStore<Arc<S>>, DbError> {
        if let Some(existing) = self.graph.read().unwrap().as_ref() {
            return Ok(existing.clone());
        }
        let mut guard = self.graph.write().unwrap();
        if let Some(existing) = guard.as_ref() {
            return Ok(existing.clone());
        }
        let quads = QuadStore::open(self.store.clone(), identifier)?;
        *guard = Some(quads.clone());
        Ok(quads)
    }

    /// Idempotent doc→graph bridge accessor. Attaches to every mapping's
    /// collection (which must already be open via `collection(..)`) and
    /// auto-links/unlinks as documents change.
    pub fn graph_bridge(
        &self,
        identifier: &str,
        graph_identifier: &str,
        mappings: Vec<RelationMapping>,
    ) -> Result<Arc<GraphBridge<Arc<S>>>, DbError> {
        if let Some(existing) = self.bridges.read().unwrap().get(identifier) {
            return Ok(existing.clone());
        }
        let mut guard = self.bridges.write().unwrap();
        if let Some(existing) = guard.get(identifier) {
            return Ok(existing.clone());
        }

        let graph = self.graph(graph_identifier)?;
        let mapped_collections: Vec<String> = mappings.iter().map(|m| m.collection.clone()).collect();
        let bridge = Arc::new(GraphBridge::new(graph, mappings));

        for name in mapped_collections {
            if let Some(collection) = self.collections.read().unwrap().get(&name).cloned() {
                self.spawn_index_fanout(collection, bridge.clone(), GraphBridge::apply_change);
            }
        }

        guard.insert(identifier.to_string(), bridge.clone());
        Ok(bridge)
    }

    /// Idempotent replication engine accessor. Does not start any loop on
    /// its own — callers drive `run_pull_loop`/`run_push_loop`/
    /// `run_queue_loop` with their own cancellation tokens.
    pub fn replication_engine(
        &self,
        identifier: &str,
        collection: &Arc<Collection<Arc<S>>>,
        config: ReplicationConfig,
        durable: Option<DurableConfig>,
    ) -> Result<Arc<ReplicationEngine<Arc<S>>>, DbError> {
        if let Some(existing) = self.replication.read().unwrap().get(identifier) {
            return Ok(existing.clone());
        }
        let mut guard = self.replication.write().unwrap();
        if let Some(existing) = guard.get(identifier) {
            return Ok(existing.clone());
        }

        let engine = Arc::new(ReplicationEngine::open(collection.clone(), self.store.clone(), identifier, config, durable)?);
        guard.insert(identifier.to_string(), engine.clone());
        Ok(engine)
    }

    fn spawn_index_fanout<I, E>(&self, collection: Arc<Collection<Arc<S>>>, index: Arc<I>, apply: fn(&I, &ChangeEvent) -> Result<(), E>)
    where
        I: Send + Sync + 'static,
        E: std::error::Error + 'static,
    {
        let mut rx = collection.changes();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = apply(&index, &event) {
                            tracing::warn!(error = %e, "index change application failed");
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "index fanout lagged behind collection change bus");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    fn spawn_fanout(&self, collection: Arc<Collection<Arc<S>>>) {
        let mut rx = collection.changes();
        let sender = self.bus.clone_sender();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let _ = sender.send(event);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "database-wide change fanout lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

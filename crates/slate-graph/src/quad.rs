use std::collections::HashSet;

use slate_store::{Store, Transaction};

use crate::encoding::{self, Direction};
use crate::error::GraphError;

/// A set of RDF-like triples, persisted across a quad bucket and two side
/// indexes (SP, PO) for forward/reverse prefix iteration, plus a per-node
/// incidence index so the document bridge can remove exactly the edges it
/// created without a full-store scan.
#[derive(Clone)]
pub struct QuadStore<S: Store> {
    store: S,
    identifier: String,
}

impl<S: Store> QuadStore<S> {
    pub fn open(store: S, identifier: impl Into<String>) -> Result<Self, GraphError> {
        let identifier = identifier.into();
        store.create_bucket(&identifier)?;
        Ok(Self { store, identifier })
    }

    pub fn add_quad(&self, s: &str, p: &str, o: &str) -> Result<(), GraphError> {
        let txn = self.store.begin(false)?;
        txn.put(&self.identifier, &encoding::quad_key(s, p, o), &[])?;
        txn.put(&self.identifier, &encoding::sp_key(s, p, o), &[])?;
        txn.put(&self.identifier, &encoding::po_key(p, o, s), &[])?;
        txn.put(&self.identifier, &encoding::node_key(s, Direction::Out, p, o), &[])?;
        txn.put(&self.identifier, &encoding::node_key(o, Direction::In, p, s), &[])?;
        txn.commit()?;
        Ok(())
    }

    pub fn remove_quad(&self, s: &str, p: &str, o: &str) -> Result<(), GraphError> {
        let txn = self.store.begin(false)?;
        txn.delete(&self.identifier, &encoding::quad_key(s, p, o))?;
        txn.delete(&self.identifier, &encoding::sp_key(s, p, o))?;
        txn.delete(&self.identifier, &encoding::po_key(p, o, s))?;
        txn.delete(&self.identifier, &encoding::node_key(s, Direction::Out, p, o))?;
        txn.delete(&self.identifier, &encoding::node_key(o, Direction::In, p, s))?;
        txn.commit()?;
        Ok(())
    }

    pub fn link(&self, s: &str, p: &str, o: &str) -> Result<(), GraphError> {
        self.add_quad(s, p, o)
    }

    pub fn unlink(&self, s: &str, p: &str, o: &str) -> Result<(), GraphError> {
        self.remove_quad(s, p, o)
    }

    pub fn has(&self, s: &str, p: &str, o: &str) -> Result<bool, GraphError> {
        let txn = self.store.begin(true)?;
        Ok(txn.get(&self.identifier, &encoding::quad_key(s, p, o))?.is_some())
    }

    /// Remove every edge incident to `node` in either direction, using the
    /// incidence index instead of scanning the whole quad bucket.
    pub fn remove_incident(&self, node: &str) -> Result<(), GraphError> {
        let edges = self.incident_edges(node)?;
        for (dir, p, other) in edges {
            match dir {
                Direction::Out => self.remove_quad(node, &p, &other)?,
                Direction::In => self.remove_quad(&other, &p, node)?,
            }
        }
        Ok(())
    }

    fn incident_edges(&self, node: &str) -> Result<Vec<(Direction, String, String)>, GraphError> {
        let txn = self.store.begin(true)?;
        let prefix = encoding::node_scan_prefix_all(node);
        let mut edges = Vec::new();
        for entry in txn.scan_prefix(&self.identifier, &prefix)? {
            let (key, _) = entry?;
            let rest = &key[prefix.len()..];
            let dir = match rest.first() {
                Some(b'o') => Direction::Out,
                Some(b'i') => Direction::In,
                _ => continue,
            };
            if let Some((p, other)) = encoding::parse_node_key(&key) {
                edges.push((dir, p.to_string(), other.to_string()));
            }
        }
        Ok(edges)
    }

    fn out_edges(&self, node: &str, predicates: &[String]) -> Result<Vec<(String, String)>, GraphError> {
        let txn = self.store.begin(true)?;
        let mut results = Vec::new();
        if predicates.is_empty() {
            let prefix = encoding::sp_scan_prefix(node);
            for entry in txn.scan_prefix(&self.identifier, &prefix)? {
                let (key, _) = entry?;
                if let Some((_, p, o)) = encoding::parse_sp_key(&key) {
                    results.push((p.to_string(), o.to_string()));
                }
            }
        } else {
            for pred in predicates {
                let prefix = encoding::sp_scan_prefix_pred(node, pred);
                for entry in txn.scan_prefix(&self.identifier, &prefix)? {
                    let (key, _) = entry?;
                    if let Some((_, p, o)) = encoding::parse_sp_key(&key) {
                        results.push((p.to_string(), o.to_string()));
                    }
                }
            }
        }
        Ok(results)
    }

    fn in_edges(&self, node: &str, predicates: &[String]) -> Result<Vec<(String, String)>, GraphError> {
        let edges = self.incident_edges(node)?;
        Ok(edges
            .into_iter()
            .filter(|(dir, p, _)| *dir == Direction::In && (predicates.is_empty() || predicates.contains(p)))
            .map(|(_, p, other)| (p, other))
            .collect())
    }

    pub fn v(&self, nodes: impl IntoIterator<Item = impl Into<String>>) -> Traversal<'_, S> {
        Traversal { store: self, frontier: nodes.into_iter().map(Into::into).collect(), last_triples: Vec::new(), limit: None }
    }

    /// Depth-first search from `from` to `to`, descending only along
    /// `predicates` (empty = any). Returns every simple path (no revisits)
    /// up to `max_depth` edges.
    pub fn find_path(
        &self,
        from: &str,
        to: &str,
        max_depth: usize,
        predicates: &[String],
    ) -> Result<Vec<Vec<String>>, GraphError> {
        let mut paths = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![from.to_string()];
        visited.insert(from.to_string());
        self.dfs(from, to, max_depth, predicates, &mut visited, &mut stack, &mut paths)?;
        Ok(paths)
    }

    fn dfs(
        &self,
        current: &str,
        target: &str,
        remaining_depth: usize,
        predicates: &[String],
        visited: &mut HashSet<String>,
        path: &mut Vec<String>,
        paths: &mut Vec<Vec<String>>,
    ) -> Result<(), GraphError> {
        if current == target && path.len() > 1 {
            paths.push(path.clone());
            return Ok(());
        }
        if remaining_depth == 0 {
            return Ok(());
        }
        for (_, next) in self.out_edges(current, predicates)? {
            if visited.contains(&next) {
                continue;
            }
            visited.insert(next.clone());
            path.push(next.clone());
            self.dfs(&next, target, remaining_depth - 1, predicates, visited, path, paths)?;
            path.pop();
            visited.remove(&next);
        }
        Ok(())
    }
}

/// A chainable traversal over a `QuadStore`. Each step materializes the next
/// frontier and dedupes it; only the triples produced by the final step are
/// returned from `execute`.
pub struct Traversal<'a, S: Store> {
    store: &'a QuadStore<S>,
    frontier: Vec<String>,
    last_triples: Vec<(String, String, String)>,
    limit: Option<usize>,
}

impl<'a, S: Store> Traversal<'a, S> {
    pub fn out(mut self, predicates: impl IntoIterator<Item = impl Into<String>>) -> Result<Self, GraphError> {
        let predicates: Vec<String> = predicates.into_iter().map(Into::into).collect();
        let mut next = HashSet::new();
        let mut triples = Vec::new();
        for node in &self.frontier {
            for (p, o) in self.store.out_edges(node, &predicates)? {
                next.insert(o.clone());
                triples.push((node.clone(), p, o));
            }
        }
        self.frontier = next.into_iter().collect();
        self.last_triples = triples;
        Ok(self)
    }

    pub fn inn(mut self, predicates: impl IntoIterator<Item = impl Into<String>>) -> Result<Self, GraphError> {
        let predicates: Vec<String> = predicates.into_iter().map(Into::into).collect();
        let mut next = HashSet::new();
        let mut triples = Vec::new();
        for node in &self.frontier {
            for (p, s) in self.store.in_edges(node, &predicates)? {
                next.insert(s.clone());
                triples.push((s, p, node.clone()));
            }
        }
        self.frontier = next.into_iter().collect();
        self.last_triples = triples;
        Ok(self)
    }

    pub fn both(mut self, predicates: impl IntoIterator<Item = impl Into<String>>) -> Result<Self, GraphError> {
        let predicates: Vec<String> = predicates.into_iter().map(Into::into).collect();
        let mut next = HashSet::new();
        let mut triples = Vec::new();
        for node in &self.frontier {
            for (p, o) in self.store.out_edges(node, &predicates)? {
                next.insert(o.clone());
                triples.push((node.clone(), p, o));
            }
            for (p, s) in self.store.in_edges(node, &predicates)? {
                next.insert(s.clone());
                triples.push((s, p, node.clone()));
            }
        }
        self.frontier = next.into_iter().collect();
        self.last_triples = triples;
        Ok(self)
    }

    /// Keeps only frontier nodes with an outgoing `predicate` edge to
    /// `object`.
    pub fn has(mut self, predicate: impl Into<String>, object: impl Into<String>) -> Result<Self, GraphError> {
        let predicate = predicate.into();
        let object = object.into();
        let mut kept = Vec::new();
        for node in &self.frontier {
            if self.store.has(node, &predicate, &object)? {
                kept.push(node.clone());
            }
        }
        self.last_triples.retain(|(s, _, _)| kept.contains(s));
        self.frontier = kept;
        Ok(self)
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn execute(self) -> Vec<(String, String, String)> {
        let mut triples = self.last_triples;
        if let Some(limit) = self.limit {
            triples.truncate(limit);
        }
        triples
    }
}

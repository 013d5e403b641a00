use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use kylix_core::{KylixError, TransactionId};
use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::node::TransactionNode;
use crate::pattern::Pattern;
use crate::store::DagStore;

/// How many of the most recently written nodes/edges are kept warm in
/// memory at startup (spec.md §4.2 "Startup/recovery").
const WARM_CACHE_SIZE: usize = 100;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Metadata {
    last_node_id: Option<u64>,
    node_count: u64,
    edge_count: u64,
    last_checkpoint: Option<DateTime<Utc>>,
}

/// File-per-record DAG store (spec.md §4.2 "Persistence layout"). Owns
/// the on-disk directory under `db_path` exclusively for the lifetime of
/// the process.
pub struct PersistentDagStore {
    nodes_dir: PathBuf,
    edges_dir: PathBuf,
    metadata_path: PathBuf,
    node_cache: HashMap<TransactionId, TransactionNode>,
    edge_cache: HashMap<(TransactionId, TransactionId), Vec<Edge>>,
    metadata: Metadata,
}

impl PersistentDagStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, KylixError> {
        let root = db_path.as_ref().to_path_buf();
        let nodes_dir = root.join("nodes");
        let edges_dir = root.join("edges");
        fs::create_dir_all(&nodes_dir).map_err(|e| KylixError::Io(e.to_string()))?;
        fs::create_dir_all(&edges_dir).map_err(|e| KylixError::Io(e.to_string()))?;
        let metadata_path = root.join("metadata.bin");
        let metadata = Self::load_metadata(&metadata_path);

        let mut store = Self {
            nodes_dir,
            edges_dir,
            metadata_path,
            node_cache: HashMap::new(),
            edge_cache: HashMap::new(),
            metadata,
        };
        store.warm_cache()?;
        Ok(store)
    }

    fn load_metadata(path: &Path) -> Metadata {
        // A missing or unreadable metadata file is equivalent to
        // all-zero counters (spec.md §6 "Metadata record").
        fs::read(path)
            .ok()
            .and_then(|bytes| bincode::deserialize(&bytes).ok())
            .unwrap_or_default()
    }

    fn flush_metadata(&self) -> Result<(), KylixError> {
        let bytes = bincode::serialize(&self.metadata)
            .map_err(|e| KylixError::Serialization(e.to_string()))?;
        fs::write(&self.metadata_path, bytes).map_err(|e| KylixError::Io(e.to_string()))
    }

    fn node_path(&self, id: TransactionId) -> PathBuf {
        self.nodes_dir.join(format!("{id}.bin"))
    }

    fn edge_path(&self, from: TransactionId, to: TransactionId) -> PathBuf {
        self.edges_dir.join(format!("{from}_{to}.bin"))
    }

    fn node_file_ids(&self) -> Result<Vec<TransactionId>, KylixError> {
        let mut ids: Vec<TransactionId> = fs::read_dir(&self.nodes_dir)
            .map_err(|e| KylixError::Io(e.to_string()))?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let path = e.path();
                if path.extension().and_then(|x| x.to_str()) != Some("bin") {
                    return None;
                }
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.parse::<TransactionId>().ok())
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// A node is committed iff its file exists on disk; a truncated or
    /// corrupt file is treated as absent, never as an error that aborts
    /// a caller (spec.md §4.2 "Crash consistency").
    fn read_node_file(path: &Path) -> Option<TransactionNode> {
        let bytes = fs::read(path).ok()?;
        bincode::deserialize(&bytes).ok()
    }

    fn read_edge_file(path: &Path) -> Option<Vec<Edge>> {
        let bytes = fs::read(path).ok()?;
        bincode::deserialize(&bytes).ok()
    }

    fn warm_cache(&mut self) -> Result<(), KylixError> {
        let ids = self.node_file_ids()?;
        for id in ids.into_iter().rev().take(WARM_CACHE_SIZE) {
            if let Some(node) = Self::read_node_file(&self.node_path(id)) {
                self.node_cache.insert(id, node);
            }
        }

        let mut edge_files: Vec<PathBuf> = fs::read_dir(&self.edges_dir)
            .map_err(|e| KylixError::Io(e.to_string()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|x| x.to_str()) == Some("bin"))
            .collect();
        edge_files.sort();
        for path in edge_files.into_iter().rev().take(WARM_CACHE_SIZE) {
            if let Some(edges) = Self::read_edge_file(&path) {
                if let Some(first) = edges.first() {
                    self.edge_cache.insert((first.from, first.to), edges);
                }
            }
        }
        Ok(())
    }

    fn outgoing(&mut self, id: TransactionId) -> Vec<Edge> {
        let mut out = Vec::new();
        for ((from, _to), edges) in self.edge_cache.iter() {
            if *from == id {
                out.extend(edges.iter().cloned());
            }
        }
        if !out.is_empty() {
            return out;
        }
        // Fall back to a directory scan for edges not in the warm cache.
        let Ok(entries) = fs::read_dir(&self.edges_dir) else {
            return out;
        };
        let prefix = format!("{id}_");
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with(&prefix) {
                if let Some(edges) = Self::read_edge_file(&path) {
                    out.extend(edges);
                }
            }
        }
        out
    }

    /// Recompute the authoritative node count by rescanning `nodes/`,
    /// tolerating a stale metadata counter (spec.md §4.2).
    pub fn rescan_node_count(&self) -> Result<u64, KylixError> {
        Ok(self.node_file_ids()?.len() as u64)
    }

    /// Crash-atomic checkpoint: each node/edge already lives in its own
    /// file, so compaction here only needs to refresh the metadata
    /// counters. The new metadata is written beside the old file and
    /// the rename flips atomically.
    pub fn checkpoint(&mut self) -> Result<(), KylixError> {
        self.metadata.node_count = self.rescan_node_count()?;
        self.metadata.last_checkpoint = Some(Utc::now());
        let tmp_path = self.metadata_path.with_extension("bin.tmp");
        let bytes = bincode::serialize(&self.metadata)
            .map_err(|e| KylixError::Serialization(e.to_string()))?;
        fs::write(&tmp_path, bytes).map_err(|e| KylixError::Io(e.to_string()))?;
        fs::rename(&tmp_path, &self.metadata_path).map_err(|e| KylixError::Io(e.to_string()))
    }
}

impl DagStore for PersistentDagStore {
    fn add_node(&mut self, id: TransactionId, data: TransactionNode) -> Result<(), KylixError> {
        let bytes =
            bincode::serialize(&data).map_err(|e| KylixError::Serialization(e.to_string()))?;
        fs::write(self.node_path(id), bytes).map_err(|e| KylixError::Io(e.to_string()))?;
        self.node_cache.insert(id, data);
        self.metadata.last_node_id = Some(id.as_u64());
        self.metadata.node_count += 1;
        self.flush_metadata()?;
        Ok(())
    }

    fn add_edge(&mut self, edge: Edge) -> Result<(), KylixError> {
        if self.get_node(edge.from).is_err() || self.get_node(edge.to).is_err() {
            return Err(KylixError::NodeNotFound(edge.from.to_string()));
        }
        let key = (edge.from, edge.to);
        let mut edges = self.edge_cache.get(&key).cloned().unwrap_or_else(|| {
            Self::read_edge_file(&self.edge_path(edge.from, edge.to)).unwrap_or_default()
        });
        edges.push(edge.clone());
        let bytes =
            bincode::serialize(&edges).map_err(|e| KylixError::Serialization(e.to_string()))?;
        fs::write(self.edge_path(edge.from, edge.to), bytes)
            .map_err(|e| KylixError::Io(e.to_string()))?;
        self.edge_cache.insert(key, edges);
        self.metadata.edge_count += 1;
        self.flush_metadata()?;
        Ok(())
    }

    fn get_node(&mut self, id: TransactionId) -> Result<TransactionNode, KylixError> {
        if let Some(node) = self.node_cache.get(&id) {
            return Ok(node.clone());
        }
        let node = Self::read_node_file(&self.node_path(id)).ok_or(KylixError::NotFound)?;
        self.node_cache.insert(id, node.clone());
        Ok(node)
    }

    fn get_all_nodes(&mut self) -> Result<Vec<(TransactionId, TransactionNode)>, KylixError> {
        let mut out = Vec::new();
        for id in self.node_file_ids()? {
            if let Ok(node) = self.get_node(id) {
                out.push((id, node));
            }
        }
        Ok(out)
    }

    fn query(
        &mut self,
        pattern: &Pattern,
    ) -> Result<Vec<(TransactionId, TransactionNode, Vec<Edge>)>, KylixError> {
        let mut out = Vec::new();
        for id in self.node_file_ids()? {
            let node = match self.get_node(id) {
                Ok(n) => n,
                Err(_) => continue,
            };
            if node.matches(
                pattern.subject.as_deref(),
                pattern.predicate.as_deref(),
                pattern.object.as_deref(),
            ) {
                let edges = self.outgoing(id);
                out.push((id, node, edges));
            }
        }
        Ok(out)
    }

    fn clear_all(&mut self) {
        self.node_cache.clear();
        self.edge_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(s: &str, p: &str, o: &str, v: &str) -> TransactionNode {
        TransactionNode {
            subject: s.into(),
            predicate: p.into(),
            object: o.into(),
            validator: v.into(),
            timestamp: Utc::now(),
            signature: vec![],
            hash: format!("{s}{p}{o}"),
        }
    }

    #[test]
    fn round_trips_a_node_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PersistentDagStore::open(dir.path()).unwrap();
        store
            .add_node(TransactionId::new(0), node("a", "p", "b", "v1"))
            .unwrap();

        let mut reopened = PersistentDagStore::open(dir.path()).unwrap();
        let n = reopened.get_node(TransactionId::new(0)).unwrap();
        assert_eq!(n.subject, "a");
    }

    #[test]
    fn add_edge_requires_both_endpoints_to_exist() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PersistentDagStore::open(dir.path()).unwrap();
        store
            .add_node(TransactionId::new(0), node("a", "p", "b", "v1"))
            .unwrap();
        let err = store
            .add_edge(Edge::confirms(TransactionId::new(0), TransactionId::new(1)))
            .unwrap_err();
        assert!(matches!(err, KylixError::NodeNotFound(_)));
    }

    #[test]
    fn truncated_node_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PersistentDagStore::open(dir.path()).unwrap();
        store
            .add_node(TransactionId::new(0), node("a", "p", "b", "v1"))
            .unwrap();
        std::fs::write(dir.path().join("nodes").join("tx0.bin"), b"\x00").unwrap();
        store.clear_all();
        assert!(matches!(
            store.get_node(TransactionId::new(0)),
            Err(KylixError::NotFound)
        ));
    }

    #[test]
    fn checkpoint_refreshes_metadata_and_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PersistentDagStore::open(dir.path()).unwrap();
        store
            .add_node(TransactionId::new(0), node("a", "p", "b", "v1"))
            .unwrap();
        store.checkpoint().unwrap();
        assert!(dir.path().join("metadata.bin").exists());
        assert!(!dir.path().join("metadata.bin.tmp").exists());
    }

    #[test]
    fn query_unions_cache_and_on_disk_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PersistentDagStore::open(dir.path()).unwrap();
        store
            .add_node(TransactionId::new(0), node("a", "p", "b", "v1"))
            .unwrap();
        store.clear_all();
        let results = store
            .query(&Pattern::new(Some("a".into()), None, None))
            .unwrap();
        assert_eq!(results.len(), 1);
    }
}

use std::collections::HashMap;

use kylix_core::{KylixError, TransactionId};

use crate::edge::Edge;
use crate::node::TransactionNode;
use crate::pattern::Pattern;
use crate::store::DagStore;

/// Pure in-memory DAG store. Used by tests and by any deployment that
/// does not need durability across restarts.
#[derive(Default)]
pub struct MemoryDagStore {
    nodes: HashMap<TransactionId, TransactionNode>,
    edges: Vec<Edge>,
}

impl MemoryDagStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn outgoing(&self, id: TransactionId) -> Vec<Edge> {
        self.edges.iter().filter(|e| e.from == id).cloned().collect()
    }
}

impl DagStore for MemoryDagStore {
    fn add_node(&mut self, id: TransactionId, data: TransactionNode) -> Result<(), KylixError> {
        self.nodes.insert(id, data);
        Ok(())
    }

    fn add_edge(&mut self, edge: Edge) -> Result<(), KylixError> {
        if !self.nodes.contains_key(&edge.from) || !self.nodes.contains_key(&edge.to) {
            return Err(KylixError::NodeNotFound(format!("{}", edge.from)));
        }
        self.edges.push(edge);
        Ok(())
    }

    fn get_node(&mut self, id: TransactionId) -> Result<TransactionNode, KylixError> {
        self.nodes.get(&id).cloned().ok_or(KylixError::NotFound)
    }

    fn get_all_nodes(&mut self) -> Result<Vec<(TransactionId, TransactionNode)>, KylixError> {
        Ok(self.nodes.iter().map(|(id, n)| (*id, n.clone())).collect())
    }

    fn query(
        &mut self,
        pattern: &Pattern,
    ) -> Result<Vec<(TransactionId, TransactionNode, Vec<Edge>)>, KylixError> {
        let mut out = Vec::new();
        for (id, node) in self.nodes.iter() {
            if node.matches(
                pattern.subject.as_deref(),
                pattern.predicate.as_deref(),
                pattern.object.as_deref(),
            ) {
                out.push((*id, node.clone(), self.outgoing(*id)));
            }
        }
        Ok(out)
    }

    fn clear_all(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }
}

use kylix_core::{KylixError, TransactionId};

use crate::edge::Edge;
use crate::node::TransactionNode;
use crate::pattern::Pattern;

/// The contract both the memory and persistent DAG stores satisfy
/// (spec.md §4.2). `get_node`/`get_all_nodes`/`query` take `&mut self`
/// because the persistent variant lazily reads through to disk and
/// populates its cache as a side effect.
pub trait DagStore {
    fn add_node(&mut self, id: TransactionId, data: TransactionNode) -> Result<(), KylixError>;

    fn add_edge(&mut self, edge: Edge) -> Result<(), KylixError>;

    fn get_node(&mut self, id: TransactionId) -> Result<TransactionNode, KylixError>;

    fn get_all_nodes(&mut self) -> Result<Vec<(TransactionId, TransactionNode)>, KylixError>;

    fn query(
        &mut self,
        pattern: &Pattern,
    ) -> Result<Vec<(TransactionId, TransactionNode, Vec<Edge>)>, KylixError>;

    /// Test hook only; drops in-memory tables.
    fn clear_all(&mut self);
}

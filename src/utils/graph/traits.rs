//! Trait definitions for graph abstractions.
//!
//! Graph algorithms in this crate are written against these traits rather
//! than against [`ControlFlowGraph`](crate::cfg::ControlFlowGraph) directly, so
//! the same dominator code runs on the interprocedural graph, on the
//! call-summarised per-routine view, and on small synthetic graphs in tests.
//!
//! - [`GraphBase`] - Slot count and node iteration
//! - [`Successors`] - Forward edge traversal
//! - [`Predecessors`] - Backward edge traversal
//! - [`RootedGraph`] - Graphs with a designated entry node

use crate::utils::graph::NodeId;

/// Base trait providing core graph properties.
pub trait GraphBase {
    /// Returns an upper bound on node indices.
    ///
    /// Every [`NodeId`] produced by [`node_ids`](GraphBase::node_ids) has an
    /// index below this value, so it can size per-node vectors. For arena
    /// graphs with removed slots this is larger than the number of live nodes.
    fn node_count(&self) -> usize;

    /// Returns an iterator over all live node identifiers, ascending.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Trait for graphs that support forward edge traversal.
pub trait Successors: GraphBase {
    /// Returns an iterator over the successors of `node`.
    ///
    /// The order is deterministic; a successor may be reported once per edge.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Trait for graphs that support backward edge traversal.
pub trait Predecessors: GraphBase {
    /// Returns an iterator over the predecessors of `node`.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// A graph with a designated entry node.
pub trait RootedGraph: Successors + Predecessors {
    /// Returns the entry node.
    fn entry(&self) -> NodeId;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Adjacency-list graph for algorithm tests.
    #[derive(Debug)]
    pub(crate) struct TestGraph {
        pub(crate) succs: Vec<Vec<NodeId>>,
        pub(crate) preds: Vec<Vec<NodeId>>,
        pub(crate) entry: NodeId,
    }

    impl TestGraph {
        pub(crate) fn new(node_count: usize, edges: &[(usize, usize)], entry: usize) -> Self {
            let mut succs = vec![Vec::new(); node_count];
            let mut preds = vec![Vec::new(); node_count];
            for &(from, to) in edges {
                succs[from].push(NodeId::new(to));
                preds[to].push(NodeId::new(from));
            }
            Self {
                succs,
                preds,
                entry: NodeId::new(entry),
            }
        }
    }

    impl GraphBase for TestGraph {
        fn node_count(&self) -> usize {
            self.succs.len()
        }

        fn node_ids(&self) -> impl Iterator<Item = NodeId> {
            (0..self.succs.len()).map(NodeId::new)
        }
    }

    impl Successors for TestGraph {
        fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
            self.succs[node.index()].iter().copied()
        }
    }

    impl Predecessors for TestGraph {
        fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
            self.preds[node.index()].iter().copied()
        }
    }

    impl RootedGraph for TestGraph {
        fn entry(&self) -> NodeId {
            self.entry
        }
    }

    #[test]
    fn test_test_graph_adjacency() {
        let g = TestGraph::new(3, &[(0, 1), (0, 2), (1, 2)], 0);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.successors(NodeId::new(0)).count(), 2);
        assert_eq!(
            g.predecessors(NodeId::new(2)).collect::<Vec<_>>(),
            vec![NodeId::new(0), NodeId::new(1)]
        );
        assert_eq!(g.entry(), NodeId::new(0));
    }
}

//! Node identifiers.

use std::fmt;

/// A strongly-typed identifier for a node of a control-flow graph.
///
/// `NodeId` wraps the index of the node's slot in the graph arena. Slots of
/// removed nodes are never reused, so an id stays meaningful for the whole
/// lifetime of a graph: analysis results keyed by `NodeId` survive dead-code
/// elimination and the id of a removed node simply stops resolving.
///
/// # Examples
///
/// ```rust
/// use flowcheck::cfg::ControlFlowGraph;
///
/// let mut cfg = ControlFlowGraph::new();
/// let a = cfg.create_node("a", false, false, None)?;
/// let b = cfg.create_node("b", false, false, None)?;
///
/// assert_ne!(a, b);
/// assert_eq!(cfg.node_id("b"), Some(b));
/// # Ok::<(), flowcheck::Error>(())
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a new `NodeId` from a raw slot index.
    ///
    /// Intended for tests and for graph implementations; ids handed out by a
    /// [`ControlFlowGraph`](crate::cfg::ControlFlowGraph) should be preferred.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw slot index, usable to index per-node vectors.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    #[inline]
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

impl From<NodeId> for usize {
    #[inline]
    fn from(node: NodeId) -> Self {
        node.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_roundtrip() {
        let node: NodeId = 123usize.into();
        assert_eq!(node.index(), 123);
        assert_eq!(usize::from(node), 123);
    }

    #[test]
    fn test_node_id_formatting() {
        let node = NodeId::new(42);
        assert_eq!(format!("{node:?}"), "NodeId(42)");
        assert_eq!(format!("{node}"), "n42");
    }

    #[test]
    fn test_node_id_ordering() {
        let mut nodes = vec![NodeId::new(3), NodeId::new(1), NodeId::new(2)];
        nodes.sort();
        assert_eq!(nodes, vec![NodeId::new(1), NodeId::new(2), NodeId::new(3)]);
    }
}

//! Depth-first traversals.
//!
//! All traversals use an explicit stack of successor cursors instead of
//! recursion, so they handle arbitrarily long block chains. Successors are
//! visited in the order the graph reports them, which makes the resulting
//! numbering deterministic.

use crate::utils::graph::{NodeId, Successors};

/// A depth-first spanning tree of the nodes reachable from a start node.
#[derive(Debug, Clone)]
pub struct DfsTree {
    /// Reachable nodes in preorder; `preorder[0]` is the start node.
    pub preorder: Vec<NodeId>,
    /// Nodes in postorder.
    pub postorder: Vec<NodeId>,
    /// Spanning-tree parent per node index (`None` for the start node and for
    /// unreachable nodes).
    pub parent: Vec<Option<NodeId>>,
    /// 1-based preorder number per node index, 0 for unreachable nodes.
    pub number: Vec<usize>,
}

impl DfsTree {
    /// Returns `true` if `node` was reached.
    #[must_use]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.number.get(node.index()).is_some_and(|&n| n != 0)
    }
}

/// Builds a depth-first spanning tree rooted at `start`.
///
/// A node's parent is the node from which it was first discovered, and every
/// node is numbered when it is first entered. This is the numbering the
/// semi-dominator computation depends on.
pub fn depth_first<G: Successors>(graph: &G, start: NodeId) -> DfsTree {
    let n = graph.node_count();
    let mut tree = DfsTree {
        preorder: Vec::new(),
        postorder: Vec::new(),
        parent: vec![None; n],
        number: vec![0; n],
    };
    if start.index() >= n {
        return tree;
    }

    tree.preorder.push(start);
    tree.number[start.index()] = 1;
    let mut stack: Vec<(NodeId, Vec<NodeId>, usize)> =
        vec![(start, graph.successors(start).collect(), 0)];

    while let Some((node, succs, cursor)) = stack.last_mut() {
        if let Some(&next) = succs.get(*cursor) {
            *cursor += 1;
            if tree.number[next.index()] == 0 {
                let parent = *node;
                tree.preorder.push(next);
                tree.number[next.index()] = tree.preorder.len();
                tree.parent[next.index()] = Some(parent);
                stack.push((next, graph.successors(next).collect(), 0));
            }
        } else {
            tree.postorder.push(*node);
            stack.pop();
        }
    }
    tree
}

/// Returns the nodes reachable from `start` in reverse postorder.
///
/// Every node appears before its successors except along back edges, which
/// makes this the natural seeding order for forward worklists.
pub fn reverse_postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let mut order = depth_first(graph, start).postorder;
    order.reverse();
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::graph::traits::tests::TestGraph;

    #[test]
    fn test_depth_first_parents() {
        // 0 -> 1 -> 3, 0 -> 2 -> 3
        let g = TestGraph::new(5, &[(0, 1), (0, 2), (1, 3), (2, 3)], 0);
        let tree = depth_first(&g, NodeId::new(0));

        assert_eq!(
            tree.preorder,
            vec![NodeId::new(0), NodeId::new(1), NodeId::new(3), NodeId::new(2)]
        );
        assert_eq!(tree.parent[3], Some(NodeId::new(1)));
        assert_eq!(tree.parent[2], Some(NodeId::new(0)));
        assert!(!tree.is_reachable(NodeId::new(4)));
        assert_eq!(tree.number[2], 4);
    }

    #[test]
    fn test_reverse_postorder_with_loop() {
        // 0 -> 1 -> 2 -> 1, 2 -> 3
        let g = TestGraph::new(4, &[(0, 1), (1, 2), (2, 1), (2, 3)], 0);
        let rpo = reverse_postorder(&g, NodeId::new(0));
        assert_eq!(
            rpo,
            vec![NodeId::new(0), NodeId::new(1), NodeId::new(2), NodeId::new(3)]
        );
    }
}

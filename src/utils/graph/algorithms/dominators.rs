//! Dominator tree computation using the Lengauer-Tarjan algorithm.
//!
//! A node `d` **dominates** a node `n` if every path from the entry node to `n`
//! passes through `d`. The **immediate dominator** of `n` is the unique strict
//! dominator of `n` that is dominated by every other strict dominator of `n`.
//! Making each node's immediate dominator its parent yields the dominator
//! tree, rooted at the entry.
//!
//! # Algorithm
//!
//! 1. Number the reachable nodes in depth-first preorder and record each
//!    node's spanning-tree parent. Unreachable nodes take no part.
//! 2. Walk the nodes in reverse preorder. The **semi-dominator** of `w` is the
//!    minimum over the predecessors `v` of `w` of the semi-dominator of
//!    `eval(v)`, where `eval` returns the node with the smallest
//!    semi-dominator on the forest path above `v`. The forest is a union-find
//!    over spanning-tree edges with path compression.
//! 3. `w` is placed in the bucket of its semi-dominator and linked to its
//!    parent. The parent's bucket is then drained: each bucketed node `v`
//!    takes its parent as immediate dominator when `eval(v)` has the same
//!    semi-dominator, otherwise it defers to `eval(v)`.
//! 4. A final forward pass in preorder resolves the deferred nodes.
//!
//! This is the "simple" variant with path compression only, running in
//! O(E log V).

use crate::utils::graph::{algorithms::depth_first, NodeId, RootedGraph, Successors};

/// Marker for "no node" inside the algorithm's index vectors.
const UNDEF: NodeId = NodeId::new(usize::MAX);

/// Result of dominator tree computation.
///
/// # Examples
///
/// ```rust
/// use flowcheck::cfg::ProgramBuilder;
/// use flowcheck::utils::graph::algorithms::compute_dominators;
///
/// // entry -> a | b -> exit
/// let cfg = ProgramBuilder::new()
///     .block("entry").branch_lt("x", 1.0, "a", "b")
///     .block("a").jump("exit")
///     .block("b").jump("exit")
///     .block("exit").end()
///     .build()?;
///
/// let id = |name| cfg.node_id(name).unwrap();
/// let dom = compute_dominators(&cfg, id("entry"));
///
/// assert!(dom.dominates(id("entry"), id("exit")));
/// assert!(!dom.strictly_dominates(id("a"), id("exit")));
/// assert_eq!(dom.immediate_dominator(id("exit")), Some(id("entry")));
/// # Ok::<(), flowcheck::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct DominatorTree {
    /// The entry (root) node of the dominator tree
    entry: NodeId,
    /// Immediate dominator per node index; the entry maps to itself and
    /// unreachable nodes map to `UNDEF`
    idom: Vec<NodeId>,
    /// 1-based depth-first preorder number per node index, 0 if unreachable
    preorder: Vec<usize>,
    /// Reachable nodes in preorder
    order: Vec<NodeId>,
}

impl DominatorTree {
    /// Returns the entry (root) node of the dominator tree.
    #[inline]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns `true` if `node` is reachable from the entry.
    #[inline]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.preorder.get(node.index()).is_some_and(|&n| n != 0)
    }

    /// Returns the immediate dominator of a node, or `None` for the entry node
    /// and for unreachable nodes.
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        if node == self.entry || !self.is_reachable(node) {
            None
        } else {
            Some(self.idom[node.index()])
        }
    }

    /// Checks if node `a` dominates node `b`.
    ///
    /// A reachable node dominates itself. Unreachable nodes neither dominate
    /// nor are dominated.
    ///
    /// # Complexity
    ///
    /// O(depth) where depth is the depth of `b` in the dominator tree.
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        self.dominators(b).any(|d| d == a)
    }

    /// Checks if node `a` strictly dominates node `b`.
    #[inline]
    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Returns an iterator over all dominators of a node, from the node itself
    /// up to (and including) the entry node. Empty for unreachable nodes.
    pub fn dominators(&self, node: NodeId) -> DominatorIterator<'_> {
        DominatorIterator {
            tree: self,
            current: self.is_reachable(node).then_some(node),
        }
    }

    /// Returns the depth of a node in the dominator tree (entry has depth 0).
    pub fn depth(&self, node: NodeId) -> usize {
        self.dominators(node).count().saturating_sub(1)
    }

    /// Returns the children of a node in the dominator tree, in preorder.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.order
            .iter()
            .copied()
            .filter(|&n| n != self.entry && self.idom[n.index()] == node)
            .collect()
    }

    /// Returns the 1-based depth-first preorder number of a reachable node.
    pub fn preorder_number(&self, node: NodeId) -> Option<usize> {
        self.preorder.get(node.index()).copied().filter(|&n| n != 0)
    }

    /// Returns the reachable nodes in depth-first preorder.
    pub fn reachable(&self) -> &[NodeId] {
        &self.order
    }

    /// Returns the number of nodes reachable from the entry.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.order.len()
    }
}

/// Iterator over dominators of a node, from the node up to the entry.
pub struct DominatorIterator<'a> {
    tree: &'a DominatorTree,
    current: Option<NodeId>,
}

impl Iterator for DominatorIterator<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = if current == self.tree.entry {
            None
        } else {
            Some(self.tree.idom[current.index()])
        };
        Some(current)
    }
}

/// Computes the dominator tree of the nodes reachable from `entry`.
///
/// # Complexity
///
/// - Time: O(E log V)
/// - Space: O(V + E)
pub fn compute_dominators<G>(graph: &G, entry: NodeId) -> DominatorTree
where
    G: Successors,
{
    let node_count = graph.node_count();
    if entry.index() >= node_count {
        return DominatorTree {
            entry,
            idom: vec![UNDEF; node_count],
            preorder: vec![0; node_count],
            order: Vec::new(),
        };
    }

    let mut lt = LengauerTarjan::new(graph, entry);
    lt.compute();

    DominatorTree {
        entry,
        idom: lt.idom,
        preorder: lt.dfnum,
        order: lt.vertex,
    }
}

/// Convenience function to compute dominators for a [`RootedGraph`].
pub fn compute_dominators_rooted<G>(graph: &G) -> DominatorTree
where
    G: RootedGraph,
{
    compute_dominators(graph, graph.entry())
}

/// Internal state for the Lengauer-Tarjan algorithm.
struct LengauerTarjan {
    /// Entry node
    entry: NodeId,
    /// DFS number for each node (0 = not visited)
    dfnum: Vec<usize>,
    /// Node with each DFS number minus one (inverse of dfnum)
    vertex: Vec<NodeId>,
    /// Parent in DFS tree
    parent: Vec<NodeId>,
    /// Reachable predecessors, gathered from the successor lists
    preds: Vec<Vec<NodeId>>,
    /// Semidominator (stored as node ID)
    semi: Vec<NodeId>,
    /// Immediate dominator (final result)
    idom: Vec<NodeId>,
    /// Ancestor in the forest for link-eval
    ancestor: Vec<NodeId>,
    /// Node with minimal semidominator on the compressed path to the ancestor
    best: Vec<NodeId>,
    /// Bucket for each node (nodes whose semidominator is this node)
    bucket: Vec<Vec<NodeId>>,
}

impl LengauerTarjan {
    fn new<G: Successors>(graph: &G, entry: NodeId) -> Self {
        let n = graph.node_count();
        let tree = depth_first(graph, entry);

        let mut preds = vec![Vec::new(); n];
        for &v in &tree.preorder {
            for s in graph.successors(v) {
                preds[s.index()].push(v);
            }
        }

        Self {
            entry,
            parent: tree
                .parent
                .iter()
                .map(|p| p.unwrap_or(UNDEF))
                .collect(),
            dfnum: tree.number,
            vertex: tree.preorder,
            preds,
            semi: (0..n).map(NodeId::new).collect(),
            idom: vec![UNDEF; n],
            ancestor: vec![UNDEF; n],
            best: (0..n).map(NodeId::new).collect(),
            bucket: vec![Vec::new(); n],
        }
    }

    fn semi_number(&self, node: NodeId) -> usize {
        self.dfnum[self.semi[node.index()].index()]
    }

    fn compute(&mut self) {
        for i in (1..self.vertex.len()).rev() {
            let w = self.vertex[i];
            let parent_w = self.parent[w.index()];

            // semi(w) = min semi(eval(v)) over predecessors v
            let preds = std::mem::take(&mut self.preds[w.index()]);
            for &v in &preds {
                let u = self.eval(v);
                if self.semi_number(u) < self.semi_number(w) {
                    self.semi[w.index()] = self.semi[u.index()];
                }
            }
            self.preds[w.index()] = preds;

            let semi_w = self.semi[w.index()];
            self.bucket[semi_w.index()].push(w);
            self.ancestor[w.index()] = parent_w;

            let bucket = std::mem::take(&mut self.bucket[parent_w.index()]);
            for v in bucket {
                let u = self.eval(v);
                self.idom[v.index()] = if self.semi_number(u) == self.semi_number(v) {
                    parent_w
                } else {
                    u
                };
            }
        }

        for i in 1..self.vertex.len() {
            let w = self.vertex[i];
            if self.idom[w.index()] != self.semi[w.index()] {
                self.idom[w.index()] = self.idom[self.idom[w.index()].index()];
            }
        }

        self.idom[self.entry.index()] = self.entry;
    }

    /// Returns the node with the smallest semidominator on the forest path
    /// from `v` up to (excluding) its forest root.
    fn eval(&mut self, v: NodeId) -> NodeId {
        if self.ancestor[v.index()] == UNDEF {
            return v;
        }
        self.compress(v);
        self.best[v.index()]
    }

    /// Path compression, iterative: collect the path top-down, then fold the
    /// best semidominator downwards while pointing each node at the root's child.
    fn compress(&mut self, v: NodeId) {
        let mut path = Vec::new();
        let mut u = v;
        while self.ancestor[self.ancestor[u.index()].index()] != UNDEF {
            path.push(u);
            u = self.ancestor[u.index()];
        }

        for &w in path.iter().rev() {
            let a = self.ancestor[w.index()];
            if self.semi_number(self.best[a.index()]) < self.semi_number(self.best[w.index()]) {
                self.best[w.index()] = self.best[a.index()];
            }
            self.ancestor[w.index()] = self.ancestor[a.index()];
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::*;
    use crate::utils::graph::traits::tests::TestGraph;

    fn n(i: usize) -> NodeId {
        NodeId::new(i)
    }

    /// Dominators of `target` by definition: `d` dominates `target` iff
    /// `target` is unreachable once `d` is deleted.
    fn brute_force_dominators(g: &TestGraph, target: usize) -> BTreeSet<usize> {
        let reach_without = |removed: Option<usize>| {
            let mut seen = vec![false; g.succs.len()];
            let mut stack = Vec::new();
            if removed != Some(g.entry.index()) {
                stack.push(g.entry.index());
                seen[g.entry.index()] = true;
            }
            while let Some(x) = stack.pop() {
                for s in &g.succs[x] {
                    let s = s.index();
                    if Some(s) != removed && !seen[s] {
                        seen[s] = true;
                        stack.push(s);
                    }
                }
            }
            seen
        };

        if !reach_without(None)[target] {
            return BTreeSet::new();
        }
        (0..g.succs.len())
            .filter(|&d| d == target || !reach_without(Some(d))[target])
            .collect()
    }

    #[test]
    fn test_dominator_linear() {
        let g = TestGraph::new(4, &[(0, 1), (1, 2), (2, 3)], 0);
        let dom = compute_dominators_rooted(&g);

        assert_eq!(dom.immediate_dominator(n(0)), None);
        assert_eq!(dom.immediate_dominator(n(1)), Some(n(0)));
        assert_eq!(dom.immediate_dominator(n(3)), Some(n(2)));
        assert_eq!(dom.dominators(n(3)).collect::<Vec<_>>(), vec![n(3), n(2), n(1), n(0)]);
        assert_eq!(dom.depth(n(3)), 3);
    }

    #[test]
    fn test_dominator_diamond() {
        let g = TestGraph::new(4, &[(0, 1), (0, 2), (1, 3), (2, 3)], 0);
        let dom = compute_dominators_rooted(&g);

        assert_eq!(dom.immediate_dominator(n(3)), Some(n(0)));
        assert!(!dom.dominates(n(1), n(3)));
        assert_eq!(dom.children(n(0)), vec![n(1), n(3), n(2)]);
    }

    #[test]
    fn test_dominator_loop() {
        // 0 -> 1 -> 2 -> 1, 2 -> 3
        let g = TestGraph::new(4, &[(0, 1), (1, 2), (2, 1), (2, 3)], 0);
        let dom = compute_dominators_rooted(&g);

        assert!(dom.dominates(n(1), n(2)));
        assert!(dom.dominates(n(2), n(3)));
        assert_eq!(dom.immediate_dominator(n(1)), Some(n(0)));
    }

    #[test]
    fn test_dominator_semidominator_differs() {
        // Classic case where idom(w) != semi(w):
        // 0 -> 1, 0 -> 4, 1 -> 2, 2 -> 3, 4 -> 3, 3 -> 2
        let g = TestGraph::new(5, &[(0, 1), (0, 4), (1, 2), (2, 3), (4, 3), (3, 2)], 0);
        let dom = compute_dominators_rooted(&g);

        assert_eq!(dom.immediate_dominator(n(2)), Some(n(0)));
        assert_eq!(dom.immediate_dominator(n(3)), Some(n(0)));
        for target in 0..5 {
            let expected = brute_force_dominators(&g, target);
            let actual: BTreeSet<usize> = dom.dominators(n(target)).map(NodeId::index).collect();
            assert_eq!(actual, expected, "dominators of {target}");
        }
    }

    #[test]
    fn test_dominator_unreachable() {
        let g = TestGraph::new(3, &[(0, 1), (2, 1)], 0);
        let dom = compute_dominators_rooted(&g);

        assert!(!dom.is_reachable(n(2)));
        assert!(!dom.dominates(n(2), n(1)));
        assert_eq!(dom.immediate_dominator(n(2)), None);
        assert_eq!(dom.dominators(n(2)).count(), 0);
        assert_eq!(dom.immediate_dominator(n(1)), Some(n(0)));
        assert_eq!(dom.preorder_number(n(1)), Some(2));
        assert_eq!(dom.node_count(), 2);
    }

    fn graph_strategy() -> impl Strategy<Value = TestGraph> {
        (2usize..9).prop_flat_map(|size| {
            proptest::collection::vec((0..size, 0..size), 0..(size * 3))
                .prop_map(move |edges| TestGraph::new(size, &edges, 0))
        })
    }

    proptest! {
        #[test]
        fn prop_dominators_match_path_enumeration(g in graph_strategy()) {
            let dom = compute_dominators_rooted(&g);
            for target in 0..g.succs.len() {
                let expected = brute_force_dominators(&g, target);
                let actual: BTreeSet<usize> =
                    dom.dominators(n(target)).map(NodeId::index).collect();
                prop_assert_eq!(actual, expected);
            }
        }
    }
}

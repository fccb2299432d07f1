//! Intraprocedural, call-summarised view of a routine.

use crate::{
    cfg::{ControlFlowGraph, Terminator},
    utils::graph::{GraphBase, NodeId, Predecessors, RootedGraph, Successors},
};

/// One routine of a [`ControlFlowGraph`] with calls collapsed into edges.
///
/// A registered call site continues directly at its return site instead of
/// entering the callee, and `return` blocks have no successors. Loops inside
/// a routine therefore keep a single dominating header even when their body
/// calls a function that is also called from elsewhere.
///
/// The view is built for the nodes reachable from `entry`; everything else is
/// left without edges.
#[derive(Debug)]
pub struct RoutineView<'a> {
    cfg: &'a ControlFlowGraph,
    entry: NodeId,
    succs: Vec<Vec<NodeId>>,
    preds: Vec<Vec<NodeId>>,
}

impl<'a> RoutineView<'a> {
    /// Builds the view of the routine starting at `entry`.
    #[must_use]
    pub fn new(cfg: &'a ControlFlowGraph, entry: NodeId) -> Self {
        let slots = cfg.node_count();
        let mut succs = vec![Vec::new(); slots];
        let mut preds = vec![Vec::new(); slots];
        let mut seen = vec![false; slots];
        let mut stack = Vec::new();

        if cfg.contains(entry) {
            seen[entry.index()] = true;
            stack.push(entry);
        }
        while let Some(node) = stack.pop() {
            let out = Self::local_successors(cfg, node);
            for &succ in &out {
                preds[succ.index()].push(node);
                if !seen[succ.index()] {
                    seen[succ.index()] = true;
                    stack.push(succ);
                }
            }
            succs[node.index()] = out;
        }

        Self {
            cfg,
            entry,
            succs,
            preds,
        }
    }

    fn local_successors(cfg: &ControlFlowGraph, node: NodeId) -> Vec<NodeId> {
        if let Some((_, call)) = cfg.call_at(node) {
            return vec![call.return_to];
        }
        match cfg.node(node).map(|n| n.terminator()) {
            Some(Terminator::Return(_)) | None => Vec::new(),
            Some(terminator) => terminator
                .targets()
                .into_iter()
                .filter(|&t| cfg.contains(t))
                .collect(),
        }
    }

    /// The underlying graph.
    #[must_use]
    pub fn cfg(&self) -> &'a ControlFlowGraph {
        self.cfg
    }
}

impl GraphBase for RoutineView<'_> {
    fn node_count(&self) -> usize {
        self.succs.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        self.cfg.node_ids()
    }
}

impl Successors for RoutineView<'_> {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.succs
            .get(node.index())
            .into_iter()
            .flatten()
            .copied()
    }
}

impl Predecessors for RoutineView<'_> {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.preds
            .get(node.index())
            .into_iter()
            .flatten()
            .copied()
    }
}

impl RootedGraph for RoutineView<'_> {
    fn entry(&self) -> NodeId {
        self.entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cfg::ProgramBuilder, Result};

    #[test]
    fn test_call_site_skips_callee() -> Result<()> {
        let cfg = ProgramBuilder::new()
            .block("main")
            .call("f", &[], &[], "after")
            .block("after")
            .end()
            .function("f", &[], None)
            .block("f_body")
            .print(1.0)
            .jump("f_exit")
            .exit_block("f_exit")
            .ret_void()
            .build()?;

        let id = |name: &str| cfg.node_id(name).ok_or(crate::Error::UnknownNode(name.into()));
        let main = RoutineView::new(&cfg, id("main")?);
        assert_eq!(main.successors(id("main")?).collect::<Vec<_>>(), vec![id("after")?]);
        assert_eq!(main.predecessors(id("f_body")?).count(), 0);

        let callee = RoutineView::new(&cfg, id("f_body")?);
        assert_eq!(callee.successors(id("f_exit")?).count(), 0);
        assert_eq!(callee.predecessors(id("f_exit")?).collect::<Vec<_>>(), vec![id("f_body")?]);

        // Interprocedurally the exit still flows back to the caller.
        assert_eq!(cfg.successors(id("f_exit")?), vec![id("after")?]);
        Ok(())
    }
}

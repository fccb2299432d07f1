//! Empty block elision.
//!
//! A block with no instructions whose only effect is an unconditional jump is
//! a trampoline. Every reference to it is redirected to its target and the
//! block is removed:
//!
//! ```text
//! a: jumpif x < 3 b        a: jumpif x < 3 c
//!    jump d           =>      jump d
//! b: jump c
//! ```
//!
//! References include branch and jump edges, `pushstate` markers naming the
//! block, call records returning to it, function entries and the program's
//! first block.

use crate::{
    cfg::{ControlFlowGraph, Terminator},
    compiler::{CfgPass, EventKind, EventLog},
    utils::graph::NodeId,
    Result,
};

/// Removes empty blocks ending in an unconditional jump.
#[derive(Debug, Default)]
pub struct EmptyBlockElisionPass;

impl EmptyBlockElisionPass {
    /// Creates a new elision pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The jump target if `node` is an elidable trampoline.
    fn trampoline_target(cfg: &ControlFlowGraph, node: NodeId) -> Option<NodeId> {
        let block = cfg.node(node)?;
        if !block.is_populated() || !block.is_empty() || cfg.last() == Some(node) {
            return None;
        }
        match block.terminator() {
            Terminator::Jump(target) if *target != node => Some(*target),
            _ => None,
        }
    }
}

impl CfgPass for EmptyBlockElisionPass {
    fn name(&self) -> &'static str {
        "elide-empty-blocks"
    }

    fn description(&self) -> &'static str {
        "Redirects edges around blocks that only jump elsewhere"
    }

    fn run_on_node(
        &self,
        cfg: &mut ControlFlowGraph,
        node: NodeId,
        events: &EventLog,
    ) -> Result<Vec<NodeId>> {
        let Some(target) = Self::trampoline_target(cfg, node) else {
            return Ok(Vec::new());
        };

        let name = cfg.label(node);
        let line = cfg.node(node).and_then(|n| n.line());
        let target_name = cfg.label(target);
        let mut dirty = cfg.predecessors(node);

        cfg.redirect(node, target)?;
        cfg.remove_node(node)?;

        events
            .record(EventKind::EdgeRedirected)
            .node(name.as_str())
            .line(line)
            .pass(self.name())
            .message(format!("elided '{name}', edges now go to '{target_name}'"));

        dirty.push(target);
        dirty.retain(|&d| d != node);
        Ok(dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cfg::ProgramBuilder, ir::RelOp, Error};

    #[test]
    fn test_branch_target_redirected() -> Result<()> {
        let mut cfg = ProgramBuilder::new()
            .block("a")
            .input("x")
            .branch("x", RelOp::Lt, 3.0, "b", "d")
            .block("b")
            .jump("c")
            .block("c")
            .print(1.0)
            .jump("d")
            .block("d")
            .end()
            .build()?;
        let id = |name: &str| cfg.node_id(name).ok_or(Error::UnknownNode(name.into()));
        let (a, b, c) = (id("a")?, id("b")?, id("c")?);

        let events = EventLog::new();
        let dirty = EmptyBlockElisionPass.run_on_node(&mut cfg, b, &events)?;
        assert_eq!(dirty, vec![a, c]);
        assert!(!cfg.contains(b));
        assert_eq!(cfg.successors(a)[0], c);
        assert_eq!(events.count_kind(EventKind::EdgeRedirected), 1);
        cfg.validate()
    }

    #[test]
    fn test_first_block_moves() -> Result<()> {
        let mut cfg = ProgramBuilder::new()
            .block("start")
            .jump("body")
            .block("body")
            .print(1.0)
            .end()
            .build()?;
        let start = cfg.node_id("start").ok_or(Error::UnknownNode("start".into()))?;
        EmptyBlockElisionPass.run_on_node(&mut cfg, start, &EventLog::new())?;
        assert_eq!(cfg.first(), cfg.node_id("body"));
        cfg.validate()
    }

    #[test]
    fn test_self_loop_and_last_are_kept() -> Result<()> {
        let mut cfg = ProgramBuilder::new()
            .block("spin")
            .jump("spin")
            .block("tail")
            .end()
            .build()?;
        let events = EventLog::new();
        for name in ["spin", "tail"] {
            let node = cfg.node_id(name).ok_or(Error::UnknownNode(name.into()))?;
            assert!(EmptyBlockElisionPass
                .run_on_node(&mut cfg, node, &events)?
                .is_empty());
        }
        assert_eq!(cfg.len(), 2);
        Ok(())
    }
}

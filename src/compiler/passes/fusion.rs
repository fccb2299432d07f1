//! Block fusion.
//!
//! A block whose only predecessor reaches it through an unconditional jump is
//! appended to that predecessor:
//!
//! ```text
//! p: x = 1         p: x = 1
//!    jump n   =>      print x
//! n: print x          jump m
//!    jump m
//! ```
//!
//! Blocks that are entered by other means than the predecessor's jump are
//! never fused: the program's first block, function entries, and return
//! sites (named by a `pushstate` or a call record). When the absorbed block is
//! a function's exit or the program's last block, the role moves to the
//! predecessor together with the call records it made.

use crate::{
    cfg::{ControlFlowGraph, Terminator},
    compiler::{CfgPass, EventKind, EventLog},
    utils::graph::NodeId,
    Result,
};

/// Merges blocks into their sole predecessor.
#[derive(Debug, Default)]
pub struct BlockFusionPass;

impl BlockFusionPass {
    /// Creates a new fusion pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The predecessor `node` can be fused into, if any.
    fn fusion_target(cfg: &ControlFlowGraph, node: NodeId) -> Option<NodeId> {
        let block = cfg.node(node)?;
        if !block.is_populated() || cfg.first() == Some(node) {
            return None;
        }

        let mut preds = block.predecessors().iter().copied();
        let (Some(pred), None) = (preds.next(), preds.next()) else {
            return None;
        };
        if pred == node {
            return None;
        }

        let pred_block = cfg.node(pred)?;
        if !pred_block.is_populated()
            || pred_block.function() != block.function()
            || *pred_block.terminator() != Terminator::Jump(node)
        {
            return None;
        }

        let entered_elsewhere = cfg.functions().any(|(_, f)| {
            f.first == Some(node) || f.calls.iter().any(|c| c.return_to == node)
        }) || !cfg.state_references(block.name()).is_empty();
        if entered_elsewhere {
            return None;
        }
        Some(pred)
    }
}

impl CfgPass for BlockFusionPass {
    fn name(&self) -> &'static str {
        "fuse-blocks"
    }

    fn description(&self) -> &'static str {
        "Merges blocks into a sole unconditional predecessor"
    }

    fn run_on_node(
        &self,
        cfg: &mut ControlFlowGraph,
        node: NodeId,
        events: &EventLog,
    ) -> Result<Vec<NodeId>> {
        let Some(pred) = Self::fusion_target(cfg, node) else {
            return Ok(Vec::new());
        };

        let name = cfg.label(node);
        let pred_name = cfg.label(pred);
        let line = cfg.node(pred).and_then(|n| n.line());

        cfg.merge_into(pred, node)?;

        events
            .record(EventKind::BlockMerged)
            .node(pred_name.as_str())
            .line(line)
            .pass(self.name())
            .message(format!("merged '{name}' into '{pred_name}'"));

        let mut dirty = vec![pred];
        dirty.extend(cfg.successors(pred));
        Ok(dirty)
    }
}

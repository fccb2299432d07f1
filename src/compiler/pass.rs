//! The interface implemented by every graph simplification pass.

use crate::{cfg::ControlFlowGraph, compiler::EventLog, utils::graph::NodeId, Result};

/// A local rewrite of the control-flow graph.
///
/// The [`PassScheduler`](crate::compiler::PassScheduler) offers nodes to each
/// pass one at a time from a worklist. A pass inspects the neighbourhood of
/// the offered node, rewrites it through the graph's mutation API, and
/// reports which nodes may now be rewritable again.
///
/// # Contract
///
/// * The offered node is live when `run_on_node` is called. It may be removed
///   by the pass.
/// * The returned list names the nodes whose neighbourhood changed. An empty
///   list means nothing changed; a pass that keeps reporting changes on an
///   unchanged graph prevents the fixpoint from being reached.
/// * Every transformation is recorded in `events`.
pub trait CfgPass {
    /// Unique name for logging and events.
    fn name(&self) -> &'static str;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Runs the pass on one node.
    ///
    /// # Errors
    ///
    /// Structural errors from the graph API. User-program problems are
    /// recorded as events instead.
    fn run_on_node(
        &self,
        cfg: &mut ControlFlowGraph,
        node: NodeId,
        events: &EventLog,
    ) -> Result<Vec<NodeId>>;
}

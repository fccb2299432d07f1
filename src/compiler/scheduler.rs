//! Pass scheduler for running simplification passes to a fixpoint.
//!
//! The `PassScheduler` keeps an explicit FIFO worklist of dirty node ids
//! instead of rescanning the graph: every live node is queued once, and a node
//! is queued again only when a pass reports that its neighbourhood changed.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::{
    cfg::ControlFlowGraph,
    compiler::{
        passes::{BlockFusionPass, ConstantPropagationPass, EmptyBlockElisionPass},
        CfgPass, EventKind, EventLog,
    },
    config::SimplifyConfig,
    utils::graph::{algorithms::reverse_postorder, NodeId},
    Result,
};

/// Counters describing one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimplifyStats {
    /// Number of node visits taken off the worklist.
    pub visits: usize,
    /// Number of pass invocations that changed the graph.
    pub changes: usize,
    /// `false` if the visit cap stopped the run before the worklist drained.
    pub converged: bool,
}

/// Runs a list of [`CfgPass`]es over a graph until no pass changes anything.
pub struct PassScheduler {
    /// Maximum number of node visits before stopping.
    max_iterations: usize,
    /// Passes offered each node, in order.
    passes: Vec<Box<dyn CfgPass>>,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::from_config(&SimplifyConfig::default())
    }
}

impl PassScheduler {
    /// Creates a scheduler without passes.
    ///
    /// # Arguments
    ///
    /// * `max_iterations` - Maximum node visits before the run is cut short.
    #[must_use]
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            passes: Vec::new(),
        }
    }

    /// Creates a scheduler with the passes enabled in `config`.
    ///
    /// Constant propagation runs first so that collapsed branches expose empty
    /// blocks and single-predecessor chains to the structural passes.
    #[must_use]
    pub fn from_config(config: &SimplifyConfig) -> Self {
        let mut scheduler = Self::new(config.max_iterations);
        if config.constant_propagation {
            scheduler.add_pass(Box::new(ConstantPropagationPass::new(
                config.remove_unused_assignments,
            )));
        }
        if config.elide_empty_blocks {
            scheduler.add_pass(Box::new(EmptyBlockElisionPass::new()));
        }
        if config.fuse_blocks {
            scheduler.add_pass(Box::new(BlockFusionPass::new()));
        }
        scheduler
    }

    /// Appends a pass.
    pub fn add_pass(&mut self, pass: Box<dyn CfgPass>) {
        self.passes.push(pass);
    }

    /// Names of the registered passes, in run order.
    pub fn pass_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(|p| p.name())
    }

    /// Runs every pass to a fixpoint.
    ///
    /// The worklist is seeded in reverse postorder from the first block so
    /// that constants flow forward in one sweep, followed by every remaining
    /// live node (function bodies, unreachable blocks).
    ///
    /// # Errors
    ///
    /// Structural errors raised by a pass, or [`Error::Internal`](crate::Error::Internal)
    /// if the graph fails validation afterwards.
    pub fn run(&self, cfg: &mut ControlFlowGraph, events: &EventLog) -> Result<SimplifyStats> {
        let mut stats = SimplifyStats {
            converged: true,
            ..SimplifyStats::default()
        };
        if self.passes.is_empty() {
            return Ok(stats);
        }

        for pass in &self.passes {
            events
                .record(EventKind::PassStarted)
                .pass(pass.name())
                .message(pass.description());
        }

        let mut worklist: VecDeque<NodeId> = VecDeque::new();
        let mut queued: FxHashSet<NodeId> = FxHashSet::default();
        let seed = cfg
            .first()
            .map(|first| reverse_postorder(cfg, first))
            .unwrap_or_default();
        let live: Vec<NodeId> = cfg.nodes().map(|(id, _)| id).collect();
        for node in seed.into_iter().chain(live) {
            if queued.insert(node) {
                worklist.push_back(node);
            }
        }

        while let Some(node) = worklist.pop_front() {
            queued.remove(&node);
            if stats.visits >= self.max_iterations {
                stats.converged = false;
                log::warn!(
                    "simplification stopped after {} node visits",
                    self.max_iterations
                );
                events.warn(format!(
                    "simplification stopped after {} node visits",
                    self.max_iterations
                ));
                break;
            }
            stats.visits += 1;

            for pass in &self.passes {
                if !cfg.contains(node) {
                    break;
                }
                let dirty = pass.run_on_node(cfg, node, events)?;
                if dirty.is_empty() {
                    continue;
                }
                stats.changes += 1;
                log::debug!(
                    "{} changed {} ({} dirty)",
                    pass.name(),
                    node,
                    dirty.len()
                );
                for d in dirty {
                    if cfg.contains(d) && queued.insert(d) {
                        worklist.push_back(d);
                    }
                }
            }
        }

        cfg.validate()?;

        for pass in &self.passes {
            events
                .record(EventKind::PassCompleted)
                .pass(pass.name())
                .message(format!("{} changes in {} visits", stats.changes, stats.visits));
        }
        Ok(stats)
    }
}

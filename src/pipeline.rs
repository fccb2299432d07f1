//! The verification pipeline.
//!
//! [`Verifier`] runs every stage on one graph and collects the outcome in a
//! [`VerificationReport`]:
//!
//! 1. **Simplification**: the [`PassScheduler`] fixpoint
//! 2. **Loop discovery**: dominators and natural loops on the simplified
//!    graph, each outermost loop reported as a [`EventKind::LoopReport`]
//! 3. **Symbolic search**: every feasible path, followed by dead-code
//!    elimination
//! 4. **Termination**: each loop found in step 2 is validated against the
//!    search results
//! 5. **Post-simplification**: optional second fixpoint on the pruned graph
//!
//! # Example
//!
//! ```rust
//! use flowcheck::cfg::ProgramBuilder;
//! use flowcheck::config::VerifierConfig;
//! use flowcheck::ir::ArithOp;
//! use flowcheck::pipeline::Verifier;
//!
//! let mut cfg = ProgramBuilder::new()
//!     .block("entry")
//!     .assign("i", 0.0)
//!     .jump("head")
//!     .block("head")
//!     .branch_lt("i", 10.0, "body", "done")
//!     .block("body")
//!     .eval("i", "i", ArithOp::Add, 1.0)
//!     .jump("head")
//!     .block("done")
//!     .print("i")
//!     .end()
//!     .build()?;
//!
//! let report = Verifier::new(VerifierConfig::default()).run(&mut cfg)?;
//! assert!(report.is_clean());
//! assert_eq!(report.terminating(), 1);
//! # Ok::<(), flowcheck::Error>(())
//! ```

use std::time::{Duration, Instant};

use crate::{
    analysis::{
        eliminate_dead_code, find_loops, LoopForest, LoopVerdict, SearchSummary, SymbolicEngine,
        TerminationValidator,
    },
    cfg::ControlFlowGraph,
    compiler::{EventKind, EventLog, PassScheduler, SimplifyStats},
    config::VerifierConfig,
    Result,
};

/// Outcome of one [`Verifier::run`].
#[derive(Debug, Clone)]
pub struct VerificationReport {
    /// Every transformation and diagnostic of the run.
    pub events: EventLog,
    /// Loops of the simplified graph, before dead-code elimination.
    pub loops: LoopForest,
    /// One verdict per loop, in forest order. Empty if termination checking
    /// is disabled.
    pub verdicts: Vec<LoopVerdict>,
    /// The symbolic search, with the blocks dead-code elimination removed.
    pub search: SearchSummary,
    /// The first simplification.
    pub simplify: SimplifyStats,
    /// The second simplification, if enabled.
    pub post_simplify: Option<SimplifyStats>,
    /// Wall time of the whole run.
    pub total_time: Duration,
}

impl VerificationReport {
    /// Returns `true` if the run reported no program error.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.events.has(EventKind::Error)
    }

    /// Number of loops proven to terminate.
    #[must_use]
    pub fn terminating(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|v| matches!(v, LoopVerdict::Terminates))
            .count()
    }

    /// Number of loops with a termination warning.
    #[must_use]
    pub fn flagged(&self) -> usize {
        self.verdicts.iter().filter(|v| v.is_warning()).count()
    }

    /// One-line summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} paths{}, {} blocks removed, {} loops ({} terminating, {} flagged), {} warnings, {} errors in {:.2?}",
            self.search.paths,
            if self.search.truncated { " (truncated)" } else { "" },
            self.search.removed.len(),
            self.loops.len(),
            self.terminating(),
            self.flagged(),
            self.events.warnings().count(),
            self.events.errors().count(),
            self.total_time
        )
    }
}

/// Runs the verification stages on a graph.
pub struct Verifier {
    config: VerifierConfig,
    scheduler: PassScheduler,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(VerifierConfig::default())
    }
}

impl Verifier {
    /// Creates a verifier with the given configuration.
    #[must_use]
    pub fn new(config: VerifierConfig) -> Self {
        let scheduler = PassScheduler::from_config(&config.simplify);
        Self { config, scheduler }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verifies `cfg`, modifying it in place unless the configuration
    /// disables every transformation.
    ///
    /// # Errors
    ///
    /// Structural and internal errors. Errors of the analysed program are
    /// reported as events in the returned report.
    pub fn run(&self, cfg: &mut ControlFlowGraph) -> Result<VerificationReport> {
        let start = Instant::now();
        let events = EventLog::new();

        let simplify = self.scheduler.run(cfg, &events)?;
        log::debug!(
            "simplified in {} visits, {} changes",
            simplify.visits,
            simplify.changes
        );

        let loops = find_loops(cfg)?;
        for lp in loops.roots() {
            let line = cfg.node(lp.header).and_then(|n| n.line());
            events
                .record(EventKind::LoopReport)
                .node(lp.header_name())
                .line(line)
                .message(lp.info(&loops));
        }

        let mut search = SymbolicEngine::new(cfg, &self.config.search, &events).search()?;
        if self.config.search.eliminate_dead_code {
            search.removed = eliminate_dead_code(cfg, &search, &events)?;
        }

        let verdicts = if self.config.validate_termination {
            TerminationValidator::new(cfg, &loops, &search, &events)
                .with_max_paths(self.config.search.max_paths)
                .validate_all()?
        } else {
            Vec::new()
        };

        let post_simplify = if self.config.post_simplify {
            Some(self.scheduler.run(cfg, &events)?)
        } else {
            None
        };

        let report = VerificationReport {
            events,
            loops,
            verdicts,
            search,
            simplify,
            post_simplify,
            total_time: start.elapsed(),
        };
        log::debug!("verification complete: {}", report.summary());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cfg::ProgramBuilder,
        config::SearchConfig,
        ir::{ArithOp, RelOp},
    };

    fn countdown(step: ArithOp) -> Result<ControlFlowGraph> {
        ProgramBuilder::new()
            .block("entry")
            .line(1)
            .assign("i", 10.0)
            .jump("head")
            .block("head")
            .line(2)
            .branch("i", RelOp::Gt, 0.0, "body", "done")
            .block("body")
            .line(3)
            .eval("i", "i", step, 1.0)
            .jump("head")
            .block("done")
            .line(4)
            .print("i")
            .end()
            .build()
    }

    #[test]
    fn test_terminating_loop_is_clean() -> Result<()> {
        let mut cfg = countdown(ArithOp::Sub)?;
        let report = Verifier::default().run(&mut cfg)?;
        assert!(report.is_clean());
        assert_eq!(report.loops.len(), 1);
        assert_eq!(report.verdicts, vec![LoopVerdict::Terminates]);
        assert_eq!(report.flagged(), 0);
        assert!(report.events.has(EventKind::LoopReport));
        cfg.validate()
    }

    #[test]
    fn test_diverging_loop_is_flagged() -> Result<()> {
        let mut cfg = countdown(ArithOp::Add)?;
        let report = Verifier::default().run(&mut cfg)?;
        assert_eq!(report.flagged(), 1);
        assert!(matches!(report.verdicts[0], LoopVerdict::OnlyBadPaths(_)));
        // The exit is never taken, so the search proves it unreachable.
        assert_eq!(report.search.removed, vec!["done".to_string()]);
        assert!(report
            .events
            .warnings()
            .any(|e| e.message.contains("i increasing")));
        Ok(())
    }

    #[test]
    fn test_analysis_preset_leaves_graph_alone() -> Result<()> {
        let mut cfg = countdown(ArithOp::Add)?;
        let before = cfg.len();
        let report = Verifier::new(VerifierConfig::analysis()).run(&mut cfg)?;
        assert_eq!(cfg.len(), before);
        assert!(report.search.removed.is_empty());
        assert_eq!(report.simplify.changes, 0);
        Ok(())
    }

    #[test]
    fn test_truncated_search_keeps_blocks() -> Result<()> {
        let mut cfg = countdown(ArithOp::Add)?;
        let search = SearchConfig::default().with_max_paths(1).with_max_depth(3);
        let config = VerifierConfig::analysis().with_search(search);
        let report = Verifier::new(config).run(&mut cfg)?;
        assert!(report.search.truncated);
        assert!(report
            .events
            .warnings()
            .any(|e| e.message.starts_with("analysis incomplete")));
        Ok(())
    }
}

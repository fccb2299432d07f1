//! Path-sensitive search over the whole program.
//!
//! [`SymbolicEngine::search`] walks the graph depth-first from the first
//! block with a single root [`Fringe`]. At each block it runs the body
//! through the [`Executor`] and then follows the terminator:
//!
//! | Terminator | Successor |
//! |------------|-----------|
//! | `End` | the path is complete |
//! | `Jump(t)` | `t` |
//! | `Branch` | decided by [`Satisfiability`]: *must* and *cant* take one side, *may* forks |
//! | `Return(v)` | the innermost return-site marker, with `v` pushed for the caller |
//!
//! A *may* branch forks one fringe per side, each clipped to the side's
//! condition. `==` and `!=` split three ways (`<`, `==`, `>`) so that both
//! sides of an equality test narrow an indeterminate operand.
//!
//! A user-program error aborts only the path it occurs on and is reported
//! once per block and message. Internal errors stop the search.
//!
//! After the search, [`eliminate_dead_code`] removes every block no feasible
//! path entered.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    analysis::symbolic::{
        Executor, Fringe, PathCondition, Revisit, Satisfiability, StackEntry, SymbolicValue,
        SymbolicVariable,
    },
    cfg::{CfgNode, ControlFlowGraph, Terminator},
    compiler::{EventKind, EventLog},
    config::SearchConfig,
    error::ProgramError,
    ir::{Comparison, RelOp},
    utils::graph::NodeId,
    Error, Result,
};

/// What the search learned about one block.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    /// Number of times a feasible path entered the block.
    pub visits: usize,
    /// Hull of every entry state.
    pub state: Option<Fringe>,
}

/// Outcome of a whole search.
#[derive(Debug, Clone, Default)]
pub struct SearchSummary {
    /// Number of paths explored.
    pub paths: usize,
    /// `true` if a path or depth cap or an exhausted widening budget cut
    /// the search short. Dead-code elimination is unsound on a truncated search.
    pub truncated: bool,
    /// Blocks removed by dead-code elimination.
    pub removed: Vec<String>,
    /// Per-block results.
    pub results: FxHashMap<NodeId, SearchResult>,
}

impl SearchSummary {
    /// Number of feasible entries into `node`.
    #[must_use]
    pub fn visits(&self, node: NodeId) -> usize {
        self.results.get(&node).map_or(0, |r| r.visits)
    }

    /// Returns `true` if a feasible path entered `node`.
    #[must_use]
    pub fn is_reached(&self, node: NodeId) -> bool {
        self.visits(node) > 0
    }

    /// Hull of the entry states of `node`.
    #[must_use]
    pub fn state(&self, node: NodeId) -> Option<&Fringe> {
        self.results.get(&node).and_then(|r| r.state.as_ref())
    }
}

enum Step {
    Continue(NodeId),
    Stop,
}

struct Search {
    summary: SearchSummary,
    pending: Vec<(NodeId, Fringe)>,
    halted: bool,
}

/// The symbolic execution engine.
pub struct SymbolicEngine<'a> {
    cfg: &'a ControlFlowGraph,
    config: &'a SearchConfig,
    events: &'a EventLog,
}

impl<'a> SymbolicEngine<'a> {
    /// Creates an engine over `cfg`.
    #[must_use]
    pub fn new(cfg: &'a ControlFlowGraph, config: &'a SearchConfig, events: &'a EventLog) -> Self {
        Self {
            cfg,
            config,
            events,
        }
    }

    /// Explores every feasible path from the first block.
    ///
    /// # Errors
    ///
    /// Internal errors only; errors of the analysed program are reported as
    /// events.
    pub fn search(&self) -> Result<SearchSummary> {
        let mut search = Search {
            summary: SearchSummary::default(),
            pending: Vec::new(),
            halted: false,
        };
        let Some(first) = self.cfg.first() else {
            return Ok(search.summary);
        };

        search.summary.paths = 1;
        search.pending.push((first, Fringe::new()));
        while let Some((node, fringe)) = search.pending.pop() {
            if search.halted {
                break;
            }
            self.run_path(node, fringe, &mut search)?;
        }

        log::debug!(
            "symbolic search: {} paths, {} blocks reached{}",
            search.summary.paths,
            search.summary.results.values().filter(|r| r.visits > 0).count(),
            if search.summary.truncated {
                " (truncated)"
            } else {
                ""
            }
        );
        Ok(search.summary)
    }

    fn run_path(&self, start: NodeId, mut fringe: Fringe, search: &mut Search) -> Result<()> {
        let mut node = start;
        loop {
            match self.step(node, &mut fringe, search) {
                Ok(Step::Continue(next)) => node = next,
                Ok(Step::Stop) => return Ok(()),
                Err(Error::Program(error)) => {
                    let (name, line) = self
                        .cfg
                        .node(node)
                        .map_or((String::new(), None), |n| (n.name().to_string(), n.line()));
                    self.events
                        .record_once(EventKind::Error, &name, line, error.to_string());
                    return Ok(());
                }
                Err(other) => return Err(other),
            }
        }
    }

    fn truncate(&self, search: &mut Search, node: &str, reason: &str) {
        if self
            .events
            .record_once(EventKind::Warning, node, None, format!("analysis incomplete: {reason}"))
        {
            log::warn!("symbolic search truncated at '{node}': {reason}");
        }
        search.summary.truncated = true;
    }

    fn step(&self, node: NodeId, fringe: &mut Fringe, search: &mut Search) -> Result<Step> {
        let block = self
            .cfg
            .node(node)
            .ok_or_else(|| internal_error!("search reached removed node {}", node))?;
        let name = block.name();
        if !block.is_populated() {
            return Err(ProgramError::UndeclaredState(name.to_string()).into());
        }
        if fringe.depth >= self.config.max_depth {
            self.truncate(search, name, "path depth limit reached");
            return Ok(Step::Stop);
        }

        let result = search.summary.results.entry(node).or_default();
        result.visits += 1;
        result.state = Some(match result.state.take() {
            Some(previous) => previous.join(fringe),
            None => fringe.detached(),
        });

        match fringe.enter(node, self.config.max_widenings) {
            Revisit::First | Revisit::Widened | Revisit::Unwound => {}
            Revisit::Subsumed => return Ok(Step::Stop),
            Revisit::Exhausted => {
                self.truncate(search, name, "widening limit reached");
                return Ok(Step::Stop);
            }
            Revisit::Recursion => {
                log::debug!("recursive entry into '{name}' summarised");
                return self.summarise_call(block, fringe).map(Step::Continue);
            }
        }

        let exec = Executor::new(self.cfg, self.events, block);
        exec.run(fringe, block.instructions())?;

        match block.terminator() {
            Terminator::End => Ok(Step::Stop),
            Terminator::Jump(target) => Ok(Step::Continue(*target)),
            Terminator::Branch {
                comparison,
                on_true,
                on_false,
            } => self.branch(name, comparison, *on_true, *on_false, &exec, fringe, search),
            Terminator::Return(value) => {
                let value = value
                    .as_ref()
                    .map(|v| exec.operand(fringe, v))
                    .transpose()?;
                let site = fringe.stack.unwind_to_state().ok_or_else(|| {
                    internal_error!("bad stack use: return from '{}' without a return marker", name)
                })?;
                if let Some(value) = value {
                    fringe.stack.push(StackEntry::Value {
                        source: None,
                        variable: SymbolicVariable::with_value(value),
                    });
                }
                Ok(Step::Continue(site))
            }
        }
    }

    /// Skips an invocation whose entry state an enclosing invocation of the
    /// same routine already covers. Its effects are unknown: the state is
    /// clobbered and a result of the routine's return type is pushed for
    /// the return site.
    fn summarise_call(&self, block: &CfgNode, fringe: &mut Fringe) -> Result<NodeId> {
        let site = fringe.stack.unwind_to_state().ok_or_else(|| {
            internal_error!(
                "bad stack use: recursive entry into '{}' without a return marker",
                block.name()
            )
        })?;
        fringe.clobber();
        let returns = block
            .function()
            .and_then(|f| self.cfg.function(f))
            .and_then(|f| f.return_type);
        if let Some(ty) = returns {
            fringe.stack.push(StackEntry::Value {
                source: None,
                variable: SymbolicVariable::with_value(SymbolicValue::full(ty)),
            });
        }
        Ok(site)
    }

    fn branch(
        &self,
        name: &str,
        comparison: &Comparison,
        on_true: NodeId,
        on_false: NodeId,
        exec: &Executor<'_>,
        fringe: &mut Fringe,
        search: &mut Search,
    ) -> Result<Step> {
        let op = comparison.op;
        let satisfiability = decide(fringe, comparison, exec)?;

        let taken = |fringe: &mut Fringe, test: Comparison| {
            fringe.conditions.push_back(PathCondition {
                node: name.to_string(),
                test,
            });
        };
        match satisfiability {
            Satisfiability::Must => {
                taken(fringe, comparison.clone());
                return Ok(Step::Continue(on_true));
            }
            Satisfiability::Cant => {
                taken(fringe, comparison.negated());
                return Ok(Step::Continue(on_false));
            }
            Satisfiability::May => {}
        }

        let pieces: Vec<(RelOp, NodeId)> = match op {
            RelOp::Eq => vec![
                (RelOp::Lt, on_false),
                (RelOp::Gt, on_false),
                (RelOp::Eq, on_true),
            ],
            RelOp::Ne => vec![
                (RelOp::Eq, on_false),
                (RelOp::Lt, on_true),
                (RelOp::Gt, on_true),
            ],
            _ => vec![(op.negate(), on_false), (op, on_true)],
        };

        let mut feasible: Vec<(NodeId, Fringe)> = Vec::with_capacity(pieces.len());
        for (piece, target) in pieces {
            let mut side = fringe.fork();
            let test = comparison.with_op(piece);
            if constrain(&mut side, &test, exec)? {
                taken(&mut side, test);
                feasible.push((target, side));
            }
        }
        log::debug!("'{name}': {} of a {op} test feasible", feasible.len());

        let Some((next, last)) = feasible.pop() else {
            return Ok(Step::Stop);
        };
        for other in feasible {
            if search.summary.paths >= self.config.max_paths {
                self.truncate(search, name, "path limit reached");
                search.halted = true;
                break;
            }
            search.summary.paths += 1;
            search.pending.push(other);
        }
        *fringe = last;
        Ok(Step::Continue(next))
    }
}

/// Decides `comparison` on the current state, using known relations
/// between two variable operands before their intervals.
pub(crate) fn decide(
    fringe: &Fringe,
    comparison: &Comparison,
    exec: &Executor<'_>,
) -> Result<Satisfiability> {
    let lhs = exec.operand(fringe, &comparison.lhs)?;
    let rhs = exec.operand(fringe, &comparison.rhs)?;
    let op = comparison.op;
    let known = match (comparison.lhs.as_var(), comparison.rhs.as_var()) {
        (Some(a), Some(b)) => fringe.vars.relation(a, b),
        _ => None,
    };
    Ok(match known {
        Some(rel) if rel.implies(op) => Satisfiability::Must,
        Some(rel) if rel.implies(op.negate()) => Satisfiability::Cant,
        _ => lhs.can_meet(op, &rhs)?,
    })
}

/// Narrows both operands of `test` to the values satisfying it. Returns
/// `false` if no values are left.
pub(crate) fn constrain(fringe: &mut Fringe, test: &Comparison, exec: &Executor<'_>) -> Result<bool> {
    let lhs = exec.operand(fringe, &test.lhs)?;
    let rhs = exec.operand(fringe, &test.rhs)?;
    let left = lhs.clip(test.op, &rhs)?;
    let right = rhs.clip(test.op.flip(), &lhs)?;
    if left.is_empty() || right.is_empty() {
        fringe.feasible = false;
        return Ok(false);
    }
    if let Some(var) = test.lhs.as_var().and_then(|a| fringe.var_mut(a)) {
        var.value = left;
    }
    if let Some(var) = test.rhs.as_var().and_then(|b| fringe.var_mut(b)) {
        var.value = right;
    }
    if let (Some(a), Some(b)) = (test.lhs.as_var(), test.rhs.as_var()) {
        fringe.vars.relate(a, test.op, b);
    }
    Ok(true)
}

/// Removes every block no feasible path entered.
///
/// A block stays if it is the first block, or the target of a jump or of a
/// pushed return marker in a block that stays: a path that aborted on an
/// error still owns its successors. Ordinary blocks are removed before exit
/// blocks; an exit block whose role cannot be handed to a unique
/// predecessor is kept. Nothing is removed after a truncated search.
///
/// # Errors
///
/// Structural errors from the graph other than
/// [`Error::AmbiguousExit`].
pub fn eliminate_dead_code(
    cfg: &mut ControlFlowGraph,
    summary: &SearchSummary,
    events: &EventLog,
) -> Result<Vec<String>> {
    if summary.truncated {
        log::debug!("dead-code elimination skipped: search was truncated");
        return Ok(Vec::new());
    }

    let mut kept: FxHashSet<NodeId> = cfg
        .nodes()
        .map(|(id, _)| id)
        .filter(|&id| summary.is_reached(id))
        .chain(cfg.first())
        .collect();
    let mut frontier: Vec<NodeId> = kept.iter().copied().collect();
    while let Some(id) = frontier.pop() {
        let Some(node) = cfg.node(id) else {
            continue;
        };
        let mut owned: Vec<NodeId> = node
            .pushed_states()
            .filter_map(|state| cfg.node_id(state))
            .collect();
        if let Terminator::Jump(target) = node.terminator() {
            owned.push(*target);
        }
        for target in owned {
            if kept.insert(target) {
                frontier.push(target);
            }
        }
    }

    let mut dead: Vec<(NodeId, bool)> = cfg
        .nodes()
        .filter(|(id, _)| !kept.contains(id))
        .map(|(id, node)| (id, node.is_exit()))
        .collect();
    dead.sort_by_key(|&(id, is_exit)| (is_exit, id));

    let mut removed = Vec::new();
    for (id, _) in dead {
        let Some(node) = cfg.node(id) else {
            continue;
        };
        let (name, line) = (node.name().to_string(), node.line());
        match cfg.remove_node(id) {
            Ok(()) => {}
            Err(Error::AmbiguousExit(_)) => {
                log::debug!("kept unreachable exit block '{name}'");
                continue;
            }
            Err(other) => return Err(other),
        }
        log::debug!("removed unreachable block '{name}'");
        events
            .record(EventKind::BlockRemoved)
            .node(name.as_str())
            .line(line)
            .message("removed unreachable block");
        events.record_once(EventKind::Warning, &name, line, "unreachable code");
        removed.push(name);
    }
    Ok(removed)
}

//! Termination arguments for natural loops.
//!
//! A loop terminates if every iteration moves the operands of its exit test
//! towards the exit. [`TerminationValidator`] replays one iteration of a
//! loop symbolically: starting at the header from the hull of the states
//! the search saw there, with every [`Monotonicity`] reset, it walks each
//! path through the body back to the block holding the exit test and judges
//! the continuation guard against how its operands moved:
//!
//! | Guard | Good | Bad |
//! |-------|------|-----|
//! | `a < b`, `a <= b` | `a` increases or `b` decreases, neither the other way | neither moves towards the exit |
//! | `a > b`, `a >= b` | `a` decreases or `b` increases, neither the other way | neither moves towards the exit |
//! | `a == b` | one side moves strictly, the other is unchanged | both unchanged |
//! | `a != b` | never | both unchanged |
//!
//! Anything else, including an operand changing unpredictably, is a
//! *potential* bad path. A path whose state cannot satisfy the guard any
//! more leaves the loop and is good. Blocks of nested loops are judged by
//! their own loop, so a path entering one is accepted. A path that comes
//! back to a block without passing the header runs through a cycle no loop
//! owns and is potentially bad.

use std::fmt;

use bitflags::bitflags;
use imbl::HashSet as ImHashSet;
use rustc_hash::FxHashMap;
use strum::Display;

use crate::{
    analysis::{
        loops::{Loop, LoopCondition, LoopForest},
        symbolic::{
            constrain, decide, Executor, Fringe, Monotonicity, PathCondition, Satisfiability,
            SearchSummary, StackEntry, SymbolicValue, SymbolicVariable,
        },
    },
    cfg::{ControlFlowGraph, Terminator},
    compiler::{EventKind, EventLog},
    ir::{Comparison, Operand, RelOp},
    utils::graph::NodeId,
    Error, Result,
};

bitflags! {
    /// Every way a variable changed in a block, over all replayed paths.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MonotoneFlags: u8 {
        /// Not written since the header
        const FRESH = 0x01;
        /// Written without moving
        const NONE = 0x02;
        /// Increased
        const INCREASING = 0x04;
        /// Decreased
        const DECREASING = 0x08;
        /// Moved in both directions or overwritten
        const UNKNOWN = 0x10;
    }
}

impl From<Monotonicity> for MonotoneFlags {
    fn from(value: Monotonicity) -> Self {
        match value {
            Monotonicity::Fresh => MonotoneFlags::FRESH,
            Monotonicity::None => MonotoneFlags::NONE,
            Monotonicity::Increasing => MonotoneFlags::INCREASING,
            Monotonicity::Decreasing => MonotoneFlags::DECREASING,
            Monotonicity::Unknown => MonotoneFlags::UNKNOWN,
        }
    }
}

/// Per block, per variable: how the variable moved between the header and
/// the end of the block.
pub type ChangeMap = FxHashMap<NodeId, FxHashMap<String, MonotoneFlags>>;

/// Judgement of one iteration path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum PathVerdict {
    /// The path moves towards the exit or leaves the loop.
    #[strum(serialize = "good")]
    Good,
    /// The path may or may not progress.
    #[strum(serialize = "potentially bad")]
    Potential,
    /// The path makes no progress towards the exit.
    #[strum(serialize = "bad")]
    Bad,
}

/// A path that fails to argue termination.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterExample {
    /// Branch decisions along the path, starting at the header.
    pub conditions: Vec<PathCondition>,
    /// Comparator variables of the exit test and how they moved.
    pub comparators: Vec<(String, Monotonicity)>,
}

impl fmt::Display for CounterExample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let conditions: Vec<String> = self.conditions.iter().map(ToString::to_string).collect();
        let comparators: Vec<String> = self
            .comparators
            .iter()
            .map(|(name, m)| format!("{name} {m}"))
            .collect();
        match (conditions.is_empty(), comparators.is_empty()) {
            (true, true) => write!(f, "an empty path"),
            (true, false) => write!(f, "{}", comparators.join(", ")),
            (false, true) => write!(f, "{}", conditions.join(", ")),
            (false, false) => write!(f, "{}; {}", conditions.join(", "), comparators.join(", ")),
        }
    }
}

/// Outcome for a whole loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopVerdict {
    /// Every iteration path is good.
    Terminates,
    /// No iteration path is good and at least one is bad.
    OnlyBadPaths(CounterExample),
    /// Some iteration path is not known to be good.
    PotentialBadPath(CounterExample),
    /// The loop has no exit test to argue with.
    NoCondition,
    /// The search never entered the loop.
    Unreached,
    /// No iteration path could be replayed.
    Inconclusive,
    /// The iteration path cap dropped paths before a bad one was found.
    Incomplete,
}

impl LoopVerdict {
    /// Returns `true` for verdicts that warn about the loop.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            LoopVerdict::OnlyBadPaths(_)
                | LoopVerdict::PotentialBadPath(_)
                | LoopVerdict::NoCondition
                | LoopVerdict::Incomplete
        )
    }
}

/// Detailed result of [`TerminationValidator::analyze`].
#[derive(Debug, Clone)]
pub struct LoopAnalysis {
    /// The loop verdict.
    pub verdict: LoopVerdict,
    /// Judged iteration paths in discovery order.
    pub paths: Vec<(PathVerdict, CounterExample)>,
    /// How variables moved in each replayed block.
    pub changes: ChangeMap,
    /// `true` if the iteration path cap dropped paths.
    pub truncated: bool,
}

struct Walk {
    node: NodeId,
    fringe: Fringe,
    steps: usize,
    seen: ImHashSet<NodeId>,
}

/// Checks loops of a searched graph for a termination argument.
pub struct TerminationValidator<'a> {
    cfg: &'a ControlFlowGraph,
    forest: &'a LoopForest,
    summary: &'a SearchSummary,
    events: &'a EventLog,
    max_paths: usize,
}

impl<'a> TerminationValidator<'a> {
    /// Creates a validator. `summary` must come from a search over `cfg` or
    /// over the graph `cfg` was derived from by dead-code elimination.
    #[must_use]
    pub fn new(
        cfg: &'a ControlFlowGraph,
        forest: &'a LoopForest,
        summary: &'a SearchSummary,
        events: &'a EventLog,
    ) -> Self {
        Self {
            cfg,
            forest,
            summary,
            events,
            max_paths: 10_000,
        }
    }

    /// Caps the number of iteration paths replayed per loop.
    #[must_use]
    pub fn with_max_paths(mut self, max: usize) -> Self {
        self.max_paths = max;
        self
    }

    /// Validates every loop, outermost first, and reports each verdict.
    ///
    /// # Errors
    ///
    /// Internal errors only.
    pub fn validate_all(&self) -> Result<Vec<LoopVerdict>> {
        (0..self.forest.len()).map(|idx| self.validate(idx)).collect()
    }

    /// Validates loop `idx` and records the verdict in the event log.
    ///
    /// # Errors
    ///
    /// Internal errors only.
    pub fn validate(&self, idx: usize) -> Result<LoopVerdict> {
        let lp = self.loop_at(idx)?;
        let verdict = self.analyze(idx)?.verdict;
        let header = lp.header_name();
        let line = self.cfg.node(lp.header).and_then(|n| n.line());

        let (kind, message) = match &verdict {
            LoopVerdict::Terminates => (EventKind::Info, format!("loop at '{header}' terminates")),
            LoopVerdict::OnlyBadPaths(example) => (
                EventKind::Warning,
                format!("could only find bad paths in loop at '{header}', e.g. {example}"),
            ),
            LoopVerdict::PotentialBadPath(example) => (
                EventKind::Warning,
                format!("found a potentially bad path in loop at '{header}': {example}"),
            ),
            LoopVerdict::NoCondition => (
                EventKind::Warning,
                "cannot argue termination: no condition".to_string(),
            ),
            LoopVerdict::Unreached => (EventKind::Info, format!("loop at '{header}' is never entered")),
            LoopVerdict::Inconclusive => (
                EventKind::Info,
                format!("no iteration of loop at '{header}' could be replayed"),
            ),
            LoopVerdict::Incomplete => (
                EventKind::Warning,
                format!("analysis incomplete: iteration path limit reached in loop at '{header}'"),
            ),
        };
        if verdict.is_warning() {
            log::warn!("{message}");
        } else {
            log::debug!("{message}");
        }
        self.events
            .record(kind)
            .node(header)
            .line(line)
            .message(message);
        Ok(verdict)
    }

    /// Replays every iteration path of loop `idx` without reporting.
    ///
    /// # Errors
    ///
    /// [`Error::Internal`] if `idx` is not a loop of the forest or the walk
    /// finds an inconsistent graph.
    pub fn analyze(&self, idx: usize) -> Result<LoopAnalysis> {
        let lp = self.loop_at(idx)?;
        let mut analysis = LoopAnalysis {
            verdict: LoopVerdict::Inconclusive,
            paths: Vec::new(),
            changes: ChangeMap::default(),
            truncated: false,
        };

        let Some(cond) = &lp.condition else {
            analysis.verdict = LoopVerdict::NoCondition;
            return Ok(analysis);
        };
        let seed = match self.summary.state(lp.header) {
            Some(state) if self.cfg.contains(lp.header) && self.summary.is_reached(lp.header) => {
                state.restart()
            }
            _ => {
                analysis.verdict = LoopVerdict::Unreached;
                return Ok(analysis);
            }
        };
        if !self.cfg.contains(cond.node) {
            // The test block was never reached from a live header, so no
            // iteration completes.
            analysis.verdict = LoopVerdict::Terminates;
            return Ok(analysis);
        }

        let mut pending = vec![Walk {
            node: lp.header,
            fringe: seed,
            steps: 0,
            seen: ImHashSet::new(),
        }];
        let mut walks = 1;
        while let Some(walk) = pending.pop() {
            self.replay(idx, lp, cond, walk, &mut pending, &mut walks, &mut analysis)?;
        }

        analysis.verdict = Self::conclude(&analysis.paths, analysis.truncated);
        Ok(analysis)
    }

    fn loop_at(&self, idx: usize) -> Result<&'a Loop> {
        self.forest
            .get(idx)
            .ok_or_else(|| internal_error!("loop index {} out of range", idx))
    }

    fn replay(
        &self,
        idx: usize,
        lp: &Loop,
        cond: &LoopCondition,
        mut walk: Walk,
        pending: &mut Vec<Walk>,
        walks: &mut usize,
        analysis: &mut LoopAnalysis,
    ) -> Result<()> {
        loop {
            let node = walk.node;
            if !lp.contains(node) {
                return Ok(());
            }
            let Some(block) = self.cfg.node(node) else {
                return Ok(());
            };
            let restarting = node == lp.header && walk.steps > 0;
            if restarting && cond.node != lp.header {
                // Back at the header without passing the exit test.
                let example = Self::example(&walk.fringe, &cond.continuation());
                analysis.paths.push((PathVerdict::Potential, example));
                return Ok(());
            }
            if lp.member(node).is_some_and(|m| m.owner != idx) {
                analysis.paths.push((
                    PathVerdict::Good,
                    Self::example(&walk.fringe, &cond.continuation()),
                ));
                return Ok(());
            }
            if node != lp.header && walk.seen.contains(&node) {
                // A cycle bypassing the header that no nested loop owns.
                analysis.paths.push((
                    PathVerdict::Potential,
                    Self::example(&walk.fringe, &cond.continuation()),
                ));
                return Ok(());
            }
            walk.seen.insert(node);

            let exec = Executor::new(self.cfg, self.events, block).quiet();
            match exec.run(&mut walk.fringe, block.instructions()) {
                Ok(()) => {}
                Err(Error::Program(_)) => return Ok(()),
                Err(other) => return Err(other),
            }
            let changes = analysis.changes.entry(node).or_default();
            for (name, var) in walk.fringe.vars.iter() {
                *changes.entry(name.to_string()).or_default() |= MonotoneFlags::from(var.monotonicity);
            }

            if node == cond.node {
                let continuation = cond.continuation();
                if walk.steps > 0 || node != lp.header {
                    let verdict = Self::judge(&walk.fringe, &continuation, &exec)?;
                    analysis
                        .paths
                        .push((verdict, Self::example(&walk.fringe, &continuation)));
                    return Ok(());
                }
                // First pass over a header test: enter the body.
                let next = match block.terminator() {
                    Terminator::Branch {
                        on_true, on_false, ..
                    } => {
                        if cond.continue_on_true {
                            *on_true
                        } else {
                            *on_false
                        }
                    }
                    Terminator::Jump(target) => *target,
                    _ => return Ok(()),
                };
                if !constrain(&mut walk.fringe, &continuation, &exec)? {
                    return Ok(());
                }
                walk.fringe.conditions.push_back(PathCondition {
                    node: block.name().to_string(),
                    test: continuation,
                });
                walk.node = next;
                walk.steps += 1;
                continue;
            }

            if let Some((function, call)) = self.cfg.call_at(node) {
                // Calls are summarised: the callee runs outside the loop.
                if walk.fringe.stack.unwind_to_state().is_none() {
                    return Err(internal_error!(
                        "bad stack use: call in '{}' without a return marker",
                        block.name()
                    ));
                }
                if let Some(ty) = self.cfg.function(function).and_then(|f| f.return_type) {
                    walk.fringe.stack.push(StackEntry::Value {
                        source: None,
                        variable: SymbolicVariable::with_value(SymbolicValue::full(ty)),
                    });
                }
                walk.node = call.return_to;
                walk.steps += 1;
                continue;
            }

            match block.terminator() {
                Terminator::Jump(target) => {
                    walk.node = *target;
                    walk.steps += 1;
                }
                Terminator::Branch {
                    comparison,
                    on_true,
                    on_false,
                } => {
                    let sides = match decide(&walk.fringe, comparison, &exec)? {
                        Satisfiability::Must => vec![(comparison.clone(), *on_true)],
                        Satisfiability::Cant => vec![(comparison.negated(), *on_false)],
                        Satisfiability::May => vec![
                            (comparison.negated(), *on_false),
                            (comparison.clone(), *on_true),
                        ],
                    };
                    let mut feasible = Vec::with_capacity(sides.len());
                    for (test, target) in sides {
                        let mut side = walk.fringe.fork();
                        if constrain(&mut side, &test, &exec)? {
                            side.conditions.push_back(PathCondition {
                                node: block.name().to_string(),
                                test,
                            });
                            feasible.push((target, side));
                        }
                    }
                    let Some((next, last)) = feasible.pop() else {
                        return Ok(());
                    };
                    for (target, fringe) in feasible {
                        if *walks >= self.max_paths {
                            log::debug!("iteration path cap reached in loop at '{}'", lp.header_name());
                            analysis.truncated = true;
                            break;
                        }
                        *walks += 1;
                        pending.push(Walk {
                            node: target,
                            fringe,
                            steps: walk.steps + 1,
                            seen: walk.seen.clone(),
                        });
                    }
                    walk.node = next;
                    walk.fringe = last;
                    walk.steps += 1;
                }
                Terminator::End | Terminator::Return(_) => return Ok(()),
            }
        }
    }

    fn monotonicity(fringe: &Fringe, operand: &Operand) -> Monotonicity {
        operand
            .as_var()
            .and_then(|name| fringe.var(name))
            .map_or(Monotonicity::Fresh, |v| v.monotonicity)
    }

    fn judge(fringe: &Fringe, continuation: &Comparison, exec: &Executor<'_>) -> Result<PathVerdict> {
        if decide(fringe, continuation, exec)? == Satisfiability::Cant {
            return Ok(PathVerdict::Good);
        }
        let a = Self::monotonicity(fringe, &continuation.lhs);
        let b = Self::monotonicity(fringe, &continuation.rhs);
        Ok(judge_progress(continuation.op, a, b))
    }

    fn example(fringe: &Fringe, continuation: &Comparison) -> CounterExample {
        let comparators = continuation
            .variables()
            .into_iter()
            .map(|name| {
                let m = fringe.var(name).map_or(Monotonicity::Fresh, |v| v.monotonicity);
                (name.to_string(), m)
            })
            .collect();
        CounterExample {
            conditions: fringe.conditions.iter().cloned().collect(),
            comparators,
        }
    }

    fn conclude(paths: &[(PathVerdict, CounterExample)], truncated: bool) -> LoopVerdict {
        if paths.is_empty() {
            return if truncated {
                LoopVerdict::Incomplete
            } else {
                LoopVerdict::Inconclusive
            };
        }
        let any_good = paths.iter().any(|(v, _)| *v == PathVerdict::Good);
        let worst = paths.iter().max_by_key(|(v, _)| *v).map(|(v, e)| (*v, e.clone()));
        match worst {
            None | Some((PathVerdict::Good, _)) if truncated => LoopVerdict::Incomplete,
            None | Some((PathVerdict::Good, _)) => LoopVerdict::Terminates,
            Some((PathVerdict::Bad, example)) if !any_good => LoopVerdict::OnlyBadPaths(example),
            Some((_, example)) => LoopVerdict::PotentialBadPath(example),
        }
    }
}

/// Judges one iteration that continues while `a op b` holds, given how `a`
/// and `b` moved.
#[must_use]
pub fn judge_progress(op: RelOp, a: Monotonicity, b: Monotonicity) -> PathVerdict {
    if a == Monotonicity::Unknown || b == Monotonicity::Unknown {
        return PathVerdict::Potential;
    }
    let directed = |toward: bool, away: bool| match (toward, away) {
        (true, false) => PathVerdict::Good,
        (true, true) => PathVerdict::Potential,
        (false, _) => PathVerdict::Bad,
    };
    match op {
        RelOp::Lt | RelOp::Le => directed(
            a == Monotonicity::Increasing || b == Monotonicity::Decreasing,
            a == Monotonicity::Decreasing || b == Monotonicity::Increasing,
        ),
        RelOp::Gt | RelOp::Ge => directed(
            a == Monotonicity::Decreasing || b == Monotonicity::Increasing,
            a == Monotonicity::Increasing || b == Monotonicity::Decreasing,
        ),
        RelOp::Eq => match (a.is_neutral(), b.is_neutral()) {
            (true, true) => PathVerdict::Bad,
            (true, false) | (false, true) => PathVerdict::Good,
            (false, false) => PathVerdict::Potential,
        },
        RelOp::Ne => {
            if a.is_neutral() && b.is_neutral() {
                PathVerdict::Bad
            } else {
                PathVerdict::Potential
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{loops::find_loops, symbolic::SymbolicEngine},
        cfg::ProgramBuilder,
        config::SearchConfig,
        ir::ArithOp,
    };

    fn validate(cfg: &ControlFlowGraph, events: &EventLog) -> Result<Vec<LoopVerdict>> {
        let forest = find_loops(cfg)?;
        let summary = SymbolicEngine::new(cfg, &SearchConfig::default(), events).search()?;
        TerminationValidator::new(cfg, &forest, &summary, events).validate_all()
    }

    fn counting(step: ArithOp) -> Result<ControlFlowGraph> {
        ProgramBuilder::new()
            .block("entry")
            .assign("i", 0.0)
            .jump("head")
            .block("head")
            .branch_lt("i", 10.0, "body", "done")
            .block("body")
            .eval("i", "i", step, 1.0)
            .jump("head")
            .block("done")
            .print("i")
            .end()
            .build()
    }

    #[test]
    fn test_judge_progress() {
        use Monotonicity::*;
        assert_eq!(judge_progress(RelOp::Lt, Increasing, Fresh), PathVerdict::Good);
        assert_eq!(judge_progress(RelOp::Lt, Fresh, Decreasing), PathVerdict::Good);
        assert_eq!(judge_progress(RelOp::Le, Decreasing, Fresh), PathVerdict::Bad);
        assert_eq!(judge_progress(RelOp::Lt, Increasing, Increasing), PathVerdict::Potential);
        assert_eq!(judge_progress(RelOp::Ge, Decreasing, None), PathVerdict::Good);
        assert_eq!(judge_progress(RelOp::Gt, Fresh, Fresh), PathVerdict::Bad);
        assert_eq!(judge_progress(RelOp::Eq, Increasing, Fresh), PathVerdict::Good);
        assert_eq!(judge_progress(RelOp::Eq, None, Fresh), PathVerdict::Bad);
        assert_eq!(judge_progress(RelOp::Ne, Increasing, Fresh), PathVerdict::Potential);
        assert_eq!(judge_progress(RelOp::Ne, Fresh, Fresh), PathVerdict::Bad);
        assert_eq!(judge_progress(RelOp::Lt, Unknown, Fresh), PathVerdict::Potential);
    }

    #[test]
    fn test_counting_loop_terminates() -> Result<()> {
        let cfg = counting(ArithOp::Add)?;
        let events = EventLog::new();
        assert_eq!(validate(&cfg, &events)?, vec![LoopVerdict::Terminates]);
        assert_eq!(events.warnings().count(), 0);
        Ok(())
    }

    #[test]
    fn test_wrong_direction_only_bad_paths() -> Result<()> {
        let cfg = counting(ArithOp::Sub)?;
        let events = EventLog::new();
        let verdicts = validate(&cfg, &events)?;
        let LoopVerdict::OnlyBadPaths(example) = &verdicts[0] else {
            panic!("expected bad paths, got {:?}", verdicts[0]);
        };
        assert_eq!(
            example.comparators,
            vec![("i".to_string(), Monotonicity::Decreasing)]
        );
        let warning = events.warnings().next().expect("warning");
        assert!(warning.message.starts_with("could only find bad paths"));
        assert!(warning.message.contains("i decreasing"));
        assert_eq!(warning.node.as_deref(), Some("head"));
        Ok(())
    }

    #[test]
    fn test_one_stuck_branch_is_potential() -> Result<()> {
        let cfg = ProgramBuilder::new()
            .block("entry")
            .assign("i", 0.0)
            .input("k")
            .jump("head")
            .block("head")
            .branch_lt("i", 10.0, "body", "done")
            .block("body")
            .branch_lt("k", 0.0, "step", "head")
            .block("step")
            .eval("i", "i", ArithOp::Add, 1.0)
            .jump("head")
            .block("done")
            .end()
            .build()?;
        let events = EventLog::new();
        let forest = find_loops(&cfg)?;
        let summary = SymbolicEngine::new(&cfg, &SearchConfig::default(), &events).search()?;
        let validator = TerminationValidator::new(&cfg, &forest, &summary, &events);
        let analysis = validator.analyze(0)?;

        assert!(matches!(analysis.verdict, LoopVerdict::PotentialBadPath(_)));
        let verdicts: Vec<PathVerdict> = analysis.paths.iter().map(|(v, _)| *v).collect();
        assert!(verdicts.contains(&PathVerdict::Good));
        assert!(verdicts.contains(&PathVerdict::Bad));

        let step = cfg.node_id("step").expect("step");
        assert_eq!(analysis.changes[&step]["i"], MonotoneFlags::INCREASING);
        Ok(())
    }

    #[test]
    fn test_no_condition_and_unreached() -> Result<()> {
        let cfg = ProgramBuilder::new()
            .block("entry")
            .assign("x", 1.0)
            .branch_lt("x", 0.0, "spin", "done")
            .block("spin")
            .jump("spin")
            .block("done")
            .end()
            .build()?;
        let events = EventLog::new();
        let verdicts = validate(&cfg, &events)?;
        assert_eq!(verdicts, vec![LoopVerdict::NoCondition]);
        assert!(events
            .warnings()
            .any(|e| e.message.starts_with("cannot argue termination")));

        let cfg = ProgramBuilder::new()
            .block("entry")
            .assign("x", 1.0)
            .branch_lt("x", 0.0, "head", "done")
            .block("head")
            .branch_lt("x", 5.0, "body", "done")
            .block("body")
            .jump("head")
            .block("done")
            .end()
            .build()?;
        let events = EventLog::new();
        assert_eq!(validate(&cfg, &events)?, vec![LoopVerdict::Unreached]);
        Ok(())
    }

    #[test]
    fn test_nested_loops_judged_separately() -> Result<()> {
        let cfg = ProgramBuilder::new()
            .block("entry")
            .assign("i", 0.0)
            .jump("outer")
            .block("outer")
            .branch_lt("i", 3.0, "init", "done")
            .block("init")
            .assign("j", 0.0)
            .jump("inner")
            .block("inner")
            .branch_lt("j", 3.0, "inner_body", "next")
            .block("inner_body")
            .eval("j", "j", ArithOp::Add, 1.0)
            .jump("inner")
            .block("next")
            .eval("i", "i", ArithOp::Add, 1.0)
            .jump("outer")
            .block("done")
            .end()
            .build()?;
        let events = EventLog::new();
        let verdicts = validate(&cfg, &events)?;
        assert_eq!(verdicts, vec![LoopVerdict::Terminates, LoopVerdict::Terminates]);
        Ok(())
    }

    #[test]
    fn test_cycle_bypassing_the_header_is_potential() -> Result<()> {
        // `a` and `b` form a cycle with two entries, so no loop owns it.
        let cfg = ProgramBuilder::new()
            .block("entry")
            .assign("i", 0.0)
            .input("k")
            .jump("head")
            .block("head")
            .branch_lt("i", 10.0, "x", "done")
            .block("x")
            .eval("i", "i", ArithOp::Add, 1.0)
            .branch_lt("k", 0.0, "a", "b")
            .block("a")
            .branch_lt("k", 5.0, "b", "head")
            .block("b")
            .jump("a")
            .block("done")
            .end()
            .build()?;
        let events = EventLog::new();
        let forest = find_loops(&cfg)?;
        assert_eq!(forest.len(), 1);
        let summary = SymbolicEngine::new(&cfg, &SearchConfig::default(), &events).search()?;
        assert!(!summary.truncated);

        let analysis = TerminationValidator::new(&cfg, &forest, &summary, &events).analyze(0)?;
        assert!(matches!(analysis.verdict, LoopVerdict::PotentialBadPath(_)));
        assert!(analysis.paths.iter().any(|(v, _)| *v == PathVerdict::Good));
        assert!(analysis.paths.iter().any(|(v, _)| *v == PathVerdict::Potential));
        assert!(!analysis.truncated);
        Ok(())
    }

    #[test]
    fn test_path_cap_makes_verdict_incomplete() -> Result<()> {
        // The `k >= 0` side never moves `i`.
        let cfg = ProgramBuilder::new()
            .block("entry")
            .assign("i", 0.0)
            .input("k")
            .jump("head")
            .block("head")
            .branch_lt("i", 10.0, "body", "done")
            .block("body")
            .branch_lt("k", 0.0, "inc", "head")
            .block("inc")
            .eval("i", "i", ArithOp::Add, 1.0)
            .jump("head")
            .block("done")
            .end()
            .build()?;
        let events = EventLog::new();
        let forest = find_loops(&cfg)?;
        let summary = SymbolicEngine::new(&cfg, &SearchConfig::default(), &events).search()?;

        let full = TerminationValidator::new(&cfg, &forest, &summary, &events).analyze(0)?;
        assert!(matches!(full.verdict, LoopVerdict::PotentialBadPath(_)));

        let capped = TerminationValidator::new(&cfg, &forest, &summary, &events).with_max_paths(1);
        let analysis = capped.analyze(0)?;
        assert!(analysis.truncated);
        assert_eq!(analysis.paths.len(), 1);
        assert_eq!(analysis.paths[0].0, PathVerdict::Good);
        assert_eq!(analysis.verdict, LoopVerdict::Incomplete);

        assert_eq!(capped.validate(0)?, LoopVerdict::Incomplete);
        assert!(events.warnings().any(|e| e.message
            == "analysis incomplete: iteration path limit reached in loop at 'head'"));
        Ok(())
    }

    #[test]
    fn test_counter_example_display() {
        let example = CounterExample {
            conditions: vec![PathCondition {
                node: "head".to_string(),
                test: Comparison::new(Operand::var("i"), RelOp::Lt, Operand::from(10.0)),
            }],
            comparators: vec![("i".to_string(), Monotonicity::Decreasing)],
        };
        assert_eq!(example.to_string(), "i < 10 at 'head'; i decreasing");
    }
}

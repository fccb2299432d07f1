//! Natural loop discovery and nesting.
//!
//! # Loop Structure
//!
//! ```text
//!          |
//!          v
//!     [header] <------+  <- Dominates every member
//!          |          |
//!          v          |
//!     [body ...]      |
//!          |          |
//!          v          |
//!     [tail] ---------+  <- Back edge source(s)
//! ```
//!
//! A back edge is an edge `tail -> header` whose target dominates its source.
//! The natural loop of a header is the header plus every node that reaches
//! one of its tails without passing through the header.
//!
//! # Per-routine discovery
//!
//! [`find_loops`] runs one dominator computation per routine (the main
//! program and each function) on a [`RoutineView`], where a call site steps
//! straight to its return site. On the interprocedural graph a function called
//! from several places would make the return sites reachable around the loop
//! header, hiding loops whose body contains a call.
//!
//! # Nesting
//!
//! Loop bodies are [`BitSet`]s over node indices. Sorting the bodies as large
//! unsigned numbers in descending order places every loop after all loops that
//! strictly contain it, so a single pass attaches each loop to the closest
//! earlier loop containing it. Two bodies that intersect without one
//! containing the other are reported as [`Error::NotLaminar`].

use std::fmt::Write;

use crate::{
    cfg::{ControlFlowGraph, FunctionId, RoutineView, Terminator},
    ir::Comparison,
    utils::{
        graph::{
            algorithms::{compute_dominators, DominatorTree},
            GraphBase, NodeId, Predecessors, Successors,
        },
        radix_sort_descending, BitSet,
    },
    Error, Result,
};

/// The exit test of a loop, captured when the loop is found.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopCondition {
    /// Block holding the branch (the header or a tail).
    pub node: NodeId,
    /// The branch guard as written.
    pub comparison: Comparison,
    /// `true` if the loop continues when the guard holds.
    pub continue_on_true: bool,
}

impl LoopCondition {
    /// The guard under which execution stays in the loop.
    #[must_use]
    pub fn continuation(&self) -> Comparison {
        if self.continue_on_true {
            self.comparison.clone()
        } else {
            self.comparison.negated()
        }
    }
}

/// A block of a loop body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopMember {
    /// The block.
    pub node: NodeId,
    /// Block name at discovery time.
    pub name: String,
    /// Index of the innermost loop containing the block.
    pub owner: usize,
}

/// A natural loop.
#[derive(Debug, Clone)]
pub struct Loop {
    /// The loop header.
    pub header: NodeId,
    /// Back edge sources.
    pub tails: Vec<NodeId>,
    /// Body membership by node index.
    pub body: BitSet,
    /// Body blocks in id order, tagged with their innermost loop.
    pub members: Vec<LoopMember>,
    /// The exit test, if the header or a tail branches out of the loop.
    pub condition: Option<LoopCondition>,
    /// Routine the loop belongs to (`None` for the main program).
    pub function: Option<FunctionId>,
    /// Enclosing loop.
    pub parent: Option<usize>,
    /// Directly nested loops.
    pub children: Vec<usize>,
    /// Nesting depth (0 = outermost).
    pub depth: usize,
}

impl Loop {
    /// Returns true if this loop contains the given block.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.body.contains(node.index())
    }

    /// Returns the number of blocks in the loop.
    #[must_use]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Name of the header at discovery time.
    #[must_use]
    pub fn header_name(&self) -> &str {
        self.member(self.header).map_or("?", |m| m.name.as_str())
    }

    /// The member record of `node`.
    #[must_use]
    pub fn member(&self, node: NodeId) -> Option<&LoopMember> {
        self.members.iter().find(|m| m.node == node)
    }

    /// Renders the structured loop report: header, exit test, members (nested
    /// ones annotated with the header of their loop) and nested loops.
    #[must_use]
    pub fn info(&self, forest: &LoopForest) -> String {
        let mut out = String::new();
        self.write_info(forest, 0, &mut out);
        out
    }

    fn write_info(&self, forest: &LoopForest, indent: usize, out: &mut String) {
        let pad = " ".repeat(indent);
        let _ = writeln!(out, "{pad}loop at '{}'", self.header_name());
        match &self.condition {
            Some(cond) => {
                let name = self.member(cond.node).map_or("?", |m| m.name.as_str());
                let _ = writeln!(out, "{pad}  condition in '{name}': {}", cond.continuation());
            }
            None => {
                let _ = writeln!(out, "{pad}  no condition");
            }
        }

        let own = forest.position(self.header);
        let members: Vec<String> = self
            .members
            .iter()
            .map(|m| match forest.get(m.owner) {
                Some(owner) if Some(m.owner) != own => {
                    format!("{} (in loop '{}')", m.name, owner.header_name())
                }
                _ => m.name.clone(),
            })
            .collect();
        let _ = writeln!(out, "{pad}  members: {}", members.join(", "));

        for &child in &self.children {
            if let Some(child) = forest.get(child) {
                child.write_info(forest, indent + 4, out);
            }
        }
    }
}

/// All loops of a program, outermost first.
#[derive(Debug, Clone, Default)]
pub struct LoopForest {
    loops: Vec<Loop>,
    /// Innermost loop per node index.
    block_to_loop: Vec<Option<usize>>,
}

impl LoopForest {
    /// Returns all loops; every loop comes after the loops containing it.
    #[must_use]
    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    /// Returns the loop at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Loop> {
        self.loops.get(index)
    }

    /// Returns the number of loops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    /// Returns true if there are no loops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Iterates over all loops in the forest.
    pub fn iter(&self) -> impl Iterator<Item = &Loop> {
        self.loops.iter()
    }

    /// Loops that are not nested in another loop.
    pub fn roots(&self) -> impl Iterator<Item = &Loop> {
        self.loops.iter().filter(|l| l.parent.is_none())
    }

    /// Index of the loop with the given header.
    #[must_use]
    pub fn position(&self, header: NodeId) -> Option<usize> {
        self.loops.iter().position(|l| l.header == header)
    }

    /// Returns the loop with the given header.
    #[must_use]
    pub fn loop_for_header(&self, header: NodeId) -> Option<&Loop> {
        self.loops.iter().find(|l| l.header == header)
    }

    /// Index of the innermost loop containing the given block.
    #[must_use]
    pub fn innermost(&self, block: NodeId) -> Option<usize> {
        self.block_to_loop.get(block.index()).copied().flatten()
    }

    /// Returns the loop depth for a block (0 if not in any loop).
    #[must_use]
    pub fn loop_depth(&self, block: NodeId) -> usize {
        self.innermost(block)
            .and_then(|i| self.loops.get(i))
            .map_or(0, |l| l.depth + 1)
    }
}

/// A natural loop before nesting.
#[derive(Debug, Clone)]
pub struct NaturalLoop {
    /// The loop header.
    pub header: NodeId,
    /// Back edge sources, ascending.
    pub tails: Vec<NodeId>,
    /// Body membership by node index.
    pub body: BitSet,
}

/// Finds the natural loops of a graph, one per header.
///
/// Back edges sharing a header are merged into one loop with several tails.
/// Only nodes reachable in `dominators` take part.
#[must_use]
pub fn natural_loops<G>(graph: &G, dominators: &DominatorTree) -> Vec<NaturalLoop>
where
    G: GraphBase + Successors + Predecessors,
{
    let capacity = graph.node_count();
    let mut loops: Vec<NaturalLoop> = Vec::new();

    for &node in dominators.reachable() {
        for succ in graph.successors(node) {
            if !dominators.dominates(succ, node) {
                continue;
            }
            let idx = match loops.iter().position(|l| l.header == succ) {
                Some(idx) => idx,
                None => {
                    let mut body = BitSet::new(capacity);
                    body.insert(succ.index());
                    loops.push(NaturalLoop {
                        header: succ,
                        tails: Vec::new(),
                        body,
                    });
                    loops.len() - 1
                }
            };
            let lp = &mut loops[idx];
            if !lp.tails.contains(&node) {
                lp.tails.push(node);
            }

            let mut stack = Vec::new();
            if lp.body.insert(node.index()) {
                stack.push(node);
            }
            while let Some(current) = stack.pop() {
                for pred in graph.predecessors(current) {
                    if dominators.is_reachable(pred) && lp.body.insert(pred.index()) {
                        stack.push(pred);
                    }
                }
            }
        }
    }

    for lp in &mut loops {
        lp.tails.sort_unstable();
    }
    loops.sort_by_key(|l| l.header);
    loops
}

/// The exit test of a loop: the header's branch if it leaves the loop,
/// otherwise the first tail's.
fn loop_condition(cfg: &ControlFlowGraph, raw: &NaturalLoop) -> Option<LoopCondition> {
    std::iter::once(raw.header)
        .chain(raw.tails.iter().copied())
        .find_map(|node| match cfg.node(node)?.terminator() {
            Terminator::Branch {
                comparison,
                on_true,
                on_false,
            } => {
                let (t, f) = (
                    raw.body.contains(on_true.index()),
                    raw.body.contains(on_false.index()),
                );
                (t != f).then(|| LoopCondition {
                    node,
                    comparison: comparison.clone(),
                    continue_on_true: t,
                })
            }
            _ => None,
        })
}

/// Orders loops outermost first and links parents and children.
///
/// # Errors
///
/// [`Error::NotLaminar`] if two bodies overlap without nesting.
fn nest(cfg: &ControlFlowGraph, raw: Vec<NaturalLoop>) -> Result<LoopForest> {
    let bodies: Vec<BitSet> = raw.iter().map(|l| l.body.clone()).collect();
    let order = radix_sort_descending(&bodies);
    let mut raw: Vec<Option<NaturalLoop>> = raw.into_iter().map(Some).collect();
    let sorted: Vec<NaturalLoop> = order.into_iter().filter_map(|i| raw[i].take()).collect();

    let mut parents: Vec<Option<usize>> = vec![None; sorted.len()];
    for (k, inner) in sorted.iter().enumerate() {
        for (j, outer) in sorted.iter().enumerate().take(k).rev() {
            if !inner.body.intersects(&outer.body) {
                continue;
            }
            if !inner.body.is_subset(&outer.body) {
                return Err(Error::NotLaminar {
                    outer: cfg.label(outer.header),
                    inner: cfg.label(inner.header),
                });
            }
            if parents[k].is_none() {
                parents[k] = Some(j);
            }
        }
    }

    let capacity = cfg.node_count();
    let mut block_to_loop = vec![None; capacity];
    for (k, lp) in sorted.iter().enumerate() {
        for idx in lp.body.iter() {
            if idx < capacity {
                block_to_loop[idx] = Some(k);
            }
        }
    }

    let mut loops: Vec<Loop> = Vec::with_capacity(sorted.len());
    for (k, lp) in sorted.into_iter().enumerate() {
        let condition = loop_condition(cfg, &lp);
        let members = lp
            .body
            .iter()
            .map(|idx| {
                let node = NodeId::new(idx);
                LoopMember {
                    node,
                    name: cfg.label(node),
                    owner: block_to_loop[idx].unwrap_or(k),
                }
            })
            .collect();
        let depth = parents[k].map_or(0, |p| loops[p].depth + 1);
        if let Some(p) = parents[k] {
            loops[p].children.push(k);
        }
        loops.push(Loop {
            header: lp.header,
            function: cfg.node(lp.header).and_then(|n| n.function()),
            tails: lp.tails,
            body: lp.body,
            members,
            condition,
            parent: parents[k],
            children: Vec::new(),
            depth,
        });
    }

    Ok(LoopForest {
        loops,
        block_to_loop,
    })
}

/// Finds every loop of the program.
///
/// Dominators are computed per routine on its [`RoutineView`]; the loops of
/// all routines are merged into one forest and nested.
///
/// # Errors
///
/// [`Error::NotLaminar`] if loop bodies overlap without nesting, which
/// indicates a broken graph.
///
/// # Examples
///
/// ```rust
/// use flowcheck::analysis::find_loops;
/// use flowcheck::cfg::ProgramBuilder;
/// use flowcheck::ir::ArithOp;
///
/// let cfg = ProgramBuilder::new()
///     .block("entry").assign("i", 0.0).jump("head")
///     .block("head").branch_lt("i", 10.0, "body", "done")
///     .block("body").eval("i", "i", ArithOp::Add, 1.0).jump("head")
///     .block("done").end()
///     .build()?;
///
/// let forest = find_loops(&cfg)?;
/// assert_eq!(forest.len(), 1);
/// let lp = &forest.loops()[0];
/// assert_eq!(lp.header_name(), "head");
/// assert_eq!(lp.size(), 2);
/// assert_eq!(lp.condition.as_ref().map(|c| c.continuation().to_string()), Some("i < 10".into()));
/// # Ok::<(), flowcheck::Error>(())
/// ```
pub fn find_loops(cfg: &ControlFlowGraph) -> Result<LoopForest> {
    let mut raw: Vec<NaturalLoop> = Vec::new();
    for entry in cfg.routine_entries() {
        let view = RoutineView::new(cfg, entry);
        let dominators = compute_dominators(&view, entry);
        for lp in natural_loops(&view, &dominators) {
            if raw.iter().all(|seen| seen.header != lp.header) {
                raw.push(lp);
            }
        }
    }
    let forest = nest(cfg, raw)?;
    log::debug!("found {} loops", forest.len());
    Ok(forest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cfg::ProgramBuilder,
        ir::{ArithOp, Operand, RelOp},
    };

    fn names(cfg: &ControlFlowGraph, lp: &Loop) -> Vec<String> {
        lp.members.iter().map(|m| cfg.label(m.node)).collect()
    }

    #[test]
    fn test_single_back_edge() -> Result<()> {
        let cfg = ProgramBuilder::new()
            .block("entry")
            .assign("i", 0.0)
            .jump("head")
            .block("head")
            .branch_lt("i", 10.0, "body", "done")
            .block("body")
            .branch_lt("i", 5.0, "left", "right")
            .block("left")
            .jump("latch")
            .block("right")
            .jump("latch")
            .block("latch")
            .eval("i", "i", ArithOp::Add, 1.0)
            .jump("head")
            .block("done")
            .end()
            .build()?;

        let forest = find_loops(&cfg)?;
        assert_eq!(forest.len(), 1);
        let lp = &forest.loops()[0];
        assert_eq!(names(&cfg, lp), vec!["head", "body", "left", "right", "latch"]);
        assert_eq!(lp.tails, vec![cfg.node_id("latch").ok_or(Error::UnknownNode("latch".into()))?]);
        assert!(lp.condition.as_ref().is_some_and(|c| c.continue_on_true));
        assert_eq!(forest.loop_depth(lp.header), 1);
        Ok(())
    }

    #[test]
    fn test_nested_loops() -> Result<()> {
        let cfg = ProgramBuilder::new()
            .block("entry")
            .jump("outer")
            .block("outer")
            .branch_lt("i", 10.0, "inner", "done")
            .block("inner")
            .branch_lt("j", 10.0, "inner_body", "outer_latch")
            .block("inner_body")
            .eval("j", "j", ArithOp::Add, 1.0)
            .jump("inner")
            .block("outer_latch")
            .eval("i", "i", ArithOp::Add, 1.0)
            .jump("outer")
            .block("done")
            .end()
            .build()?;

        let forest = find_loops(&cfg)?;
        assert_eq!(forest.len(), 2);
        let (outer, inner) = (&forest.loops()[0], &forest.loops()[1]);
        assert_eq!(outer.header_name(), "outer");
        assert_eq!(inner.header_name(), "inner");
        assert!(inner.body.is_subset(&outer.body));
        assert_eq!(inner.parent, Some(0));
        assert_eq!(outer.children, vec![1]);
        assert_eq!(inner.depth, 1);

        let inner_member = outer.member(inner.header).map(|m| m.owner);
        assert_eq!(inner_member, Some(1));

        let info = outer.info(&forest);
        assert!(info.contains("loop at 'outer'"));
        assert!(info.contains("inner (in loop 'inner')"));
        assert!(info.contains("    loop at 'inner'"));
        Ok(())
    }

    #[test]
    fn test_shared_header_merges_tails() -> Result<()> {
        let cfg = ProgramBuilder::new()
            .block("head")
            .branch_lt("i", 10.0, "a", "done")
            .block("a")
            .branch_lt("i", 5.0, "b", "head")
            .block("b")
            .jump("head")
            .block("done")
            .end()
            .build()?;

        let forest = find_loops(&cfg)?;
        assert_eq!(forest.len(), 1);
        assert_eq!(forest.loops()[0].tails.len(), 2);
        Ok(())
    }

    #[test]
    fn test_tail_condition() -> Result<()> {
        // do { i = i + 1 } while (i < 3)
        let cfg = ProgramBuilder::new()
            .block("entry")
            .jump("body")
            .block("body")
            .eval("i", "i", ArithOp::Add, 1.0)
            .branch("i", RelOp::Ge, 3.0, "done", "body")
            .block("done")
            .end()
            .build()?;
        let forest = find_loops(&cfg)?;
        let cond = forest.loops()[0].condition.clone();
        assert_eq!(cond.as_ref().map(|c| c.continue_on_true), Some(false));
        assert_eq!(cond.map(|c| c.continuation().to_string()), Some("i < 3".into()));
        Ok(())
    }

    #[test]
    fn test_loop_with_call_found_per_routine() -> Result<()> {
        let cfg = ProgramBuilder::new()
            .block("entry")
            .call("f", &[], &[], "r0")
            .block("r0")
            .jump("head")
            .block("head")
            .branch_lt("i", 10.0, "body", "done")
            .block("body")
            .call("f", &["i"], &[], "r1")
            .block("r1")
            .pop("i")
            .eval("i", "i", ArithOp::Add, 1.0)
            .jump("head")
            .block("done")
            .end()
            .function("f", &[], None)
            .exit_block("f_exit")
            .print(Operand::str("hi"))
            .ret_void()
            .build()?;

        let forest = find_loops(&cfg)?;
        assert_eq!(forest.len(), 1);
        let lp = &forest.loops()[0];
        assert_eq!(lp.header_name(), "head");
        assert!(!lp.contains(cfg.node_id("f_exit").ok_or(Error::UnknownNode("f_exit".into()))?));
        Ok(())
    }

    #[test]
    fn test_overlap_is_not_laminar() -> Result<()> {
        let cfg = ProgramBuilder::new()
            .block("a")
            .jump("b")
            .block("b")
            .jump("c")
            .block("c")
            .end()
            .build()?;
        let body = |nodes: &[usize]| {
            let mut set = BitSet::new(cfg.node_count());
            for &n in nodes {
                set.insert(n);
            }
            set
        };
        let raw = vec![
            NaturalLoop {
                header: NodeId::new(0),
                tails: vec![NodeId::new(1)],
                body: body(&[0, 1]),
            },
            NaturalLoop {
                header: NodeId::new(1),
                tails: vec![NodeId::new(2)],
                body: body(&[1, 2]),
            },
        ];
        assert!(matches!(nest(&cfg, raw), Err(Error::NotLaminar { .. })));
        Ok(())
    }
}

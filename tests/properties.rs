//! Randomised properties of the analyses, checked against concrete
//! execution and brute-force graph search.

use std::collections::BTreeSet;

use flowcheck::{
    analysis::{eliminate_dead_code, find_loops, SymbolicEngine},
    cfg::{ControlFlowGraph, ProgramBuilder},
    compiler::EventLog,
    config::{SearchConfig, SimplifyConfig, VerifierConfig},
    ir::{ArithOp, Operand, RelOp, ValueType},
    pipeline::Verifier,
    utils::graph::{algorithms::compute_dominators_rooted, NodeId},
};
use proptest::prelude::*;

const OPS: [RelOp; 6] = [
    RelOp::Lt,
    RelOp::Le,
    RelOp::Gt,
    RelOp::Ge,
    RelOp::Eq,
    RelOp::Ne,
];

/// One branching block: `x op threshold`, then the two successor indices.
#[derive(Debug, Clone)]
struct Block {
    op: RelOp,
    threshold: f64,
    on_true: usize,
    on_false: usize,
}

fn name(index: usize, count: usize) -> String {
    if index == count {
        "end".to_string()
    } else {
        format!("b{index}")
    }
}

/// Blocks `b0..b{n-1}` branching forward on the input `x`, then `end`.
fn forward_program() -> impl Strategy<Value = Vec<Block>> {
    (1usize..8).prop_flat_map(|count| {
        proptest::collection::vec((0usize..6, -5i32..5, 0usize..64, 0usize..64), count).prop_map(
            move |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(k, (op, t, a, b))| Block {
                        op: OPS[op],
                        threshold: f64::from(t),
                        on_true: k + 1 + a % (count - k),
                        on_false: k + 1 + b % (count - k),
                    })
                    .collect()
            },
        )
    })
}

/// Blocks branching anywhere, including backwards.
fn any_program() -> impl Strategy<Value = Vec<(usize, usize)>> {
    (1usize..8).prop_flat_map(|count| {
        proptest::collection::vec((0..=count, 0..=count), count)
    })
}

fn build(blocks: &[Block]) -> ControlFlowGraph {
    let count = blocks.len();
    let mut builder = ProgramBuilder::new();
    for (k, block) in blocks.iter().enumerate() {
        builder = builder.block(&name(k, count));
        builder = if k == 0 { builder.input("x") } else { builder.print("x") };
        builder = builder.branch(
            "x",
            block.op,
            block.threshold,
            &name(block.on_true, count),
            &name(block.on_false, count),
        );
    }
    builder
        .block("end")
        .print("x")
        .end()
        .build()
        .expect("generated program is well formed")
}

fn build_graph(edges: &[(usize, usize)]) -> ControlFlowGraph {
    let count = edges.len();
    let mut builder = ProgramBuilder::new();
    for (k, &(t, f)) in edges.iter().enumerate() {
        builder = builder
            .block(&name(k, count))
            .input("x")
            .branch("x", RelOp::Lt, 0.0, &name(t, count), &name(f, count));
    }
    builder
        .block("end")
        .end()
        .build()
        .expect("generated graph is well formed")
}

/// Blocks a concrete run with input `x` enters.
fn concrete_path(blocks: &[Block], x: f64) -> Vec<String> {
    let count = blocks.len();
    let mut at = 0;
    let mut path = Vec::new();
    while at < count {
        path.push(name(at, count));
        let block = &blocks[at];
        let t = block.threshold;
        at = if compare(block.op, x, t) {
            block.on_true
        } else {
            block.on_false
        };
    }
    path.push("end".to_string());
    path
}

const ARITH: [ArithOp; 3] = [ArithOp::Add, ArithOp::Sub, ArithOp::Mul];

/// What a block of a [`Step`] program does before its branch.
#[derive(Debug, Clone)]
enum Stmt {
    /// `y = c`
    Set(f64),
    /// `y = x`
    Copy,
    /// `y = y op x`
    WithX(ArithOp),
    /// `y = y op c`
    WithConst(ArithOp, f64),
    /// `y = f(x)` where `f(n) = 2n + 1`
    Call,
}

/// Right-hand side of a branch.
#[derive(Debug, Clone)]
enum Rhs {
    X,
    Y,
    Const(f64),
}

impl Rhs {
    fn operand(&self) -> Operand {
        match self {
            Rhs::X => Operand::var("x"),
            Rhs::Y => Operand::var("y"),
            Rhs::Const(c) => Operand::num(*c),
        }
    }
}

/// One block: a statement over `x` and `y`, then `lhs op rhs` branching
/// forward.
#[derive(Debug, Clone)]
struct Step {
    stmt: Stmt,
    lhs_is_x: bool,
    op: RelOp,
    rhs: Rhs,
    on_true: usize,
    on_false: usize,
}

fn stmt() -> impl Strategy<Value = Stmt> {
    (0usize..5, 0usize..3, -3i32..4).prop_map(|(kind, op, c)| match kind {
        0 => Stmt::Set(f64::from(c)),
        1 => Stmt::Copy,
        2 => Stmt::WithX(ARITH[op]),
        3 => Stmt::WithConst(ARITH[op], f64::from(c)),
        _ => Stmt::Call,
    })
}

fn rhs() -> impl Strategy<Value = Rhs> {
    (0usize..3, -4i32..4).prop_map(|(kind, c)| match kind {
        0 => Rhs::X,
        1 => Rhs::Y,
        _ => Rhs::Const(f64::from(c)),
    })
}

/// Forward programs over the input `x` and a derived `y`, with calls.
fn stepped_program() -> impl Strategy<Value = Vec<Step>> {
    (1usize..7).prop_flat_map(|count| {
        proptest::collection::vec(
            (stmt(), any::<bool>(), 0usize..6, rhs(), 0usize..64, 0usize..64),
            count,
        )
        .prop_map(move |raw| {
            raw.into_iter()
                .enumerate()
                .map(|(k, (stmt, lhs_is_x, op, rhs, a, b))| Step {
                    stmt,
                    lhs_is_x,
                    op: OPS[op],
                    rhs,
                    on_true: k + 1 + a % (count - k),
                    on_false: k + 1 + b % (count - k),
                })
                .collect()
        })
    })
}

fn build_stepped(steps: &[Step]) -> ControlFlowGraph {
    let count = steps.len();
    let mut builder = ProgramBuilder::new();
    for (k, step) in steps.iter().enumerate() {
        builder = builder.block(&name(k, count));
        if k == 0 {
            builder = builder.input("x").assign("y", 0.0);
        }
        builder = match &step.stmt {
            Stmt::Set(c) => builder.assign("y", *c),
            Stmt::Copy => builder.assign("y", "x"),
            Stmt::WithX(op) => builder.eval("y", "y", *op, "x"),
            Stmt::WithConst(op, c) => builder.eval("y", "y", *op, *c),
            Stmt::Call => {
                let resume = format!("r{k}");
                builder
                    .call("f", &[], &[Operand::var("x")], &resume)
                    .block(&resume)
                    .pop("y")
            }
        };
        builder = builder.branch(
            if step.lhs_is_x { "x" } else { "y" },
            step.op,
            step.rhs.operand(),
            &name(step.on_true, count),
            &name(step.on_false, count),
        );
    }
    builder
        .block("end")
        .print("y")
        .end()
        .function("f", &[("n", ValueType::Double)], Some(ValueType::Double))
        .exit_block("f_body")
        .eval("t", "n", ArithOp::Mul, 2.0)
        .eval("t", "t", ArithOp::Add, 1.0)
        .ret("t")
        .build()
        .expect("generated program is well formed")
}

fn compare(op: RelOp, a: f64, b: f64) -> bool {
    match op {
        RelOp::Lt => a < b,
        RelOp::Le => a <= b,
        RelOp::Gt => a > b,
        RelOp::Ge => a >= b,
        RelOp::Eq => a == b,
        RelOp::Ne => a != b,
    }
}

fn arith(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        _ => a + b,
    }
}

/// Blocks a concrete run with input `x` enters, with `x` and `y` on entry.
fn concrete_run(steps: &[Step], x: f64) -> Vec<(String, Option<f64>, Option<f64>)> {
    let count = steps.len();
    let mut trace = Vec::new();
    let mut at = 0;
    let mut y = None;
    while at < count {
        let step = &steps[at];
        trace.push((name(at, count), (at > 0).then_some(x), y));
        let mut value = y.unwrap_or(0.0);
        value = match &step.stmt {
            Stmt::Set(c) => *c,
            Stmt::Copy => x,
            Stmt::WithX(op) => arith(*op, value, x),
            Stmt::WithConst(op, c) => arith(*op, value, *c),
            Stmt::Call => {
                trace.push(("f_body".to_string(), Some(x), Some(value)));
                trace.push((format!("r{at}"), Some(x), Some(value)));
                2.0 * x + 1.0
            }
        };
        y = Some(value);
        let lhs = if step.lhs_is_x { x } else { value };
        let rhs = match step.rhs {
            Rhs::X => x,
            Rhs::Y => value,
            Rhs::Const(c) => c,
        };
        at = if compare(step.op, lhs, rhs) {
            step.on_true
        } else {
            step.on_false
        };
    }
    trace.push(("end".to_string(), Some(x), y));
    trace
}

/// Dominators of `target` by definition: `d` dominates `target` iff
/// `target` is unreachable from the first block once `d` is deleted.
fn brute_force_dominators(cfg: &ControlFlowGraph, target: NodeId) -> BTreeSet<NodeId> {
    let Some(first) = cfg.first() else {
        return BTreeSet::new();
    };
    let reaches = |removed: Option<NodeId>| {
        let mut seen = BTreeSet::new();
        let mut stack = Vec::new();
        if removed != Some(first) {
            seen.insert(first);
            stack.push(first);
        }
        while let Some(node) = stack.pop() {
            for succ in cfg.successors(node) {
                if Some(succ) != removed && seen.insert(succ) {
                    stack.push(succ);
                }
            }
        }
        seen.contains(&target)
    };
    if !reaches(None) {
        return BTreeSet::new();
    }
    cfg.nodes()
        .map(|(id, _)| id)
        .filter(|&d| d == target || !reaches(Some(d)))
        .collect()
}

proptest! {
    /// Dead-code elimination never removes a block some concrete input runs.
    #[test]
    fn prop_dead_code_elimination_keeps_concrete_paths(
        blocks in forward_program(),
        inputs in proptest::collection::vec(-6i32..6, 1..6),
    ) {
        let mut cfg = build(&blocks);
        let config = VerifierConfig::new().with_simplify(SimplifyConfig::disabled());
        let report = Verifier::new(config).run(&mut cfg).expect("verification runs");
        prop_assert!(report.is_clean());

        for x in inputs {
            for block in concrete_path(&blocks, f64::from(x)) {
                prop_assert!(
                    cfg.node_id(&block).is_some(),
                    "'{}' was removed but x = {} runs it", block, x
                );
            }
        }
        prop_assert!(cfg.validate().is_ok());
    }

    /// Every concrete run with assignments, arithmetic and calls lies inside
    /// the search's entry states, and dead-code elimination keeps it.
    #[test]
    fn prop_search_covers_concrete_runs(
        steps in stepped_program(),
        inputs in proptest::collection::vec(-4i32..5, 1..6),
    ) {
        let mut cfg = build_stepped(&steps);
        let events = EventLog::new();
        let config = SearchConfig::default();
        let summary = SymbolicEngine::new(&cfg, &config, &events)
            .search()
            .expect("search runs");
        prop_assert!(!summary.truncated);

        let runs: Vec<_> = inputs
            .iter()
            .map(|&x| (x, concrete_run(&steps, f64::from(x))))
            .collect();
        for (x, trace) in &runs {
            for (block, cx, cy) in trace {
                let id = cfg.node_id(block).expect("traced block exists");
                prop_assert!(summary.is_reached(id), "x = {} enters unreached '{}'", x, block);
                let state = summary.state(id).expect("reached block has a state");
                for (var, value) in [("x", cx), ("y", cy)] {
                    let (Some(value), Some(symbolic)) = (value, state.var(var)) else {
                        continue;
                    };
                    let covered = symbolic.value.as_double().is_some_and(|i| i.contains(value));
                    prop_assert!(
                        covered,
                        "x = {}: {} = {} at '{}' outside {}", x, var, value, block, symbolic.value
                    );
                }
            }
        }

        eliminate_dead_code(&mut cfg, &summary, &events).expect("elimination runs");
        for (x, trace) in &runs {
            for (block, _, _) in trace {
                prop_assert!(
                    cfg.node_id(block).is_some(),
                    "'{}' was removed but x = {} runs it", block, x
                );
            }
        }
        prop_assert!(cfg.validate().is_ok());
    }

    /// The Lengauer–Tarjan tree of a built graph matches the definition.
    #[test]
    fn prop_graph_dominators_match_definition(edges in any_program()) {
        let cfg = build_graph(&edges);
        let dom = compute_dominators_rooted(&cfg);
        for (target, _) in cfg.nodes() {
            let expected = brute_force_dominators(&cfg, target);
            let actual: BTreeSet<NodeId> = if dom.is_reachable(target) {
                dom.dominators(target).collect()
            } else {
                BTreeSet::new()
            };
            prop_assert_eq!(actual, expected);
        }
    }

    /// Every loop header dominates its members and every nested loop lies
    /// inside its parent.
    #[test]
    fn prop_loops_are_dominated_and_nested(edges in any_program()) {
        let cfg = build_graph(&edges);
        let dom = compute_dominators_rooted(&cfg);
        let forest = find_loops(&cfg).expect("natural loops nest");
        for lp in forest.iter() {
            for member in &lp.members {
                prop_assert!(dom.dominates(lp.header, member.node));
            }
            if let Some(parent) = lp.parent.and_then(|p| forest.get(p)) {
                prop_assert!(lp.body.is_subset(&parent.body));
                prop_assert_eq!(lp.depth, parent.depth + 1);
            }
        }
    }
}

#![allow(unused)]
extern crate flowcheck;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flowcheck::{
    analysis::{find_loops, SymbolicEngine},
    cfg::{ControlFlowGraph, ProgramBuilder},
    compiler::EventLog,
    config::{SearchConfig, VerifierConfig},
    ir::{ArithOp, RelOp},
    pipeline::Verifier,
    utils::graph::algorithms::compute_dominators_rooted,
};
use std::hint::black_box;

/// A chain of `count` counting loops, each with a two-way branch in its body.
fn loop_chain(count: usize) -> ControlFlowGraph {
    let mut builder = ProgramBuilder::new().block("entry").input("k").jump("init0");
    for n in 0..count {
        let (head, left, right, latch) = (
            format!("h{n}"),
            format!("l{n}"),
            format!("r{n}"),
            format!("t{n}"),
        );
        let counter = format!("i{n}");
        builder = builder
            .block(&format!("init{n}"))
            .assign(&counter, 0.0)
            .jump(&head)
            .block(&head)
            .branch(counter.as_str(), RelOp::Lt, 8.0, &left, &format!("init{}", n + 1))
            .block(&left)
            .branch("k", RelOp::Gt, 0.0, &right, &latch)
            .block(&right)
            .eval("k", "k", ArithOp::Sub, 1.0)
            .jump(&latch)
            .block(&latch)
            .eval(&counter, counter.as_str(), ArithOp::Add, 1.0)
            .jump(&head);
    }
    builder
        .block(&format!("init{count}"))
        .print("k")
        .end()
        .build()
        .expect("benchmark program builds")
}

fn bench_dominators(c: &mut Criterion) {
    let mut group = c.benchmark_group("dominators");
    for count in [4, 32, 128] {
        let cfg = loop_chain(count);
        group.throughput(Throughput::Elements(cfg.len() as u64));
        group.bench_with_input(BenchmarkId::new("lengauer_tarjan", count), &cfg, |b, cfg| {
            b.iter(|| black_box(compute_dominators_rooted(black_box(cfg))));
        });
        group.bench_with_input(BenchmarkId::new("find_loops", count), &cfg, |b, cfg| {
            b.iter(|| black_box(find_loops(black_box(cfg)).unwrap()));
        });
    }
    group.finish();
}

fn bench_symbolic(c: &mut Criterion) {
    let mut group = c.benchmark_group("symbolic");
    let config = SearchConfig::default();
    for count in [1, 4, 16] {
        let cfg = loop_chain(count);
        group.bench_with_input(BenchmarkId::new("search", count), &cfg, |b, cfg| {
            b.iter(|| {
                let events = EventLog::new();
                black_box(SymbolicEngine::new(cfg, &config, &events).search().unwrap())
            });
        });
        group.bench_with_input(BenchmarkId::new("verifier", count), &cfg, |b, cfg| {
            let verifier = Verifier::new(VerifierConfig::full());
            b.iter(|| {
                let mut graph = cfg.clone();
                black_box(verifier.run(&mut graph).unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dominators, bench_symbolic);
criterion_main!(benches);

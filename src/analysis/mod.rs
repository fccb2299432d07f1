//! Program analyses over a [`ControlFlowGraph`](crate::cfg::ControlFlowGraph).
//!
//! # Architecture
//!
//! - [`loops`] - Dominator-based natural loop discovery and nesting
//! - [`symbolic`] - Path-sensitive symbolic execution and dead-code
//!   elimination
//! - [`termination`] - Termination arguments for the loops found by
//!   [`find_loops`], seeded by the symbolic search
//!
//! # Usage
//!
//! ```rust
//! use flowcheck::analysis::find_loops;
//! use flowcheck::cfg::ProgramBuilder;
//! use flowcheck::ir::ArithOp;
//!
//! let cfg = ProgramBuilder::new()
//!     .block("entry")
//!     .assign("i", 0.0)
//!     .jump("head")
//!     .block("head")
//!     .branch_lt("i", 10.0, "body", "done")
//!     .block("body")
//!     .eval("i", "i", ArithOp::Add, 1.0)
//!     .jump("head")
//!     .block("done")
//!     .end()
//!     .build()?;
//!
//! let forest = find_loops(&cfg)?;
//! assert_eq!(forest.len(), 1);
//! assert_eq!(forest.loops()[0].header_name(), "head");
//! # Ok::<(), flowcheck::Error>(())
//! ```

pub mod loops;
pub mod symbolic;
pub mod termination;

pub use loops::{
    find_loops, natural_loops, Loop, LoopCondition, LoopForest, LoopMember, NaturalLoop,
};
pub use symbolic::{eliminate_dead_code, SearchSummary, SymbolicEngine};
pub use termination::{
    judge_progress, ChangeMap, CounterExample, LoopAnalysis, LoopVerdict, MonotoneFlags,
    PathVerdict, TerminationValidator,
};

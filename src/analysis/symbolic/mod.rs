//! Path-sensitive symbolic execution over interval domains.
//!
//! # Architecture
//!
//! - [`Interval`] / [`SymbolicValue`] - Abstract scalars over `f64` and
//!   strings, with [`Satisfiability`] tests and clipping for branches
//! - [`SymbolicVariable`] - A scalar with its definedness, [`Monotonicity`]
//!   and versioned [`Relation`]s to other variables
//! - [`SymbolicVarSet`] / [`SymbolicStack`] / [`SymbolicArray`] - The state of
//!   one path; all three fork in O(1)
//! - [`Fringe`] - One path: state, branch conditions and revisit records
//! - [`Executor`] - Transfer functions of the body instructions
//! - [`SymbolicEngine`] - The depth-first search, producing a
//!   [`SearchSummary`] that drives [`eliminate_dead_code`] and seeds the
//!   termination check
//!
//! # Usage
//!
//! ```rust
//! use flowcheck::analysis::symbolic::{eliminate_dead_code, SymbolicEngine};
//! use flowcheck::cfg::ProgramBuilder;
//! use flowcheck::compiler::EventLog;
//! use flowcheck::config::SearchConfig;
//!
//! let mut cfg = ProgramBuilder::new()
//!     .block("entry")
//!     .assign("x", 5.0)
//!     .branch_lt("x", 3.0, "small", "large")
//!     .block("small")
//!     .jump("done")
//!     .block("large")
//!     .jump("done")
//!     .block("done")
//!     .end()
//!     .build()?;
//!
//! let events = EventLog::new();
//! let summary = SymbolicEngine::new(&cfg, &SearchConfig::default(), &events).search()?;
//! let removed = eliminate_dead_code(&mut cfg, &summary, &events)?;
//! assert_eq!(removed, vec!["small".to_string()]);
//! # Ok::<(), flowcheck::Error>(())
//! ```

mod array;
mod engine;
mod executor;
mod fringe;
mod interval;
mod lattice;
mod stack;
mod variable;
mod varset;

pub use array::{ArrayRange, IndexRange, SymbolicArray};
pub(crate) use engine::{constrain, decide};
pub use engine::{eliminate_dead_code, SearchResult, SearchSummary, SymbolicEngine};
pub use executor::Executor;
pub use fringe::{Fringe, PathCondition, Revisit};
pub use interval::{Bound, Interval, Satisfiability, TextBound};
pub use lattice::AbstractDomain;
pub use stack::{StackEntry, SymbolicStack};
pub use variable::{Monotonicity, Relation, SymbolicValue, SymbolicVariable};
pub use varset::{SymbolicVarSet, MAX_CHAIN};

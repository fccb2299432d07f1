// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # flowcheck
//!
//! Control-flow analysis and symbolic verification for programs lowered to a
//! graph of named blocks.
//!
//! A front end translates source code into [`ir::Instruction`]s grouped into
//! blocks of a [`cfg::ControlFlowGraph`]. `flowcheck` then simplifies the
//! graph, finds its loops, explores every feasible path symbolically over
//! interval domains and checks each loop for a termination argument. Program
//! errors and warnings are collected as structured events rather than
//! aborting the analysis.
//!
//! ## Features
//!
//! - **Graph model** - Named blocks, functions with call/return sites, a
//!   builder that consumes the front end's instruction stream, DOT output
//! - **Simplification** - Worklist fixpoint of constant propagation, empty
//!   block elision and block fusion
//! - **Loops** - Lengauer–Tarjan dominators, natural loops and their nesting
//! - **Symbolic execution** - Interval arithmetic for numbers and strings,
//!   relations between variables, widening at loop headers, bounds checks,
//!   dead-code elimination
//! - **Termination** - Monotonicity of the loop test operands along every
//!   iteration path
//!
//! ## Quick Start
//!
//! ```rust
//! use flowcheck::prelude::*;
//!
//! let mut cfg = ProgramBuilder::new()
//!     .block("entry")
//!     .assign("x", 2.0)
//!     .eval("y", "x", ArithOp::Add, 3.0)
//!     .print("y")
//!     .end()
//!     .build()?;
//!
//! let report = Verifier::new(VerifierConfig::default()).run(&mut cfg)?;
//! assert!(report.is_clean());
//!
//! let entry = cfg.first().and_then(|id| cfg.node(id)).expect("entry block");
//! assert_eq!(entry.instructions().len(), 1);
//! assert_eq!(entry.instructions()[0].to_string(), "print 5");
//! # Ok::<(), flowcheck::Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`cfg`] - The graph model and [`cfg::ProgramBuilder`]
//! - [`ir`] - Instructions, operands and operators
//! - [`compiler`] - Simplification passes and the [`compiler::EventLog`]
//! - [`analysis`] - Loops, symbolic execution and termination
//! - [`pipeline`] - The [`pipeline::Verifier`] driving all stages
//! - [`config`] - Settings of every stage
//!
//! ## Logging
//!
//! The library logs through the [`log`] facade and installs no logger.
//! Diagnostics about the analysed program are never logged as the only
//! channel; they are recorded as [`compiler::Event`]s.

#[macro_use]
pub mod error;

pub mod analysis;
pub mod cfg;
pub mod compiler;
pub mod config;
pub mod ir;
pub mod pipeline;
pub mod utils;

/// Convenient re-exports of the most commonly used types.
///
/// ```rust
/// use flowcheck::prelude::*;
///
/// let cfg = ProgramBuilder::new().block("main").print(1.0).end().build()?;
/// assert_eq!(cfg.len(), 1);
/// # Ok::<(), flowcheck::Error>(())
/// ```
pub mod prelude;

pub use error::{Error, ProgramError};

/// The result type used throughout `flowcheck`.
pub type Result<T> = std::result::Result<T, Error>;

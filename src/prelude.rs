//! # flowcheck Prelude
//!
//! The types needed to build a graph, run the verifier and inspect its
//! report. Import this module to get them all at once.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all flowcheck operations
pub use crate::Error;

/// Errors of the analysed program
pub use crate::ProgramError;

/// The result type used throughout flowcheck
pub use crate::Result;

// ================================================================================================
// Graph Model
// ================================================================================================

/// Graph, blocks and the builder consuming the front end's instructions
pub use crate::cfg::{CfgNode, ControlFlowGraph, FunctionId, ProgramBuilder, Terminator};

/// Instruction set
pub use crate::ir::{ArithOp, Comparison, Instruction, Literal, Operand, RelOp, ValueType};

/// Graph node identifiers
pub use crate::utils::graph::NodeId;

// ================================================================================================
// Pipeline
// ================================================================================================

/// The verification driver and its report
pub use crate::pipeline::{VerificationReport, Verifier};

/// Settings of every stage
pub use crate::config::{SearchConfig, SimplifyConfig, VerifierConfig};

/// Diagnostic and transformation events
pub use crate::compiler::{Event, EventKind, EventLog};

// ================================================================================================
// Analyses
// ================================================================================================

/// Loops, symbolic search and termination verdicts
pub use crate::analysis::{
    find_loops, Loop, LoopForest, LoopVerdict, PathVerdict, SearchSummary, SymbolicEngine,
    TerminationValidator,
};

/// Abstract values of the symbolic engine
pub use crate::analysis::symbolic::{Interval, Monotonicity, SymbolicValue};

//! Control-flow graph of named basic blocks.
//!
//! # Architecture
//!
//! - [`ControlFlowGraph`] - Arena of [`CfgNode`]s with a name index, the
//!   function table and the program's first and final blocks
//! - [`CfgNode`] / [`Terminator`] - A block and the edges leaving it
//! - [`FunctionSymbol`] / [`FunctionCall`] - Function layout and call records,
//!   which supply the interprocedural return edges
//! - [`RoutineView`] - One routine with calls collapsed into edges, used for
//!   loop discovery
//! - [`ProgramBuilder`] - Fluent construction for tests and tools
//!
//! Nodes refer to each other by [`NodeId`](crate::utils::graph::NodeId)
//! only. Predecessor sets are back-references maintained by the graph
//! whenever a terminator changes, and [`ControlFlowGraph::validate`] checks
//! that they stay symmetric.

mod builder;
mod function;
mod graph;
mod node;
mod view;

pub use builder::{IntoOperand, ProgramBuilder};
pub use function::{FunctionCall, FunctionId, FunctionSymbol};
pub use graph::ControlFlowGraph;
pub use node::{CfgNode, Terminator};
pub use view::RoutineView;

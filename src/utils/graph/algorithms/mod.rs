//! Graph algorithms for program analysis.
//!
//! All algorithms are generic over the traits in
//! [`crate::utils::graph`], so they run unchanged on the interprocedural
//! [`ControlFlowGraph`](crate::cfg::ControlFlowGraph), on per-routine
//! [`RoutineView`](crate::cfg::RoutineView)s and on synthetic test graphs.
//!
//! # Available Algorithms
//!
//! ## Traversal
//!
//! - [`depth_first`] - Depth-first spanning tree with pre- and postorder
//! - [`reverse_postorder`] - Reverse postorder (forward dataflow order)
//!
//! ## Dominator Analysis
//!
//! - [`compute_dominators`] - Compute the dominator tree using Lengauer-Tarjan
//! - [`compute_dominators_rooted`] - Same, from a [`RootedGraph`](crate::utils::graph::RootedGraph)'s entry
//! - [`DominatorTree`] - Result of dominator computation

mod dominators;
mod traversal;

pub use dominators::{compute_dominators, compute_dominators_rooted, DominatorIterator, DominatorTree};
pub use traversal::{depth_first, reverse_postorder, DfsTree};

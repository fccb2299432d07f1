//! Directed graph infrastructure for program analysis.
//!
//! # Key Components
//!
//! - [`NodeId`] - Strongly-typed node identifier
//! - [`GraphBase`], [`Successors`], [`Predecessors`], [`RootedGraph`] -
//!   Traits the algorithms are written against
//! - [`algorithms`] - Traversal and dominator computation
//!
//! # Strongly-Typed Identifiers
//!
//! Node identifiers are newtype wrappers around arena indices. They are
//! never reused after a node is removed, so per-node vectors sized with
//! [`GraphBase::node_count`] stay valid across graph edits.

pub mod algorithms;
mod node;
mod traits;

pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, RootedGraph, Successors};

//! Shared helpers: bit vectors, DOT escaping and the graph toolkit.

mod bitset;
mod dot;
pub mod graph;

pub use bitset::{radix_sort_descending, BitSet, BitSetIter};
pub use dot::escape_dot;

//! Built-in simplification passes.
//!
//! - [`ConstantPropagationPass`] - Block-local constant substitution, folding
//!   and branch collapsing
//! - [`EmptyBlockElisionPass`] - Removes blocks that only jump elsewhere
//! - [`BlockFusionPass`] - Merges a block into its sole predecessor

mod constprop;
mod elision;
mod fusion;

pub use constprop::ConstantPropagationPass;
pub use elision::EmptyBlockElisionPass;
pub use fusion::BlockFusionPass;

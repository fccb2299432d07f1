//! Lattice operations shared by the abstract domains.
//!
//! The symbolic engine merges states where paths meet (join), narrows them
//! along branch conditions (meet) and accelerates loops by widening. Each
//! domain ([`Interval`](super::Interval), [`SymbolicValue`](super::SymbolicValue),
//! [`SymbolicArray`](super::SymbolicArray)) implements [`AbstractDomain`].
//!
//! # Ordering
//!
//! `a.subsumes(b)` is the lattice order `b ⊑ a`: every concrete value
//! described by `b` is also described by `a`. Re-entering a node with a state
//! the recorded one subsumes adds no behaviour and ends the path.

use std::fmt::Debug;

/// An abstract domain with the operations the symbolic search needs.
///
/// Implementations must satisfy, for all `a`, `b`:
///
/// - `a.join(b).subsumes(a)` and `a.join(b).subsumes(b)`
/// - `a.subsumes(a.meet(b))` and `b.subsumes(a.meet(b))`
/// - `a.widen(b).subsumes(a.join(b))`
pub trait AbstractDomain: Clone + Debug + PartialEq {
    /// Least upper bound.
    #[must_use]
    fn join(&self, other: &Self) -> Self;

    /// Greatest lower bound. May produce the empty element.
    #[must_use]
    fn meet(&self, other: &Self) -> Self;

    /// Widening: like [`join`](AbstractDomain::join), but every bound that
    /// moved between `self` (older) and `newer` jumps to the extreme of its
    /// domain so that repeated widening stabilises.
    #[must_use]
    fn widen(&self, newer: &Self) -> Self;

    /// Returns `true` if `self` describes every value `other` does.
    fn subsumes(&self, other: &Self) -> bool;

    /// Returns `true` for the empty element (no concrete value).
    fn is_bottom(&self) -> bool;
}

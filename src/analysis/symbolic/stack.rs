//! Symbolic runtime stack.
//!
//! The stack carries saved locals, return-site markers and argument/return
//! values across calls. It is an [`imbl::Vector`], so cloning a fringe shares
//! the stack structurally and forks stay O(1).
//!
//! # Call sequence
//!
//! ```text
//! caller:  push i          [.., i]
//!          pushstate r     [.., i, @r]
//!          push 3          [.., i, @r, 3]
//! callee:  pop a           [.., i, @r]
//!          return a        [.., i, a]        resume at r
//! r:       pop res         [.., i]
//!          pop i           [..]
//! ```

use std::fmt;

use imbl::Vector;

use crate::{
    analysis::symbolic::{AbstractDomain, SymbolicVariable},
    utils::graph::NodeId,
};

/// One stack slot.
#[derive(Debug, Clone, PartialEq)]
pub enum StackEntry {
    /// A pushed value. `source` names the variable it was read from so that
    /// popping it back into the same variable restores the saved state.
    Value {
        /// Variable the value was pushed from, if any
        source: Option<String>,
        /// Snapshot of the value
        variable: SymbolicVariable,
    },
    /// A return-site marker.
    State(NodeId),
}

impl fmt::Display for StackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackEntry::Value {
                source: Some(name),
                variable,
            } => write!(f, "{name}={}", variable.value),
            StackEntry::Value { variable, .. } => write!(f, "{}", variable.value),
            StackEntry::State(node) => write!(f, "@{node}"),
        }
    }
}

/// The stack of one path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolicStack {
    entries: Vector<StackEntry>,
}

impl SymbolicStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pushes an entry.
    pub fn push(&mut self, entry: StackEntry) {
        self.entries.push_back(entry);
    }

    /// Pops the top entry.
    pub fn pop(&mut self) -> Option<StackEntry> {
        self.entries.pop_back()
    }

    /// The top entry.
    #[must_use]
    pub fn peek(&self) -> Option<&StackEntry> {
        self.entries.back()
    }

    /// The innermost return-site marker: the call context of the current
    /// routine (`None` in the main program).
    #[must_use]
    pub fn top_state(&self) -> Option<NodeId> {
        self.entries.iter().rev().find_map(|e| match e {
            StackEntry::State(node) => Some(*node),
            StackEntry::Value { .. } => None,
        })
    }

    /// Number of return-site markers, i.e. the call depth.
    #[must_use]
    pub fn call_depth(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, StackEntry::State(_)))
            .count()
    }

    /// Pops entries up to and including the innermost return-site marker.
    /// Returns the marker, or `None` if there is none (the stack is then left
    /// untouched).
    pub fn unwind_to_state(&mut self) -> Option<NodeId> {
        let state = self.top_state()?;
        while let Some(entry) = self.entries.pop_back() {
            if matches!(entry, StackEntry::State(_)) {
                break;
            }
        }
        Some(state)
    }

    /// Iterates bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &StackEntry> {
        self.entries.iter()
    }

    /// Slot-wise merge of two stacks of the same shape; otherwise `self`.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        if self.len() != other.len() {
            return self.clone();
        }
        let entries = self
            .entries
            .iter()
            .zip(other.entries.iter())
            .map(|(a, b)| match (a, b) {
                (
                    StackEntry::Value {
                        source: sa,
                        variable: va,
                    },
                    StackEntry::Value {
                        source: sb,
                        variable: vb,
                    },
                ) if va.ty == vb.ty => StackEntry::Value {
                    source: if sa == sb { sa.clone() } else { None },
                    variable: va.join(vb),
                },
                _ => a.clone(),
            })
            .collect();
        Self { entries }
    }

    /// Index of the first entry above the innermost return-site marker.
    fn frame_start(&self) -> usize {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, StackEntry::State(_)))
            .map(|(i, _)| i + 1)
            .last()
            .unwrap_or(0)
    }

    /// Returns `true` if the innermost frame of `self` (the entries above
    /// its innermost marker: pending arguments or pushed values) covers
    /// that of `other`. The frames may sit at different depths.
    #[must_use]
    pub fn frame_subsumes(&self, other: &Self) -> bool {
        let (mine, theirs) = (self.frame_start(), other.frame_start());
        self.len() - mine == other.len() - theirs
            && self
                .entries
                .iter()
                .skip(mine)
                .zip(other.entries.iter().skip(theirs))
                .all(|(a, b)| match (a, b) {
                    (
                        StackEntry::Value { variable: va, .. },
                        StackEntry::Value { variable: vb, .. },
                    ) => va.ty == vb.ty && va.value.subsumes(&vb.value),
                    _ => false,
                })
    }

    /// Widens every value of the innermost frame against the matching slot
    /// of `old`'s innermost frame. Frames of different shape are left alone.
    pub fn widen_frame(&mut self, old: &Self) {
        let (mine, theirs) = (self.frame_start(), old.frame_start());
        if self.len() - mine != old.len() - theirs {
            return;
        }
        for (offset, prev) in old.entries.iter().skip(theirs).enumerate() {
            let (
                Some(StackEntry::Value { variable, .. }),
                StackEntry::Value { variable: prev, .. },
            ) = (self.entries.get_mut(mine + offset), prev)
            else {
                continue;
            };
            if prev.ty == variable.ty {
                variable.value = prev.value.widen(&variable.value);
                variable.relations.clear();
            }
        }
    }

    /// Returns `true` if `self` covers every value `other` holds, slot by slot.
    #[must_use]
    pub fn subsumes(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|(a, b)| match (a, b) {
                    (StackEntry::State(x), StackEntry::State(y)) => x == y,
                    (
                        StackEntry::Value { variable: va, .. },
                        StackEntry::Value { variable: vb, .. },
                    ) => va.value.subsumes(&vb.value),
                    _ => false,
                })
    }
}

impl fmt::Display for SymbolicStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{entry}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::symbolic::SymbolicValue;

    fn value(v: f64) -> StackEntry {
        StackEntry::Value {
            source: None,
            variable: SymbolicVariable::with_value(SymbolicValue::number(v)),
        }
    }

    #[test]
    fn test_state_tracking() {
        let mut stack = SymbolicStack::new();
        stack.push(value(1.0));
        assert_eq!(stack.top_state(), None);
        stack.push(StackEntry::State(NodeId::new(4)));
        stack.push(value(2.0));
        stack.push(value(3.0));
        assert_eq!(stack.top_state(), Some(NodeId::new(4)));
        assert_eq!(stack.call_depth(), 1);

        assert_eq!(stack.unwind_to_state(), Some(NodeId::new(4)));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.unwind_to_state(), None);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut a = SymbolicStack::new();
        a.push(value(1.0));
        let mut b = a.clone();
        b.push(value(2.0));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 2);
        assert_eq!(b.to_string(), "[1, 2]");
    }

    #[test]
    fn test_join_and_subsumes() {
        let mut a = SymbolicStack::new();
        a.push(value(1.0));
        let mut b = SymbolicStack::new();
        b.push(value(3.0));
        let joined = a.join(&b);
        assert!(joined.subsumes(&a) && joined.subsumes(&b));
        assert!(!a.subsumes(&b));
    }
}

//! Basic blocks and their terminators.

use std::collections::BTreeSet;

use crate::{
    cfg::FunctionId,
    ir::{Comparison, Instruction, Operand},
    utils::graph::NodeId,
};

/// How control leaves a block.
///
/// The terminator is the only place successor edges live, which keeps the
/// "no successor / one unconditional successor / two guarded successors"
/// invariant structural.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    /// No successor: the end of the program (or a block still being built).
    End,
    /// Unconditional edge.
    Jump(NodeId),
    /// Two-way branch guarded by a comparison.
    Branch {
        /// Guard
        comparison: Comparison,
        /// Taken when the guard holds
        on_true: NodeId,
        /// Taken otherwise
        on_false: NodeId,
    },
    /// Function return. The successors are the return sites registered for
    /// the owning function.
    Return(Option<Operand>),
}

impl Terminator {
    /// Local successor edges, i.e. everything except return edges.
    #[must_use]
    pub fn targets(&self) -> Vec<NodeId> {
        match self {
            Terminator::Jump(t) => vec![*t],
            Terminator::Branch {
                on_true, on_false, ..
            } => vec![*on_true, *on_false],
            Terminator::End | Terminator::Return(_) => Vec::new(),
        }
    }

    /// Returns `true` if this is a two-way branch.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(self, Terminator::Branch { .. })
    }

    /// Replaces every edge to `old` with an edge to `new`. A branch whose two
    /// edges become identical collapses into a jump.
    pub(crate) fn retarget(&mut self, old: NodeId, new: NodeId) {
        match self {
            Terminator::Jump(t) if *t == old => *t = new,
            Terminator::Branch {
                on_true, on_false, ..
            } => {
                if *on_true == old {
                    *on_true = new;
                }
                if *on_false == old {
                    *on_false = new;
                }
                if on_true == on_false {
                    *self = Terminator::Jump(new);
                }
            }
            _ => {}
        }
    }
}

/// A basic block.
#[derive(Debug, Clone)]
pub struct CfgNode {
    pub(crate) name: String,
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) terminator: Terminator,
    pub(crate) predecessors: BTreeSet<NodeId>,
    pub(crate) function: Option<FunctionId>,
    pub(crate) is_exit: bool,
    /// `false` for placeholders created by a forward jump reference.
    pub(crate) populated: bool,
    /// A control suffix has been installed; nothing may be appended.
    pub(crate) closed: bool,
    /// `jumpif` pushed incrementally, waiting for its fall-through `jump`.
    pub(crate) pending_branch: Option<(Comparison, NodeId)>,
    pub(crate) line: Option<usize>,
}

impl CfgNode {
    pub(crate) fn new(name: &str, function: Option<FunctionId>, is_exit: bool) -> Self {
        Self {
            name: name.to_string(),
            instructions: Vec::new(),
            terminator: Terminator::End,
            predecessors: BTreeSet::new(),
            function,
            is_exit,
            populated: true,
            closed: false,
            pending_branch: None,
            line: None,
        }
    }

    /// Block name, unique within the graph.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Straight-line instructions (without the control suffix).
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The block's terminator.
    #[must_use]
    pub fn terminator(&self) -> &Terminator {
        &self.terminator
    }

    /// The guard of a two-way branch.
    #[must_use]
    pub fn comparison(&self) -> Option<&Comparison> {
        match &self.terminator {
            Terminator::Branch { comparison, .. } => Some(comparison),
            _ => None,
        }
    }

    /// Predecessor back-references.
    #[must_use]
    pub fn predecessors(&self) -> &BTreeSet<NodeId> {
        &self.predecessors
    }

    /// Owning function, `None` for the main program.
    #[must_use]
    pub fn function(&self) -> Option<FunctionId> {
        self.function
    }

    /// Returns `true` if this block is a function's exit block.
    #[must_use]
    pub fn is_exit(&self) -> bool {
        self.is_exit
    }

    /// Returns `false` for a block that was referenced but never defined.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Returns `true` if the block has no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Source line of the block, when the front end recorded one.
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    /// Return-site markers pushed by this block.
    pub fn pushed_states(&self) -> impl Iterator<Item = &str> {
        self.instructions.iter().filter_map(|i| match i {
            Instruction::PushState(state) => Some(state.as_str()),
            _ => None,
        })
    }

    /// The control suffix in instruction form, given a resolver for names.
    pub(crate) fn control_suffix(&self, name_of: impl Fn(NodeId) -> String) -> Vec<Instruction> {
        match &self.terminator {
            Terminator::End => Vec::new(),
            Terminator::Jump(t) => vec![Instruction::Jump(name_of(*t))],
            Terminator::Branch {
                comparison,
                on_true,
                on_false,
            } => vec![
                Instruction::JumpIf {
                    comparison: comparison.clone(),
                    target: name_of(*on_true),
                },
                Instruction::Jump(name_of(*on_false)),
            ],
            Terminator::Return(value) => vec![Instruction::Return(value.clone())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::RelOp;

    #[test]
    fn test_retarget_collapses_branch() {
        let mut term = Terminator::Branch {
            comparison: Comparison::new(Operand::var("x"), RelOp::Lt, Operand::num(1.0)),
            on_true: NodeId::new(1),
            on_false: NodeId::new(2),
        };
        term.retarget(NodeId::new(1), NodeId::new(3));
        assert_eq!(term.targets(), vec![NodeId::new(3), NodeId::new(2)]);

        term.retarget(NodeId::new(2), NodeId::new(3));
        assert_eq!(term, Terminator::Jump(NodeId::new(3)));
    }
}

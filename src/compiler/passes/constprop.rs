//! Block-local constant propagation.
//!
//! Walks a block's straight-line instructions with an environment of
//! variables known to hold a literal, substitutes those literals into later
//! operands and folds arithmetic whose operands are all constant:
//!
//! ```text
//! x = 2                 x = 2
//! y = x + 3      =>     y = 5
//! print y               print 5
//! ```
//!
//! A branch guard that becomes constant collapses into a jump to the taken
//! side. Comparing literals of different domains is a type error; it is
//! reported and the block is left untouched.
//!
//! Optionally, scalars that are declared and assigned literals only in this
//! block and read nowhere in the graph are removed afterwards, so the example
//! above ends as a single `print 5`.
//!
//! The environment starts empty at every block, so no assumption is made
//! about values flowing in from predecessors.

use rustc_hash::FxHashMap;

use crate::{
    cfg::{ControlFlowGraph, Terminator},
    compiler::{CfgPass, EventKind, EventLog},
    error::ProgramError,
    ir::{Instruction, Literal, Operand},
    utils::graph::NodeId,
    Result,
};

/// Substitutes and folds constants within a block.
#[derive(Debug)]
pub struct ConstantPropagationPass {
    remove_unused: bool,
}

impl Default for ConstantPropagationPass {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Replaces a variable operand by its known literal. Returns `true` on change.
fn substitute(operand: &mut Operand, env: &FxHashMap<String, Literal>) -> bool {
    let Some(lit) = operand.as_var().and_then(|v| env.get(v)) else {
        return false;
    };
    *operand = Operand::Literal(lit.clone());
    true
}

impl ConstantPropagationPass {
    /// Creates the pass. With `remove_unused`, unread literal-only scalars
    /// are deleted after folding.
    #[must_use]
    pub fn new(remove_unused: bool) -> Self {
        Self { remove_unused }
    }

    /// Propagates through the straight-line part of a block.
    fn propagate(
        instructions: &mut [Instruction],
        env: &mut FxHashMap<String, Literal>,
        folded: &mut Vec<String>,
    ) {
        for instr in instructions.iter_mut() {
            let before = instr.to_string();
            let mut changed = false;
            for operand in instr.operands_mut() {
                changed |= substitute(operand, env);
            }

            let fold = match instr {
                Instruction::Evaluate {
                    target,
                    op,
                    lhs: Operand::Literal(lhs),
                    rhs: Operand::Literal(rhs),
                } => op.fold(lhs, rhs).ok().map(|value| (target.clone(), value)),
                _ => None,
            };
            if let Some((target, value)) = fold {
                *instr = Instruction::Assign {
                    target,
                    value: Operand::Literal(value),
                };
                changed = true;
            }

            match &*instr {
                Instruction::Assign {
                    target,
                    value: Operand::Literal(lit),
                } => {
                    env.insert(target.clone(), lit.clone());
                }
                other => {
                    if let Some(var) = other.defined_variable() {
                        env.remove(var);
                    }
                }
            }

            if changed {
                folded.push(format!("{before} -> {instr}"));
            }
        }
    }

    /// Removes scalars of `node` that nothing reads. Returns the removed
    /// instructions.
    fn remove_unused(cfg: &mut ControlFlowGraph, node: NodeId) -> Result<Vec<Instruction>> {
        let reads = cfg.read_variables();
        let writers = cfg.variable_writers();
        let Some(block) = cfg.node(node) else {
            return Ok(Vec::new());
        };

        let removable = |var: &str| {
            !reads.contains(var)
                && writers
                    .get(var)
                    .is_some_and(|w| w.len() == 1 && w.contains(&node))
                && block.instructions().iter().all(|i| match i {
                    Instruction::Declare { .. }
                    | Instruction::Assign {
                        value: Operand::Literal(_),
                        ..
                    } => true,
                    other => other.defined_variable() != Some(var),
                })
        };

        let (removed, kept): (Vec<Instruction>, Vec<Instruction>) = block
            .instructions()
            .iter()
            .cloned()
            .partition(|i| i.defined_variable().is_some_and(removable));

        if !removed.is_empty() {
            cfg.set_body(node, kept)?;
        }
        Ok(removed)
    }
}

impl CfgPass for ConstantPropagationPass {
    fn name(&self) -> &'static str {
        "constant-propagation"
    }

    fn description(&self) -> &'static str {
        "Substitutes and folds block-local constants, collapsing constant branches"
    }

    fn run_on_node(
        &self,
        cfg: &mut ControlFlowGraph,
        node: NodeId,
        events: &EventLog,
    ) -> Result<Vec<NodeId>> {
        let Some(block) = cfg.node(node) else {
            return Ok(Vec::new());
        };
        let name = block.name().to_string();
        let line = block.line();
        let mut instructions = block.instructions().to_vec();
        let mut terminator = block.terminator().clone();

        let mut env = FxHashMap::default();
        let mut folded = Vec::new();
        Self::propagate(&mut instructions, &mut env, &mut folded);

        let mut dirty = Vec::new();
        let mut collapsed = None;
        match &mut terminator {
            Terminator::Branch {
                comparison,
                on_true,
                on_false,
            } => {
                let before = comparison.to_string();
                let mut changed = substitute(&mut comparison.lhs, &env);
                changed |= substitute(&mut comparison.rhs, &env);
                match comparison.fold() {
                    Ok(Some(taken)) => {
                        let (target, dropped) = if taken {
                            (*on_true, *on_false)
                        } else {
                            (*on_false, *on_true)
                        };
                        collapsed = Some((before, taken, target, dropped));
                    }
                    Ok(None) => {
                        if changed {
                            folded.push(format!("{before} -> {comparison}"));
                        }
                    }
                    Err(ProgramError::TypeMismatch(message)) => {
                        events.record_once(EventKind::Error, &name, line, message);
                        return Ok(Vec::new());
                    }
                    Err(other) => {
                        events.record_once(EventKind::Error, &name, line, other.to_string());
                        return Ok(Vec::new());
                    }
                }
            }
            Terminator::Return(Some(value)) => {
                let before = value.to_string();
                if substitute(value, &env) {
                    folded.push(format!("return {before} -> return {value}"));
                }
            }
            _ => {}
        }

        if !folded.is_empty() {
            cfg.set_body(node, instructions)?;
            for message in folded {
                events
                    .record(EventKind::ConstantFolded)
                    .node(name.as_str())
                    .line(line)
                    .pass(self.name())
                    .message(message);
            }
            dirty.push(node);
        }

        if let Some((guard, taken, target, dropped)) = collapsed {
            cfg.set_terminator(node, Terminator::Jump(target))?;
            events
                .record(EventKind::BranchSimplified)
                .node(name.as_str())
                .line(line)
                .pass(self.name())
                .message(format!(
                    "'{guard}' is always {taken}, jumping to '{}'",
                    cfg.label(target)
                ));
            dirty.extend([node, target, dropped]);
        } else if dirty.contains(&node) {
            cfg.set_terminator(node, terminator)?;
        }

        if self.remove_unused {
            let removed = Self::remove_unused(cfg, node)?;
            for instr in &removed {
                events
                    .record(EventKind::InstructionRemoved)
                    .node(name.as_str())
                    .line(line)
                    .pass(self.name())
                    .message(format!("removed unused '{instr}'"));
            }
            if !removed.is_empty() && !dirty.contains(&node) {
                dirty.push(node);
            }
        }

        dirty.dedup();
        Ok(dirty)
    }
}

//! Instructions of a basic block.

use std::fmt;

use crate::ir::{ArithOp, Comparison, Operand, ValueType};

/// A single instruction as produced by the front end.
///
/// The last three variants are *control* instructions. They may only appear
/// as the suffix of a block (`jump`, `return`, or `jumpif` immediately
/// followed by `jump`) and are turned into the block's terminator when the
/// instruction list is installed in the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Declares a scalar variable (initially undefined).
    Declare {
        /// Variable name
        name: String,
        /// Declared domain
        ty: ValueType,
    },
    /// `target = value`
    Assign {
        /// Assigned variable
        target: String,
        /// Assigned value
        value: Operand,
    },
    /// `target = lhs op rhs`
    Evaluate {
        /// Assigned variable
        target: String,
        /// Operator
        op: ArithOp,
        /// Left operand
        lhs: Operand,
        /// Right operand
        rhs: Operand,
    },
    /// Writes a value to the program output.
    Print(Operand),
    /// Reads an arbitrary value of the target's type.
    Input {
        /// Assigned variable
        target: String,
    },
    /// Pushes a value on the runtime stack.
    Push(Operand),
    /// Pushes a return-site marker naming the block execution resumes at.
    PushState(String),
    /// Pops the top value, optionally storing it.
    Pop {
        /// Variable receiving the value, or `None` to discard it
        target: Option<String>,
    },
    /// Declares a flat array of `size` elements.
    DeclareArray {
        /// Array name
        name: String,
        /// Element domain
        ty: ValueType,
        /// Number of elements
        size: Operand,
    },
    /// `target = array[index]`
    ArrayRead {
        /// Assigned variable
        target: String,
        /// Array name
        array: String,
        /// Element index
        index: Operand,
    },
    /// `array[index] = value`
    ArrayWrite {
        /// Array name
        array: String,
        /// Element index
        index: Operand,
        /// Stored value
        value: Operand,
    },
    /// Conditional jump; must be followed by a [`Instruction::Jump`] naming
    /// the fall-through block.
    JumpIf {
        /// Guard
        comparison: Comparison,
        /// Block taken when the guard holds
        target: String,
    },
    /// Unconditional jump.
    Jump(String),
    /// Returns from the current function, optionally with a value.
    Return(Option<Operand>),
}

impl Instruction {
    /// Returns `true` for `jumpif`, `jump` and `return`.
    #[must_use]
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Instruction::JumpIf { .. } | Instruction::Jump(_) | Instruction::Return(_)
        )
    }

    /// The scalar variable written by this instruction, if any.
    #[must_use]
    pub fn defined_variable(&self) -> Option<&str> {
        match self {
            Instruction::Declare { name, .. } => Some(name),
            Instruction::Assign { target, .. }
            | Instruction::Evaluate { target, .. }
            | Instruction::Input { target }
            | Instruction::ArrayRead { target, .. } => Some(target),
            Instruction::Pop { target } => target.as_deref(),
            _ => None,
        }
    }

    /// Operands read by this instruction.
    #[must_use]
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Instruction::Assign { value, .. } => vec![value],
            Instruction::Evaluate { lhs, rhs, .. } => vec![lhs, rhs],
            Instruction::Print(op) | Instruction::Push(op) => vec![op],
            Instruction::DeclareArray { size, .. } => vec![size],
            Instruction::ArrayRead { index, .. } => vec![index],
            Instruction::ArrayWrite { index, value, .. } => vec![index, value],
            Instruction::JumpIf { comparison, .. } => vec![&comparison.lhs, &comparison.rhs],
            Instruction::Return(Some(op)) => vec![op],
            _ => Vec::new(),
        }
    }

    /// Mutable access to the operands read by this instruction.
    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Instruction::Assign { value, .. } => vec![value],
            Instruction::Evaluate { lhs, rhs, .. } => vec![lhs, rhs],
            Instruction::Print(op) | Instruction::Push(op) => vec![op],
            Instruction::DeclareArray { size, .. } => vec![size],
            Instruction::ArrayRead { index, .. } => vec![index],
            Instruction::ArrayWrite { index, value, .. } => vec![index, value],
            Instruction::JumpIf { comparison, .. } => {
                vec![&mut comparison.lhs, &mut comparison.rhs]
            }
            Instruction::Return(Some(op)) => vec![op],
            _ => Vec::new(),
        }
    }

    /// Names read by this instruction, including array names.
    #[must_use]
    pub fn read_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operands().into_iter().filter_map(Operand::as_var).collect();
        match self {
            Instruction::ArrayRead { array, .. } | Instruction::ArrayWrite { array, .. } => {
                names.push(array);
            }
            _ => {}
        }
        names
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Declare { name, ty } => write!(f, "{ty} {name}"),
            Instruction::Assign { target, value } => write!(f, "{target} = {value}"),
            Instruction::Evaluate {
                target,
                op,
                lhs,
                rhs,
            } => write!(f, "{target} = {lhs} {op} {rhs}"),
            Instruction::Print(op) => write!(f, "print {op}"),
            Instruction::Input { target } => write!(f, "input {target}"),
            Instruction::Push(op) => write!(f, "push {op}"),
            Instruction::PushState(state) => write!(f, "pushstate {state}"),
            Instruction::Pop { target: Some(t) } => write!(f, "pop {t}"),
            Instruction::Pop { target: None } => f.write_str("pop"),
            Instruction::DeclareArray { name, ty, size } => write!(f, "{ty} {name}[{size}]"),
            Instruction::ArrayRead {
                target,
                array,
                index,
            } => write!(f, "{target} = {array}[{index}]"),
            Instruction::ArrayWrite {
                array,
                index,
                value,
            } => write!(f, "{array}[{index}] = {value}"),
            Instruction::JumpIf { comparison, target } => {
                write!(f, "jumpif {comparison} {target}")
            }
            Instruction::Jump(target) => write!(f, "jump {target}"),
            Instruction::Return(Some(op)) => write!(f, "return {op}"),
            Instruction::Return(None) => f.write_str("return"),
        }
    }
}

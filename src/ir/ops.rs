//! Arithmetic and relational operators.

use std::{cmp::Ordering, fmt};

use strum::{Display, EnumIter};

use crate::{
    error::ProgramError,
    ir::{Literal, Operand},
};

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ArithOp {
    /// Addition, or concatenation for strings
    #[strum(serialize = "+")]
    Add,
    /// Subtraction
    #[strum(serialize = "-")]
    Sub,
    /// Multiplication
    #[strum(serialize = "*")]
    Mul,
    /// Division
    #[strum(serialize = "/")]
    Div,
    /// Floating point remainder
    #[strum(serialize = "%")]
    Mod,
}

impl ArithOp {
    /// Evaluates the operator on two constants.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::TypeMismatch`] when the operands have different
    /// domains or the operator is undefined for strings, and
    /// [`ProgramError::DivisionByZero`] / [`ProgramError::ModuloByZero`] for a
    /// zero divisor.
    pub fn fold(self, lhs: &Literal, rhs: &Literal) -> Result<Literal, ProgramError> {
        match (lhs, rhs) {
            (Literal::Double(a), Literal::Double(b)) => {
                let (a, b) = (*a, *b);
                let value = match self {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => {
                        if b == 0.0 {
                            return Err(ProgramError::DivisionByZero);
                        }
                        a / b
                    }
                    ArithOp::Mod => {
                        if b == 0.0 {
                            return Err(ProgramError::ModuloByZero);
                        }
                        a % b
                    }
                };
                Ok(Literal::Double(value))
            }
            (Literal::String(a), Literal::String(b)) if self == ArithOp::Add => {
                Ok(Literal::String(format!("{a}{b}")))
            }
            (Literal::String(_), Literal::String(_)) => Err(ProgramError::TypeMismatch(format!(
                "operator '{self}' is not defined for strings"
            ))),
            _ => Err(ProgramError::TypeMismatch(format!(
                "cannot apply '{self}' to {} and {}",
                lhs.value_type(),
                rhs.value_type()
            ))),
        }
    }
}

/// Relational operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum RelOp {
    /// `<`
    #[strum(serialize = "<")]
    Lt,
    /// `<=`
    #[strum(serialize = "<=")]
    Le,
    /// `>`
    #[strum(serialize = ">")]
    Gt,
    /// `>=`
    #[strum(serialize = ">=")]
    Ge,
    /// `==`
    #[strum(serialize = "==")]
    Eq,
    /// `!=`
    #[strum(serialize = "!=")]
    Ne,
}

impl RelOp {
    /// The operator that holds exactly when `self` does not.
    #[must_use]
    pub const fn negate(self) -> Self {
        match self {
            RelOp::Lt => RelOp::Ge,
            RelOp::Le => RelOp::Gt,
            RelOp::Gt => RelOp::Le,
            RelOp::Ge => RelOp::Lt,
            RelOp::Eq => RelOp::Ne,
            RelOp::Ne => RelOp::Eq,
        }
    }

    /// The operator with swapped operands: `a op b` iff `b op.flip() a`.
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            RelOp::Lt => RelOp::Gt,
            RelOp::Le => RelOp::Ge,
            RelOp::Gt => RelOp::Lt,
            RelOp::Ge => RelOp::Le,
            RelOp::Eq => RelOp::Eq,
            RelOp::Ne => RelOp::Ne,
        }
    }

    /// Returns `true` if `a self b` guarantees `a other b`.
    #[must_use]
    pub const fn implies(self, other: RelOp) -> bool {
        matches!(
            (self, other),
            (RelOp::Lt, RelOp::Lt | RelOp::Le | RelOp::Ne)
                | (RelOp::Le, RelOp::Le)
                | (RelOp::Gt, RelOp::Gt | RelOp::Ge | RelOp::Ne)
                | (RelOp::Ge, RelOp::Ge)
                | (RelOp::Eq, RelOp::Eq | RelOp::Le | RelOp::Ge)
                | (RelOp::Ne, RelOp::Ne)
        )
    }

    /// Composes `a self b` and `b next c` into a relation between `a` and `c`.
    ///
    /// Returns `None` when nothing follows (mixed directions or `!=`).
    #[must_use]
    pub const fn compose(self, next: RelOp) -> Option<RelOp> {
        match (self, next) {
            (RelOp::Eq, op) | (op, RelOp::Eq) => Some(op),
            (RelOp::Lt, RelOp::Lt | RelOp::Le) | (RelOp::Le, RelOp::Lt) => Some(RelOp::Lt),
            (RelOp::Le, RelOp::Le) => Some(RelOp::Le),
            (RelOp::Gt, RelOp::Gt | RelOp::Ge) | (RelOp::Ge, RelOp::Gt) => Some(RelOp::Gt),
            (RelOp::Ge, RelOp::Ge) => Some(RelOp::Ge),
            _ => None,
        }
    }

    /// Returns `true` if the ordering of `a` relative to `b` satisfies `a self b`.
    #[must_use]
    pub const fn holds(self, ordering: Ordering) -> bool {
        match self {
            RelOp::Lt => matches!(ordering, Ordering::Less),
            RelOp::Le => !matches!(ordering, Ordering::Greater),
            RelOp::Gt => matches!(ordering, Ordering::Greater),
            RelOp::Ge => !matches!(ordering, Ordering::Less),
            RelOp::Eq => matches!(ordering, Ordering::Equal),
            RelOp::Ne => !matches!(ordering, Ordering::Equal),
        }
    }

    /// Evaluates the operator on two constants.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::TypeMismatch`] when the literals have different
    /// domains.
    pub fn fold(self, lhs: &Literal, rhs: &Literal) -> Result<bool, ProgramError> {
        match (lhs, rhs) {
            (Literal::Double(a), Literal::Double(b)) => Ok(match a.partial_cmp(b) {
                Some(ordering) => self.holds(ordering),
                None => self == RelOp::Ne,
            }),
            (Literal::String(a), Literal::String(b)) => Ok(self.holds(a.cmp(b))),
            _ => Err(ProgramError::TypeMismatch(format!(
                "cannot compare {} with {}",
                lhs.value_type(),
                rhs.value_type()
            ))),
        }
    }
}

/// A relational test `lhs op rhs` guarding a conditional branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Operator
    pub op: RelOp,
    /// Left operand
    pub lhs: Operand,
    /// Right operand
    pub rhs: Operand,
}

impl Comparison {
    /// Creates a comparison.
    #[must_use]
    pub fn new(lhs: Operand, op: RelOp, rhs: Operand) -> Self {
        Self { op, lhs, rhs }
    }

    /// The same test with the operator negated.
    #[must_use]
    pub fn negated(&self) -> Self {
        Self {
            op: self.op.negate(),
            lhs: self.lhs.clone(),
            rhs: self.rhs.clone(),
        }
    }

    /// The same test with `op` in place of the original operator.
    #[must_use]
    pub fn with_op(&self, op: RelOp) -> Self {
        Self {
            op,
            lhs: self.lhs.clone(),
            rhs: self.rhs.clone(),
        }
    }

    /// Folds the comparison if both operands are constant.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::TypeMismatch`] for constants of different domains.
    pub fn fold(&self) -> Result<Option<bool>, ProgramError> {
        match (self.lhs.as_literal(), self.rhs.as_literal()) {
            (Some(lhs), Some(rhs)) => self.op.fold(lhs, rhs).map(Some),
            _ => Ok(None),
        }
    }

    /// Variables read by the test.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.lhs.as_var().into_iter().chain(self.rhs.as_var())
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

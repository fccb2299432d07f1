//! Value types, literals and operands.

use std::fmt;

use strum::{Display, EnumIter};

/// The two scalar domains of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ValueType {
    /// IEEE-754 double precision number
    #[strum(serialize = "double")]
    Double,
    /// Character string
    #[strum(serialize = "string")]
    String,
}

/// A constant value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric constant
    Double(f64),
    /// String constant
    String(String),
}

impl Literal {
    /// Returns the domain of this literal.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Literal::Double(_) => ValueType::Double,
            Literal::String(_) => ValueType::String,
        }
    }

    /// Returns the numeric value, if this is a double.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Double(v) => Some(*v),
            Literal::String(_) => None,
        }
    }

    /// Returns `true` if this is the numeric constant `value`.
    #[must_use]
    pub fn is_number(&self, value: f64) -> bool {
        matches!(self, Literal::Double(v) if *v == value)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Double(v) => write!(f, "{v}"),
            Literal::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Double(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

/// An instruction operand: either a constant or a variable read.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Constant operand
    Literal(Literal),
    /// Read of a named variable
    Var(String),
}

impl Operand {
    /// Shorthand for a variable operand.
    pub fn var(name: impl Into<String>) -> Self {
        Operand::Var(name.into())
    }

    /// Shorthand for a numeric constant.
    #[must_use]
    pub fn num(value: f64) -> Self {
        Operand::Literal(Literal::Double(value))
    }

    /// Shorthand for a string constant.
    pub fn str(value: impl Into<String>) -> Self {
        Operand::Literal(Literal::String(value.into()))
    }

    /// Returns the variable name if this operand reads one.
    #[must_use]
    pub fn as_var(&self) -> Option<&str> {
        match self {
            Operand::Var(name) => Some(name),
            Operand::Literal(_) => None,
        }
    }

    /// Returns the literal if this operand is constant.
    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Operand::Literal(lit) => Some(lit),
            Operand::Var(_) => None,
        }
    }

    /// Returns `true` if this operand reads `name`.
    #[must_use]
    pub fn reads(&self, name: &str) -> bool {
        self.as_var() == Some(name)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(lit) => write!(f, "{lit}"),
            Operand::Var(name) => f.write_str(name),
        }
    }
}

impl From<Literal> for Operand {
    fn from(value: Literal) -> Self {
        Operand::Literal(value)
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::num(value)
    }
}

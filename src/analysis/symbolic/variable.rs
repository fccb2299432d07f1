//! Abstract values and variables.

use std::fmt;

use crate::{
    analysis::symbolic::{AbstractDomain, Interval, Satisfiability, TextBound},
    error::ProgramError,
    ir::{ArithOp, Literal, RelOp, ValueType},
};

/// An abstract scalar: an interval in one of the two domains.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolicValue {
    /// Numeric interval
    Double(Interval<f64>),
    /// String interval
    String(Interval<TextBound>),
}

impl SymbolicValue {
    /// Every value of `ty`.
    #[must_use]
    pub fn full(ty: ValueType) -> Self {
        match ty {
            ValueType::Double => SymbolicValue::Double(Interval::full()),
            ValueType::String => SymbolicValue::String(Interval::full()),
        }
    }

    /// The single number `value`.
    #[must_use]
    pub fn number(value: f64) -> Self {
        SymbolicValue::Double(Interval::point(value))
    }

    /// The numeric interval `[lo, hi]`.
    #[must_use]
    pub fn range(lo: f64, hi: f64) -> Self {
        SymbolicValue::Double(Interval::new(lo, hi))
    }

    /// The domain of the value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            SymbolicValue::Double(_) => ValueType::Double,
            SymbolicValue::String(_) => ValueType::String,
        }
    }

    /// The numeric interval, if this is a double.
    #[must_use]
    pub fn as_double(&self) -> Option<&Interval<f64>> {
        match self {
            SymbolicValue::Double(i) => Some(i),
            SymbolicValue::String(_) => None,
        }
    }

    /// Returns `true` if no concrete value is described.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            SymbolicValue::Double(i) => i.is_empty(),
            SymbolicValue::String(i) => i.is_empty(),
        }
    }

    /// Returns `true` if exactly one concrete value is described.
    #[must_use]
    pub fn is_determinate(&self) -> bool {
        match self {
            SymbolicValue::Double(i) => i.is_determinate(),
            SymbolicValue::String(i) => i.is_determinate(),
        }
    }

    /// The constant, if determinate.
    #[must_use]
    pub fn as_literal(&self) -> Option<Literal> {
        match self {
            SymbolicValue::Double(i) => i.as_point().map(|v| Literal::Double(*v)),
            SymbolicValue::String(i) => i
                .as_point()
                .and_then(TextBound::as_str)
                .map(|s| Literal::String(s.to_string())),
        }
    }

    /// Returns `true` if this is the number `value` and nothing else.
    #[must_use]
    pub fn is_number(&self, value: f64) -> bool {
        matches!(self, SymbolicValue::Double(i) if i.as_point() == Some(&value))
    }

    fn mismatch(&self, what: &str, other: &Self) -> ProgramError {
        ProgramError::TypeMismatch(format!(
            "cannot {what} {} and {}",
            self.value_type(),
            other.value_type()
        ))
    }

    /// Decides `self op other`.
    ///
    /// # Errors
    ///
    /// [`ProgramError::TypeMismatch`] when the domains differ.
    pub fn can_meet(&self, op: RelOp, other: &Self) -> Result<Satisfiability, ProgramError> {
        match (self, other) {
            (SymbolicValue::Double(a), SymbolicValue::Double(b)) => Ok(a.can_meet(op, b)),
            (SymbolicValue::String(a), SymbolicValue::String(b)) => Ok(a.can_meet(op, b)),
            _ => Err(self.mismatch("compare", other)),
        }
    }

    /// Restricts `self` to values satisfying `self op other`.
    ///
    /// # Errors
    ///
    /// [`ProgramError::TypeMismatch`] when the domains differ.
    pub fn clip(&self, op: RelOp, other: &Self) -> Result<Self, ProgramError> {
        match (self, other) {
            (SymbolicValue::Double(a), SymbolicValue::Double(b)) => {
                Ok(SymbolicValue::Double(a.clip(op, b)))
            }
            (SymbolicValue::String(a), SymbolicValue::String(b)) => {
                Ok(SymbolicValue::String(a.clip(op, b)))
            }
            _ => Err(self.mismatch("compare", other)),
        }
    }

    /// Applies an arithmetic operator.
    ///
    /// # Errors
    ///
    /// [`ProgramError::TypeMismatch`] for mixed domains or a non-`+` string
    /// operator, [`ProgramError::DivisionByZero`] /
    /// [`ProgramError::ModuloByZero`] when the divisor is always zero.
    pub fn apply(&self, op: ArithOp, other: &Self) -> Result<Self, ProgramError> {
        match (self, other) {
            (SymbolicValue::Double(a), SymbolicValue::Double(b)) => {
                let value = match op {
                    ArithOp::Add => a.add(b),
                    ArithOp::Sub => a.sub(b),
                    ArithOp::Mul => a.mul(b),
                    ArithOp::Div if b.as_point() == Some(&0.0) => {
                        return Err(ProgramError::DivisionByZero)
                    }
                    ArithOp::Div => a.div(b),
                    ArithOp::Mod if b.as_point() == Some(&0.0) => {
                        return Err(ProgramError::ModuloByZero)
                    }
                    ArithOp::Mod => a.rem(b),
                };
                Ok(SymbolicValue::Double(value))
            }
            (SymbolicValue::String(a), SymbolicValue::String(b)) if op == ArithOp::Add => {
                Ok(SymbolicValue::String(a.concat(b)))
            }
            (SymbolicValue::String(_), SymbolicValue::String(_)) => Err(ProgramError::TypeMismatch(
                format!("operator '{op}' is not defined for strings"),
            )),
            _ => Err(self.mismatch(&format!("apply '{op}' to"), other)),
        }
    }
}

impl From<&Literal> for SymbolicValue {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Double(v) => SymbolicValue::Double(Interval::point(*v)),
            Literal::String(s) => SymbolicValue::String(Interval::point(TextBound::Str(s.clone()))),
        }
    }
}

impl AbstractDomain for SymbolicValue {
    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (SymbolicValue::Double(a), SymbolicValue::Double(b)) => SymbolicValue::Double(a.join(b)),
            (SymbolicValue::String(a), SymbolicValue::String(b)) => SymbolicValue::String(a.join(b)),
            _ => other.clone(),
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (SymbolicValue::Double(a), SymbolicValue::Double(b)) => SymbolicValue::Double(a.meet(b)),
            (SymbolicValue::String(a), SymbolicValue::String(b)) => SymbolicValue::String(a.meet(b)),
            _ => other.clone(),
        }
    }

    fn widen(&self, newer: &Self) -> Self {
        match (self, newer) {
            (SymbolicValue::Double(a), SymbolicValue::Double(b)) => SymbolicValue::Double(a.widen(b)),
            (SymbolicValue::String(a), SymbolicValue::String(b)) => SymbolicValue::String(a.widen(b)),
            _ => newer.clone(),
        }
    }

    fn subsumes(&self, other: &Self) -> bool {
        match (self, other) {
            (SymbolicValue::Double(a), SymbolicValue::Double(b)) => a.subsumes(b),
            (SymbolicValue::String(a), SymbolicValue::String(b)) => a.subsumes(b),
            _ => false,
        }
    }

    fn is_bottom(&self) -> bool {
        self.is_empty()
    }
}

impl fmt::Display for SymbolicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolicValue::Double(i) => write!(f, "{i}"),
            SymbolicValue::String(i) => write!(f, "{i}"),
        }
    }
}

/// How a variable changed along a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Monotonicity {
    /// Not touched.
    Fresh,
    /// Written, but the value did not move (`x = x`, `x = x + 0`).
    None,
    /// Only ever increased.
    Increasing,
    /// Only ever decreased.
    Decreasing,
    /// Moved in both directions or was overwritten.
    Unknown,
}

impl Monotonicity {
    /// Returns `true` for [`Fresh`](Monotonicity::Fresh) and
    /// [`None`](Monotonicity::None).
    #[must_use]
    pub const fn is_neutral(self) -> bool {
        matches!(self, Monotonicity::Fresh | Monotonicity::None)
    }

    /// The combined change of `self` followed by `next`.
    #[must_use]
    pub const fn then(self, next: Monotonicity) -> Monotonicity {
        match (self, next) {
            (Monotonicity::Fresh, m) => m,
            (m, Monotonicity::Fresh) => m,
            (Monotonicity::None, m) | (m, Monotonicity::None) => m,
            (Monotonicity::Increasing, Monotonicity::Increasing) => Monotonicity::Increasing,
            (Monotonicity::Decreasing, Monotonicity::Decreasing) => Monotonicity::Decreasing,
            _ => Monotonicity::Unknown,
        }
    }

    /// The opposite direction.
    #[must_use]
    pub const fn reversed(self) -> Monotonicity {
        match self {
            Monotonicity::Increasing => Monotonicity::Decreasing,
            Monotonicity::Decreasing => Monotonicity::Increasing,
            m => m,
        }
    }

    /// The change made by `x = x op rhs` (or `x = rhs op x` for commutative
    /// operators) when the old value of `x` is in `current`.
    #[must_use]
    pub fn of_step(op: ArithOp, current: &SymbolicValue, rhs: &SymbolicValue) -> Monotonicity {
        match (current, rhs) {
            (SymbolicValue::Double(x), SymbolicValue::Double(r)) => match op {
                ArithOp::Add | ArithOp::Sub => {
                    let m = if r.is_positive() {
                        Monotonicity::Increasing
                    } else if r.is_negative() {
                        Monotonicity::Decreasing
                    } else if r.as_point() == Some(&0.0) {
                        Monotonicity::None
                    } else {
                        Monotonicity::Unknown
                    };
                    if op == ArithOp::Sub {
                        m.reversed()
                    } else {
                        m
                    }
                }
                ArithOp::Mul | ArithOp::Div => {
                    if r.as_point() == Some(&1.0) {
                        return Monotonicity::None;
                    }
                    let grows = |lo: f64, hi: f64| r.is_positive() && *r.lo() > lo && *r.hi() < hi;
                    let scales_up = match op {
                        ArithOp::Mul => grows(1.0, f64::INFINITY),
                        _ => grows(0.0, 1.0),
                    };
                    let scales_down = match op {
                        ArithOp::Mul => grows(0.0, 1.0),
                        _ => grows(1.0, f64::INFINITY),
                    };
                    match (x.is_positive(), x.is_negative(), scales_up, scales_down) {
                        (true, _, true, _) | (_, true, _, true) => Monotonicity::Increasing,
                        (true, _, _, true) | (_, true, true, _) => Monotonicity::Decreasing,
                        _ => Monotonicity::Unknown,
                    }
                }
                ArithOp::Mod => Monotonicity::Unknown,
            },
            (SymbolicValue::String(_), SymbolicValue::String(r)) if op == ArithOp::Add => {
                match r.as_point().and_then(TextBound::as_str) {
                    Some("") => Monotonicity::None,
                    Some(_) => Monotonicity::Increasing,
                    None if r.lo().as_str().is_some_and(|s| !s.is_empty()) => {
                        Monotonicity::Increasing
                    }
                    None => Monotonicity::Unknown,
                }
            }
            _ => Monotonicity::Unknown,
        }
    }
}

impl fmt::Display for Monotonicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Monotonicity::Fresh => "untouched",
            Monotonicity::None => "unchanged",
            Monotonicity::Increasing => "increasing",
            Monotonicity::Decreasing => "decreasing",
            Monotonicity::Unknown => "changing unpredictably",
        })
    }
}

/// A known relation `self op other`, valid while `other` is at `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Operator
    pub op: RelOp,
    /// The other variable
    pub other: String,
    /// Version of `other` when the relation was recorded
    pub version: u64,
}

/// A scalar variable on one path.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicVariable {
    /// Declared domain
    pub ty: ValueType,
    /// Possible values
    pub value: SymbolicValue,
    /// `false` until the first write on this path
    pub defined: bool,
    /// Change since the last reset
    pub monotonicity: Monotonicity,
    /// Bumped on every write; stale relations name an older version.
    pub version: u64,
    /// Relations to other variables
    pub relations: Vec<Relation>,
}

impl SymbolicVariable {
    /// A declared but unassigned variable.
    #[must_use]
    pub fn declared(ty: ValueType) -> Self {
        Self {
            ty,
            value: SymbolicValue::full(ty),
            defined: false,
            monotonicity: Monotonicity::Fresh,
            version: 0,
            relations: Vec::new(),
        }
    }

    /// A defined variable holding `value`.
    #[must_use]
    pub fn with_value(value: SymbolicValue) -> Self {
        Self {
            ty: value.value_type(),
            value,
            defined: true,
            monotonicity: Monotonicity::Fresh,
            version: 0,
            relations: Vec::new(),
        }
    }

    /// Returns `true` while the interval is non-empty.
    #[must_use]
    pub fn is_feasible(&self) -> bool {
        !self.value.is_empty()
    }

    /// Overwrites the value, folding `change` into the monotonicity and
    /// dropping relations.
    pub fn write(&mut self, value: SymbolicValue, change: Monotonicity) {
        self.value = value;
        self.defined = true;
        self.monotonicity = self.monotonicity.then(change);
        self.version += 1;
        self.relations.clear();
    }

    /// Records `self op other`, replacing an older relation to `other`.
    pub fn relate(&mut self, op: RelOp, other: &str, version: u64) {
        self.relations.retain(|r| r.other != other);
        self.relations.push(Relation {
            op,
            other: other.to_string(),
            version,
        });
    }

    /// Merges two states of the same variable from different paths.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        Self {
            ty: self.ty,
            value: self.value.join(&other.value),
            defined: self.defined && other.defined,
            monotonicity: if self.monotonicity == other.monotonicity {
                self.monotonicity
            } else {
                Monotonicity::Unknown
            },
            version: self.version.max(other.version),
            relations: self
                .relations
                .iter()
                .filter(|r| other.relations.contains(r))
                .cloned()
                .collect(),
        }
    }

    /// Returns `true` if every behaviour of `other` is covered by `self`.
    #[must_use]
    pub fn subsumes(&self, other: &Self) -> bool {
        self.ty == other.ty && self.value.subsumes(&other.value) && (!self.defined || other.defined)
    }
}

impl fmt::Display for SymbolicVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.value)?;
        if !self.defined {
            f.write_str(" (undefined)")?;
        }
        Ok(())
    }
}

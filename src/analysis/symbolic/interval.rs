//! Closed intervals over ordered bounds.
//!
//! [`Interval<T>`] is the numeric and textual core of the abstract domain. The
//! bound type decides how strict comparisons clip: for `f64` the adjacent
//! representable value is used, so `x < 10` leaves `x` in `[.., 10⁻]`; for
//! strings there is no adjacent value and strict comparisons clip like their
//! non-strict counterparts, which over-approximates.
//!
//! An interval whose lower bound exceeds its upper bound is empty. Empty
//! intervals are how infeasibility shows up after a branch refines a value.

use std::{cmp::Ordering, fmt};

use crate::{analysis::symbolic::AbstractDomain, ir::RelOp};

/// A totally ordered bound type with extremes and neighbours.
pub trait Bound: Clone + PartialOrd + fmt::Debug + fmt::Display {
    /// Smallest value of the domain (possibly an infinity).
    fn lowest() -> Self;
    /// Largest value of the domain (possibly an infinity).
    fn highest() -> Self;
    /// The next value above `self`, or `self` if the domain has none.
    fn successor(&self) -> Self;
    /// The next value below `self`, or `self` if the domain has none.
    fn predecessor(&self) -> Self;
}

impl Bound for f64 {
    fn lowest() -> Self {
        f64::NEG_INFINITY
    }

    fn highest() -> Self {
        f64::INFINITY
    }

    fn successor(&self) -> Self {
        step_up(*self)
    }

    fn predecessor(&self) -> Self {
        -step_up(-*self)
    }
}

/// The smallest `f64` greater than `x` (infinities and NaN are fixed points).
fn step_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// A string bound. [`TextBound::Top`] lies above every string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TextBound {
    /// A concrete string
    Str(String),
    /// Greater than every string
    Top,
}

impl TextBound {
    /// The string, unless this is [`TextBound::Top`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TextBound::Str(s) => Some(s),
            TextBound::Top => None,
        }
    }
}

impl fmt::Display for TextBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextBound::Str(s) => write!(f, "{s:?}"),
            TextBound::Top => f.write_str("top"),
        }
    }
}

impl Bound for TextBound {
    fn lowest() -> Self {
        TextBound::Str(String::new())
    }

    fn highest() -> Self {
        TextBound::Top
    }

    fn successor(&self) -> Self {
        self.clone()
    }

    fn predecessor(&self) -> Self {
        self.clone()
    }
}

/// Whether a relation can hold between two abstract values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Satisfiability {
    /// Holds for every pair of concrete values.
    Must,
    /// Holds for some pairs but not all.
    May,
    /// Holds for no pair.
    Cant,
}

impl Satisfiability {
    /// The satisfiability of the negated relation.
    #[must_use]
    pub const fn negate(self) -> Self {
        match self {
            Satisfiability::Must => Satisfiability::Cant,
            Satisfiability::May => Satisfiability::May,
            Satisfiability::Cant => Satisfiability::Must,
        }
    }
}

fn lesser<T: PartialOrd>(a: T, b: T) -> T {
    if b < a {
        b
    } else {
        a
    }
}

fn greater<T: PartialOrd>(a: T, b: T) -> T {
    if b > a {
        b
    } else {
        a
    }
}

/// A closed interval `[lo, hi]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval<T> {
    lo: T,
    hi: T,
}

impl<T: Bound> Interval<T> {
    /// Creates `[lo, hi]`. An inverted pair is the empty interval.
    #[must_use]
    pub fn new(lo: T, hi: T) -> Self {
        Self { lo, hi }
    }

    /// The single value `value`.
    #[must_use]
    pub fn point(value: T) -> Self {
        Self {
            lo: value.clone(),
            hi: value,
        }
    }

    /// Every value of the domain.
    #[must_use]
    pub fn full() -> Self {
        Self {
            lo: T::lowest(),
            hi: T::highest(),
        }
    }

    /// No value at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            lo: T::highest(),
            hi: T::lowest(),
        }
    }

    /// Lower bound.
    #[must_use]
    pub fn lo(&self) -> &T {
        &self.lo
    }

    /// Upper bound.
    #[must_use]
    pub fn hi(&self) -> &T {
        &self.hi
    }

    /// Returns `true` if no value lies in the interval.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !matches!(
            self.lo.partial_cmp(&self.hi),
            Some(Ordering::Less | Ordering::Equal)
        )
    }

    /// Returns `true` if the interval holds exactly one value.
    #[must_use]
    pub fn is_determinate(&self) -> bool {
        self.lo == self.hi
    }

    /// The single value, if determinate.
    #[must_use]
    pub fn as_point(&self) -> Option<&T> {
        self.is_determinate().then_some(&self.lo)
    }

    /// Returns `true` if the interval covers the whole domain.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.lo == T::lowest() && self.hi == T::highest()
    }

    /// Returns `true` if `value` lies in the interval.
    pub fn contains(&self, value: &T) -> bool {
        self.lo <= *value && *value <= self.hi
    }

    /// Decides whether `x op y` holds for `x` in `self` and `y` in `other`.
    #[must_use]
    pub fn can_meet(&self, op: RelOp, other: &Self) -> Satisfiability {
        if self.is_empty() || other.is_empty() {
            return Satisfiability::Cant;
        }
        let (a, b) = (self, other);
        let (must, cant) = match op {
            RelOp::Lt => (a.hi < b.lo, a.lo >= b.hi),
            RelOp::Le => (a.hi <= b.lo, a.lo > b.hi),
            RelOp::Gt => (a.lo > b.hi, a.hi <= b.lo),
            RelOp::Ge => (a.lo >= b.hi, a.hi < b.lo),
            RelOp::Eq => (
                a.is_determinate() && b.is_determinate() && a.lo == b.lo,
                a.hi < b.lo || b.hi < a.lo,
            ),
            RelOp::Ne => return self.can_meet(RelOp::Eq, other).negate(),
        };
        if must {
            Satisfiability::Must
        } else if cant {
            Satisfiability::Cant
        } else {
            Satisfiability::May
        }
    }

    /// Restricts `self` to the values `x` for which some `y` in `other`
    /// satisfies `x op y`.
    #[must_use]
    pub fn clip(&self, op: RelOp, other: &Self) -> Self {
        if other.is_empty() {
            return Self::empty();
        }
        match op {
            RelOp::Lt => Self::new(self.lo.clone(), lesser(self.hi.clone(), other.hi.predecessor())),
            RelOp::Le => Self::new(self.lo.clone(), lesser(self.hi.clone(), other.hi.clone())),
            RelOp::Gt => Self::new(greater(self.lo.clone(), other.lo.successor()), self.hi.clone()),
            RelOp::Ge => Self::new(greater(self.lo.clone(), other.lo.clone()), self.hi.clone()),
            RelOp::Eq => self.meet(other),
            RelOp::Ne => match other.as_point() {
                Some(v) if *v == self.lo && *v == self.hi => Self::empty(),
                Some(v) if *v == self.lo => Self::new(self.lo.successor(), self.hi.clone()),
                Some(v) if *v == self.hi => Self::new(self.lo.clone(), self.hi.predecessor()),
                _ => self.clone(),
            },
        }
    }
}

impl<T: Bound> AbstractDomain for Interval<T> {
    fn join(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        Self::new(
            lesser(self.lo.clone(), other.lo.clone()),
            greater(self.hi.clone(), other.hi.clone()),
        )
    }

    fn meet(&self, other: &Self) -> Self {
        Self::new(
            greater(self.lo.clone(), other.lo.clone()),
            lesser(self.hi.clone(), other.hi.clone()),
        )
    }

    fn widen(&self, newer: &Self) -> Self {
        if self.is_empty() {
            return newer.clone();
        }
        if newer.is_empty() {
            return self.clone();
        }
        let lo = if newer.lo < self.lo {
            T::lowest()
        } else {
            self.lo.clone()
        };
        let hi = if newer.hi > self.hi {
            T::highest()
        } else {
            self.hi.clone()
        };
        Self::new(lo, hi)
    }

    fn subsumes(&self, other: &Self) -> bool {
        if other.is_empty() {
            return true;
        }
        !self.is_empty() && self.lo <= other.lo && other.hi <= self.hi
    }

    fn is_bottom(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Bound> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("empty")
        } else if self.is_determinate() {
            write!(f, "{}", self.lo)
        } else {
            write!(f, "[{}, {}]", self.lo, self.hi)
        }
    }
}

/// `a * b` with `0 * inf = 0`, the convention for interval bounds.
fn mul_bound(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        0.0
    } else {
        a * b
    }
}

/// Interval from candidate bounds; NaN anywhere gives the full interval.
fn hull(candidates: [f64; 4]) -> Interval<f64> {
    if candidates.iter().any(|c| c.is_nan()) {
        return Interval::full();
    }
    let lo = candidates.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = candidates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Interval::new(lo, hi)
}

impl Interval<f64> {
    /// Returns `true` if zero lies in the interval.
    #[must_use]
    pub fn contains_zero(&self) -> bool {
        self.contains(&0.0)
    }

    /// Returns `true` if every value is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        !self.is_empty() && self.lo > 0.0
    }

    /// Returns `true` if every value is strictly negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        !self.is_empty() && self.hi < 0.0
    }

    /// The integers in the interval as `(first, last)`, saturated to `i64`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn integer_range(&self) -> Option<(i64, i64)> {
        if self.is_empty() {
            return None;
        }
        let (lo, hi) = (self.lo.ceil(), self.hi.floor());
        (lo <= hi).then(|| (lo as i64, hi as i64))
    }

    /// Interval sum.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::empty();
        }
        let (lo, hi) = (self.lo + other.lo, self.hi + other.hi);
        if lo.is_nan() || hi.is_nan() {
            return Self::full();
        }
        Self::new(lo, hi)
    }

    /// Interval difference.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    /// Interval negation.
    #[must_use]
    pub fn neg(&self) -> Self {
        Self::new(-self.hi, -self.lo)
    }

    /// Interval product.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::empty();
        }
        hull([
            mul_bound(self.lo, other.lo),
            mul_bound(self.lo, other.hi),
            mul_bound(self.hi, other.lo),
            mul_bound(self.hi, other.hi),
        ])
    }

    /// Interval quotient. A divisor containing zero gives the full interval;
    /// the caller reports division by an always-zero divisor.
    #[must_use]
    pub fn div(&self, other: &Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::empty();
        }
        if other.contains_zero() {
            return Self::full();
        }
        hull([
            self.lo / other.lo,
            self.lo / other.hi,
            self.hi / other.lo,
            self.hi / other.hi,
        ])
    }

    /// Truncated remainder, the sign following the dividend.
    #[must_use]
    pub fn rem(&self, other: &Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::empty();
        }
        if let (Some(a), Some(b)) = (self.as_point(), other.as_point()) {
            if *b != 0.0 {
                return Self::point(a % b);
            }
        }
        let m = greater(other.lo.abs(), other.hi.abs());
        if self.lo >= 0.0 {
            Self::new(0.0, lesser(self.hi, m))
        } else if self.hi <= 0.0 {
            Self::new(greater(self.lo, -m), 0.0)
        } else {
            Self::new(greater(self.lo, -m), lesser(self.hi, m))
        }
    }
}

impl Interval<TextBound> {
    /// Interval of `a + b` (concatenation). Every concatenation has its left
    /// operand as a prefix, so it is at least the left lower bound.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::empty();
        }
        match (self.as_point(), other.as_point()) {
            (Some(TextBound::Str(a)), Some(TextBound::Str(b))) => {
                Self::point(TextBound::Str(format!("{a}{b}")))
            }
            _ => Self::new(self.lo.clone(), TextBound::Top),
        }
    }
}

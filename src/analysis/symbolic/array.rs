//! Range-partitioned symbolic arrays.
//!
//! An array is a sorted list of disjoint, contiguous index ranges, each
//! sharing one abstract value:
//!
//! ```text
//! a[0..=1] = 0   a[2] = [1, 9]   a[3..=4] = undefined
//! ```
//!
//! A write at a determinate index splits the covering range and replaces the
//! value there (strong update). A write at an indeterminate index joins the
//! new value into every range it may hit (weak update). Reads join the values
//! of every range the index may hit.

use std::fmt;

use imbl::Vector;

use crate::{
    analysis::symbolic::{AbstractDomain, Interval, SymbolicValue},
    error::ProgramError,
    ir::ValueType,
};

/// One run of elements sharing a value.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayRange {
    /// First index
    pub start: i64,
    /// Last index (inclusive)
    pub end: i64,
    /// Value of every element in the run
    pub value: SymbolicValue,
    /// `false` if some element may be unwritten
    pub defined: bool,
}

/// Outcome of a bounds check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    /// First in-bounds index that may be accessed
    pub start: i64,
    /// Last in-bounds index that may be accessed
    pub end: i64,
    /// `true` if some possible index lies outside the array
    pub may_overflow: bool,
}

impl IndexRange {
    /// Returns `true` if exactly one element is accessed.
    #[must_use]
    pub fn is_determinate(&self) -> bool {
        self.start == self.end && !self.may_overflow
    }
}

/// A declared array on one path.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicArray {
    name: String,
    ty: ValueType,
    size: Interval<f64>,
    ranges: Vector<ArrayRange>,
}

impl SymbolicArray {
    /// Declares an array of `size` elements, all unwritten.
    ///
    /// # Errors
    ///
    /// [`ProgramError::InvalidArraySize`] if `size` holds no positive integer.
    pub fn declare(name: &str, ty: ValueType, size: &Interval<f64>) -> Result<Self, ProgramError> {
        let invalid = || ProgramError::InvalidArraySize {
            array: name.to_string(),
            size: size.to_string(),
        };
        let (_, max) = size.integer_range().ok_or_else(invalid)?;
        if max < 1 {
            return Err(invalid());
        }
        let min = size.integer_range().map_or(1, |(lo, _)| lo.max(1));
        #[allow(clippy::cast_precision_loss)]
        let size = Interval::new(min as f64, max as f64);
        let mut ranges = Vector::new();
        ranges.push_back(ArrayRange {
            start: 0,
            end: max - 1,
            value: SymbolicValue::full(ty),
            defined: false,
        });
        Ok(Self {
            name: name.to_string(),
            ty,
            size,
            ranges,
        })
    }

    /// Array name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element domain.
    #[must_use]
    pub fn element_type(&self) -> ValueType {
        self.ty
    }

    /// Possible sizes.
    #[must_use]
    pub fn size(&self) -> &Interval<f64> {
        &self.size
    }

    /// The value runs, ascending.
    pub fn ranges(&self) -> impl Iterator<Item = &ArrayRange> {
        self.ranges.iter()
    }

    /// Checks an index against the bounds.
    ///
    /// # Errors
    ///
    /// [`ProgramError::NonIntegralIndex`] if no possible index is an integer,
    /// [`ProgramError::OutOfBounds`] if every possible index is outside the
    /// array.
    pub fn check_index(&self, index: &Interval<f64>) -> Result<IndexRange, ProgramError> {
        let (lo, hi) = index
            .integer_range()
            .ok_or_else(|| ProgramError::NonIntegralIndex {
                array: self.name.clone(),
                index: index.to_string(),
            })?;
        #[allow(clippy::cast_possible_truncation)]
        let (min_size, max_size) = (*self.size.lo() as i64, *self.size.hi() as i64);
        if hi < 0 || lo >= max_size {
            return Err(ProgramError::OutOfBounds {
                array: self.name.clone(),
                index: index.to_string(),
                size: self.size.to_string(),
            });
        }
        Ok(IndexRange {
            start: lo.max(0),
            end: hi.min(max_size - 1),
            may_overflow: lo < 0 || hi >= min_size,
        })
    }

    /// Splits runs so that `at` starts a run.
    fn split_at(&mut self, at: i64) {
        let Some(pos) = self.ranges.iter().position(|r| r.start < at && at <= r.end) else {
            return;
        };
        let mut right = self.ranges[pos].clone();
        right.start = at;
        self.ranges[pos].end = at - 1;
        self.ranges.insert(pos + 1, right);
    }

    /// Joined value of the elements in `range`, and whether all are defined.
    #[must_use]
    pub fn read(&self, range: &IndexRange) -> (SymbolicValue, bool) {
        let mut value: Option<SymbolicValue> = None;
        let mut defined = true;
        for run in self.ranges.iter().filter(|r| r.start <= range.end && range.start <= r.end) {
            value = Some(match value {
                Some(v) => v.join(&run.value),
                None => run.value.clone(),
            });
            defined &= run.defined;
        }
        (value.unwrap_or_else(|| SymbolicValue::full(self.ty)), defined)
    }

    /// Writes `value` to the elements in `range`.
    pub fn write(&mut self, range: &IndexRange, value: &SymbolicValue) {
        self.split_at(range.start);
        self.split_at(range.end + 1);
        let strong = range.is_determinate();
        for run in self.ranges.iter_mut() {
            if run.start < range.start || run.end > range.end {
                continue;
            }
            if strong {
                run.value = value.clone();
                run.defined = true;
            } else {
                run.value = run.value.join(value);
            }
        }
        self.coalesce();
    }

    /// Every element may now hold any value of the element type. Which
    /// elements are defined is unchanged.
    pub fn clobber(&mut self) {
        let full = SymbolicValue::full(self.ty);
        for run in self.ranges.iter_mut() {
            run.value = full.clone();
        }
        self.coalesce();
    }

    /// Merges adjacent runs with equal contents.
    fn coalesce(&mut self) {
        let mut merged: Vector<ArrayRange> = Vector::new();
        for run in self.ranges.iter() {
            match merged.back_mut() {
                Some(last) if last.value == run.value && last.defined == run.defined => {
                    last.end = run.end;
                }
                _ => merged.push_back(run.clone()),
            }
        }
        self.ranges = merged;
    }

    /// Every run boundary of both arrays, paired with both values.
    #[allow(clippy::type_complexity)]
    fn zip_runs<'a>(
        &'a self,
        other: &'a Self,
    ) -> Vec<(i64, i64, &'a ArrayRange, &'a ArrayRange)> {
        let mut cuts: Vec<i64> = self
            .ranges
            .iter()
            .chain(other.ranges.iter())
            .flat_map(|r| [r.start, r.end + 1])
            .collect();
        cuts.sort_unstable();
        cuts.dedup();
        cuts.windows(2)
            .filter_map(|w| {
                let (start, end) = (w[0], w[1] - 1);
                let a = self.ranges.iter().find(|r| r.start <= start && end <= r.end)?;
                let b = other.ranges.iter().find(|r| r.start <= start && end <= r.end)?;
                Some((start, end, a, b))
            })
            .collect()
    }

    fn combine(
        &self,
        other: &Self,
        f: impl Fn(&SymbolicValue, &SymbolicValue) -> SymbolicValue,
    ) -> Self {
        let last = |a: &Self| a.ranges.back().map(|r| r.end);
        if self.ty != other.ty || last(self) != last(other) {
            return other.clone();
        }
        let mut result = Self {
            name: self.name.clone(),
            ty: self.ty,
            size: self.size.join(&other.size),
            ranges: self
                .zip_runs(other)
                .into_iter()
                .map(|(start, end, a, b)| ArrayRange {
                    start,
                    end,
                    value: f(&a.value, &b.value),
                    defined: a.defined && b.defined,
                })
                .collect(),
        };
        result.coalesce();
        result
    }
}

impl AbstractDomain for SymbolicArray {
    fn join(&self, other: &Self) -> Self {
        self.combine(other, SymbolicValue::join)
    }

    fn meet(&self, other: &Self) -> Self {
        self.combine(other, SymbolicValue::meet)
    }

    fn widen(&self, newer: &Self) -> Self {
        self.combine(newer, SymbolicValue::widen)
    }

    fn subsumes(&self, other: &Self) -> bool {
        self.ty == other.ty
            && self.size.subsumes(&other.size)
            && self
                .zip_runs(other)
                .iter()
                .all(|(_, _, a, b)| a.value.subsumes(&b.value) && (!a.defined || b.defined))
    }

    fn is_bottom(&self) -> bool {
        self.ranges.iter().any(|r| r.value.is_empty())
    }
}

impl fmt::Display for SymbolicArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}[{}] = {{", self.ty, self.name, self.size)?;
        for (i, run) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if run.start == run.end {
                write!(f, "{}: ", run.start)?;
            } else {
                write!(f, "{}..={}: ", run.start, run.end)?;
            }
            if run.defined {
                write!(f, "{}", run.value)?;
            } else {
                f.write_str("undefined")?;
            }
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(size: f64) -> SymbolicArray {
        match SymbolicArray::declare("a", ValueType::Double, &Interval::point(size)) {
            Ok(a) => a,
            Err(e) => panic!("declare failed: {e}"),
        }
    }

    #[test]
    fn test_determinate_write_is_strong() -> Result<(), ProgramError> {
        let mut a = array(5.0);
        let at = a.check_index(&Interval::point(2.0))?;
        assert!(at.is_determinate());
        a.write(&at, &SymbolicValue::number(7.0));
        assert_eq!(a.ranges().count(), 3);
        assert_eq!(a.read(&at), (SymbolicValue::number(7.0), true));

        let all = a.check_index(&Interval::new(0.0, 4.0))?;
        let (_, defined) = a.read(&all);
        assert!(!defined);
        assert_eq!(a.to_string(), "double a[5] = {0..=1: undefined, 2: 7, 3..=4: undefined}");
        Ok(())
    }

    #[test]
    fn test_indeterminate_write_is_weak() -> Result<(), ProgramError> {
        let mut a = array(5.0);
        for i in 0..5 {
            let at = a.check_index(&Interval::point(f64::from(i)))?;
            a.write(&at, &SymbolicValue::number(0.0));
        }
        assert_eq!(a.ranges().count(), 1);

        let some = a.check_index(&Interval::new(1.0, 2.0))?;
        a.write(&some, &SymbolicValue::number(9.0));
        let first = a.check_index(&Interval::point(0.0))?;
        assert_eq!(a.read(&first).0, SymbolicValue::number(0.0));
        let second = a.check_index(&Interval::point(1.0))?;
        assert_eq!(a.read(&second), (SymbolicValue::range(0.0, 9.0), true));
        Ok(())
    }

    #[test]
    fn test_bounds() -> Result<(), ProgramError> {
        let a = array(5.0);
        assert!(matches!(
            a.check_index(&Interval::point(7.0)),
            Err(ProgramError::OutOfBounds { .. })
        ));
        assert!(matches!(
            a.check_index(&Interval::point(-1.0)),
            Err(ProgramError::OutOfBounds { .. })
        ));
        assert!(matches!(
            a.check_index(&Interval::point(1.5)),
            Err(ProgramError::NonIntegralIndex { .. })
        ));
        let possible = a.check_index(&Interval::new(0.0, 6.0))?;
        assert!(possible.may_overflow);
        assert_eq!((possible.start, possible.end), (0, 4));
        assert!(!a.check_index(&Interval::new(0.0, 4.0))?.may_overflow);
        Ok(())
    }

    #[test]
    fn test_invalid_size() {
        assert!(SymbolicArray::declare("a", ValueType::Double, &Interval::point(0.0)).is_err());
        assert!(SymbolicArray::declare("a", ValueType::Double, &Interval::point(2.5)).is_err());
        assert!(SymbolicArray::declare("a", ValueType::Double, &Interval::new(2.5, 3.5)).is_ok());
    }

    #[test]
    fn test_join_and_subsumes() -> Result<(), ProgramError> {
        let mut a = array(3.0);
        let mut b = array(3.0);
        let at = a.check_index(&Interval::point(0.0))?;
        a.write(&at, &SymbolicValue::number(1.0));
        b.write(&at, &SymbolicValue::number(2.0));
        let joined = a.join(&b);
        assert!(joined.subsumes(&a) && joined.subsumes(&b));
        assert!(!a.subsumes(&b));
        assert_eq!(joined.read(&at).0, SymbolicValue::range(1.0, 2.0));
        Ok(())
    }
}

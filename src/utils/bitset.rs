//! A fixed-capacity bit vector over node indices.
//!
//! Loop bodies are stored as [`BitSet`]s so that containment between loops is
//! a word-wise subset test, and so that a whole family of bodies can be
//! ordered by reading each set as one large unsigned number (see
//! [`radix_sort_descending`]). Under that reading a strict superset always
//! compares greater than each of its subsets, which is what loop nesting
//! classification relies on.
//!
//! # Example
//!
//! ```rust
//! use flowcheck::utils::BitSet;
//!
//! let mut outer = BitSet::new(100);
//! let mut inner = BitSet::new(100);
//! for idx in [3, 4, 5, 70] {
//!     outer.insert(idx);
//! }
//! inner.insert(4);
//! inner.insert(70);
//!
//! assert!(inner.is_subset(&outer));
//! assert_eq!(outer.count(), 4);
//! ```

use std::cmp::Ordering;

/// A bit vector with a fixed number of addressable bits.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitSet {
    /// The bits, least significant word first.
    words: Vec<u64>,
    /// The number of addressable bits.
    len: usize,
}

impl BitSet {
    /// Creates a new empty bit set with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
            len: capacity,
        }
    }

    /// Returns the capacity of this bit set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Sets the bit at the given index. Returns `true` if it was clear before.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn insert(&mut self, index: usize) -> bool {
        assert!(index < self.len, "index out of bounds");
        let mask = 1u64 << (index % 64);
        let word = &mut self.words[index / 64];
        let was_clear = *word & mask == 0;
        *word |= mask;
        was_clear
    }

    /// Clears the bit at the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn remove(&mut self, index: usize) {
        assert!(index < self.len, "index out of bounds");
        self.words[index / 64] &= !(1u64 << (index % 64));
    }

    /// Returns `true` if the bit at the given index is set.
    ///
    /// Indices beyond the capacity are reported as clear.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        index < self.len && (self.words[index / 64] & (1u64 << (index % 64))) != 0
    }

    /// Returns the number of bits set.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Computes the union with another bit set (in place).
    ///
    /// Returns `true` if `self` changed.
    pub fn union_with(&mut self, other: &Self) -> bool {
        assert_eq!(self.len, other.len, "bit sets must have same length");
        let mut changed = false;
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            let old = *a;
            *a |= *b;
            changed |= old != *a;
        }
        changed
    }

    /// Returns `true` if every bit of `self` is also set in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        assert_eq!(self.len, other.len, "bit sets must have same length");
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & !b == 0)
    }

    /// Returns `true` if the two sets share at least one bit.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        assert_eq!(self.len, other.len, "bit sets must have same length");
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Compares the two sets as unsigned numbers, highest index most significant.
    #[must_use]
    pub fn cmp_numeric(&self, other: &Self) -> Ordering {
        assert_eq!(self.len, other.len, "bit sets must have same length");
        self.words.iter().rev().cmp(other.words.iter().rev())
    }

    /// Returns an iterator over the indices of set bits, ascending.
    pub fn iter(&self) -> BitSetIter<'_> {
        BitSetIter {
            set: self,
            word_idx: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl std::fmt::Debug for BitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Iterator over the set bits in a `BitSet`.
pub struct BitSetIter<'a> {
    set: &'a BitSet,
    word_idx: usize,
    current: u64,
}

impl Iterator for BitSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word_idx * 64 + bit);
            }
            self.word_idx += 1;
            self.current = *self.set.words.get(self.word_idx)?;
        }
    }
}

/// Orders `sets` descending by numeric value using a binary LSD radix sort.
///
/// Returns the permutation as indices into `sets`. The sort is stable, so
/// equal sets keep their input order. Every strict superset ends up before
/// all of its subsets.
///
/// # Panics
///
/// Panics if the sets do not all have the same capacity.
#[must_use]
pub fn radix_sort_descending(sets: &[BitSet]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..sets.len()).collect();
    let Some(capacity) = sets.first().map(BitSet::len) else {
        return order;
    };
    assert!(
        sets.iter().all(|s| s.len() == capacity),
        "bit sets must have same length"
    );

    let mut ones = Vec::with_capacity(order.len());
    let mut zeros = Vec::with_capacity(order.len());
    for bit in 0..capacity {
        ones.clear();
        zeros.clear();
        for &idx in &order {
            if sets[idx].contains(bit) {
                ones.push(idx);
            } else {
                zeros.push(idx);
            }
        }
        order.clear();
        order.extend_from_slice(&ones);
        order.extend_from_slice(&zeros);
    }
    order
}

//! Pure algebra on finite, non-empty sets of non-negative integer bit
//! counts. `spec.md` §4.7. Kept canonicalised (sorted, deduplicated) by
//! virtue of being backed by a `BTreeSet`.

use std::collections::BTreeSet;

use num_bigint::BigInt;
use num_rational::BigRational;

use crate::value::ValueSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitLengthSet(BTreeSet<u64>);

impl BitLengthSet {
    pub fn single(bits: u64) -> Self {
        BitLengthSet(BTreeSet::from([bits]))
    }

    pub fn min(&self) -> u64 {
        *self.0.iter().next().expect("bit-length set is never empty")
    }

    pub fn max(&self) -> u64 {
        *self.0.iter().next_back().expect("bit-length set is never empty")
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.iter().copied()
    }

    pub fn shift(&self, delta: u64) -> Self {
        BitLengthSet(self.0.iter().map(|&b| b + delta).collect())
    }

    /// `{ a + b | a in self, b in other }`. Used for a structure's field
    /// sequence and a fixed-length array's elements.
    pub fn minkowski_sum(&self, other: &Self) -> Self {
        let mut out = BTreeSet::new();
        for &a in &self.0 {
            for &b in &other.0 {
                out.insert(a + b);
            }
        }
        BitLengthSet(out)
    }

    pub fn union(&self, other: &Self) -> Self {
        BitLengthSet(self.0.union(&other.0).copied().collect())
    }

    /// The `count`-fold Minkowski self-sum, used by a fixed-length array of
    /// `count` elements. `count == 0` yields `{0}` (the empty sum).
    pub fn repeat_sum(&self, count: u64) -> Self {
        let mut acc = BitLengthSet::single(0);
        for _ in 0..count {
            acc = acc.minkowski_sum(self);
        }
        acc
    }

    /// The bit-length set of a variable-length array: the union, over every
    /// possible element count `k` in `[0, max_capacity]`, of the `k`-fold
    /// self-sum of `element`, shifted by the length-prefix header width.
    pub fn variable_array(element: &Self, header_bits: u64, max_capacity: u64) -> Self {
        let mut out = BTreeSet::new();
        let mut current = BitLengthSet::single(0);
        for k in 0..=max_capacity {
            out.extend(current.shift(header_bits).0.iter().copied());
            if k != max_capacity {
                current = current.minkowski_sum(element);
            }
        }
        BitLengthSet(out)
    }

    pub fn to_value_set(&self) -> ValueSet {
        ValueSet::from_rationals(
            self.0
                .iter()
                .map(|&b| BigRational::from_integer(BigInt::from(b))),
        )
    }
}

/// Minimal number of bits needed to represent `count` distinct values
/// (`0..count`), i.e. `ceil(log2(count))`, with `count <= 1` needing zero
/// bits. Shared by the union tag width and the variable-array length-prefix
/// width (`spec.md` §3: `tag_bits = ceil(log2(max(n,2)))`, header width is
/// "the minimal number of bits to encode values in `[0..max_capacity]`").
pub fn bits_to_represent(count: u64) -> u32 {
    if count <= 1 {
        0
    } else {
        (count - 1).checked_ilog2().unwrap_or(0) + 1
    }
}

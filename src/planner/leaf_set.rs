//! Set of join leaves, keyed by bit position
//!
//! Leaf `i` is the i-th base table or derived table of the FROM clause.
//! Sets order by their bit pattern, which keeps the DP table iteration
//! deterministic.

use std::fmt;

/// Bitset over at most 64 join leaves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafSet(u64);

impl LeafSet {
    /// Number of leaves representable
    pub const CAPACITY: usize = 64;

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn single(leaf: usize) -> Self {
        debug_assert!(leaf < Self::CAPACITY);
        Self(1u64 << leaf)
    }

    pub fn contains(self, leaf: usize) -> bool {
        leaf < Self::CAPACITY && self.0 & (1u64 << leaf) != 0
    }

    pub fn with(self, leaf: usize) -> Self {
        self.union(Self::single(leaf))
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    /// Leaf indices, lowest first
    pub fn iter(self) -> LeafSetIter {
        LeafSetIter(self.0)
    }
}

pub struct LeafSetIter(u64);

impl Iterator for LeafSetIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            let leaf = self.0.trailing_zeros() as usize;
            self.0 &= self.0 - 1;
            Some(leaf)
        }
    }
}

impl fmt::Display for LeafSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let leaves: Vec<String> = self.iter().map(|l| l.to_string()).collect();
        write!(f, "{{{}}}", leaves.join(", "))
    }
}

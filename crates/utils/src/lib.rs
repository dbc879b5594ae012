#![cfg_attr(not(any(test, feature = "std")), no_std)]

use core::fmt;
use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};
use core::sync::atomic::{AtomicU64, Ordering};

// spin types are the lock API of every pinirq crate; nothing here may sleep.
pub use spin::{Mutex, MutexGuard};

/// Set of GPIO lines, one bit per line id.
///
/// Iteration is always in ascending line order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LineMask(u64);

impl LineMask {
    /// Number of lines a mask can describe.
    pub const CAPACITY: u32 = u64::BITS;

    pub const EMPTY: Self = Self(0);

    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Mask holding only `line`, or the empty mask if `line` is out of range.
    #[must_use]
    pub const fn single(line: u32) -> Self {
        if line < Self::CAPACITY {
            Self(1 << line)
        } else {
            Self::EMPTY
        }
    }

    /// Mask holding lines `0..count`.
    #[must_use]
    pub const fn first(count: u32) -> Self {
        if count >= Self::CAPACITY {
            Self(u64::MAX)
        } else {
            Self((1 << count) - 1)
        }
    }

    pub const fn contains(self, line: u32) -> bool {
        line < Self::CAPACITY && self.0 & (1 << line) != 0
    }

    pub fn insert(&mut self, line: u32) {
        self.0 |= Self::single(line).0;
    }

    pub fn remove(&mut self, line: u32) {
        self.0 &= !Self::single(line).0;
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    pub const fn iter(self) -> Lines {
        Lines(self.0)
    }
}

impl fmt::Debug for LineMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LineMask({:#x})", self.0)
    }
}

impl BitAnd for LineMask {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for LineMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl Not for LineMask {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl BitAndAssign for LineMask {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl BitOrAssign for LineMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromIterator<u32> for LineMask {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut mask = Self::EMPTY;
        for line in iter {
            mask.insert(line);
        }
        mask
    }
}

impl IntoIterator for LineMask {
    type Item = u32;
    type IntoIter = Lines;
    fn into_iter(self) -> Lines {
        self.iter()
    }
}

/// Ascending iterator over the lines of a [`LineMask`].
#[derive(Clone, Debug)]
pub struct Lines(u64);

impl Iterator for Lines {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.0 == 0 {
            return None;
        }
        let line = self.0.trailing_zeros();
        self.0 &= self.0 - 1;
        Some(line)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Lines {}

/// [`LineMask`] that can be read from interrupt context without locking.
///
/// Single-line updates are one atomic RMW each, so a reader never observes a
/// half-applied change to a line.
#[derive(Default)]
pub struct AtomicLineMask(AtomicU64);

impl AtomicLineMask {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn load(&self) -> LineMask {
        LineMask(self.0.load(Ordering::Acquire))
    }

    pub fn contains(&self, line: u32) -> bool {
        self.load().contains(line)
    }

    /// Set `line`; returns whether it was already set.
    pub fn set(&self, line: u32) -> bool {
        let bit = LineMask::single(line).0;
        self.0.fetch_or(bit, Ordering::AcqRel) & bit != 0
    }

    /// Clear `line`; returns whether it was set.
    pub fn clear(&self, line: u32) -> bool {
        let bit = LineMask::single(line).0;
        self.0.fetch_and(!bit, Ordering::AcqRel) & bit != 0
    }

    pub fn assign(&self, line: u32, value: bool) {
        if value {
            self.set(line);
        } else {
            self.clear(line);
        }
    }
}

impl fmt::Debug for AtomicLineMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.load(), f)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

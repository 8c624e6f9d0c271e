//! Sequence Number Handling
//!
//! rudp stamps every outbound packet with a 32-bit sequence number that
//! wraps around. This module provides a wrapped sequence number type whose
//! comparisons and distances stay correct across the wrap boundary.

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Half of the 32-bit sequence space; the recency test pivots on it.
const HALF_SPACE: u32 = 1 << 31;

/// Sequence number with 32-bit wraparound semantics
///
/// Incremented by one per packet sent. `newer_than` and `distance_to`
/// account for wraparound so ordering holds even when the counter rolls
/// over from `u32::MAX` to 0.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct SeqNumber(u32);

impl SeqNumber {
    /// Create a sequence number from a raw value.
    #[inline]
    pub fn new(value: u32) -> Self {
        SeqNumber(value)
    }

    /// Get the raw sequence number value.
    #[inline]
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Increment the sequence number by 1, wrapping at `u32::MAX`.
    #[inline]
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    /// Get the next sequence number.
    #[inline]
    pub fn next(self) -> Self {
        SeqNumber(self.0.wrapping_add(1))
    }

    /// Whether this sequence is more recent than `other`.
    ///
    /// `s1` is more recent than `s2` iff `s1 > s2` and the forward gap is
    /// at most half the space, or `s2 > s1` and the backward gap exceeds
    /// half the space (i.e. `s1` has wrapped past `s2`).
    pub fn newer_than(self, other: SeqNumber) -> bool {
        let (s1, s2) = (self.0, other.0);
        (s1 > s2 && s1 - s2 <= HALF_SPACE) || (s2 > s1 && s2 - s1 > HALF_SPACE)
    }

    /// Signed distance from this sequence number to `other`.
    ///
    /// Positive means `other` is ahead of `self`; the magnitude is the
    /// shorter way around the 32-bit circle.
    #[inline]
    pub fn distance_to(self, other: SeqNumber) -> i32 {
        other.0.wrapping_sub(self.0) as i32
    }
}

impl fmt::Debug for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNumber({})", self.0)
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SeqNumber {
    fn from(value: u32) -> Self {
        SeqNumber(value)
    }
}

impl From<SeqNumber> for u32 {
    fn from(seq: SeqNumber) -> u32 {
        seq.0
    }
}

impl Add<u32> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: u32) -> SeqNumber {
        SeqNumber(self.0.wrapping_add(rhs))
    }
}

impl AddAssign<u32> for SeqNumber {
    fn add_assign(&mut self, rhs: u32) {
        self.0 = self.0.wrapping_add(rhs);
    }
}

impl Sub<u32> for SeqNumber {
    type Output = SeqNumber;

    fn sub(self, rhs: u32) -> SeqNumber {
        SeqNumber(self.0.wrapping_sub(rhs))
    }
}

impl SubAssign<u32> for SeqNumber {
    fn sub_assign(&mut self, rhs: u32) {
        self.0 = self.0.wrapping_sub(rhs);
    }
}

impl Sub for SeqNumber {
    type Output = i32;

    /// Signed wrapped distance between two sequence numbers.
    fn sub(self, rhs: SeqNumber) -> i32 {
        rhs.distance_to(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment() {
        let mut seq = SeqNumber::new(100);
        seq.increment();
        assert_eq!(seq.as_raw(), 101);
    }

    #[test]
    fn test_increment_wraparound() {
        let mut seq = SeqNumber::new(u32::MAX);
        seq.increment();
        assert_eq!(seq.as_raw(), 0);
    }

    #[test]
    fn test_newer_than_simple() {
        assert!(SeqNumber::new(200).newer_than(SeqNumber::new(100)));
        assert!(!SeqNumber::new(100).newer_than(SeqNumber::new(200)));
        assert!(!SeqNumber::new(100).newer_than(SeqNumber::new(100)));
    }

    #[test]
    fn test_newer_than_wraparound() {
        // 1 is just past a wrap; u32::MAX - 1 is just before it.
        assert!(SeqNumber::new(1).newer_than(SeqNumber::new(u32::MAX - 1)));
        assert!(!SeqNumber::new(u32::MAX - 1).newer_than(SeqNumber::new(1)));
    }

    #[test]
    fn test_newer_than_antisymmetric_at_half_space() {
        // Exactly half the space apart: recency is still decided one way.
        let a = SeqNumber::new(1 << 31);
        let b = SeqNumber::new(0);
        assert!(a.newer_than(b));
        assert!(!b.newer_than(a));
    }

    #[test]
    fn test_distance_simple() {
        let a = SeqNumber::new(100);
        let b = SeqNumber::new(200);
        assert_eq!(a.distance_to(b), 100);
        assert_eq!(b.distance_to(a), -100);
    }

    #[test]
    fn test_distance_wraparound() {
        let a = SeqNumber::new(u32::MAX - 10);
        let b = SeqNumber::new(10);
        assert_eq!(a.distance_to(b), 21);
        assert_eq!(b.distance_to(a), -21);
    }

    #[test]
    fn test_add_sub_wraparound() {
        assert_eq!((SeqNumber::new(u32::MAX - 10) + 20).as_raw(), 9);
        assert_eq!((SeqNumber::new(10) - 20).as_raw(), u32::MAX - 9);
    }

    #[test]
    fn test_sub_seqnumbers() {
        let a = SeqNumber::new(200);
        let b = SeqNumber::new(100);
        assert_eq!(a - b, 100);
        assert_eq!(b - a, -100);
    }
}

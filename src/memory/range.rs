// Fri Oct 16 2026 - Alex

use crate::memory::{Address, MemoryError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open address range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryRange {
    start: Address,
    end: Address,
}

impl MemoryRange {
    pub fn new(start: Address, end: Address) -> Result<Self, MemoryError> {
        if end < start {
            return Err(MemoryError::InvalidRange { start: start.as_u64(), end: end.as_u64() });
        }
        Ok(Self { start, end })
    }

    /// Fails when `start + size` does not fit in the address space.
    pub fn from_start_size(start: Address, size: u64) -> Result<Self, MemoryError> {
        let end = start
            .checked_add(size)
            .ok_or(MemoryError::AddressOverflow { start: start.as_u64(), size })?;
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn end(&self) -> Address {
        self.end
    }

    pub fn size(&self) -> u64 {
        self.end.as_u64() - self.start.as_u64()
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.start && addr < self.end
    }

    pub fn contains_range(&self, other: &Self) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn intersects(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u64, end: u64) -> MemoryRange {
        MemoryRange::new(Address::new(start), Address::new(end)).unwrap()
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(MemoryRange::new(Address::new(0x20), Address::new(0x10)).is_err());
        assert!(range(0x10, 0x10).is_empty());
    }

    #[test]
    fn test_overflowing_size_rejected() {
        let err = MemoryRange::from_start_size(Address::new(u64::MAX - 1), 4);
        assert!(matches!(err, Err(MemoryError::AddressOverflow { .. })));
    }

    #[test]
    fn test_contains_range_edges() {
        let outer = range(0x1000, 0x2000);
        assert!(outer.contains_range(&range(0x1000, 0x2000)));
        assert!(outer.contains_range(&range(0x1800, 0x1800)));
        assert!(!outer.contains_range(&range(0x1000, 0x2001)));
        assert!(!outer.contains_range(&range(0xfff, 0x1001)));
        assert!(outer.contains(Address::new(0x1fff)));
        assert!(!outer.contains(Address::new(0x2000)));
    }

    #[test]
    fn test_intersection() {
        let a = range(0x0, 0x100);
        let b = range(0x80, 0x180);
        assert_eq!(a.intersects(&b), Some(range(0x80, 0x100)));
        assert!(a.overlaps(&b));
        assert_eq!(a.intersects(&range(0x100, 0x200)), None);
    }
}

// Fri Oct 16 2026 - Alex

use crate::memory::{Address, MemoryError};
use std::fmt;

/// A window of code bytes that are mapped at `base`.
///
/// Every byte access goes through a checked slice lookup, so nothing built on
/// top of a `CodeBuffer` can read at or past `end()`.
#[derive(Clone, Copy)]
pub struct CodeBuffer<'a> {
    base: Address,
    bytes: &'a [u8],
}

impl<'a> CodeBuffer<'a> {
    pub fn new(base: Address, bytes: &'a [u8]) -> Result<Self, MemoryError> {
        base.checked_add(bytes.len() as u64)
            .ok_or(MemoryError::AddressOverflow { start: base.as_u64(), size: bytes.len() as u64 })?;
        Ok(Self { base, bytes })
    }

    /// Wraps memory of the current process between `start` and `end`.
    ///
    /// # Safety
    ///
    /// `[start, end)` must be readable for `'a` and must not be written to
    /// while the buffer is alive.
    pub unsafe fn from_raw(start: *const u8, end: *const u8) -> Result<Self, MemoryError> {
        if start.is_null() || end < start {
            return Err(MemoryError::InvalidRange { start: start as u64, end: end as u64 });
        }
        let len = end as usize - start as usize;
        let bytes = std::slice::from_raw_parts(start, len);
        Self::new(Address::from_ptr(start), bytes)
    }

    pub fn base(&self) -> Address {
        self.base
    }

    pub fn start(&self) -> Address {
        self.base
    }

    pub fn end(&self) -> Address {
        self.base + self.bytes.len() as u64
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn contains(&self, addr: Address) -> bool {
        addr.is_within_range(self.start(), self.end())
    }

    /// Offset of `addr` from the base, if it is inside the buffer.
    pub fn offset_of(&self, addr: Address) -> Option<usize> {
        if !self.contains(addr) {
            return None;
        }
        addr.distance_from(self.base).map(|d| d as usize)
    }

    /// Bytes from `addr` to the end of the buffer.
    pub fn bytes_from(&self, addr: Address) -> Option<&'a [u8]> {
        self.offset_of(addr).map(|off| &self.bytes[off..])
    }

    pub fn read_u8(&self, addr: Address) -> Option<u8> {
        self.bytes_from(addr).and_then(|b| b.first().copied())
    }

    /// Narrows the buffer to `[start, end)`, clamped to what is actually mapped.
    pub fn subrange(&self, start: Address, end: Address) -> Result<CodeBuffer<'a>, MemoryError> {
        if end < start {
            return Err(MemoryError::InvalidRange { start: start.as_u64(), end: end.as_u64() });
        }
        let start = start.max(self.start());
        let end = end.min(self.end());
        if start >= end {
            return Ok(CodeBuffer { base: start, bytes: &[] });
        }
        let lo = (start.as_u64() - self.base.as_u64()) as usize;
        let hi = (end.as_u64() - self.base.as_u64()) as usize;
        Ok(CodeBuffer { base: start, bytes: &self.bytes[lo..hi] })
    }

    /// Everything from `addr` to the end of the buffer.
    pub fn tail_from(&self, addr: Address) -> CodeBuffer<'a> {
        match self.offset_of(addr) {
            Some(off) => CodeBuffer { base: addr, bytes: &self.bytes[off..] },
            None => CodeBuffer { base: self.end(), bytes: &[] },
        }
    }
}

impl fmt::Debug for CodeBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeBuffer")
            .field("start", &self.start())
            .field("end", &self.end())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BYTES: [u8; 8] = [0x55, 0x48, 0x89, 0xe5, 0x90, 0x90, 0xc3, 0xcc];

    #[test]
    fn test_addressing() {
        let buf = CodeBuffer::new(Address::new(0x1000), &BYTES).unwrap();
        assert_eq!(buf.end(), Address::new(0x1008));
        assert_eq!(buf.read_u8(Address::new(0x1006)), Some(0xc3));
        assert_eq!(buf.read_u8(Address::new(0x1008)), None);
        assert_eq!(buf.read_u8(Address::new(0xfff)), None);
        assert_eq!(buf.bytes_from(Address::new(0x1004)), Some(&BYTES[4..]));
    }

    #[test]
    fn test_subrange_clamps() {
        let buf = CodeBuffer::new(Address::new(0x1000), &BYTES).unwrap();
        let sub = buf.subrange(Address::new(0x1002), Address::new(0x1005)).unwrap();
        assert_eq!(sub.as_slice(), &BYTES[2..5]);
        assert_eq!(sub.start(), Address::new(0x1002));

        let clamped = buf.subrange(Address::new(0xff0), Address::new(0x2000)).unwrap();
        assert_eq!(clamped.len(), BYTES.len());

        let empty = buf.subrange(Address::new(0x3000), Address::new(0x4000)).unwrap();
        assert!(empty.is_empty());

        assert!(buf.subrange(Address::new(0x1004), Address::new(0x1002)).is_err());
    }

    #[test]
    fn test_overflowing_base_rejected() {
        assert!(CodeBuffer::new(Address::new(u64::MAX - 2), &BYTES).is_err());
    }

    #[test]
    fn test_from_raw() {
        let bytes = BYTES;
        let range = bytes.as_ptr_range();
        let buf = unsafe { CodeBuffer::from_raw(range.start, range.end) }.unwrap();
        assert_eq!(buf.len(), bytes.len());
        assert_eq!(buf.as_slice(), &bytes[..]);
        assert!(unsafe { CodeBuffer::from_raw(range.end, range.start) }.is_err());
    }
}

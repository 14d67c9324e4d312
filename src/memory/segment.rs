// Fri Oct 16 2026 - Alex

use crate::memory::{Address, MemoryRange, Protection};
use std::fmt;

/// One loadable segment as it sits in memory after relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySegment {
    index: usize,
    range: MemoryRange,
    protection: Protection,
    file_offset: u64,
    file_size: u64,
}

impl MemorySegment {
    pub fn new(index: usize, range: MemoryRange, protection: Protection) -> Self {
        Self {
            index,
            range,
            protection,
            file_offset: 0,
            file_size: range.size(),
        }
    }

    pub fn with_file_offset(mut self, offset: u64) -> Self {
        self.file_offset = offset;
        self
    }

    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = size;
        self
    }

    /// Position of the segment's entry in the program header table.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn range(&self) -> &MemoryRange {
        &self.range
    }

    pub fn protection(&self) -> Protection {
        self.protection
    }

    pub fn file_offset(&self) -> u64 {
        self.file_offset
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn start(&self) -> Address {
        self.range.start()
    }

    pub fn end(&self) -> Address {
        self.range.end()
    }

    pub fn size(&self) -> u64 {
        self.range.size()
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.range.contains(addr)
    }

    pub fn is_executable(&self) -> bool {
        self.protection.can_execute()
    }
}

impl fmt::Display for MemorySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} (file: 0x{:x}+0x{:x})",
            self.index, self.range, self.protection, self.file_offset, self.file_size
        )
    }
}

// Fri Oct 16 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Invalid memory range [0x{start:x}, 0x{end:x})")]
    InvalidRange { start: u64, end: u64 },
    #[error("Range starting at 0x{start:x} with size 0x{size:x} overflows the address space")]
    AddressOverflow { start: u64, size: u64 },
}

// Fri Oct 16 2026 - Alex

use crate::memory::MemoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ElfError {
    #[error("ELF parse error: {0}")]
    Parse(#[from] goblin::error::Error),
    #[error("Not a 64-bit ELF image")]
    Not64Bit,
    #[error("Image has no loadable segments")]
    NoLoadableSegments,
    #[error("Segment #{index} file range 0x{offset:x}+0x{size:x} lies outside the file")]
    SegmentOutOfFile { index: usize, offset: u64, size: u64 },
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

// Fri Oct 16 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Nothing to decode at 0x{0:x}")]
    Empty(u64),
    #[error("Address 0x{0:x} is outside the code buffer")]
    OutOfBounds(u64),
    #[error("Instruction at 0x{at:x} runs past the end of the buffer after {consumed} bytes")]
    Truncated { at: u64, consumed: usize },
    #[error("Unsupported opcode {opcode:#x} at 0x{at:x}")]
    UnsupportedOpcode { at: u64, opcode: u16 },
    #[error("Instruction at 0x{0:x} exceeds the 15 byte limit")]
    TooLong(u64),
}

impl DecodeError {
    /// Address of the instruction that failed to decode.
    pub fn address(&self) -> u64 {
        match *self {
            Self::Empty(at) | Self::OutOfBounds(at) | Self::TooLong(at) => at,
            Self::Truncated { at, .. } | Self::UnsupportedOpcode { at, .. } => at,
        }
    }
}

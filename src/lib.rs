// Fri Oct 16 2026 - Alex

pub mod config;
pub mod dasm;
pub mod elf;
pub mod memory;
pub mod search;
pub mod utils;

pub use config::ScanConfig;
pub use dasm::{DecodeError, DecodedInstruction, InstructionClass, Opcode, X86Decoder};
pub use elf::{ElfImage, FlagMatch, SegmentStep};
pub use memory::{Address, CodeBuffer, Protection};
pub use search::{
    find_call_instruction, find_function_prologue, find_lea_instruction, ImageScanner, InstructionScanner,
    PrologueMode, ResyncPolicy,
};

// Fri Oct 16 2026 - Alex

//! Minimal x86-64 instruction decoder.
//!
//! Only the forms needed to walk compiler output and pick out calls, jumps,
//! LEAs, landing pads and padding are understood. Anything else is reported
//! as [`DecodeError::UnsupportedOpcode`].

pub mod decoder;
pub mod error;
pub mod instruction;
pub mod opcode;

pub use decoder::{X86Decoder, MAX_INSTRUCTION_LEN};
pub use error::DecodeError;
pub use instruction::{DecodedInstruction, InstructionClass, ModRm, ModRmMode, PrefixFlags};
pub use opcode::{Opcode, OPCODE_BIAS, TWO_BYTE_ESCAPE};

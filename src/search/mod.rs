// Fri Oct 16 2026 - Alex

//! Forward scanners built on the decoder.
//!
//! The free functions use default [`ScanOptions`]; build an
//! [`InstructionScanner`] to change the resync policy or alignment.

pub mod image;
pub mod options;
pub mod prologue;
pub mod scanner;

pub use image::{HitKind, ImageScanner, ScanHit};
pub use options::{ResyncPolicy, ScanOptions};
pub use prologue::{PrologueMode, LANDING_PAD};
pub use scanner::InstructionScanner;

use crate::dasm::DecodedInstruction;
use crate::memory::{Address, CodeBuffer};

pub fn find_call_instruction(code: &CodeBuffer<'_>, target: Option<Address>, ctx: &mut DecodedInstruction) -> bool {
    InstructionScanner::new().find_call_instruction(code, target, ctx)
}

pub fn find_lea_instruction(code: &CodeBuffer<'_>, displacement: i64) -> bool {
    InstructionScanner::new().find_lea_instruction(code, displacement)
}

pub fn find_function_prologue(code: &CodeBuffer<'_>, mode: PrologueMode) -> Option<Address> {
    InstructionScanner::new().find_function_prologue(code, mode)
}

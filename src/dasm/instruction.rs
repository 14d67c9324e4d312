// Fri Oct 16 2026 - Alex

use crate::dasm::Opcode;
use crate::memory::{Address, CodeBuffer};
use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Prefixes seen in front of the opcode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PrefixFlags: u8 {
        const LOCK = 0x01;
        const SEGMENT = 0x02;
        const OPERAND_SIZE = 0x04;
        const ADDRESS_SIZE = 0x08;
        const REP = 0x10;
        const REX = 0x20;
        const REPNE = 0x40;
    }
}

/// Addressing mode held in ModRM bits 7:6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModRmMode {
    /// Register indirect, or RIP-relative / SIB-absolute with a 4 byte displacement.
    Indirect,
    IndirectDisp8,
    IndirectDisp32,
    Register,
}

impl ModRmMode {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => Self::Indirect,
            1 => Self::IndirectDisp8,
            2 => Self::IndirectDisp32,
            _ => Self::Register,
        }
    }

    pub const fn bits(self) -> u8 {
        self as u8
    }

    pub const fn has_displacement(self) -> bool {
        matches!(self, Self::IndirectDisp8 | Self::IndirectDisp32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModRm {
    pub raw: u8,
    pub mode: ModRmMode,
    pub reg: u8,
    pub rm: u8,
}

impl ModRm {
    pub const fn new(raw: u8) -> Self {
        Self {
            raw,
            mode: ModRmMode::from_bits(raw >> 6),
            reg: (raw >> 3) & 7,
            rm: raw & 7,
        }
    }

    pub const fn needs_sib(&self) -> bool {
        !matches!(self.mode, ModRmMode::Register) && self.rm == 4
    }

    pub const fn is_rip_relative(&self) -> bool {
        matches!(self.mode, ModRmMode::Indirect) && self.rm == 5
    }
}

/// Coarse grouping used by the scanners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionClass {
    NearCall,
    /// `FF /2` and `FF /3`: the target comes from a register or memory.
    IndirectCall,
    Jump,
    ConditionalJump,
    Lea,
    LandingPad,
    Nop,
    Int3,
    Return,
    Other,
}

impl InstructionClass {
    pub fn is_call(self) -> bool {
        matches!(self, Self::NearCall | Self::IndirectCall)
    }

    /// Bytes compilers emit between functions.
    pub fn is_padding(self) -> bool {
        matches!(self, Self::Nop | Self::Int3)
    }
}

impl fmt::Display for InstructionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NearCall => "call",
            Self::IndirectCall => "call-indirect",
            Self::Jump => "jump",
            Self::ConditionalJump => "jcc",
            Self::Lea => "lea",
            Self::LandingPad => "endbr64",
            Self::Nop => "nop",
            Self::Int3 => "int3",
            Self::Return => "ret",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Result of decoding one instruction.
///
/// A zero `length` means the last decode into this value failed and the other
/// fields carry no information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodedInstruction {
    pub start: Address,
    pub length: usize,
    pub prefixes: PrefixFlags,
    pub rex: Option<u8>,
    pub modrm: Option<ModRm>,
    pub sib: Option<u8>,
    pub opcode: Opcode,
    /// Sign-extended memory displacement.
    pub displacement: i64,
    /// Relative branch offset, immediate, or resolved pointer slot for
    /// RIP-relative indirect calls.
    pub operand: i64,
}

impl DecodedInstruction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_valid(&self) -> bool {
        self.length > 0
    }

    /// Address of the byte following the instruction.
    pub fn end(&self) -> Address {
        self.start + self.length as u64
    }

    pub fn rex_w(&self) -> bool {
        self.rex.is_some_and(|rex| rex & 0x08 != 0)
    }

    pub fn modrm_mode(&self) -> Option<ModRmMode> {
        self.modrm.map(|m| m.mode)
    }

    pub fn modrm_reg(&self) -> Option<u8> {
        self.modrm.map(|m| m.reg)
    }

    pub fn class(&self) -> InstructionClass {
        let op = self.opcode;
        match op {
            Opcode::CALL_REL32 => InstructionClass::NearCall,
            Opcode::JMP_REL32 | Opcode::JMP_REL8 => InstructionClass::Jump,
            _ if matches!(op.raw(), 0x70..=0x7F | 0x0F80..=0x0F8F) => InstructionClass::ConditionalJump,
            Opcode::LEA => InstructionClass::Lea,
            // F3 0F 1E is endbr64/endbr32 or a shadow stack op, never filler
            Opcode::HINT_NOP if self.prefixes.contains(PrefixFlags::REP) => {
                if self.modrm.is_some_and(|m| matches!(m.raw, 0xFA | 0xFB)) {
                    InstructionClass::LandingPad
                } else {
                    InstructionClass::Other
                }
            }
            Opcode::HINT_NOP | Opcode::NOP_RM => InstructionClass::Nop,
            // with REX.B this is xchg r8, rax
            Opcode::NOP if self.rex.map_or(true, |rex| rex & 1 == 0) => InstructionClass::Nop,
            Opcode::INT3 => InstructionClass::Int3,
            Opcode::RET | Opcode::RET_IMM => InstructionClass::Return,
            Opcode::GROUP5 => match self.modrm_reg() {
                Some(2 | 3) => InstructionClass::IndirectCall,
                Some(4 | 5) => InstructionClass::Jump,
                _ => InstructionClass::Other,
            },
            _ => InstructionClass::Other,
        }
    }

    /// Destination of a call, if it can be known without reading memory.
    ///
    /// Relative calls resolve to `end() + operand`. For indirect calls the
    /// operand already holds an absolute address (the pointer slot of a
    /// RIP-relative call) and is returned as is; register calls have none.
    pub fn call_target(&self) -> Option<Address> {
        match self.class() {
            InstructionClass::NearCall => Some(self.end().offset(self.operand)),
            InstructionClass::IndirectCall if self.modrm.is_some_and(|m| m.is_rip_relative()) => {
                Some(Address::new(self.operand as u64))
            }
            _ => None,
        }
    }

    /// Destination of a relative jump or call.
    pub fn branch_target(&self) -> Option<Address> {
        match self.class() {
            InstructionClass::NearCall | InstructionClass::ConditionalJump => Some(self.end().offset(self.operand)),
            InstructionClass::Jump if self.opcode != Opcode::GROUP5 => Some(self.end().offset(self.operand)),
            _ => None,
        }
    }

    /// Raw bytes of the instruction inside `code`.
    pub fn bytes<'a>(&self, code: &CodeBuffer<'a>) -> Option<&'a [u8]> {
        code.bytes_from(self.start).and_then(|b| b.get(..self.length))
    }

    pub fn mnemonic(&self) -> &'static str {
        if self.class() == InstructionClass::LandingPad {
            return match self.modrm.map(|m| m.raw) {
                Some(0xFB) => "endbr32",
                _ => "endbr64",
            };
        }
        self.opcode.mnemonic(self.modrm_reg())
    }
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:<8} [{}]", self.start, self.mnemonic(), self.opcode)?;
        if let Some(target) = self.branch_target().or_else(|| self.call_target()) {
            write!(f, " -> {}", target)?;
        } else if self.modrm_mode().is_some_and(|m| m.has_displacement()) || self.displacement != 0 {
            write!(f, " disp {:#x}", self.displacement)?;
        }
        Ok(())
    }
}

// Fri Oct 16 2026 - Alex

use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset the analysed binary adds to every opcode it stores.
///
/// Opcodes are kept unbiased inside this crate; the bias only appears when
/// converting to or from that representation.
pub const OPCODE_BIAS: u32 = 0x80;

/// Escape byte introducing the two-byte opcode map.
pub const TWO_BYTE_ESCAPE: u8 = 0x0F;

/// Primary opcode. One-byte opcodes are stored as-is, `0F xx` as `0x0F00 | xx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opcode(u16);

impl Opcode {
    pub const MOV_RM_REG: Self = Self(0x89);
    pub const LEA: Self = Self(0x8D);
    pub const NOP: Self = Self(0x90);
    pub const RET: Self = Self(0xC3);
    pub const RET_IMM: Self = Self(0xC2);
    pub const INT3: Self = Self(0xCC);
    pub const CALL_REL32: Self = Self(0xE8);
    pub const JMP_REL32: Self = Self(0xE9);
    pub const JMP_REL8: Self = Self(0xEB);
    /// `FF /2` near indirect, `/3` far indirect, `/4` `/5` jumps.
    pub const GROUP5: Self = Self(0xFF);
    pub const HINT_NOP: Self = Self(0x0F1E);
    pub const NOP_RM: Self = Self(0x0F1F);

    pub const fn one_byte(byte: u8) -> Self {
        Self(byte as u16)
    }

    pub const fn two_byte(byte: u8) -> Self {
        Self(((TWO_BYTE_ESCAPE as u16) << 8) | byte as u16)
    }

    pub const fn raw(&self) -> u16 {
        self.0
    }

    pub const fn is_two_byte(&self) -> bool {
        (self.0 >> 8) as u8 == TWO_BYTE_ESCAPE
    }

    /// Last opcode byte without the escape.
    pub const fn low_byte(&self) -> u8 {
        self.0 as u8
    }

    /// The value the analysed binary stores for this opcode.
    pub const fn biased(&self) -> u32 {
        self.0 as u32 + OPCODE_BIAS
    }

    /// Inverse of [`Opcode::biased`]; `None` for values no opcode maps to.
    pub fn from_biased(value: u32) -> Option<Self> {
        let raw = value.checked_sub(OPCODE_BIAS)?;
        let raw = u16::try_from(raw).ok()?;
        let escape = (raw >> 8) as u8;
        if escape != 0 && escape != TWO_BYTE_ESCAPE {
            return None;
        }
        Some(Self(raw))
    }

    /// Rough mnemonic for listings; `reg` is the ModRM reg field for group opcodes.
    pub fn mnemonic(&self, reg: Option<u8>) -> &'static str {
        const ALU: [&str; 8] = ["add", "or", "adc", "sbb", "and", "sub", "xor", "cmp"];
        const SHIFT: [&str; 8] = ["rol", "ror", "rcl", "rcr", "shl", "shr", "sal", "sar"];
        let reg = reg.unwrap_or(0) as usize & 7;

        if self.is_two_byte() {
            return match self.low_byte() {
                0x05 => "syscall",
                0x0B => "ud2",
                0x1E => "nop",
                0x1F => "nop",
                0x40..=0x4F => "cmovcc",
                0x80..=0x8F => "jcc",
                0x90..=0x9F => "setcc",
                0xA2 => "cpuid",
                0xAF => "imul",
                0xB6 | 0xB7 => "movzx",
                0xBE | 0xBF => "movsx",
                _ => "(bad)",
            };
        }

        match self.low_byte() {
            b @ 0x00..=0x3D if b & 7 <= 5 => ALU[(b >> 3) as usize],
            0x50..=0x57 | 0x68 | 0x6A => "push",
            0x58..=0x5F | 0x8F => "pop",
            0x63 => "movsxd",
            0x69 | 0x6B => "imul",
            0x70..=0x7F => "jcc",
            0x80 | 0x81 | 0x83 => ALU[reg],
            0x84 | 0x85 | 0xA8 | 0xA9 => "test",
            0x86 | 0x87 | 0x91..=0x97 => "xchg",
            0x88..=0x8B | 0xB0..=0xBF | 0xC6 | 0xC7 => "mov",
            0x8D => "lea",
            0x90 => "nop",
            0x98 => "cdqe",
            0x99 => "cqo",
            0xC0 | 0xC1 | 0xD0..=0xD3 => SHIFT[reg],
            0xC2 | 0xC3 => "ret",
            0xC9 => "leave",
            0xCC => "int3",
            0xE8 => "call",
            0xE9 | 0xEB => "jmp",
            0xF4 => "hlt",
            0xF6 | 0xF7 => ["test", "test", "not", "neg", "mul", "imul", "div", "idiv"][reg],
            0xFE => ["inc", "dec", "(bad)", "(bad)", "(bad)", "(bad)", "(bad)", "(bad)"][reg],
            0xFF => ["inc", "dec", "call", "call far", "jmp", "jmp far", "push", "(bad)"][reg],
            _ => "(bad)",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_two_byte() {
            write!(f, "0f {:02x}", self.low_byte())
        } else {
            write!(f, "{:02x}", self.low_byte())
        }
    }
}

/// Immediate or relative operand that follows the ModRM/SIB/displacement bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OperandKind {
    Empty,
    Imm8,
    Imm16,
    /// 16 bits with an operand-size override, 32 otherwise.
    ImmZ,
    /// 16, 32 or 64 bits depending on the override and REX.W.
    ImmV,
    Rel8,
    Rel32,
    /// `F6`/`F7`: only `test` (reg 0 and 1) carries an immediate.
    TestGroup { wide: bool },
}

/// How an opcode continues after the opcode byte(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OpcodeShape {
    pub has_modrm: bool,
    pub operand: OperandKind,
}

impl OpcodeShape {
    const fn new(has_modrm: bool, operand: OperandKind) -> Self {
        Self { has_modrm, operand }
    }
}

/// Shape of every opcode the decoder understands; `None` for the rest.
pub(crate) fn shape_of(opcode: Opcode) -> Option<OpcodeShape> {
    use OperandKind::*;

    let byte = opcode.low_byte();
    if opcode.is_two_byte() {
        let shape = match byte {
            0x05 | 0x0B | 0xA2 => OpcodeShape::new(false, Empty),
            0x1E | 0x1F => OpcodeShape::new(true, Empty),
            0x40..=0x4F | 0x90..=0x9F | 0xAF | 0xB6 | 0xB7 | 0xBE | 0xBF => OpcodeShape::new(true, Empty),
            0x80..=0x8F => OpcodeShape::new(false, Rel32),
            _ => return None,
        };
        return Some(shape);
    }

    let shape = match byte {
        // ALU ops: xx0..xx3 take ModRM, xx4 takes imm8, xx5 takes imm16/32
        0x00..=0x3D if byte & 7 <= 3 => OpcodeShape::new(true, Empty),
        0x00..=0x3D if byte & 7 == 4 => OpcodeShape::new(false, Imm8),
        0x00..=0x3D if byte & 7 == 5 => OpcodeShape::new(false, ImmZ),
        0x50..=0x5F | 0x90..=0x99 | 0xC3 | 0xC9 | 0xCC | 0xF4 => OpcodeShape::new(false, Empty),
        0x63 | 0x84..=0x8B | 0x8D | 0x8F | 0xD0..=0xD3 | 0xFE | 0xFF => OpcodeShape::new(true, Empty),
        0x68 => OpcodeShape::new(false, ImmZ),
        0x6A | 0xA8 | 0xB0..=0xB7 => OpcodeShape::new(false, Imm8),
        0x69 | 0x81 | 0xC7 => OpcodeShape::new(true, ImmZ),
        0x6B | 0x80 | 0x83 | 0xC0 | 0xC1 | 0xC6 => OpcodeShape::new(true, Imm8),
        0x70..=0x7F | 0xEB => OpcodeShape::new(false, Rel8),
        0xA9 => OpcodeShape::new(false, ImmZ),
        0xB8..=0xBF => OpcodeShape::new(false, ImmV),
        0xC2 => OpcodeShape::new(false, Imm16),
        0xE8 | 0xE9 => OpcodeShape::new(false, Rel32),
        0xF6 => OpcodeShape::new(true, TestGroup { wide: false }),
        0xF7 => OpcodeShape::new(true, TestGroup { wide: true }),
        _ => return None,
    };
    Some(shape)
}

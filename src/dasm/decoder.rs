// Fri Oct 16 2026 - Alex

use crate::dasm::opcode::{shape_of, OperandKind};
use crate::dasm::{DecodeError, DecodedInstruction, ModRm, ModRmMode, Opcode, PrefixFlags, TWO_BYTE_ESCAPE};
use crate::memory::{Address, CodeBuffer};

/// Architectural upper bound on the length of one instruction.
pub const MAX_INSTRUCTION_LEN: usize = 15;

/// Reads instruction bytes without ever stepping past the buffer end.
struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    at: Address,
}

impl<'a> ByteCursor<'a> {
    fn new(bytes: &'a [u8], at: Address) -> Self {
        Self { bytes, pos: 0, at }
    }

    fn peek(&self) -> Result<u8, DecodeError> {
        if self.pos >= MAX_INSTRUCTION_LEN {
            return Err(DecodeError::TooLong(self.at.as_u64()));
        }
        self.bytes.get(self.pos).copied().ok_or(DecodeError::Truncated {
            at: self.at.as_u64(),
            consumed: self.pos,
        })
    }

    fn next_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = self.peek()?;
        self.pos += 1;
        Ok(byte)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        for slot in out.iter_mut() {
            *slot = self.next_u8()?;
        }
        Ok(out)
    }

    fn i8(&mut self) -> Result<i64, DecodeError> {
        Ok(self.next_u8()? as i8 as i64)
    }

    fn i16(&mut self) -> Result<i64, DecodeError> {
        Ok(i16::from_le_bytes(self.take()?) as i64)
    }

    fn i32(&mut self) -> Result<i64, DecodeError> {
        Ok(i32::from_le_bytes(self.take()?) as i64)
    }

    fn i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.take()?))
    }
}

/// Length decoder for the slice of x86-64 this crate cares about.
///
/// The decoder holds no state; every call works only on the buffer and
/// context it is handed, so one instance can be shared across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct X86Decoder;

impl X86Decoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(&self, code: &CodeBuffer<'_>, at: Address) -> Result<DecodedInstruction, DecodeError> {
        let mut insn = DecodedInstruction::new();
        self.decode_into(&mut insn, code, at)?;
        Ok(insn)
    }

    /// Decodes the instruction at `at` into `insn`.
    ///
    /// On failure `insn` is reset, so `insn.length == 0` exactly when the
    /// last decode did not succeed.
    pub fn decode_into(
        &self,
        insn: &mut DecodedInstruction,
        code: &CodeBuffer<'_>,
        at: Address,
    ) -> Result<(), DecodeError> {
        insn.reset();
        if code.is_empty() || at >= code.end() {
            return Err(DecodeError::Empty(at.as_u64()));
        }
        let bytes = code.bytes_from(at).ok_or(DecodeError::OutOfBounds(at.as_u64()))?;

        let mut out = DecodedInstruction { start: at, ..Default::default() };
        let result = Self::decode_bytes(&mut out, ByteCursor::new(bytes, at));
        if result.is_ok() {
            *insn = out;
        }
        result
    }

    fn decode_bytes(insn: &mut DecodedInstruction, mut cur: ByteCursor<'_>) -> Result<(), DecodeError> {
        loop {
            let flag = match cur.peek()? {
                0xF0 => PrefixFlags::LOCK,
                0x26 | 0x2E | 0x36 | 0x3E | 0x64 | 0x65 => PrefixFlags::SEGMENT,
                0x66 => PrefixFlags::OPERAND_SIZE,
                0x67 => PrefixFlags::ADDRESS_SIZE,
                0xF3 => PrefixFlags::REP,
                0xF2 => PrefixFlags::REPNE,
                _ => break,
            };
            insn.prefixes |= flag;
            cur.pos += 1;
        }

        let byte = cur.peek()?;
        if byte & 0xF0 == 0x40 {
            insn.rex = Some(byte);
            insn.prefixes |= PrefixFlags::REX;
            cur.pos += 1;
        }

        let first = cur.next_u8()?;
        let opcode = if first == TWO_BYTE_ESCAPE {
            Opcode::two_byte(cur.next_u8()?)
        } else {
            Opcode::one_byte(first)
        };
        let shape = shape_of(opcode).ok_or(DecodeError::UnsupportedOpcode {
            at: insn.start.as_u64(),
            opcode: opcode.raw(),
        })?;
        insn.opcode = opcode;

        if shape.has_modrm {
            let modrm = ModRm::new(cur.next_u8()?);
            insn.modrm = Some(modrm);

            let mut sib_base_absent = false;
            if modrm.needs_sib() {
                let sib = cur.next_u8()?;
                insn.sib = Some(sib);
                sib_base_absent = modrm.mode == ModRmMode::Indirect && sib & 7 == 5;
            }

            insn.displacement = match modrm.mode {
                ModRmMode::IndirectDisp8 => cur.i8()?,
                ModRmMode::IndirectDisp32 => cur.i32()?,
                ModRmMode::Indirect if modrm.is_rip_relative() || sib_base_absent => cur.i32()?,
                _ => 0,
            };
        }

        let reg = insn.modrm_reg().unwrap_or(0);
        let osize = insn.prefixes.contains(PrefixFlags::OPERAND_SIZE);
        insn.operand = match shape.operand {
            OperandKind::Empty => 0,
            OperandKind::Imm8 | OperandKind::Rel8 => cur.i8()?,
            OperandKind::Imm16 => cur.i16()?,
            OperandKind::Rel32 => cur.i32()?,
            OperandKind::ImmZ if osize => cur.i16()?,
            OperandKind::ImmZ => cur.i32()?,
            OperandKind::ImmV if insn.rex_w() => cur.i64()?,
            OperandKind::ImmV if osize => cur.i16()?,
            OperandKind::ImmV => cur.i32()?,
            OperandKind::TestGroup { .. } if reg > 1 => 0,
            OperandKind::TestGroup { wide: false } => cur.i8()?,
            OperandKind::TestGroup { wide: true } if osize => cur.i16()?,
            OperandKind::TestGroup { wide: true } => cur.i32()?,
        };

        insn.length = cur.pos;

        // indirect calls through a RIP-relative slot: resolve the slot address
        if opcode == Opcode::GROUP5 && matches!(reg, 2 | 3) && insn.modrm.is_some_and(|m| m.is_rip_relative()) {
            insn.operand = insn.end().offset(insn.displacement).as_u64() as i64;
        }

        Ok(())
    }
}

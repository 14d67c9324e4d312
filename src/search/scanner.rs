// Fri Oct 16 2026 - Alex

use crate::dasm::{DecodedInstruction, InstructionClass, Opcode, X86Decoder};
use crate::memory::{Address, CodeBuffer};
use crate::search::{ResyncPolicy, ScanOptions};
use log::{debug, trace};

/// Walks a code range one instruction at a time looking for a single shape.
#[derive(Debug, Clone, Default)]
pub struct InstructionScanner {
    decoder: X86Decoder,
    options: ScanOptions,
}

impl InstructionScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_resync(mut self, resync: ResyncPolicy) -> Self {
        self.options.resync = resync;
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn decoder(&self) -> &X86Decoder {
        &self.decoder
    }

    /// Decodes forward from the start of `code` until `accept` returns true.
    ///
    /// `ctx` is reused for every instruction and holds the accepted one on
    /// success. It is reset when the scan gives up.
    pub fn scan<F>(&self, code: &CodeBuffer<'_>, ctx: &mut DecodedInstruction, mut accept: F) -> bool
    where
        F: FnMut(&DecodedInstruction) -> bool,
    {
        let mut cursor = code.start();
        while cursor < code.end() {
            match self.decoder.decode_into(ctx, code, cursor) {
                Ok(()) => {
                    if accept(ctx) {
                        return true;
                    }
                    cursor = ctx.end();
                }
                Err(err) => match self.options.resync {
                    ResyncPolicy::Stop => {
                        trace!("scan stopped: {}", err);
                        return false;
                    }
                    ResyncPolicy::ByteWise => {
                        trace!("skipping undecodable byte at 0x{:x}", err.address());
                        cursor = cursor + 1;
                    }
                },
            }
        }
        ctx.reset();
        false
    }

    /// Finds the first call in `code`.
    ///
    /// With `target` set, only calls whose resolved destination equals it
    /// match: `end + rel32` for relative calls, the pointer slot for
    /// RIP-relative indirect calls. `None` accepts any call.
    pub fn find_call_instruction(
        &self,
        code: &CodeBuffer<'_>,
        target: Option<Address>,
        ctx: &mut DecodedInstruction,
    ) -> bool {
        let found = self.scan(code, ctx, |insn| {
            if !insn.class().is_call() {
                return false;
            }
            match target {
                None => true,
                Some(target) => insn.call_target() == Some(target),
            }
        });
        if found {
            debug!("call at {} (target {:?})", ctx.start, ctx.call_target());
        }
        found
    }

    /// Finds a LEA whose memory operand is `[base + displacement]` with an
    /// explicit 8 or 32 bit displacement.
    pub fn find_lea_instruction(&self, code: &CodeBuffer<'_>, displacement: i64) -> bool {
        self.find_lea(code, displacement).is_some()
    }

    /// Like [`InstructionScanner::find_lea_instruction`] but returns the match.
    pub fn find_lea(&self, code: &CodeBuffer<'_>, displacement: i64) -> Option<DecodedInstruction> {
        let mut ctx = DecodedInstruction::new();
        let found = self.scan(code, &mut ctx, |insn| {
            insn.class() == InstructionClass::Lea
                && insn.modrm_mode().is_some_and(|mode| mode.has_displacement())
                && insn.displacement == displacement
        });
        if found {
            debug!("lea with displacement {:#x} at {}", displacement, ctx.start);
            Some(ctx)
        } else {
            None
        }
    }

    /// Every instruction with the given opcode, in address order.
    pub fn find_all_opcode(&self, code: &CodeBuffer<'_>, opcode: Opcode) -> Vec<DecodedInstruction> {
        let mut hits = Vec::new();
        let mut ctx = DecodedInstruction::new();
        self.scan(code, &mut ctx, |insn| {
            if insn.opcode == opcode {
                hits.push(*insn);
            }
            false
        });
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u64 = 0x1000;

    // push rbp; mov rbp, rsp; call +0x20; ret
    const BODY: [u8; 10] = [0x55, 0x48, 0x89, 0xE5, 0xE8, 0x20, 0x00, 0x00, 0x00, 0xC3];

    fn buffer(bytes: &[u8]) -> CodeBuffer<'_> {
        CodeBuffer::new(Address::new(BASE), bytes).unwrap()
    }

    #[test]
    fn test_call_target_resolution() {
        let code = buffer(&BODY);
        let scanner = InstructionScanner::new();
        let target = Address::new(BASE + 9 + 0x20);

        let mut ctx = DecodedInstruction::new();
        assert!(scanner.find_call_instruction(&code, Some(target), &mut ctx));
        assert_eq!(ctx.start, Address::new(BASE + 4));
        assert_eq!(ctx.length, 5);
        assert_eq!(ctx.opcode, Opcode::CALL_REL32);

        let mut ctx = DecodedInstruction::new();
        assert!(!scanner.find_call_instruction(&code, Some(target + 1), &mut ctx));
        assert!(!ctx.is_valid());
        assert!(!scanner.find_call_instruction(&code, Some(target - 1), &mut ctx));
    }

    #[test]
    fn test_any_call_wildcard() {
        // call +0; call -0x100
        let bytes = [0xE8, 0, 0, 0, 0, 0xE8, 0x00, 0xFF, 0xFF, 0xFF];
        let code = buffer(&bytes);
        let mut ctx = DecodedInstruction::new();
        assert!(InstructionScanner::new().find_call_instruction(&code, None, &mut ctx));
        assert_eq!(ctx.start, Address::new(BASE));

        let second = Address::new(BASE + 10).offset(-0x100);
        assert!(InstructionScanner::new().find_call_instruction(&code, Some(second), &mut ctx));
        assert_eq!(ctx.start, Address::new(BASE + 5));
    }

    #[test]
    fn test_indirect_call_slot_match() {
        // nop; call qword [rip + 0x10]
        let bytes = [0x90, 0xFF, 0x15, 0x10, 0x00, 0x00, 0x00];
        let code = buffer(&bytes);
        let mut ctx = DecodedInstruction::new();
        let slot = Address::new(BASE + 7 + 0x10);
        assert!(InstructionScanner::new().find_call_instruction(&code, Some(slot), &mut ctx));
        assert_eq!(ctx.start, Address::new(BASE + 1));
    }

    #[test]
    fn test_no_call_in_range() {
        let code = buffer(&BODY[..4]);
        let mut ctx = DecodedInstruction::new();
        assert!(!InstructionScanner::new().find_call_instruction(&code, None, &mut ctx));
    }

    #[test]
    fn test_resync_policy() {
        // garbage byte 0x06 (push es, invalid in long mode) ahead of a call
        let bytes = [0x06, 0xE8, 0x00, 0x00, 0x00, 0x00];
        let code = buffer(&bytes);
        let mut ctx = DecodedInstruction::new();

        let stop = InstructionScanner::new();
        assert!(!stop.find_call_instruction(&code, None, &mut ctx));

        let resync = InstructionScanner::new().with_resync(ResyncPolicy::ByteWise);
        assert!(resync.find_call_instruction(&code, None, &mut ctx));
        assert_eq!(ctx.start, Address::new(BASE + 1));
    }

    #[test]
    fn test_scan_containment() {
        // the call straddles the end of the search window
        let code = buffer(&BODY);
        let window = code.subrange(Address::new(BASE), Address::new(BASE + 7)).unwrap();
        let mut ctx = DecodedInstruction::new();
        let scanner = InstructionScanner::new().with_resync(ResyncPolicy::ByteWise);
        assert!(!scanner.find_call_instruction(&window, None, &mut ctx));

        assert!(scanner.find_call_instruction(&code, None, &mut ctx));
        assert!(ctx.start >= code.start());
        assert!(ctx.end() <= code.end());
    }

    #[test]
    fn test_lea_displacement_match() {
        // lea rdi, [rip + 0x18]; lea rax, [rbx + 0x18]; lea rcx, [rdx + 0x12345678]
        let bytes = [
            0x48, 0x8D, 0x3D, 0x18, 0x00, 0x00, 0x00,
            0x48, 0x8D, 0x43, 0x18,
            0x48, 0x8D, 0x8A, 0x78, 0x56, 0x34, 0x12,
        ];
        let code = buffer(&bytes);
        let scanner = InstructionScanner::new();

        let hit = scanner.find_lea(&code, 0x18).unwrap();
        assert_eq!(hit.start, Address::new(BASE + 7));
        assert!(scanner.find_lea_instruction(&code, 0x12345678));
        assert!(!scanner.find_lea_instruction(&code, 0x19));

        // the RIP-relative form is not a base+displacement operand
        let rip_only = buffer(&bytes[..7]);
        assert!(!scanner.find_lea_instruction(&rip_only, 0x18));
    }

    #[test]
    fn test_lea_negative_displacement() {
        // lea rax, [rbp - 0x40]
        let bytes = [0x48, 0x8D, 0x45, 0xC0];
        assert!(InstructionScanner::new().find_lea_instruction(&buffer(&bytes), -0x40));
    }

    #[test]
    fn test_find_all_opcode() {
        let bytes = [0x90, 0xC3, 0x90, 0x0F, 0x1F, 0x00, 0x90];
        let hits = InstructionScanner::new().find_all_opcode(&buffer(&bytes), Opcode::NOP);
        let starts: Vec<_> = hits.iter().map(|h| h.start.as_u64() - BASE).collect();
        assert_eq!(starts, vec![0, 2, 6]);
    }
}

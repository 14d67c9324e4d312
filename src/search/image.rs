// Fri Oct 16 2026 - Alex

use crate::dasm::DecodedInstruction;
use crate::elf::{ElfError, ElfImage};
use crate::memory::{Address, CodeBuffer, MemorySegment};
use crate::search::{InstructionScanner, PrologueMode, ResyncPolicy, LANDING_PAD};
use log::info;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    Call,
    Lea,
    Prologue,
}

impl fmt::Display for HitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Lea => write!(f, "lea"),
            Self::Prologue => write!(f, "prologue"),
        }
    }
}

/// One match found while sweeping a whole image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanHit {
    pub kind: HitKind,
    pub address: Address,
    pub length: usize,
    pub segment: usize,
    /// Resolved destination for call hits.
    pub target: Option<Address>,
}

impl fmt::Display for ScanHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (segment #{}", self.address, self.kind, self.segment)?;
        if let Some(target) = self.target {
            write!(f, ", target {}", target)?;
        }
        write!(f, ")")
    }
}

/// Runs the scanners over every executable segment of a file-backed image.
///
/// Sweeps skip undecodable bytes unless another scanner is installed with
/// [`ImageScanner::with_scanner`].
pub struct ImageScanner<'a> {
    scanner: InstructionScanner,
    segments: Vec<(MemorySegment, CodeBuffer<'a>)>,
}

impl<'a> ImageScanner<'a> {
    pub fn new(image: &ElfImage, data: &'a [u8]) -> Result<Self, ElfError> {
        let segments = image
            .executable_segments()
            .into_iter()
            .map(|segment| {
                let code = image.segment_code(&segment, data)?;
                Ok((segment, code))
            })
            .collect::<Result<Vec<_>, ElfError>>()?;
        info!("{} executable segment(s) to scan", segments.len());
        let scanner = InstructionScanner::new().with_resync(ResyncPolicy::ByteWise);
        Ok(Self { scanner, segments })
    }

    pub fn with_scanner(mut self, scanner: InstructionScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn segments(&self) -> impl Iterator<Item = &MemorySegment> {
        self.segments.iter().map(|(segment, _)| segment)
    }

    /// Code buffer of the executable segment containing `addr`.
    pub fn code_at(&self, addr: Address) -> Option<CodeBuffer<'a>> {
        self.segments.iter().find(|(_, code)| code.contains(addr)).map(|(_, code)| *code)
    }

    /// Every call to `target` (any call when `None`).
    pub fn find_calls(&self, target: Option<Address>) -> Vec<ScanHit> {
        self.collect(|segment, code| {
            let mut hits = Vec::new();
            let mut ctx = DecodedInstruction::new();
            let mut rest = *code;
            while self.scanner.find_call_instruction(&rest, target, &mut ctx) {
                hits.push(Self::hit(HitKind::Call, segment, &ctx));
                rest = code.tail_from(ctx.end());
            }
            hits
        })
    }

    pub fn find_leas(&self, displacement: i64) -> Vec<ScanHit> {
        self.collect(|segment, code| {
            let mut hits = Vec::new();
            let mut rest = *code;
            while let Some(insn) = self.scanner.find_lea(&rest, displacement) {
                hits.push(Self::hit(HitKind::Lea, segment, &insn));
                rest = code.tail_from(insn.end());
            }
            hits
        })
    }

    pub fn find_prologues(&self, mode: PrologueMode) -> Vec<ScanHit> {
        self.collect(|segment, code| {
            let mut hits = Vec::new();
            let mut rest = *code;
            while let Some(addr) = self.scanner.find_function_prologue(&rest, mode) {
                hits.push(ScanHit {
                    kind: HitKind::Prologue,
                    address: addr,
                    length: 0,
                    segment: segment.index(),
                    target: None,
                });
                let next = match mode {
                    PrologueMode::LandingPad => addr + LANDING_PAD.len() as u64,
                    PrologueMode::Padding => self
                        .scanner
                        .decoder()
                        .decode(code, addr)
                        .map(|insn| insn.end())
                        .unwrap_or(addr + 1),
                };
                rest = code.tail_from(next);
            }
            hits
        })
    }

    fn hit(kind: HitKind, segment: &MemorySegment, insn: &DecodedInstruction) -> ScanHit {
        ScanHit {
            kind,
            address: insn.start,
            length: insn.length,
            segment: segment.index(),
            target: insn.call_target(),
        }
    }

    fn collect<F>(&self, per_segment: F) -> Vec<ScanHit>
    where
        F: Fn(&MemorySegment, &CodeBuffer<'a>) -> Vec<ScanHit> + Sync,
    {
        let mut hits: Vec<ScanHit> = self
            .segments
            .par_iter()
            .flat_map_iter(|(segment, code)| per_segment(segment, code))
            .collect();
        hits.sort_by_key(|hit| hit.address);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goblin::elf::program_header::{ProgramHeader, PF_R, PF_W, PF_X, PT_LOAD};

    const BASE: u64 = 0x5555_0000_0000;

    fn phdr(p_flags: u32, p_offset: u64, p_memsz: u64) -> ProgramHeader {
        ProgramHeader {
            p_type: PT_LOAD,
            p_flags,
            p_offset,
            p_vaddr: p_offset,
            p_paddr: p_offset,
            p_filesz: p_memsz,
            p_memsz,
            p_align: 0x10,
        }
    }

    fn fixture() -> (ElfImage, Vec<u8>) {
        let mut data = vec![0u8; 0x60];
        // first text segment at 0x10: endbr64; call +0x20; ret
        data[0x10..0x1a].copy_from_slice(&[0xF3, 0x0F, 0x1E, 0xFA, 0xE8, 0x20, 0x00, 0x00, 0x00, 0xC3]);
        // data segment at 0x20 holds something that looks like a call
        data[0x20..0x25].copy_from_slice(&[0xE8, 0x00, 0x00, 0x00, 0x00]);
        // second text segment at 0x30: lea rax, [rbx + 8]; endbr64; call -0x1e; ret
        data[0x30..0x44].copy_from_slice(&[
            0x48, 0x8D, 0x43, 0x08, 0xF3, 0x0F, 0x1E, 0xFA, 0xE8, 0xE2, 0xFF, 0xFF, 0xFF, 0xC3, 0x90, 0x90,
            0x90, 0x90, 0x90, 0x90,
        ]);
        let image = ElfImage::new(
            Address::new(BASE),
            0,
            vec![
                phdr(PF_R | PF_X, 0x10, 0x10),
                phdr(PF_R | PF_W, 0x20, 0x10),
                phdr(PF_R | PF_X, 0x30, 0x14),
            ],
        );
        (image, data)
    }

    #[test]
    fn test_calls_across_segments() {
        let (image, data) = fixture();
        let scanner = ImageScanner::new(&image, &data).unwrap();
        assert_eq!(scanner.segments().count(), 2);

        let calls = scanner.find_calls(None);
        let starts: Vec<_> = calls.iter().map(|h| h.address.as_u64() - BASE).collect();
        assert_eq!(starts, vec![0x14, 0x38]);

        // the call at 0x14 lands on 0x39, the one at 0x38 jumps back to 0x1f
        let to_first = scanner.find_calls(Some(Address::new(BASE + 0x39)));
        assert_eq!(to_first.len(), 1);
        assert_eq!(to_first[0].segment, 0);
        let to_second = scanner.find_calls(Some(Address::new(BASE + 0x1f)));
        assert_eq!(to_second.len(), 1);
        assert_eq!(to_second[0].address, Address::new(BASE + 0x38));
    }

    #[test]
    fn test_leas_and_prologues() {
        let (image, data) = fixture();
        let scanner = ImageScanner::new(&image, &data)
            .unwrap()
            .with_scanner(InstructionScanner::new().with_resync(ResyncPolicy::ByteWise));

        let leas = scanner.find_leas(8);
        assert_eq!(leas.len(), 1);
        assert_eq!(leas[0].address, Address::new(BASE + 0x30));

        let pads = scanner.find_prologues(PrologueMode::LandingPad);
        let starts: Vec<_> = pads.iter().map(|h| h.address.as_u64() - BASE).collect();
        assert_eq!(starts, vec![0x10, 0x34]);
    }

    #[test]
    fn test_sweep_continues_past_undecodable_bytes() {
        // push es; call +0; daa; call +0 (both one-byte ops are invalid in long mode)
        let mut data = vec![0u8; 0x20];
        data[0x10..0x1c].copy_from_slice(&[0x06, 0xE8, 0x00, 0x00, 0x00, 0x00, 0x27, 0xE8, 0x00, 0x00, 0x00, 0x00]);
        let image = ElfImage::new(Address::new(BASE), 0, vec![phdr(PF_R | PF_X, 0x10, 0xc)]);

        let sweep = ImageScanner::new(&image, &data).unwrap();
        let starts: Vec<_> = sweep.find_calls(None).iter().map(|h| h.address.as_u64() - BASE).collect();
        assert_eq!(starts, vec![0x11, 0x17]);

        let strict = ImageScanner::new(&image, &data)
            .unwrap()
            .with_scanner(InstructionScanner::new().with_resync(ResyncPolicy::Stop));
        assert!(strict.find_calls(None).is_empty());
    }

    #[test]
    fn test_segment_outside_file() {
        let (image, data) = fixture();
        assert!(ImageScanner::new(&image, &data[..0x38]).is_err());
    }
}

// Fri Oct 16 2026 - Alex

use crate::dasm::DecodedInstruction;
use crate::memory::{Address, CodeBuffer};
use crate::search::{InstructionScanner, ResyncPolicy};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `endbr64`, emitted at every indirect branch target under CET/IBT.
pub const LANDING_PAD: [u8; 4] = [0xF3, 0x0F, 0x1E, 0xFA];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrologueMode {
    /// The function starts at an `endbr64` marker.
    LandingPad,
    /// The function starts right after a run of nop/int3 filler.
    Padding,
}

impl fmt::Display for PrologueMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LandingPad => write!(f, "endbr64"),
            Self::Padding => write!(f, "padding"),
        }
    }
}

impl FromStr for PrologueMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "endbr" | "endbr64" | "landing-pad" | "landing_pad" => Ok(Self::LandingPad),
            "nop" | "padding" => Ok(Self::Padding),
            other => Err(format!("unknown prologue mode '{}'", other)),
        }
    }
}

impl InstructionScanner {
    /// Locates the start of the next function in `code`.
    pub fn find_function_prologue(&self, code: &CodeBuffer<'_>, mode: PrologueMode) -> Option<Address> {
        let found = match mode {
            PrologueMode::LandingPad => self.find_landing_pad(code),
            PrologueMode::Padding => self.find_after_padding(code),
        };
        if let Some(addr) = found {
            debug!("{} prologue at {}", mode, addr);
        }
        found
    }

    fn is_aligned(&self, addr: Address) -> bool {
        self.options().function_alignment.map_or(true, |align| addr.is_aligned(align))
    }

    fn find_landing_pad(&self, code: &CodeBuffer<'_>) -> Option<Address> {
        code.as_slice()
            .windows(LANDING_PAD.len())
            .enumerate()
            .map(|(offset, window)| (code.start() + offset as u64, window))
            .find(|&(addr, window)| window == LANDING_PAD && self.is_aligned(addr))
            .map(|(addr, _)| addr)
    }

    fn find_after_padding(&self, code: &CodeBuffer<'_>) -> Option<Address> {
        let mut insn = DecodedInstruction::new();
        let mut in_padding = false;
        let mut cursor = code.start();

        while cursor < code.end() {
            if self.decoder().decode_into(&mut insn, code, cursor).is_err() {
                // the run ended; the function may open with an instruction we do not decode
                if in_padding && self.is_aligned(cursor) {
                    return Some(cursor);
                }
                match self.options().resync {
                    ResyncPolicy::Stop => return None,
                    ResyncPolicy::ByteWise => {
                        in_padding = false;
                        cursor = cursor + 1;
                        continue;
                    }
                }
            }

            if insn.class().is_padding() {
                in_padding = true;
            } else if in_padding && self.is_aligned(insn.start) {
                return Some(insn.start);
            } else {
                in_padding = false;
            }
            cursor = insn.end();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::ScanOptions;

    const BASE: u64 = 0x2000;

    fn buffer(bytes: &[u8]) -> CodeBuffer<'_> {
        CodeBuffer::new(Address::new(BASE), bytes).unwrap()
    }

    // endbr64; push rbp; mov rbp, rsp; ret
    const MARKED: [u8; 9] = [0xF3, 0x0F, 0x1E, 0xFA, 0x55, 0x48, 0x89, 0xE5, 0xC3];
    // ret; int3; int3; nop; push rbp; mov rbp, rsp; ret
    const PADDED: [u8; 9] = [0xC3, 0xCC, 0xCC, 0x90, 0x55, 0x48, 0x89, 0xE5, 0xC3];

    #[test]
    fn test_landing_pad_only() {
        let code = buffer(&MARKED);
        let scanner = InstructionScanner::new();
        assert_eq!(scanner.find_function_prologue(&code, PrologueMode::LandingPad), Some(Address::new(BASE)));
        assert_eq!(scanner.find_function_prologue(&code, PrologueMode::Padding), None);
    }

    #[test]
    fn test_padding_only() {
        let code = buffer(&PADDED);
        let scanner = InstructionScanner::new();
        assert_eq!(scanner.find_function_prologue(&code, PrologueMode::Padding), Some(Address::new(BASE + 4)));
        assert_eq!(scanner.find_function_prologue(&code, PrologueMode::LandingPad), None);
    }

    #[test]
    fn test_landing_pad_found_mid_buffer() {
        let mut bytes = vec![0x00, 0x11, 0x22];
        bytes.extend_from_slice(&MARKED);
        let code = buffer(&bytes);
        let found = InstructionScanner::new().find_function_prologue(&code, PrologueMode::LandingPad);
        assert_eq!(found, Some(Address::new(BASE + 3)));
    }

    #[test]
    fn test_truncated_marker_not_found() {
        let code = buffer(&LANDING_PAD[..3]);
        assert_eq!(InstructionScanner::new().find_function_prologue(&code, PrologueMode::LandingPad), None);
    }

    #[test]
    fn test_multi_byte_padding() {
        // ret; nopw cs:[rax+rax*1+0]; endbr64
        let mut bytes = vec![0xC3, 0x66, 0x2E, 0x0F, 0x1F, 0x84, 0x00, 0x00, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(&LANDING_PAD);
        let code = buffer(&bytes);
        let found = InstructionScanner::new().find_function_prologue(&code, PrologueMode::Padding);
        assert_eq!(found, Some(Address::new(BASE + 11)));
    }

    #[test]
    fn test_padding_before_undecodable_entry() {
        // ret; nop; nop; pxor xmm0, xmm0
        let bytes = [0xC3, 0x90, 0x90, 0x66, 0x0F, 0xEF, 0xC0];
        let code = buffer(&bytes);
        let expected = Some(Address::new(BASE + 3));

        let stop = InstructionScanner::new();
        assert_eq!(stop.find_function_prologue(&code, PrologueMode::Padding), expected);
        let bytewise = InstructionScanner::new().with_resync(ResyncPolicy::ByteWise);
        assert_eq!(bytewise.find_function_prologue(&code, PrologueMode::Padding), expected);
    }

    #[test]
    fn test_endbr32_is_not_padding() {
        // ret; nop; endbr32; push rbp
        let bytes = [0xC3, 0x90, 0xF3, 0x0F, 0x1E, 0xFB, 0x55];
        let code = buffer(&bytes);
        let found = InstructionScanner::new().find_function_prologue(&code, PrologueMode::Padding);
        assert_eq!(found, Some(Address::new(BASE + 2)));
    }

    #[test]
    fn test_padding_running_to_end() {
        let bytes = [0xC3, 0x90, 0x90, 0xCC];
        let code = buffer(&bytes);
        assert_eq!(InstructionScanner::new().find_function_prologue(&code, PrologueMode::Padding), None);
    }

    #[test]
    fn test_alignment_filter() {
        // ret; nop; push rbp  -> candidate at +2, which is not 16 byte aligned
        let mut bytes = vec![0xC3, 0x90, 0x55];
        bytes.resize(16, 0x90);
        bytes.push(0x55);
        let code = buffer(&bytes);

        let loose = InstructionScanner::new();
        assert_eq!(loose.find_function_prologue(&code, PrologueMode::Padding), Some(Address::new(BASE + 2)));

        let aligned = InstructionScanner::new().with_options(ScanOptions::new().with_function_alignment(16));
        assert_eq!(aligned.find_function_prologue(&code, PrologueMode::Padding), Some(Address::new(BASE + 16)));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("endbr64".parse::<PrologueMode>(), Ok(PrologueMode::LandingPad));
        assert_eq!("NOP".parse::<PrologueMode>(), Ok(PrologueMode::Padding));
        assert!("prologue".parse::<PrologueMode>().is_err());
    }
}

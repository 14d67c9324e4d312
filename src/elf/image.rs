// Fri Oct 16 2026 - Alex

use crate::elf::{ElfError, FlagMatch, SegmentStep};
use crate::memory::{Address, CodeBuffer, MemoryRange, MemorySegment, Protection};
use goblin::elf::header::EM_X86_64;
use goblin::elf::program_header::{ProgramHeader, PT_LOAD};
use goblin::elf::Elf;
use log::{debug, trace, warn};

/// An ELF image that is already mapped and relocated.
///
/// `load_bias` is the link-time virtual address of the first loaded byte, so
/// a segment with `p_vaddr` lives at `base + (p_vaddr - load_bias)`.
#[derive(Debug, Clone)]
pub struct ElfImage {
    base: Address,
    load_bias: u64,
    program_headers: Vec<ProgramHeader>,
}

impl ElfImage {
    pub fn new(base: Address, load_bias: u64, program_headers: Vec<ProgramHeader>) -> Self {
        Self { base, load_bias, program_headers }
    }

    /// Reads the program header table of an ELF file whose first loaded byte
    /// sits at `base`.
    pub fn parse(data: &[u8], base: Address) -> Result<Self, ElfError> {
        let elf = Elf::parse(data)?;
        if !elf.is_64 {
            return Err(ElfError::Not64Bit);
        }
        if elf.header.e_machine != EM_X86_64 {
            warn!("e_machine is {}, instructions will be decoded as x86-64 anyway", elf.header.e_machine);
        }

        let load_bias = elf
            .program_headers
            .iter()
            .filter(|ph| ph.p_type == PT_LOAD)
            .map(|ph| ph.p_vaddr)
            .min()
            .ok_or(ElfError::NoLoadableSegments)?;

        debug!(
            "parsed ELF image: {} program headers, load bias 0x{:x}, mapped at {}",
            elf.program_headers.len(),
            load_bias,
            base
        );
        Ok(Self::new(base, load_bias, elf.program_headers))
    }

    /// Same as [`ElfImage::parse`] with the image placed at its link address.
    pub fn parse_at_link_address(data: &[u8]) -> Result<Self, ElfError> {
        let probe = Self::parse(data, Address::zero())?;
        Ok(Self { base: Address::new(probe.load_bias), ..probe })
    }

    pub fn base(&self) -> Address {
        self.base
    }

    pub fn load_bias(&self) -> u64 {
        self.load_bias
    }

    pub fn program_headers(&self) -> &[ProgramHeader] {
        &self.program_headers
    }

    /// Runtime address of a link-time virtual address.
    pub fn runtime_address(&self, vaddr: u64) -> Option<Address> {
        let delta = vaddr.checked_sub(self.load_bias)?;
        self.base.checked_add(delta)
    }

    /// Where a program header's memory image lives at runtime.
    pub fn segment_range(&self, phdr: &ProgramHeader) -> Option<MemoryRange> {
        let start = self.runtime_address(phdr.p_vaddr)?;
        MemoryRange::from_start_size(start, phdr.p_memsz).ok()
    }

    fn segment_at(&self, index: usize) -> Option<MemorySegment> {
        let phdr = self.program_headers.get(index)?;
        if phdr.p_type != PT_LOAD {
            return None;
        }
        let range = self.segment_range(phdr)?;
        Some(
            MemorySegment::new(index, range, Protection::from_elf_flags(phdr.p_flags))
                .with_file_offset(phdr.p_offset)
                .with_file_size(phdr.p_filesz),
        )
    }

    /// All `PT_LOAD` segments in table order.
    pub fn segments(&self) -> Vec<MemorySegment> {
        (0..self.program_headers.len()).filter_map(|i| self.segment_at(i)).collect()
    }

    pub fn executable_segments(&self) -> Vec<MemorySegment> {
        self.segments().into_iter().filter(|s| s.is_executable()).collect()
    }

    /// Checks whether `[vaddr, vaddr + size)` lies entirely inside one loaded
    /// segment whose protection includes `flags`.
    pub fn contains_segment(&self, vaddr: Address, size: u64, flags: Protection, step: SegmentStep) -> bool {
        self.find_segment(vaddr, size, flags, step, FlagMatch::default()).is_some()
    }

    /// The first loaded segment, in `step` order, that covers the range and
    /// whose flags satisfy `policy`.
    pub fn find_segment(
        &self,
        vaddr: Address,
        size: u64,
        flags: Protection,
        step: SegmentStep,
        policy: FlagMatch,
    ) -> Option<MemorySegment> {
        let Ok(query) = MemoryRange::from_start_size(vaddr, size) else {
            trace!("query {}+0x{:x} overflows, no segment can contain it", vaddr, size);
            return None;
        };

        for index in step.indices(self.program_headers.len()) {
            let Some(segment) = self.segment_at(index) else {
                continue;
            };
            if !policy.matches(segment.protection(), flags) {
                continue;
            }
            if segment.range().contains_range(&query) {
                debug!("{} is covered by segment {}", query, segment);
                return Some(segment);
            }
        }
        None
    }

    /// File bytes backing `segment`, exposed at the segment's runtime address.
    ///
    /// Only the file-backed part (`p_filesz`) is returned; the zero-filled
    /// tail of a segment has no bytes in the file.
    pub fn segment_code<'a>(&self, segment: &MemorySegment, data: &'a [u8]) -> Result<CodeBuffer<'a>, ElfError> {
        let out_of_file = || ElfError::SegmentOutOfFile {
            index: segment.index(),
            offset: segment.file_offset(),
            size: segment.file_size(),
        };
        let start = usize::try_from(segment.file_offset()).map_err(|_| out_of_file())?;
        let len = usize::try_from(segment.file_size().min(segment.size())).map_err(|_| out_of_file())?;
        let end = start.checked_add(len).ok_or_else(out_of_file)?;
        let bytes = data.get(start..end).ok_or_else(out_of_file)?;
        Ok(CodeBuffer::new(segment.start(), bytes)?)
    }
}

// Fri Oct 16 2026 - Alex

use bitflags::bitflags;
use goblin::elf::program_header::{PF_R, PF_W, PF_X};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// Segment protection, laid out like the ELF `p_flags` word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Protection: u32 {
        const EXECUTE = PF_X;
        const WRITE = PF_W;
        const READ = PF_R;
        const READ_EXECUTE = PF_R | PF_X;
        const READ_WRITE = PF_R | PF_W;
    }
}

impl Protection {
    /// Keeps only the permission bits; OS and processor specific bits are dropped.
    pub fn from_elf_flags(p_flags: u32) -> Self {
        Self::from_bits_truncate(p_flags)
    }

    pub fn to_elf_flags(self) -> u32 {
        self.bits()
    }

    pub fn can_read(self) -> bool {
        self.contains(Self::READ)
    }

    pub fn can_write(self) -> bool {
        self.contains(Self::WRITE)
    }

    pub fn can_execute(self) -> bool {
        self.contains(Self::EXECUTE)
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.can_read() { 'r' } else { '-' },
            if self.can_write() { 'w' } else { '-' },
            if self.can_execute() { 'x' } else { '-' },
        )
    }
}

impl FromStr for Protection {
    type Err = String;

    /// Accepts `rwx`-style strings (`r-x`, `rx`, `rw`) or a raw `p_flags` number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x") {
            return u32::from_str_radix(hex, 16)
                .map(Self::from_elf_flags)
                .map_err(|e| format!("invalid protection flags '{}': {}", s, e));
        }
        if let Ok(raw) = s.parse::<u32>() {
            return Ok(Self::from_elf_flags(raw));
        }

        let mut prot = Self::empty();
        for c in s.chars() {
            match c.to_ascii_lowercase() {
                'r' => prot |= Self::READ,
                'w' => prot |= Self::WRITE,
                'x' => prot |= Self::EXECUTE,
                '-' => {}
                other => return Err(format!("invalid protection character '{}'", other)),
            }
        }
        Ok(prot)
    }
}

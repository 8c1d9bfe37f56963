//! ELF64 program (segment) headers.

use bitflags::bitflags;

use crate::header::ELF64_PHDR_SIZE;
use crate::ident::Endian;
use crate::record::Record;

/// Program header type: unused entry.
pub const PT_NULL: u32 = 0;

/// Program header type: loadable segment.
pub const PT_LOAD: u32 = 1;

/// Program header type: dynamic linking information.
pub const PT_DYNAMIC: u32 = 2;

/// Program header type: path of the program interpreter.
pub const PT_INTERP: u32 = 3;

/// Program header type: auxiliary notes.
pub const PT_NOTE: u32 = 4;

/// Program header type: reserved.
pub const PT_SHLIB: u32 = 5;

/// Program header type: the program header table itself.
pub const PT_PHDR: u32 = 6;

/// Program header type: thread-local storage template.
pub const PT_TLS: u32 = 7;

/// Program header type: GNU `.eh_frame_hdr` location.
pub const PT_GNU_EH_FRAME: u32 = 0x6474_e550;

/// Program header type: GNU stack executability.
pub const PT_GNU_STACK: u32 = 0x6474_e551;

/// Program header type: GNU read-only after relocation.
pub const PT_GNU_RELRO: u32 = 0x6474_e552;

/// Program header type: GNU property notes.
pub const PT_GNU_PROPERTY: u32 = 0x6474_e553;

bitflags! {
    /// Segment permission flags (`p_flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SegmentFlags: u32 {
        /// Execute.
        const X = 0x1;
        /// Write.
        const W = 0x2;
        /// Read.
        const R = 0x4;
    }
}

/// Parsed ELF64 program header entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64ProgramHeader {
    /// Segment type.
    pub p_type: u32,
    /// Segment flags (read/write/execute).
    pub p_flags: u32,
    /// Offset of the segment data in the file.
    pub p_offset: u64,
    /// Virtual address of the segment.
    pub p_vaddr: u64,
    /// Physical address of the segment, where relevant.
    pub p_paddr: u64,
    /// Size of the segment data in the file.
    pub p_filesz: u64,
    /// Size of the segment in memory.
    pub p_memsz: u64,
    /// Required alignment.
    pub p_align: u64,
}

impl Record for Elf64ProgramHeader {
    const SIZE: usize = ELF64_PHDR_SIZE;
    const NAME: &'static str = "program header";

    fn parse(b: &[u8], endian: Endian) -> Self {
        Self {
            p_type: endian.read_u32(b, 0),
            p_flags: endian.read_u32(b, 4),
            p_offset: endian.read_u64(b, 8),
            p_vaddr: endian.read_u64(b, 16),
            p_paddr: endian.read_u64(b, 24),
            p_filesz: endian.read_u64(b, 32),
            p_memsz: endian.read_u64(b, 40),
            p_align: endian.read_u64(b, 48),
        }
    }
}

impl Elf64ProgramHeader {
    /// Returns the typed permission flags. Unknown bits are retained.
    #[must_use]
    pub fn flags(&self) -> SegmentFlags {
        SegmentFlags::from_bits_retain(self.p_flags)
    }

    /// Returns `true` if the file image is larger than the memory image.
    ///
    /// Loaders expect `p_filesz <= p_memsz`; a violation is worth flagging
    /// but does not stop decoding.
    #[must_use]
    pub fn is_suspicious(&self) -> bool {
        self.p_filesz > self.p_memsz
    }
}

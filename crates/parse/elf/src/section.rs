//! ELF64 section headers and string tables.
//!
//! Decodes section header records and resolves NUL-terminated names out of
//! string table sections. String lookups never read past the table: a
//! missing terminator is an error, not a read into the next section.

use std::io::{Read, Seek};

use bitflags::bitflags;

use crate::error::ElfError;
use crate::header::ELF64_SHDR_SIZE;
use crate::ident::Endian;
use crate::record::{ByteSource, Record};

/// Section type: inactive header.
pub const SHT_NULL: u32 = 0;

/// Section type: program-defined contents.
pub const SHT_PROGBITS: u32 = 1;

/// Section type: symbol table.
pub const SHT_SYMTAB: u32 = 2;

/// Section type: string table.
pub const SHT_STRTAB: u32 = 3;

/// Section type: relocation entries with addends.
pub const SHT_RELA: u32 = 4;

/// Section type: symbol hash table.
pub const SHT_HASH: u32 = 5;

/// Section type: dynamic linking information.
pub const SHT_DYNAMIC: u32 = 6;

/// Section type: notes.
pub const SHT_NOTE: u32 = 7;

/// Section type: occupies no file space (`.bss`).
pub const SHT_NOBITS: u32 = 8;

/// Section type: relocation entries without addends.
pub const SHT_REL: u32 = 9;

/// Section type: reserved.
pub const SHT_SHLIB: u32 = 10;

/// Section type: dynamic symbol table.
pub const SHT_DYNSYM: u32 = 11;

/// Section type: array of constructors.
pub const SHT_INIT_ARRAY: u32 = 14;

/// Section type: array of destructors.
pub const SHT_FINI_ARRAY: u32 = 15;

/// Section type: array of pre-constructors.
pub const SHT_PREINIT_ARRAY: u32 = 16;

/// Section type: section group.
pub const SHT_GROUP: u32 = 17;

/// Section type: extended section indices.
pub const SHT_SYMTAB_SHNDX: u32 = 18;

/// Section type: GNU-style symbol hash table.
pub const SHT_GNU_HASH: u32 = 0x6fff_fff6;

/// Section type: GNU version definitions.
pub const SHT_GNU_VERDEF: u32 = 0x6fff_fffd;

/// Section type: GNU version requirements.
pub const SHT_GNU_VERNEED: u32 = 0x6fff_fffe;

/// Section type: GNU version symbol table.
pub const SHT_GNU_VERSYM: u32 = 0x6fff_ffff;

/// Special section index: undefined.
pub const SHN_UNDEF: u16 = 0;

/// Special section index: the real index is stored elsewhere.
pub const SHN_XINDEX: u16 = 0xffff;

bitflags! {
    /// Section attribute flags (`sh_flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SectionFlags: u64 {
        /// Writable data.
        const WRITE = 0x1;
        /// Occupies memory during execution.
        const ALLOC = 0x2;
        /// Executable machine instructions.
        const EXECINSTR = 0x4;
        /// Might be merged.
        const MERGE = 0x10;
        /// Contains NUL-terminated strings.
        const STRINGS = 0x20;
        /// `sh_info` contains a section header table index.
        const INFO_LINK = 0x40;
        /// Preserve order after combining.
        const LINK_ORDER = 0x80;
        /// Non-standard OS-specific handling required.
        const OS_NONCONFORMING = 0x100;
        /// Member of a section group.
        const GROUP = 0x200;
        /// Holds thread-local data.
        const TLS = 0x400;
        /// Holds compressed data.
        const COMPRESSED = 0x800;
    }
}

/// Parsed ELF64 section header entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64SectionHeader {
    /// Offset into the section header string table for this section's name.
    pub sh_name: u32,
    /// Section type (`SHT_SYMTAB`, `SHT_STRTAB`, etc.).
    pub sh_type: u32,
    /// Section flags.
    pub sh_flags: u64,
    /// Virtual address of the section in memory (0 for non-loaded sections).
    pub sh_addr: u64,
    /// File offset of the section data.
    pub sh_offset: u64,
    /// Size of the section data in bytes.
    pub sh_size: u64,
    /// Associated section index (e.g., `.strtab` index for `.symtab`).
    pub sh_link: u32,
    /// Extra info (interpretation depends on section type).
    pub sh_info: u32,
    /// Required alignment of the section (must be a power of two).
    pub sh_addralign: u64,
    /// Size of each entry (for sections with fixed-size entries).
    pub sh_entsize: u64,
}

impl Record for Elf64SectionHeader {
    const SIZE: usize = ELF64_SHDR_SIZE;
    const NAME: &'static str = "section header";

    fn parse(b: &[u8], endian: Endian) -> Self {
        Self {
            sh_name: endian.read_u32(b, 0),
            sh_type: endian.read_u32(b, 4),
            sh_flags: endian.read_u64(b, 8),
            sh_addr: endian.read_u64(b, 16),
            sh_offset: endian.read_u64(b, 24),
            sh_size: endian.read_u64(b, 32),
            sh_link: endian.read_u32(b, 40),
            sh_info: endian.read_u32(b, 44),
            sh_addralign: endian.read_u64(b, 48),
            sh_entsize: endian.read_u64(b, 56),
        }
    }
}

impl Elf64SectionHeader {
    /// Returns the typed section flags. Unknown bits are retained.
    #[must_use]
    pub fn flags(&self) -> SectionFlags {
        SectionFlags::from_bits_retain(self.sh_flags)
    }

    /// Returns `true` if the section's bytes live in the file.
    #[must_use]
    pub fn occupies_file(&self) -> bool {
        self.sh_type != SHT_NOBITS && self.sh_type != SHT_NULL
    }

    /// Returns `true` if `sh_link` holds a section index for this type.
    #[must_use]
    pub fn has_section_link(&self) -> bool {
        matches!(
            self.sh_type,
            SHT_SYMTAB
                | SHT_DYNSYM
                | SHT_DYNAMIC
                | SHT_REL
                | SHT_RELA
                | SHT_HASH
                | SHT_GNU_HASH
                | SHT_SYMTAB_SHNDX
                | SHT_GNU_VERDEF
                | SHT_GNU_VERNEED
                | SHT_GNU_VERSYM
        )
    }

    /// Returns `true` if `addr` falls inside this section's memory image.
    #[must_use]
    pub fn contains_addr(&self, addr: u64) -> bool {
        self.sh_addr != 0 && addr >= self.sh_addr && addr - self.sh_addr < self.sh_size
    }
}

/// Checks the per-section invariants of a decoded section table.
///
/// # Errors
///
/// Returns [`ElfError::BadSectionIndex`] if a section that uses `sh_link`
/// names a section outside the table, or [`ElfError::TruncatedTable`] if a
/// section that occupies file space ends past `source_len`.
pub fn check_sections(sections: &[Elf64SectionHeader], source_len: u64) -> Result<(), ElfError> {
    let count = sections.len() as u64;
    for shdr in sections {
        if shdr.has_section_link() && u64::from(shdr.sh_link) >= count {
            return Err(ElfError::BadSectionIndex {
                index: u64::from(shdr.sh_link),
                count,
            });
        }
        if shdr.occupies_file() {
            crate::record::check_region(shdr.sh_offset, shdr.sh_size, source_len)?;
        }
    }
    Ok(())
}

/// Reads the file bytes of one section.
///
/// Sections that occupy no file space (`SHT_NOBITS`, `SHT_NULL`) yield an
/// empty buffer.
///
/// # Errors
///
/// Returns [`ElfError::TruncatedTable`] if the section extends past the end
/// of the source, or [`ElfError::IoFailure`] if the reader fails.
pub fn read_section<R: Read + Seek>(
    source: &mut ByteSource<R>,
    shdr: &Elf64SectionHeader,
) -> Result<Vec<u8>, ElfError> {
    if !shdr.occupies_file() {
        return Ok(Vec::new());
    }
    source.read_at(shdr.sh_offset, shdr.sh_size)
}

/// A view over the raw bytes of a string table section.
///
/// To get the string at offset `i`, start at the `i`th byte and read until
/// a NUL byte:
///
/// ```text
/// | 0x | \0 |  l |  i |  b |  c |  . |  s |  o |  . |  6 | \0 |
/// ```
///
/// Offset 1 resolves to `libc.so.6`, offset 4 to `c.so.6`, offset 0 to the
/// empty string.
#[derive(Debug, Clone, Copy)]
pub struct StringTable<'a> {
    data: &'a [u8],
}

impl<'a> StringTable<'a> {
    /// Creates a new string table from the raw section data.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Length of the table in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the table holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resolves the NUL-terminated string beginning at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::OffsetOutOfRange`] if `offset >= len`,
    /// [`ElfError::UnterminatedString`] if the table ends before a NUL byte,
    /// and [`ElfError::InvalidUtf8`] if the bytes are not UTF-8.
    pub fn resolve(&self, offset: u64) -> Result<&'a str, ElfError> {
        let start = usize::try_from(offset)
            .ok()
            .filter(|&start| start < self.data.len())
            .ok_or(ElfError::OffsetOutOfRange {
                offset,
                len: self.data.len() as u64,
            })?;
        let remaining = &self.data[start..];
        let nul_pos = remaining
            .iter()
            .position(|&b| b == 0)
            .ok_or(ElfError::UnterminatedString { offset })?;
        core::str::from_utf8(&remaining[..nul_pos]).map_err(|_| ElfError::InvalidUtf8 { offset })
    }
}

//! Dynamic section decoding and shared-library dependency resolution.
//!
//! The dynamic section is an array of tag/value pairs terminated by
//! `DT_NULL`. String-valued entries (`DT_NEEDED`, `DT_SONAME`, `DT_RPATH`,
//! `DT_RUNPATH`) hold offsets into the dynamic string table, whose virtual
//! address is given by `DT_STRTAB` and matched against the section headers.

use std::io::{Read, Seek};

use crate::error::ElfError;
use crate::ident::Endian;
use crate::record::{ByteSource, Record, decode_array};
use crate::section::{Elf64SectionHeader, SHT_DYNAMIC, StringTable, read_section};

/// Marks the end of the dynamic array.
pub const DT_NULL: i64 = 0;
/// String table offset of a needed library name.
pub const DT_NEEDED: i64 = 1;
/// Size of the PLT relocation entries.
pub const DT_PLTRELSZ: i64 = 2;
/// Address of the PLT/GOT.
pub const DT_PLTGOT: i64 = 3;
/// Address of the symbol hash table.
pub const DT_HASH: i64 = 4;
/// Address of the dynamic string table.
pub const DT_STRTAB: i64 = 5;
/// Address of the dynamic symbol table.
pub const DT_SYMTAB: i64 = 6;
/// Address of the `Rela` relocation table.
pub const DT_RELA: i64 = 7;
/// Total size of the `Rela` relocation table.
pub const DT_RELASZ: i64 = 8;
/// Size of one `Rela` entry.
pub const DT_RELAENT: i64 = 9;
/// Size of the dynamic string table.
pub const DT_STRSZ: i64 = 10;
/// Size of one symbol table entry.
pub const DT_SYMENT: i64 = 11;
/// Address of the initialization function.
pub const DT_INIT: i64 = 12;
/// Address of the termination function.
pub const DT_FINI: i64 = 13;
/// String table offset of the shared object name.
pub const DT_SONAME: i64 = 14;
/// String table offset of the library search path (deprecated).
pub const DT_RPATH: i64 = 15;
/// Start symbol search in the object itself.
pub const DT_SYMBOLIC: i64 = 16;
/// Address of the `Rel` relocation table.
pub const DT_REL: i64 = 17;
/// Total size of the `Rel` relocation table.
pub const DT_RELSZ: i64 = 18;
/// Size of one `Rel` entry.
pub const DT_RELENT: i64 = 19;
/// Type of relocation used by the PLT.
pub const DT_PLTREL: i64 = 20;
/// Reserved for debugger use.
pub const DT_DEBUG: i64 = 21;
/// Relocations may modify a non-writable segment.
pub const DT_TEXTREL: i64 = 22;
/// Address of the PLT relocations.
pub const DT_JMPREL: i64 = 23;
/// Process all relocations before transferring control.
pub const DT_BIND_NOW: i64 = 24;
/// Address of the constructor pointer array.
pub const DT_INIT_ARRAY: i64 = 25;
/// Address of the destructor pointer array.
pub const DT_FINI_ARRAY: i64 = 26;
/// Size of the constructor pointer array.
pub const DT_INIT_ARRAYSZ: i64 = 27;
/// Size of the destructor pointer array.
pub const DT_FINI_ARRAYSZ: i64 = 28;
/// String table offset of the library search path.
pub const DT_RUNPATH: i64 = 29;
/// Flags for the object being loaded.
pub const DT_FLAGS: i64 = 30;
/// Address of the GNU-style hash table.
pub const DT_GNU_HASH: i64 = 0x6fff_fef5;
/// Address of the symbol version table.
pub const DT_VERSYM: i64 = 0x6fff_fff0;
/// Count of `Rela` relocations that are relative.
pub const DT_RELACOUNT: i64 = 0x6fff_fff9;
/// Additional `DT_FLAGS_1` state flags.
pub const DT_FLAGS_1: i64 = 0x6fff_fffb;
/// Address of the version requirement table.
pub const DT_VERNEED: i64 = 0x6fff_fffe;
/// Number of version requirement entries.
pub const DT_VERNEEDNUM: i64 = 0x6fff_ffff;

/// Size of an ELF64 dynamic entry (16 bytes).
pub const ELF64_DYN_SIZE: usize = 16;

/// Meaning of a dynamic entry's tag, as far as this decoder interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicTag {
    /// `DT_NULL`: end of the array.
    Null,
    /// `DT_NEEDED`: the value is a string table offset of a library name.
    Needed,
    /// `DT_STRTAB`: the value is the string table's virtual address.
    StrTab,
    /// `DT_STRSZ`: the value is the string table's size.
    StrSz,
    /// `DT_SONAME`: the value is a string table offset.
    SoName,
    /// `DT_RPATH`: the value is a string table offset.
    RPath,
    /// `DT_RUNPATH`: the value is a string table offset.
    RunPath,
    /// Any other tag; the value is not interpreted.
    Other(i64),
}

impl From<i64> for DynamicTag {
    fn from(tag: i64) -> Self {
        match tag {
            DT_NULL => Self::Null,
            DT_NEEDED => Self::Needed,
            DT_STRTAB => Self::StrTab,
            DT_STRSZ => Self::StrSz,
            DT_SONAME => Self::SoName,
            DT_RPATH => Self::RPath,
            DT_RUNPATH => Self::RunPath,
            other => Self::Other(other),
        }
    }
}

/// Parsed ELF64 dynamic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64Dyn {
    /// Entry tag.
    pub d_tag: i64,
    /// Value or address, interpreted according to `d_tag`.
    pub d_un: u64,
}

impl Record for Elf64Dyn {
    const SIZE: usize = ELF64_DYN_SIZE;
    const NAME: &'static str = "dynamic entry";

    fn parse(b: &[u8], endian: Endian) -> Self {
        Self {
            d_tag: endian.read_i64(b, 0),
            d_un: endian.read_u64(b, 8),
        }
    }
}

impl Elf64Dyn {
    /// Returns the interpreted tag.
    #[must_use]
    pub fn tag(&self) -> DynamicTag {
        DynamicTag::from(self.d_tag)
    }

    /// Returns `true` if the value is an offset into the dynamic string table.
    #[must_use]
    pub fn references_string(&self) -> bool {
        matches!(
            self.tag(),
            DynamicTag::Needed | DynamicTag::SoName | DynamicTag::RPath | DynamicTag::RunPath
        )
    }
}

/// Everything resolved from the dynamic section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicInfo {
    /// Decoded entries up to and including the first `DT_NULL`.
    pub entries: Vec<Elf64Dyn>,
    /// `DT_NEEDED` names in file order, duplicates preserved.
    pub needed: Vec<String>,
    /// `DT_SONAME`, if present.
    pub soname: Option<String>,
    /// `DT_RPATH`, if present.
    pub rpath: Option<String>,
    /// `DT_RUNPATH`, if present.
    pub runpath: Option<String>,
}

/// Finds the dynamic section, if any, returning its index and header.
#[must_use]
pub fn find_dynamic_section(
    sections: &[Elf64SectionHeader],
) -> Option<(usize, &Elf64SectionHeader)> {
    sections
        .iter()
        .enumerate()
        .find(|(_, s)| s.sh_type == SHT_DYNAMIC)
}

/// Decodes the entries of a dynamic section, stopping after the first
/// `DT_NULL`.
///
/// # Errors
///
/// Returns [`ElfError::TruncatedTable`] if the section size is not a whole
/// number of entries or the section extends past the source,
/// [`ElfError::LayoutMismatch`] if a non-zero `sh_entsize` is not 16, or
/// [`ElfError::IoFailure`] if the reader fails.
pub fn read_dynamic_entries<R: Read + Seek>(
    source: &mut ByteSource<R>,
    shdr: &Elf64SectionHeader,
    endian: Endian,
) -> Result<Vec<Elf64Dyn>, ElfError> {
    let entry_size = if shdr.sh_entsize == 0 {
        ELF64_DYN_SIZE as u64
    } else {
        shdr.sh_entsize
    };
    if entry_size != ELF64_DYN_SIZE as u64 {
        return Err(ElfError::LayoutMismatch {
            record: Elf64Dyn::NAME,
            expected: ELF64_DYN_SIZE as u64,
            found: entry_size,
        });
    }
    if shdr.sh_size % entry_size != 0 {
        return Err(ElfError::TruncatedTable {
            offset: shdr.sh_offset,
            size: shdr.sh_size,
            source_len: source.len(),
        });
    }
    let mut entries: Vec<Elf64Dyn> = decode_array(
        source,
        shdr.sh_offset,
        shdr.sh_size / entry_size,
        entry_size,
        endian,
    )?;
    if let Some(end) = entries.iter().position(|e| e.d_tag == DT_NULL) {
        entries.truncate(end + 1);
    }
    Ok(entries)
}

/// Finds the section holding virtual address `addr`, returning the section
/// and the offset of `addr` within it.
///
/// An exact match on `sh_addr` wins over a section that merely contains the
/// address. Sections without file data are never matched.
#[must_use]
pub fn locate_string_table(
    sections: &[Elf64SectionHeader],
    addr: u64,
) -> Option<(&Elf64SectionHeader, u64)> {
    let candidates = || sections.iter().filter(|s| s.occupies_file());
    candidates()
        .find(|s| s.sh_addr == addr && s.sh_addr != 0)
        .or_else(|| candidates().find(|s| s.contains_addr(addr)))
        .map(|s| (s, addr - s.sh_addr))
}

/// Decodes the dynamic section and resolves its string-valued entries.
///
/// A file without a dynamic section yields an empty [`DynamicInfo`].
///
/// # Errors
///
/// Returns [`ElfError::UnresolvedStringTable`] if string-valued entries
/// exist but `DT_STRTAB` is missing or matches no section, any error of
/// [`read_dynamic_entries`], and any error of [`StringTable::resolve`].
pub fn analyze_dynamic<R: Read + Seek>(
    source: &mut ByteSource<R>,
    sections: &[Elf64SectionHeader],
    endian: Endian,
) -> Result<DynamicInfo, ElfError> {
    let Some((_, dynamic)) = find_dynamic_section(sections) else {
        return Ok(DynamicInfo::default());
    };
    let entries = read_dynamic_entries(source, dynamic, endian)?;

    let mut info = DynamicInfo {
        entries,
        ..DynamicInfo::default()
    };
    if !info.entries.iter().any(Elf64Dyn::references_string) {
        return Ok(info);
    }

    let strtab_addr = info
        .entries
        .iter()
        .find(|e| e.tag() == DynamicTag::StrTab)
        .map(|e| e.d_un)
        .ok_or(ElfError::UnresolvedStringTable { addr: None })?;
    let (strtab_shdr, start) = locate_string_table(sections, strtab_addr).ok_or(
        ElfError::UnresolvedStringTable {
            addr: Some(strtab_addr),
        },
    )?;
    let data = read_section(source, strtab_shdr)?;

    // `start < sh_size == data.len()` holds for any located section.
    let mut table = usize::try_from(start)
        .ok()
        .and_then(|start| data.get(start..))
        .unwrap_or_default();
    let declared_size = info
        .entries
        .iter()
        .find(|e| e.tag() == DynamicTag::StrSz)
        .and_then(|e| usize::try_from(e.d_un).ok());
    if let Some(size) = declared_size {
        table = &table[..size.min(table.len())];
    }
    let strings = StringTable::new(table);

    for entry in &info.entries {
        match entry.tag() {
            DynamicTag::Needed => info.needed.push(strings.resolve(entry.d_un)?.to_owned()),
            DynamicTag::SoName => info.soname = Some(strings.resolve(entry.d_un)?.to_owned()),
            DynamicTag::RPath => info.rpath = Some(strings.resolve(entry.d_un)?.to_owned()),
            DynamicTag::RunPath => info.runpath = Some(strings.resolve(entry.d_un)?.to_owned()),
            _ => {}
        }
    }
    Ok(info)
}

/// Resolves the shared-library dependency names (`DT_NEEDED`) in file order.
///
/// # Errors
///
/// See [`analyze_dynamic`].
pub fn find_dependencies<R: Read + Seek>(
    source: &mut ByteSource<R>,
    sections: &[Elf64SectionHeader],
    endian: Endian,
) -> Result<Vec<String>, ElfError> {
    analyze_dynamic(source, sections, endian).map(|info| info.needed)
}

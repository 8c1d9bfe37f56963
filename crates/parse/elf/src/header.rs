//! ELF64 file header decoding.
//!
//! Decodes the 64-byte file header with explicit field widths in the byte
//! order declared by `EI_DATA`, and checks that the section and program
//! header tables it describes fit inside the source.

use std::io::{Read, Seek};

use crate::error::ElfError;
use crate::ident::{
    self, EI_ABIVERSION, EI_DATA, EI_NIDENT, EI_OSABI, EI_VERSION, ElfClass, Endian,
};
use crate::record::{ByteSource, check_region, table_size};

/// ELF type: no file type.
pub const ET_NONE: u16 = 0;

/// ELF type: relocatable object.
pub const ET_REL: u16 = 1;

/// ELF type: executable.
pub const ET_EXEC: u16 = 2;

/// ELF type: shared object (or PIE).
pub const ET_DYN: u16 = 3;

/// ELF type: core dump.
pub const ET_CORE: u16 = 4;

/// ELF machine: Intel 80386.
pub const EM_386: u16 = 3;

/// ELF machine: ARM (32-bit).
pub const EM_ARM: u16 = 40;

/// ELF machine: x86-64.
pub const EM_X86_64: u16 = 62;

/// ELF machine: 64-bit PowerPC.
pub const EM_PPC64: u16 = 21;

/// ELF machine: IBM S/390.
pub const EM_S390: u16 = 22;

/// ELF machine: AArch64.
pub const EM_AARCH64: u16 = 183;

/// ELF machine: RISC-V.
pub const EM_RISCV: u16 = 243;

/// `e_phnum` value signalling that the real count lives in section 0's `sh_info`.
pub const PN_XNUM: u16 = 0xffff;

/// Size of an ELF64 file header (64 bytes).
pub const ELF64_EHDR_SIZE: usize = 64;

/// Size of an ELF64 program header entry (56 bytes).
pub const ELF64_PHDR_SIZE: usize = 56;

/// Size of an ELF64 section header entry (64 bytes).
pub const ELF64_SHDR_SIZE: usize = 64;

/// Classification of `e_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfType {
    /// `ET_NONE`.
    None,
    /// `ET_REL`.
    Relocatable,
    /// `ET_EXEC`.
    Executable,
    /// `ET_DYN`.
    SharedObject,
    /// `ET_CORE`.
    Core,
    /// Any OS- or processor-specific or unassigned value.
    Other(u16),
}

impl From<u16> for ElfType {
    fn from(value: u16) -> Self {
        match value {
            ET_NONE => Self::None,
            ET_REL => Self::Relocatable,
            ET_EXEC => Self::Executable,
            ET_DYN => Self::SharedObject,
            ET_CORE => Self::Core,
            other => Self::Other(other),
        }
    }
}

/// Parsed ELF64 file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64Header {
    /// Raw identification bytes.
    pub e_ident: [u8; EI_NIDENT],
    /// Byte order decoded from `EI_DATA`.
    pub endian: Endian,
    /// Object file type.
    pub e_type: u16,
    /// Target machine architecture.
    pub e_machine: u16,
    /// Object file version.
    pub e_version: u32,
    /// Virtual address of the entry point.
    pub e_entry: u64,
    /// Offset of the program header table in the file.
    pub e_phoff: u64,
    /// Offset of the section header table in the file.
    pub e_shoff: u64,
    /// Processor-specific flags.
    pub e_flags: u32,
    /// Size of this header.
    pub e_ehsize: u16,
    /// Size of each program header entry.
    pub e_phentsize: u16,
    /// Number of program header entries.
    pub e_phnum: u16,
    /// Size of each section header entry.
    pub e_shentsize: u16,
    /// Number of section header entries.
    pub e_shnum: u16,
    /// Section header string table index.
    pub e_shstrndx: u16,
}

impl Elf64Header {
    /// Parse an ELF64 file header from the leading bytes of a file.
    ///
    /// Validates the magic, class and data encoding. Table geometry is
    /// checked separately by [`Elf64Header::check_tables`].
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::NotElf`], [`ElfError::UnsupportedClass`] or
    /// [`ElfError::UnsupportedEncoding`] for a bad identification, and
    /// [`ElfError::TruncatedTable`] if fewer than 64 bytes are available.
    pub fn parse(data: &[u8]) -> Result<Self, ElfError> {
        let class = ident::validate(data)?;
        if class != ElfClass::Elf64 {
            return Err(ElfError::UnsupportedClass {
                class: class.to_byte(),
            });
        }
        Self::parse_fields(data)
    }

    /// Reads the header fields from an identification that has already
    /// passed [`ident::validate`] with class ELF64.
    pub(crate) fn parse_fields(data: &[u8]) -> Result<Self, ElfError> {
        if data.len() < ELF64_EHDR_SIZE {
            return Err(ElfError::TruncatedTable {
                offset: 0,
                size: ELF64_EHDR_SIZE as u64,
                source_len: data.len() as u64,
            });
        }
        let endian = Endian::from_byte(data[EI_DATA])?;

        let mut e_ident = [0u8; EI_NIDENT];
        e_ident.copy_from_slice(&data[..EI_NIDENT]);

        Ok(Self {
            e_ident,
            endian,
            e_type: endian.read_u16(data, 16),
            e_machine: endian.read_u16(data, 18),
            e_version: endian.read_u32(data, 20),
            e_entry: endian.read_u64(data, 24),
            e_phoff: endian.read_u64(data, 32),
            e_shoff: endian.read_u64(data, 40),
            e_flags: endian.read_u32(data, 48),
            e_ehsize: endian.read_u16(data, 52),
            e_phentsize: endian.read_u16(data, 54),
            e_phnum: endian.read_u16(data, 56),
            e_shentsize: endian.read_u16(data, 58),
            e_shnum: endian.read_u16(data, 60),
            e_shstrndx: endian.read_u16(data, 62),
        })
    }

    /// Validates entry sizes and table bounds against the source length.
    ///
    /// A table with no entries is not checked. When the header defers a
    /// count to section 0 (`e_shnum == 0` with a non-zero `e_shoff`, or
    /// `e_phnum == PN_XNUM`), only section 0 itself is checked here; the
    /// deferred table is checked once its real count is known.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::LayoutMismatch`] if an entry size is not the
    /// ELF64 record size, or [`ElfError::TruncatedTable`] if a table ends
    /// past `source_len`.
    pub fn check_tables(&self, source_len: u64) -> Result<(), ElfError> {
        if self.e_phnum > 0 {
            check_entry_size("program header", ELF64_PHDR_SIZE, self.e_phentsize)?;
            if self.e_phnum != PN_XNUM {
                let size = table_size(
                    self.e_phoff,
                    u64::from(self.e_phnum),
                    ELF64_PHDR_SIZE as u64,
                    source_len,
                )?;
                check_region(self.e_phoff, size, source_len)?;
            }
        }

        if self.e_shnum > 0 || self.e_shoff != 0 {
            check_entry_size("section header", ELF64_SHDR_SIZE, self.e_shentsize)?;
            let count = u64::from(self.e_shnum.max(1));
            let size = table_size(self.e_shoff, count, ELF64_SHDR_SIZE as u64, source_len)?;
            check_region(self.e_shoff, size, source_len)?;
        }

        Ok(())
    }

    /// Returns the `EI_VERSION` byte.
    #[must_use]
    pub fn ident_version(&self) -> u8 {
        self.e_ident[EI_VERSION]
    }

    /// Returns the `EI_OSABI` byte.
    #[must_use]
    pub fn os_abi(&self) -> u8 {
        self.e_ident[EI_OSABI]
    }

    /// Returns the `EI_ABIVERSION` byte.
    #[must_use]
    pub fn abi_version(&self) -> u8 {
        self.e_ident[EI_ABIVERSION]
    }

    /// Returns the classified object file type.
    #[must_use]
    pub fn elf_type(&self) -> ElfType {
        ElfType::from(self.e_type)
    }
}

fn check_entry_size(record: &'static str, expected: usize, found: u16) -> Result<(), ElfError> {
    if usize::from(found) == expected {
        Ok(())
    } else {
        Err(ElfError::LayoutMismatch {
            record,
            expected: expected as u64,
            found: u64::from(found),
        })
    }
}

/// Decodes and validates the file header of `source`.
///
/// This is the shallow pipeline: magic, class, header fields and table
/// geometry. No table is read.
///
/// # Errors
///
/// Any [`ElfError`] produced by [`Elf64Header::parse`] or
/// [`Elf64Header::check_tables`], or [`ElfError::IoFailure`] if the source
/// fails a read.
pub fn decode_header<R: Read + Seek>(source: &mut ByteSource<R>) -> Result<Elf64Header, ElfError> {
    let prefix = source.read_prefix(ELF64_EHDR_SIZE)?;
    let header = Elf64Header::parse(&prefix)?;
    header.check_tables(source.len())?;
    Ok(header)
}

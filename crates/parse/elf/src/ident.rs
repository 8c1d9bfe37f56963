//! ELF identification: magic, class and data encoding.
//!
//! Also provides the explicit-width field readers used by every record
//! decoder. Byte order always comes from `EI_DATA`, never from the host.

use crate::error::ElfError;

/// ELF magic bytes: `\x7fELF`.
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// Size of the `e_ident` array.
pub const EI_NIDENT: usize = 16;

/// Index of the class byte in `e_ident`.
pub const EI_CLASS: usize = 4;

/// Index of the data encoding byte in `e_ident`.
pub const EI_DATA: usize = 5;

/// Index of the identification version byte in `e_ident`.
pub const EI_VERSION: usize = 6;

/// Index of the OS/ABI byte in `e_ident`.
pub const EI_OSABI: usize = 7;

/// Index of the ABI version byte in `e_ident`.
pub const EI_ABIVERSION: usize = 8;

/// ELF class: 32-bit.
pub const ELFCLASS32: u8 = 1;

/// ELF class: 64-bit.
pub const ELFCLASS64: u8 = 2;

/// ELF data encoding: little-endian.
pub const ELFDATA2LSB: u8 = 1;

/// ELF data encoding: big-endian.
pub const ELFDATA2MSB: u8 = 2;

/// Word size declared by `EI_CLASS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    /// `ELFCLASS32`.
    Elf32,
    /// `ELFCLASS64`.
    Elf64,
}

impl ElfClass {
    /// Returns the raw `EI_CLASS` value.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Elf32 => ELFCLASS32,
            Self::Elf64 => ELFCLASS64,
        }
    }

    /// Returns the word size in bits.
    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            Self::Elf32 => 32,
            Self::Elf64 => 64,
        }
    }
}

/// Byte order declared by `EI_DATA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// `ELFDATA2LSB`.
    Little,
    /// `ELFDATA2MSB`.
    Big,
}

/// Copy `N` bytes starting at `off` into an array.
///
/// # Panics
///
/// Panics if `off + N > data.len()`. Callers must bounds-check first.
fn array_at<const N: usize>(data: &[u8], off: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[off..off + N]);
    out
}

impl Endian {
    /// Decodes an `EI_DATA` byte.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::UnsupportedEncoding`] for anything other than
    /// `ELFDATA2LSB` or `ELFDATA2MSB`.
    pub fn from_byte(data: u8) -> Result<Self, ElfError> {
        match data {
            ELFDATA2LSB => Ok(Self::Little),
            ELFDATA2MSB => Ok(Self::Big),
            _ => Err(ElfError::UnsupportedEncoding { data }),
        }
    }

    /// Returns the raw `EI_DATA` value.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Little => ELFDATA2LSB,
            Self::Big => ELFDATA2MSB,
        }
    }

    /// Read a `u16` from `data` at byte offset `off`.
    ///
    /// # Panics
    ///
    /// Panics if `off + 2 > data.len()`.
    #[must_use]
    pub fn read_u16(self, data: &[u8], off: usize) -> u16 {
        let bytes = array_at(data, off);
        match self {
            Self::Little => u16::from_le_bytes(bytes),
            Self::Big => u16::from_be_bytes(bytes),
        }
    }

    /// Read a `u32` from `data` at byte offset `off`.
    ///
    /// # Panics
    ///
    /// Panics if `off + 4 > data.len()`.
    #[must_use]
    pub fn read_u32(self, data: &[u8], off: usize) -> u32 {
        let bytes = array_at(data, off);
        match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        }
    }

    /// Read a `u64` from `data` at byte offset `off`.
    ///
    /// # Panics
    ///
    /// Panics if `off + 8 > data.len()`.
    #[must_use]
    pub fn read_u64(self, data: &[u8], off: usize) -> u64 {
        let bytes = array_at(data, off);
        match self {
            Self::Little => u64::from_le_bytes(bytes),
            Self::Big => u64::from_be_bytes(bytes),
        }
    }

    /// Read an `i64` from `data` at byte offset `off`.
    ///
    /// # Panics
    ///
    /// Panics if `off + 8 > data.len()`.
    #[must_use]
    pub fn read_i64(self, data: &[u8], off: usize) -> i64 {
        let bytes = array_at(data, off);
        match self {
            Self::Little => i64::from_le_bytes(bytes),
            Self::Big => i64::from_be_bytes(bytes),
        }
    }
}

/// Checks the 4-byte ELF signature at the start of `bytes`.
///
/// # Errors
///
/// Returns [`ElfError::NotElf`] if fewer than four bytes are present or they
/// do not equal `\x7fELF`.
pub fn check_magic(bytes: &[u8]) -> Result<(), ElfError> {
    match bytes.first_chunk::<4>() {
        Some(magic) if *magic == ELF_MAGIC => Ok(()),
        _ => Err(ElfError::NotElf {
            found: bytes[..bytes.len().min(4)].to_vec(),
        }),
    }
}

/// Validates the ELF signature and determines the word size.
///
/// Only the first five bytes are inspected.
///
/// # Errors
///
/// Returns [`ElfError::NotElf`] on a signature mismatch,
/// [`ElfError::TruncatedTable`] if the class byte is missing, and
/// [`ElfError::UnsupportedClass`] if `EI_CLASS` is neither 1 nor 2.
pub fn validate(bytes: &[u8]) -> Result<ElfClass, ElfError> {
    check_magic(bytes)?;
    let Some(&class) = bytes.get(EI_CLASS) else {
        return Err(ElfError::TruncatedTable {
            offset: EI_CLASS as u64,
            size: 1,
            source_len: bytes.len() as u64,
        });
    };
    match class {
        ELFCLASS32 => Ok(ElfClass::Elf32),
        ELFCLASS64 => Ok(ElfClass::Elf64),
        _ => Err(ElfError::UnsupportedClass { class }),
    }
}

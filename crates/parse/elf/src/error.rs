//! Errors reported by the decoder.
//!
//! Every variant that stems from malformed input carries the offending
//! bytes, offsets or sizes so a front end can print a precise diagnostic.

use core::fmt;
use std::io;

/// Errors that can occur while decoding an ELF64 image.
#[derive(Debug)]
pub enum ElfError {
    /// The source does not start with `\x7fELF`.
    ///
    /// `found` holds up to the first four bytes that were present.
    NotElf {
        /// The leading bytes of the source.
        found: Vec<u8>,
    },
    /// `EI_CLASS` is not `ELFCLASS64`.
    UnsupportedClass {
        /// The raw `EI_CLASS` byte.
        class: u8,
    },
    /// `EI_DATA` is neither `ELFDATA2LSB` nor `ELFDATA2MSB`.
    UnsupportedEncoding {
        /// The raw `EI_DATA` byte.
        data: u8,
    },
    /// A declared entry size disagrees with the fixed record size.
    LayoutMismatch {
        /// Which record kind was being decoded.
        record: &'static str,
        /// The size this decoder expects.
        expected: u64,
        /// The size the file declares.
        found: u64,
    },
    /// A table or region extends past the end of the source, or a region's
    /// size is not a whole number of entries.
    TruncatedTable {
        /// Start of the region in the file.
        offset: u64,
        /// Declared size of the region in bytes.
        size: u64,
        /// Total length of the source.
        source_len: u64,
    },
    /// A string reference points at or beyond the end of its table.
    OffsetOutOfRange {
        /// The offending offset.
        offset: u64,
        /// Length of the string table.
        len: u64,
    },
    /// No NUL byte follows a string reference before the table ends.
    UnterminatedString {
        /// Offset of the string within its table.
        offset: u64,
    },
    /// A referenced name is not valid UTF-8.
    InvalidUtf8 {
        /// Offset of the string within its table.
        offset: u64,
    },
    /// The dynamic string table could not be matched to a section.
    ///
    /// `addr` is the `DT_STRTAB` address, or `None` if the dynamic table
    /// has no `DT_STRTAB` entry at all.
    UnresolvedStringTable {
        /// The `DT_STRTAB` virtual address, if present.
        addr: Option<u64>,
    },
    /// A section index field points outside the section header table.
    BadSectionIndex {
        /// The offending index.
        index: u64,
        /// Number of sections in the table.
        count: u64,
    },
    /// The byte source failed a read or seek.
    IoFailure(io::Error),
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotElf { found } => {
                write!(f, "not an ELF file (magic bytes:")?;
                if found.is_empty() {
                    write!(f, " <empty>")?;
                }
                for byte in found {
                    write!(f, " {byte:#04x}")?;
                }
                write!(f, ")")
            }
            Self::UnsupportedClass { class } => {
                write!(f, "unsupported ELF class {class} (expected 2, ELFCLASS64)")
            }
            Self::UnsupportedEncoding { data } => {
                write!(f, "unsupported data encoding {data} (expected 1 or 2)")
            }
            Self::LayoutMismatch {
                record,
                expected,
                found,
            } => write!(
                f,
                "{record} entry size is {found} bytes, expected {expected}"
            ),
            Self::TruncatedTable {
                offset,
                size,
                source_len,
            } => write!(
                f,
                "table at offset {offset:#x} of {size} bytes does not fit in {source_len} bytes"
            ),
            Self::OffsetOutOfRange { offset, len } => {
                write!(f, "string offset {offset:#x} outside table of {len} bytes")
            }
            Self::UnterminatedString { offset } => {
                write!(f, "string at offset {offset:#x} is not NUL-terminated")
            }
            Self::InvalidUtf8 { offset } => {
                write!(f, "string at offset {offset:#x} is not valid UTF-8")
            }
            Self::UnresolvedStringTable { addr: Some(addr) } => {
                write!(f, "no section at dynamic string table address {addr:#x}")
            }
            Self::UnresolvedStringTable { addr: None } => {
                write!(f, "dynamic table references strings but has no DT_STRTAB")
            }
            Self::BadSectionIndex { index, count } => {
                write!(f, "section index {index} out of range ({count} sections)")
            }
            Self::IoFailure(err) => write!(f, "I/O failure: {err}"),
        }
    }
}

impl std::error::Error for ElfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ElfError {
    fn from(err: io::Error) -> Self {
        Self::IoFailure(err)
    }
}

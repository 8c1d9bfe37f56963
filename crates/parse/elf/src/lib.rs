//! Bounds-checked ELF64 structural decoder.
//!
//! Decodes the file header, the section and program header tables, section
//! names, and the dynamic section's library dependencies from any
//! `Read + Seek` source. Every field is read with an explicit width in the
//! byte order the file declares, and every table is checked against the
//! source length before it is read. A run either yields a complete
//! [`DecodedModel`] or the first [`ElfError`] it hit.
//!
//! # Usage
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let file = BufReader::new(File::open("/bin/ls")?);
//! let model = kestrel_elf::decode(file)?;
//! for (shdr, name) in model.sections().iter().zip(model.section_names()) {
//!     println!("{name:<20} {:#x}", shdr.sh_offset);
//! }
//! for lib in model.dependencies() {
//!     println!("needs {lib}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]

pub mod dynamic;
pub mod error;
pub mod header;
pub mod ident;
pub mod model;
pub mod record;
pub mod section;
pub mod segment;

#[cfg(test)]
mod fixture;

pub use dynamic::{DynamicInfo, DynamicTag, Elf64Dyn, find_dependencies};
pub use error::ElfError;
pub use header::{Elf64Header, ElfType};
pub use ident::{ElfClass, Endian};
pub use model::{
    Anomaly, DecodeDepth, DecodeStage, Decoded, DecodedModel, Decoder, decode, decode_header_only,
};
pub use record::ByteSource;
pub use section::{Elf64SectionHeader, SectionFlags, StringTable};
pub use segment::{Elf64ProgramHeader, SegmentFlags};

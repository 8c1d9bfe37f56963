//! The decoding pipeline and the model it produces.
//!
//! [`Decoder`] drives a byte source through a fixed sequence of stages:
//!
//! ```text
//! Unopened -> MagicChecked -> ClassChecked -> HeaderDecoded
//!          -> TablesDecoded -> NamesResolved -> Complete
//! ```
//!
//! Each stage runs only after the previous one succeeded. The first failure
//! aborts the run and no partial model is returned.

use core::fmt;
use std::io::{Read, Seek};

use crate::dynamic::{DynamicInfo, analyze_dynamic};
use crate::error::ElfError;
use crate::header::{ELF64_EHDR_SIZE, Elf64Header, PN_XNUM};
use crate::ident::{self, ElfClass};
use crate::record::{ByteSource, decode_array};
use crate::section::{
    Elf64SectionHeader, SHN_UNDEF, SHN_XINDEX, SHT_NULL, StringTable, check_sections,
    read_section,
};
use crate::segment::{Elf64ProgramHeader, PT_INTERP, PT_LOAD};

/// How far a decode run goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeDepth {
    /// Stop after the file header.
    HeaderOnly,
    /// Decode tables, names and the dynamic section.
    #[default]
    Full,
}

/// Progress of a [`Decoder`] through the pipeline.
///
/// After a failed run the stage is the last one that completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DecodeStage {
    /// Nothing has been read yet.
    Unopened,
    /// The four magic bytes matched.
    MagicChecked,
    /// The class byte is `ELFCLASS64`.
    ClassChecked,
    /// The file header is decoded and its tables fit in the source.
    HeaderDecoded,
    /// Section and program header tables are decoded.
    TablesDecoded,
    /// Section names are resolved.
    NamesResolved,
    /// Dependencies are resolved; the model is complete.
    Complete,
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unopened => "unopened",
            Self::MagicChecked => "magic checked",
            Self::ClassChecked => "class checked",
            Self::HeaderDecoded => "header decoded",
            Self::TablesDecoded => "tables decoded",
            Self::NamesResolved => "names resolved",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Something odd about the file that does not prevent decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    /// A segment's file image is larger than its memory image.
    SegmentFileSizeExceedsMemSize {
        /// Index of the program header.
        index: usize,
        /// `p_filesz`.
        filesz: u64,
        /// `p_memsz`.
        memsz: u64,
    },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SegmentFileSizeExceedsMemSize {
                index,
                filesz,
                memsz,
            } => write!(
                f,
                "segment {index}: file size {filesz:#x} exceeds memory size {memsz:#x}"
            ),
        }
    }
}

/// Everything decoded from one ELF64 file.
///
/// Invariant: `section_names.len() == sections.len()`, and every section
/// that occupies file space lies inside the source it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedModel {
    header: Elf64Header,
    sections: Vec<Elf64SectionHeader>,
    segments: Vec<Elf64ProgramHeader>,
    section_names: Vec<String>,
    dynamic: DynamicInfo,
    interpreter: Option<String>,
    anomalies: Vec<Anomaly>,
}

impl DecodedModel {
    /// The file header.
    #[must_use]
    pub fn header(&self) -> &Elf64Header {
        &self.header
    }

    /// Section headers in file order.
    #[must_use]
    pub fn sections(&self) -> &[Elf64SectionHeader] {
        &self.sections
    }

    /// Program headers in file order.
    #[must_use]
    pub fn segments(&self) -> &[Elf64ProgramHeader] {
        &self.segments
    }

    /// Section names, parallel to [`sections`](Self::sections).
    #[must_use]
    pub fn section_names(&self) -> &[String] {
        &self.section_names
    }

    /// Name of the section at `index`.
    #[must_use]
    pub fn section_name(&self, index: usize) -> Option<&str> {
        self.section_names.get(index).map(String::as_str)
    }

    /// Shared-library dependencies (`DT_NEEDED`) in file order.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dynamic.needed
    }

    /// The decoded dynamic section.
    #[must_use]
    pub fn dynamic(&self) -> &DynamicInfo {
        &self.dynamic
    }

    /// Program interpreter path from `PT_INTERP`, if any.
    #[must_use]
    pub fn interpreter(&self) -> Option<&str> {
        self.interpreter.as_deref()
    }

    /// Non-fatal oddities found while decoding.
    #[must_use]
    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    /// Finds the first section called `name`.
    #[must_use]
    pub fn section_by_name(&self, name: &str) -> Option<(usize, &Elf64SectionHeader)> {
        self.section_names
            .iter()
            .position(|n| n == name)
            .map(|i| (i, &self.sections[i]))
    }

    /// Finds the first section of type `sh_type`.
    #[must_use]
    pub fn find_section_by_type(&self, sh_type: u32) -> Option<(usize, &Elf64SectionHeader)> {
        self.sections
            .iter()
            .enumerate()
            .find(|(_, s)| s.sh_type == sh_type)
    }

    /// Iterates over the `PT_LOAD` segments.
    pub fn load_segments(&self) -> impl Iterator<Item = &Elf64ProgramHeader> {
        self.segments.iter().filter(|p| p.p_type == PT_LOAD)
    }

    /// Reads the bytes of section `index` from `source`.
    ///
    /// `source` must be the file this model was decoded from.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::BadSectionIndex`] if `index` is out of range, or
    /// any error of [`read_section`].
    pub fn section_data<R: Read + Seek>(
        &self,
        source: R,
        index: usize,
    ) -> Result<Vec<u8>, ElfError> {
        let shdr = self.sections.get(index).ok_or(ElfError::BadSectionIndex {
            index: index as u64,
            count: self.sections.len() as u64,
        })?;
        let mut source = ByteSource::new(source)?;
        read_section(&mut source, shdr)
    }

    /// Reads the bytes of the first section called `name`.
    ///
    /// # Errors
    ///
    /// See [`section_data`](Self::section_data).
    pub fn section_data_by_name<R: Read + Seek>(
        &self,
        source: R,
        name: &str,
    ) -> Result<Option<Vec<u8>>, ElfError> {
        match self.section_by_name(name) {
            Some((index, _)) => self.section_data(source, index).map(Some),
            None => Ok(None),
        }
    }
}

/// Result of [`Decoder::decode_to`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A [`DecodeDepth::HeaderOnly`] run.
    Header(Elf64Header),
    /// A [`DecodeDepth::Full`] run.
    Model(Box<DecodedModel>),
}

impl Decoded {
    /// The file header, available at every depth.
    #[must_use]
    pub fn header(&self) -> &Elf64Header {
        match self {
            Self::Header(header) => header,
            Self::Model(model) => model.header(),
        }
    }

    /// The full model, if the run went that far.
    #[must_use]
    pub fn model(&self) -> Option<&DecodedModel> {
        match self {
            Self::Header(_) => None,
            Self::Model(model) => Some(model),
        }
    }
}

/// Stateful decoder over a seekable byte source.
///
/// ```no_run
/// use kestrel_elf::{DecodeStage, Decoder};
///
/// let file = std::fs::File::open("/bin/true")?;
/// let mut decoder = Decoder::new(file);
/// let model = decoder.decode()?;
/// assert_eq!(decoder.stage(), DecodeStage::Complete);
/// println!("{:?}", model.dependencies());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Decoder<R> {
    source: R,
    stage: DecodeStage,
    failed: bool,
}

impl<R: Read + Seek> Decoder<R> {
    /// Creates a decoder in the [`DecodeStage::Unopened`] stage.
    pub fn new(source: R) -> Self {
        Self {
            source,
            stage: DecodeStage::Unopened,
            failed: false,
        }
    }

    /// The last stage the most recent run completed.
    #[must_use]
    pub fn stage(&self) -> DecodeStage {
        self.stage
    }

    /// Returns `true` if the most recent run failed.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Runs the full pipeline.
    ///
    /// # Errors
    ///
    /// The first [`ElfError`] any stage produces.
    pub fn decode(&mut self) -> Result<DecodedModel, ElfError> {
        self.stage = DecodeStage::Unopened;
        let result = run_full(&mut self.source, &mut self.stage);
        self.failed = result.is_err();
        result
    }

    /// Runs the pipeline up to [`DecodeStage::HeaderDecoded`].
    ///
    /// # Errors
    ///
    /// The first [`ElfError`] any stage produces.
    pub fn decode_header(&mut self) -> Result<Elf64Header, ElfError> {
        self.stage = DecodeStage::Unopened;
        let result = ByteSource::new(&mut self.source)
            .and_then(|mut source| run_header(&mut source, &mut self.stage));
        self.failed = result.is_err();
        result
    }

    /// Runs the pipeline to the given depth.
    ///
    /// # Errors
    ///
    /// The first [`ElfError`] any stage produces.
    pub fn decode_to(&mut self, depth: DecodeDepth) -> Result<Decoded, ElfError> {
        match depth {
            DecodeDepth::HeaderOnly => self.decode_header().map(Decoded::Header),
            DecodeDepth::Full => self.decode().map(|model| Decoded::Model(Box::new(model))),
        }
    }

    /// Unwraps the underlying source.
    pub fn into_inner(self) -> R {
        self.source
    }
}

/// Decodes a complete model from `source`.
///
/// # Errors
///
/// See [`Decoder::decode`].
pub fn decode<R: Read + Seek>(source: R) -> Result<DecodedModel, ElfError> {
    Decoder::new(source).decode()
}

/// Decodes only the file header of `source`.
///
/// # Errors
///
/// See [`Decoder::decode_header`].
pub fn decode_header_only<R: Read + Seek>(source: R) -> Result<Elf64Header, ElfError> {
    Decoder::new(source).decode_header()
}

fn run_header<R: Read + Seek>(
    source: &mut ByteSource<R>,
    stage: &mut DecodeStage,
) -> Result<Elf64Header, ElfError> {
    let prefix = source.read_prefix(ELF64_EHDR_SIZE)?;

    ident::check_magic(&prefix)?;
    *stage = DecodeStage::MagicChecked;

    let class = ident::validate(&prefix)?;
    if class != ElfClass::Elf64 {
        return Err(ElfError::UnsupportedClass {
            class: class.to_byte(),
        });
    }
    *stage = DecodeStage::ClassChecked;

    let header = Elf64Header::parse_fields(&prefix)?;
    header.check_tables(source.len())?;
    *stage = DecodeStage::HeaderDecoded;
    Ok(header)
}

fn run_full<R: Read + Seek>(
    source: &mut R,
    stage: &mut DecodeStage,
) -> Result<DecodedModel, ElfError> {
    let mut source = ByteSource::new(source)?;
    let header = run_header(&mut source, stage)?;
    let endian = header.endian;

    let (sections, shstrndx) = decode_sections(&mut source, &header)?;
    let phnum = match (header.e_phnum, sections.first()) {
        (PN_XNUM, Some(first)) => u64::from(first.sh_info),
        (phnum, _) => u64::from(phnum),
    };
    let segments: Vec<Elf64ProgramHeader> = if phnum == 0 {
        Vec::new()
    } else {
        decode_array(
            &mut source,
            header.e_phoff,
            phnum,
            u64::from(header.e_phentsize),
            endian,
        )?
    };
    check_sections(&sections, source.len())?;
    let anomalies = segments
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_suspicious())
        .map(|(index, p)| Anomaly::SegmentFileSizeExceedsMemSize {
            index,
            filesz: p.p_filesz,
            memsz: p.p_memsz,
        })
        .collect();
    *stage = DecodeStage::TablesDecoded;

    let section_names = resolve_section_names(&mut source, &sections, shstrndx)?;
    *stage = DecodeStage::NamesResolved;

    let interpreter = read_interpreter(&mut source, &segments)?;
    let dynamic = analyze_dynamic(&mut source, &sections, endian)?;
    *stage = DecodeStage::Complete;

    Ok(DecodedModel {
        header,
        sections,
        segments,
        section_names,
        dynamic,
        interpreter,
        anomalies,
    })
}

/// Decodes the section header table, resolving extended numbering through
/// section 0. Returns the sections and the real string table index.
fn decode_sections<R: Read + Seek>(
    source: &mut ByteSource<R>,
    header: &Elf64Header,
) -> Result<(Vec<Elf64SectionHeader>, u32), ElfError> {
    let mut shstrndx = u32::from(header.e_shstrndx);
    if header.e_shoff == 0 && header.e_shnum == 0 {
        return Ok((Vec::new(), shstrndx));
    }

    let entry_size = u64::from(header.e_shentsize);
    let mut count = u64::from(header.e_shnum);
    if count == 0 || header.e_shstrndx == SHN_XINDEX {
        let first: Vec<Elf64SectionHeader> =
            decode_array(source, header.e_shoff, 1, entry_size, header.endian)?;
        if let Some(first) = first.first() {
            if count == 0 {
                count = first.sh_size;
            }
            if header.e_shstrndx == SHN_XINDEX {
                shstrndx = first.sh_link;
            }
        }
    }

    let sections = decode_array(source, header.e_shoff, count, entry_size, header.endian)?;
    Ok((sections, shstrndx))
}

fn resolve_section_names<R: Read + Seek>(
    source: &mut ByteSource<R>,
    sections: &[Elf64SectionHeader],
    shstrndx: u32,
) -> Result<Vec<String>, ElfError> {
    if shstrndx == u32::from(SHN_UNDEF) {
        return Ok(vec![String::new(); sections.len()]);
    }
    let strtab_shdr = usize::try_from(shstrndx)
        .ok()
        .and_then(|i| sections.get(i))
        .ok_or(ElfError::BadSectionIndex {
            index: u64::from(shstrndx),
            count: sections.len() as u64,
        })?;
    let data = read_section(source, strtab_shdr)?;
    let strings = StringTable::new(&data);

    sections
        .iter()
        .map(|shdr| {
            if shdr.sh_type == SHT_NULL && shdr.sh_name == 0 {
                Ok(String::new())
            } else {
                strings.resolve(u64::from(shdr.sh_name)).map(str::to_owned)
            }
        })
        .collect()
}

fn read_interpreter<R: Read + Seek>(
    source: &mut ByteSource<R>,
    segments: &[Elf64ProgramHeader],
) -> Result<Option<String>, ElfError> {
    let Some(interp) = segments.iter().find(|p| p.p_type == PT_INTERP) else {
        return Ok(None);
    };
    let data = source.read_at(interp.p_offset, interp.p_filesz)?;
    StringTable::new(&data)
        .resolve(0)
        .map(|path| Some(path.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::{DT_NEEDED, DT_NULL, DT_STRTAB};
    use crate::fixture::{
        ElfImage, SectionSpec, StrictSource, dyn_table, encode_phdr, put_u16, put_u32, put_u64,
    };
    use crate::header::ELF64_SHDR_SIZE;
    use crate::ident::Endian;
    use crate::section::{SHT_DYNAMIC, SHT_NOBITS, SHT_PROGBITS, SHT_STRTAB};
    use std::io::Cursor;

    fn load(offset: u64, filesz: u64, memsz: u64) -> Elf64ProgramHeader {
        Elf64ProgramHeader {
            p_type: PT_LOAD,
            p_flags: 5,
            p_offset: offset,
            p_vaddr: 0x0040_0000 + offset,
            p_paddr: 0x0040_0000 + offset,
            p_filesz: filesz,
            p_memsz: memsz,
            p_align: 0x1000,
        }
    }

    fn dynamic_image(endian: Endian) -> ElfImage {
        ElfImage::new(endian)
            .segment(load(0, 0x40, 0x40))
            .section(".text", SHT_PROGBITS, &[0xc3; 8])
            .section_with(
                SectionSpec::new(".dynstr", SHT_STRTAB, b"\0libc.so.6\0libm.so.6\0").addr(0x400),
            )
            .section_with(
                SectionSpec::new(
                    ".dynamic",
                    SHT_DYNAMIC,
                    &dyn_table(
                        endian,
                        &[(DT_NEEDED, 1), (DT_NEEDED, 11), (DT_STRTAB, 0x400), (DT_NULL, 0)],
                    ),
                )
                .link(2)
                .entsize(16),
            )
    }

    #[test]
    fn full_decode_of_dynamic_executable() {
        for endian in [Endian::Little, Endian::Big] {
            let buf = dynamic_image(endian).build();
            let mut decoder = Decoder::new(Cursor::new(buf));
            let model = decoder.decode().expect("decodes");
            assert_eq!(decoder.stage(), DecodeStage::Complete);
            assert!(!decoder.has_failed());

            assert_eq!(model.header().endian, endian);
            // NULL, .text, .dynstr, .dynamic, .shstrtab
            assert_eq!(model.sections().len(), 5);
            assert_eq!(model.section_names().len(), model.sections().len());
            assert_eq!(model.section_name(0), Some(""));
            assert_eq!(model.section_name(1), Some(".text"));
            assert_eq!(model.section_name(4), Some(".shstrtab"));
            assert_eq!(model.segments().len(), 1);
            assert_eq!(model.load_segments().count(), 1);
            assert_eq!(model.dependencies(), ["libc.so.6", "libm.so.6"]);
            assert!(model.anomalies().is_empty());
            assert_eq!(model.interpreter(), None);
        }
    }

    #[test]
    fn section_lookups() {
        let buf = dynamic_image(Endian::Little).build();
        let model = decode(Cursor::new(buf.clone())).unwrap();

        let (index, dynamic) = model.section_by_name(".dynamic").unwrap();
        assert_eq!(index, 3);
        assert_eq!(dynamic.sh_type, SHT_DYNAMIC);
        assert_eq!(model.find_section_by_type(SHT_STRTAB).unwrap().0, 2);
        assert!(model.section_by_name(".got").is_none());

        let text = model.section_data(Cursor::new(buf.clone()), 1).unwrap();
        assert_eq!(text, [0xc3; 8]);
        assert_eq!(
            model
                .section_data_by_name(Cursor::new(buf.clone()), ".dynstr")
                .unwrap()
                .as_deref(),
            Some(&b"\0libc.so.6\0libm.so.6\0"[..])
        );
        assert_eq!(
            model
                .section_data_by_name(Cursor::new(buf.clone()), ".got")
                .unwrap(),
            None
        );
        assert!(matches!(
            model.section_data(Cursor::new(buf), 99),
            Err(ElfError::BadSectionIndex { index: 99, count: 5 })
        ));
    }

    #[test]
    fn header_only_decode_stops_early() {
        let buf = dynamic_image(Endian::Little).build();
        let mut decoder = Decoder::new(Cursor::new(buf));
        let header = decoder.decode_header().unwrap();
        assert_eq!(header.e_shnum, 5);
        assert_eq!(decoder.stage(), DecodeStage::HeaderDecoded);
        let shallow = decoder.decode_to(DecodeDepth::HeaderOnly).unwrap();
        assert!(shallow.model().is_none());
        assert_eq!(shallow.header(), &header);
        let full = decoder.decode_to(DecodeDepth::Full).unwrap();
        assert_eq!(full.model().unwrap().sections().len(), 5);
        assert_eq!(full.header(), &header);
        assert_eq!(decoder.stage(), DecodeStage::Complete);
    }

    #[test]
    fn header_only_ignores_broken_tables() {
        let mut buf = dynamic_image(Endian::Little).build();
        let shoff = usize::try_from(u64::from_le_bytes(buf[40..48].try_into().unwrap())).unwrap();
        // .dynstr's sh_offset points far past the end.
        put_u64(&mut buf, shoff + 2 * ELF64_SHDR_SIZE + 24, 0xffff_0000, Endian::Little);
        assert!(decode_header_only(Cursor::new(buf.clone())).is_ok());
        assert!(matches!(
            decode(Cursor::new(buf)),
            Err(ElfError::TruncatedTable { offset: 0xffff_0000, .. })
        ));
    }

    #[test]
    fn failure_records_last_completed_stage() {
        let mut buf = dynamic_image(Endian::Little).build();
        buf[4] = 1;
        let mut decoder = Decoder::new(Cursor::new(buf));
        assert!(matches!(
            decoder.decode(),
            Err(ElfError::UnsupportedClass { class: 1 })
        ));
        assert!(decoder.has_failed());
        assert_eq!(decoder.stage(), DecodeStage::MagicChecked);

        let mut decoder = Decoder::new(Cursor::new(b"MZ\x90\x00".to_vec()));
        assert!(matches!(decoder.decode(), Err(ElfError::NotElf { .. })));
        assert_eq!(decoder.stage(), DecodeStage::Unopened);
    }

    #[test]
    fn empty_file_is_not_elf() {
        assert!(matches!(
            decode(Cursor::new(Vec::new())),
            Err(ElfError::NotElf { .. })
        ));
    }

    #[test]
    fn magic_only_is_truncated() {
        let mut decoder = Decoder::new(Cursor::new(b"\x7fELF".to_vec()));
        assert!(matches!(
            decoder.decode(),
            Err(ElfError::TruncatedTable { .. })
        ));
        assert_eq!(decoder.stage(), DecodeStage::MagicChecked);
    }

    #[test]
    fn unresolvable_dependencies_fail_at_the_last_stage() {
        let buf = ElfImage::new(Endian::Little)
            .section_with(
                SectionSpec::new(
                    ".dynamic",
                    SHT_DYNAMIC,
                    &dyn_table(Endian::Little, &[(DT_NEEDED, 1), (DT_STRTAB, 0x7777), (DT_NULL, 0)]),
                ),
            )
            .build();
        let mut decoder = Decoder::new(Cursor::new(buf));
        assert!(matches!(
            decoder.decode(),
            Err(ElfError::UnresolvedStringTable { addr: Some(0x7777) })
        ));
        assert_eq!(decoder.stage(), DecodeStage::NamesResolved);
    }

    #[test]
    fn no_section_table() {
        let buf = ElfImage::new(Endian::Little)
            .segment(load(0, 0x40, 0x40))
            .build();
        let model = decode(Cursor::new(buf)).unwrap();
        assert!(model.sections().is_empty());
        assert!(model.section_names().is_empty());
        assert!(model.dependencies().is_empty());
        assert_eq!(model.segments().len(), 1);
    }

    #[test]
    fn undefined_shstrndx_leaves_names_empty() {
        let mut buf = dynamic_image(Endian::Little).build();
        put_u16(&mut buf, 62, 0, Endian::Little);
        let model = decode(Cursor::new(buf)).unwrap();
        assert!(model.section_names().iter().all(String::is_empty));
        assert_eq!(model.section_names().len(), 5);
    }

    #[test]
    fn shstrndx_out_of_range() {
        let mut buf = dynamic_image(Endian::Little).build();
        put_u16(&mut buf, 62, 9, Endian::Little);
        assert!(matches!(
            decode(Cursor::new(buf)),
            Err(ElfError::BadSectionIndex { index: 9, count: 5 })
        ));
    }

    #[test]
    fn section_name_past_string_table() {
        let (mut buf, layout) = dynamic_image(Endian::Little).build_with_layout();
        // sh_name of .text
        put_u32(
            &mut buf,
            usize::try_from(layout.shoff).unwrap() + ELF64_SHDR_SIZE,
            0x1000,
            Endian::Little,
        );
        assert!(matches!(
            decode(Cursor::new(buf)),
            Err(ElfError::OffsetOutOfRange { offset: 0x1000, .. })
        ));
    }

    #[test]
    fn extended_section_numbering() {
        let (mut buf, layout) = dynamic_image(Endian::Little).build_with_layout();
        let shdr0 = usize::try_from(layout.shoff).unwrap();
        // e_shnum = 0, e_shstrndx = SHN_XINDEX; real values in section 0.
        put_u16(&mut buf, 60, 0, Endian::Little);
        put_u16(&mut buf, 62, SHN_XINDEX, Endian::Little);
        put_u64(&mut buf, shdr0 + 32, 5, Endian::Little);
        put_u32(&mut buf, shdr0 + 40, 4, Endian::Little);
        let model = decode(Cursor::new(buf)).unwrap();
        assert_eq!(model.sections().len(), 5);
        assert_eq!(model.section_name(3), Some(".dynamic"));
        assert_eq!(model.dependencies().len(), 2);
    }

    #[test]
    fn extended_program_header_count() {
        let (mut buf, layout) = dynamic_image(Endian::Little).build_with_layout();
        let shdr0 = usize::try_from(layout.shoff).unwrap();
        put_u16(&mut buf, 56, PN_XNUM, Endian::Little);
        put_u32(&mut buf, shdr0 + 44, 1, Endian::Little);
        let model = decode(Cursor::new(buf)).unwrap();
        assert_eq!(model.segments().len(), 1);
    }

    #[test]
    fn oversized_file_image_is_an_anomaly() {
        let buf = ElfImage::new(Endian::Little)
            .segment(load(0, 0x40, 0x40))
            .segment(load(0, 0x40, 0x10))
            .build();
        let model = decode(Cursor::new(buf)).unwrap();
        assert_eq!(
            model.anomalies(),
            [Anomaly::SegmentFileSizeExceedsMemSize {
                index: 1,
                filesz: 0x40,
                memsz: 0x10
            }]
        );
        assert!(model.anomalies()[0].to_string().contains("segment 1"));
    }

    #[test]
    fn segment_table_past_end_is_truncated() {
        let mut buf = ElfImage::new(Endian::Little)
            .segment(load(0, 0x40, 0x40))
            .build();
        // Claim a second program header that is not there.
        put_u16(&mut buf, 56, 2, Endian::Little);
        assert!(matches!(
            decode(Cursor::new(buf)),
            Err(ElfError::TruncatedTable { offset: 64, size: 112, .. })
        ));
    }

    #[test]
    fn interpreter_path() {
        let interp = b"/lib64/ld-linux-x86-64.so.2\0";
        let (mut buf, layout) = ElfImage::new(Endian::Little)
            .section(".interp", SHT_PROGBITS, interp)
            .build_with_layout();
        let phdr = Elf64ProgramHeader {
            p_type: PT_INTERP,
            p_flags: 4,
            p_offset: layout.section_offsets[1],
            p_vaddr: 0,
            p_paddr: 0,
            p_filesz: interp.len() as u64,
            p_memsz: interp.len() as u64,
            p_align: 1,
        };
        let phoff = buf.len() as u64;
        buf.extend_from_slice(&encode_phdr(&phdr, Endian::Little));
        put_u64(&mut buf, 32, phoff, Endian::Little);
        put_u16(&mut buf, 56, 1, Endian::Little);
        let model = decode(Cursor::new(buf)).unwrap();
        assert_eq!(model.interpreter(), Some("/lib64/ld-linux-x86-64.so.2"));
    }

    #[test]
    fn nobits_sections_are_not_bounds_checked() {
        let buf = ElfImage::new(Endian::Little)
            .section_with(SectionSpec::new(".bss", SHT_NOBITS, b"").size(0x10_0000))
            .build();
        let model = decode(Cursor::new(buf)).unwrap();
        assert_eq!(model.section_by_name(".bss").unwrap().1.sh_size, 0x10_0000);
    }

    #[test]
    fn reader_never_sees_out_of_range_requests() {
        let mut buf = dynamic_image(Endian::Little).build();
        let len = buf.len();
        buf.truncate(len - 8);
        let mut decoder = Decoder::new(StrictSource::new(buf));
        assert!(matches!(
            decoder.decode(),
            Err(ElfError::TruncatedTable { .. })
        ));
        assert_eq!(decoder.stage(), DecodeStage::ClassChecked);
        assert_eq!(decoder.into_inner().reads_past_end(), 0);
    }

    #[test]
    fn section_table_decodes_field_for_field() {
        for endian in [Endian::Little, Endian::Big] {
            let (buf, layout) = ElfImage::new(endian)
                .section(".text", SHT_PROGBITS, &[0xc3; 8])
                .section_with(
                    SectionSpec::new(".data", SHT_PROGBITS, &[1, 2, 3, 4])
                        .addr(0x2000)
                        .link(1)
                        .entsize(4),
                )
                .build_with_layout();
            let section = |sh_name, sh_type, sh_addr, index: usize, sh_size, sh_link, sh_entsize| {
                Elf64SectionHeader {
                    sh_name,
                    sh_type,
                    sh_flags: 0,
                    sh_addr,
                    sh_offset: layout.section_offsets[index],
                    sh_size,
                    sh_link,
                    sh_info: 0,
                    sh_addralign: 1,
                    sh_entsize,
                }
            };
            // .shstrtab = "\0.text\0.data\0.shstrtab\0"
            let expected = [
                ElfImage::null_section(),
                section(1, SHT_PROGBITS, 0, 1, 8, 0, 0),
                section(7, SHT_PROGBITS, 0x2000, 2, 4, 1, 4),
                section(13, SHT_STRTAB, 0, 3, 23, 0, 0),
            ];

            let model = decode(Cursor::new(buf)).unwrap();
            assert_eq!(model.sections(), expected);
            assert_eq!(model.section_names(), ["", ".text", ".data", ".shstrtab"]);
        }
    }
}

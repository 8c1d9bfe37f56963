//! In-memory ELF64 images for unit tests.

use std::io::{self, Read, Seek, SeekFrom};

use crate::header::{
    ELF64_EHDR_SIZE, ELF64_PHDR_SIZE, ELF64_SHDR_SIZE, EM_X86_64, ET_EXEC, Elf64Header,
};
use crate::ident::{EI_CLASS, EI_DATA, EI_NIDENT, EI_VERSION, ELF_MAGIC, ELFCLASS64, Endian};
use crate::section::{Elf64SectionHeader, SHT_NOBITS, SHT_NULL, SHT_STRTAB};
use crate::segment::Elf64ProgramHeader;

pub fn put_u16(buf: &mut [u8], off: usize, v: u16, endian: Endian) {
    let bytes = match endian {
        Endian::Little => v.to_le_bytes(),
        Endian::Big => v.to_be_bytes(),
    };
    buf[off..off + 2].copy_from_slice(&bytes);
}

pub fn put_u32(buf: &mut [u8], off: usize, v: u32, endian: Endian) {
    let bytes = match endian {
        Endian::Little => v.to_le_bytes(),
        Endian::Big => v.to_be_bytes(),
    };
    buf[off..off + 4].copy_from_slice(&bytes);
}

pub fn put_u64(buf: &mut [u8], off: usize, v: u64, endian: Endian) {
    let bytes = match endian {
        Endian::Little => v.to_le_bytes(),
        Endian::Big => v.to_be_bytes(),
    };
    buf[off..off + 8].copy_from_slice(&bytes);
}

pub fn encode_header(hdr: &Elf64Header) -> Vec<u8> {
    let e = hdr.endian;
    let mut buf = vec![0u8; ELF64_EHDR_SIZE];
    buf[..EI_NIDENT].copy_from_slice(&hdr.e_ident);
    put_u16(&mut buf, 16, hdr.e_type, e);
    put_u16(&mut buf, 18, hdr.e_machine, e);
    put_u32(&mut buf, 20, hdr.e_version, e);
    put_u64(&mut buf, 24, hdr.e_entry, e);
    put_u64(&mut buf, 32, hdr.e_phoff, e);
    put_u64(&mut buf, 40, hdr.e_shoff, e);
    put_u32(&mut buf, 48, hdr.e_flags, e);
    put_u16(&mut buf, 52, hdr.e_ehsize, e);
    put_u16(&mut buf, 54, hdr.e_phentsize, e);
    put_u16(&mut buf, 56, hdr.e_phnum, e);
    put_u16(&mut buf, 58, hdr.e_shentsize, e);
    put_u16(&mut buf, 60, hdr.e_shnum, e);
    put_u16(&mut buf, 62, hdr.e_shstrndx, e);
    buf
}

pub fn encode_shdr(shdr: &Elf64SectionHeader, endian: Endian) -> Vec<u8> {
    let mut buf = vec![0u8; ELF64_SHDR_SIZE];
    put_u32(&mut buf, 0, shdr.sh_name, endian);
    put_u32(&mut buf, 4, shdr.sh_type, endian);
    put_u64(&mut buf, 8, shdr.sh_flags, endian);
    put_u64(&mut buf, 16, shdr.sh_addr, endian);
    put_u64(&mut buf, 24, shdr.sh_offset, endian);
    put_u64(&mut buf, 32, shdr.sh_size, endian);
    put_u32(&mut buf, 40, shdr.sh_link, endian);
    put_u32(&mut buf, 44, shdr.sh_info, endian);
    put_u64(&mut buf, 48, shdr.sh_addralign, endian);
    put_u64(&mut buf, 56, shdr.sh_entsize, endian);
    buf
}

pub fn encode_phdr(phdr: &Elf64ProgramHeader, endian: Endian) -> Vec<u8> {
    let mut buf = vec![0u8; ELF64_PHDR_SIZE];
    put_u32(&mut buf, 0, phdr.p_type, endian);
    put_u32(&mut buf, 4, phdr.p_flags, endian);
    put_u64(&mut buf, 8, phdr.p_offset, endian);
    put_u64(&mut buf, 16, phdr.p_vaddr, endian);
    put_u64(&mut buf, 24, phdr.p_paddr, endian);
    put_u64(&mut buf, 32, phdr.p_filesz, endian);
    put_u64(&mut buf, 40, phdr.p_memsz, endian);
    put_u64(&mut buf, 48, phdr.p_align, endian);
    buf
}

/// Encodes `(tag, value)` pairs as a dynamic section body.
pub fn dyn_table(endian: Endian, entries: &[(i64, u64)]) -> Vec<u8> {
    let mut buf = vec![0u8; entries.len() * 16];
    for (i, &(tag, value)) in entries.iter().enumerate() {
        put_u64(&mut buf, i * 16, tag as u64, endian);
        put_u64(&mut buf, i * 16 + 8, value, endian);
    }
    buf
}

/// One section to place in an [`ElfImage`].
#[derive(Clone)]
pub struct SectionSpec {
    name: String,
    sh_type: u32,
    data: Vec<u8>,
    addr: u64,
    size: Option<u64>,
    link: u32,
    entsize: u64,
}

impl SectionSpec {
    pub fn new(name: &str, sh_type: u32, data: &[u8]) -> Self {
        Self {
            name: name.to_owned(),
            sh_type,
            data: data.to_vec(),
            addr: 0,
            size: None,
            link: 0,
            entsize: 0,
        }
    }

    pub fn addr(mut self, addr: u64) -> Self {
        self.addr = addr;
        self
    }

    /// Overrides `sh_size`; the data written to the file is unchanged.
    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn link(mut self, link: u32) -> Self {
        self.link = link;
        self
    }

    pub fn entsize(mut self, entsize: u64) -> Self {
        self.entsize = entsize;
        self
    }
}

/// File offsets chosen by [`ElfImage::build_with_layout`].
pub struct Layout {
    /// `sh_offset` of every section, indexed like the section table.
    pub section_offsets: Vec<u64>,
    /// Offset of the section header table (0 when there is none).
    pub shoff: u64,
}

/// Builder for a minimal, well-formed ELF64 image.
///
/// File layout: header, program headers, section data (8-aligned), the
/// generated `.shstrtab`, then the section header table. Section 0 is the
/// NULL section and `.shstrtab` is always last. With no sections added the
/// image has no section table at all.
pub struct ElfImage {
    endian: Endian,
    sections: Vec<SectionSpec>,
    segments: Vec<Elf64ProgramHeader>,
}

impl ElfImage {
    pub fn new(endian: Endian) -> Self {
        Self {
            endian,
            sections: Vec::new(),
            segments: Vec::new(),
        }
    }

    pub fn null_section() -> Elf64SectionHeader {
        Elf64SectionHeader {
            sh_name: 0,
            sh_type: SHT_NULL,
            sh_flags: 0,
            sh_addr: 0,
            sh_offset: 0,
            sh_size: 0,
            sh_link: 0,
            sh_info: 0,
            sh_addralign: 0,
            sh_entsize: 0,
        }
    }

    pub fn section(self, name: &str, sh_type: u32, data: &[u8]) -> Self {
        self.section_with(SectionSpec::new(name, sh_type, data))
    }

    pub fn section_with(mut self, spec: SectionSpec) -> Self {
        self.sections.push(spec);
        self
    }

    pub fn segment(mut self, phdr: Elf64ProgramHeader) -> Self {
        self.segments.push(phdr);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.build_with_layout().0
    }

    pub fn build_with_layout(self) -> (Vec<u8>, Layout) {
        let endian = self.endian;
        let mut buf = vec![0u8; ELF64_EHDR_SIZE];

        let phoff = if self.segments.is_empty() {
            0
        } else {
            buf.len() as u64
        };
        for phdr in &self.segments {
            buf.extend_from_slice(&encode_phdr(phdr, endian));
        }

        let mut shdrs = Vec::new();
        let mut layout = Layout {
            section_offsets: Vec::new(),
            shoff: 0,
        };
        if !self.sections.is_empty() {
            let mut shstrtab = vec![0u8];
            let mut sections = self.sections;
            sections.push(SectionSpec::new(".shstrtab", SHT_STRTAB, &[]));
            let last = sections.len() - 1;

            let mut name_offsets = Vec::new();
            for spec in &sections {
                name_offsets.push(shstrtab.len() as u32);
                shstrtab.extend_from_slice(spec.name.as_bytes());
                shstrtab.push(0);
            }
            sections[last].data = shstrtab;

            shdrs.push(Self::null_section());
            layout.section_offsets.push(0);
            for (spec, name) in sections.iter().zip(name_offsets) {
                align_to(&mut buf, 8);
                let offset = buf.len() as u64;
                if spec.sh_type != SHT_NOBITS {
                    buf.extend_from_slice(&spec.data);
                }
                layout.section_offsets.push(offset);
                shdrs.push(Elf64SectionHeader {
                    sh_name: name,
                    sh_type: spec.sh_type,
                    sh_flags: 0,
                    sh_addr: spec.addr,
                    sh_offset: offset,
                    sh_size: spec.size.unwrap_or(spec.data.len() as u64),
                    sh_link: spec.link,
                    sh_info: 0,
                    sh_addralign: 1,
                    sh_entsize: spec.entsize,
                });
            }

            align_to(&mut buf, 8);
            layout.shoff = buf.len() as u64;
            for shdr in &shdrs {
                buf.extend_from_slice(&encode_shdr(shdr, endian));
            }
        }

        let mut e_ident = [0u8; EI_NIDENT];
        e_ident[..4].copy_from_slice(&ELF_MAGIC);
        e_ident[EI_CLASS] = ELFCLASS64;
        e_ident[EI_DATA] = endian.to_byte();
        e_ident[EI_VERSION] = 1;
        let header = Elf64Header {
            e_ident,
            endian,
            e_type: ET_EXEC,
            e_machine: EM_X86_64,
            e_version: 1,
            e_entry: 0x0040_1000,
            e_phoff: phoff,
            e_shoff: layout.shoff,
            e_flags: 0,
            e_ehsize: ELF64_EHDR_SIZE as u16,
            e_phentsize: ELF64_PHDR_SIZE as u16,
            e_phnum: self.segments.len() as u16,
            e_shentsize: ELF64_SHDR_SIZE as u16,
            e_shnum: shdrs.len() as u16,
            e_shstrndx: shdrs.len().saturating_sub(1) as u16,
        };
        buf[..ELF64_EHDR_SIZE].copy_from_slice(&encode_header(&header));
        (buf, layout)
    }
}

fn align_to(buf: &mut Vec<u8>, align: usize) {
    let padded = buf.len().next_multiple_of(align);
    buf.resize(padded, 0);
}

/// A reader that fails any read extending past its data, and counts them.
///
/// Decoding code must bounds-check before reading, so tests assert that
/// [`reads_past_end`](Self::reads_past_end) stays at zero.
pub struct StrictSource {
    data: Vec<u8>,
    pos: u64,
    fail_reads: bool,
    past_end: usize,
}

impl StrictSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            fail_reads: false,
            past_end: 0,
        }
    }

    /// A source whose every read fails; seeks still work.
    pub fn failing(data: Vec<u8>) -> Self {
        Self {
            fail_reads: true,
            ..Self::new(data)
        }
    }

    pub fn reads_past_end(&self) -> usize {
        self.past_end
    }
}

impl Read for StrictSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fail_reads {
            return Err(io::Error::other("injected read failure"));
        }
        let len = self.data.len() as u64;
        let end = self.pos + buf.len() as u64;
        if end > len {
            self.past_end += 1;
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of strict source",
            ));
        }
        let start = self.pos as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        self.pos = end;
        Ok(buf.len())
    }
}

impl Seek for StrictSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.data.len() as u64;
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(d) => len.checked_add_signed(d),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
        };
        self.pos = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start")
        })?;
        Ok(self.pos)
    }
}

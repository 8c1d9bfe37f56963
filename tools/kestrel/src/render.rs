//! Human-readable tables in the style of `readelf`.

use std::fmt::{self, Write};

use kestrel_elf::dynamic::{self, DynamicTag, find_dynamic_section};
use kestrel_elf::header::{self, Elf64Header};
use kestrel_elf::section::{self, SectionFlags};
use kestrel_elf::segment::{self, SegmentFlags};
use kestrel_elf::{Decoded, DecodedModel, ElfType, Endian};

use crate::cli::Views;

/// Machine name for `e_machine`.
pub fn machine_name(machine: u16) -> &'static str {
    match machine {
        header::EM_386 => "Intel 80386",
        header::EM_ARM => "ARM",
        header::EM_X86_64 => "Advanced Micro Devices X86-64",
        header::EM_PPC64 => "PowerPC64",
        header::EM_S390 => "IBM S/390",
        header::EM_AARCH64 => "AArch64",
        header::EM_RISCV => "RISC-V",
        _ => "<unknown>",
    }
}

/// Short and long names for the object file type.
pub fn type_name(elf_type: ElfType) -> &'static str {
    match elf_type {
        ElfType::None => "NONE (None)",
        ElfType::Relocatable => "REL (Relocatable file)",
        ElfType::Executable => "EXEC (Executable file)",
        ElfType::SharedObject => "DYN (Shared object file)",
        ElfType::Core => "CORE (Core file)",
        ElfType::Other(_) => "<unknown>",
    }
}

/// Name for an `EI_OSABI` byte.
pub fn os_abi_name(os_abi: u8) -> &'static str {
    match os_abi {
        0 => "UNIX - System V",
        1 => "UNIX - HP-UX",
        2 => "UNIX - NetBSD",
        3 => "UNIX - GNU",
        6 => "UNIX - Solaris",
        9 => "UNIX - FreeBSD",
        12 => "UNIX - OpenBSD",
        97 => "ARM",
        255 => "Standalone App",
        _ => "<unknown>",
    }
}

/// Name for a section type, or its hex value if unknown.
pub fn section_type_name(sh_type: u32) -> String {
    let name = match sh_type {
        section::SHT_NULL => "NULL",
        section::SHT_PROGBITS => "PROGBITS",
        section::SHT_SYMTAB => "SYMTAB",
        section::SHT_STRTAB => "STRTAB",
        section::SHT_RELA => "RELA",
        section::SHT_HASH => "HASH",
        section::SHT_DYNAMIC => "DYNAMIC",
        section::SHT_NOTE => "NOTE",
        section::SHT_NOBITS => "NOBITS",
        section::SHT_REL => "REL",
        section::SHT_SHLIB => "SHLIB",
        section::SHT_DYNSYM => "DYNSYM",
        section::SHT_INIT_ARRAY => "INIT_ARRAY",
        section::SHT_FINI_ARRAY => "FINI_ARRAY",
        section::SHT_PREINIT_ARRAY => "PREINIT_ARRAY",
        section::SHT_GROUP => "GROUP",
        section::SHT_SYMTAB_SHNDX => "SYMTAB_SHNDX",
        section::SHT_GNU_HASH => "GNU_HASH",
        section::SHT_GNU_VERDEF => "VERDEF",
        section::SHT_GNU_VERNEED => "VERNEED",
        section::SHT_GNU_VERSYM => "VERSYM",
        other => return format!("{other:#x}"),
    };
    name.to_owned()
}

/// Name for a segment type, or its hex value if unknown.
pub fn segment_type_name(p_type: u32) -> String {
    let name = match p_type {
        segment::PT_NULL => "NULL",
        segment::PT_LOAD => "LOAD",
        segment::PT_DYNAMIC => "DYNAMIC",
        segment::PT_INTERP => "INTERP",
        segment::PT_NOTE => "NOTE",
        segment::PT_SHLIB => "SHLIB",
        segment::PT_PHDR => "PHDR",
        segment::PT_TLS => "TLS",
        segment::PT_GNU_EH_FRAME => "GNU_EH_FRAME",
        segment::PT_GNU_STACK => "GNU_STACK",
        segment::PT_GNU_RELRO => "GNU_RELRO",
        segment::PT_GNU_PROPERTY => "GNU_PROPERTY",
        other => return format!("{other:#x}"),
    };
    name.to_owned()
}

/// Name for a dynamic tag, or its hex value if unknown.
pub fn dynamic_tag_name(tag: i64) -> String {
    let name = match tag {
        dynamic::DT_NULL => "NULL",
        dynamic::DT_NEEDED => "NEEDED",
        dynamic::DT_PLTRELSZ => "PLTRELSZ",
        dynamic::DT_PLTGOT => "PLTGOT",
        dynamic::DT_HASH => "HASH",
        dynamic::DT_STRTAB => "STRTAB",
        dynamic::DT_SYMTAB => "SYMTAB",
        dynamic::DT_RELA => "RELA",
        dynamic::DT_RELASZ => "RELASZ",
        dynamic::DT_RELAENT => "RELAENT",
        dynamic::DT_STRSZ => "STRSZ",
        dynamic::DT_SYMENT => "SYMENT",
        dynamic::DT_INIT => "INIT",
        dynamic::DT_FINI => "FINI",
        dynamic::DT_SONAME => "SONAME",
        dynamic::DT_RPATH => "RPATH",
        dynamic::DT_SYMBOLIC => "SYMBOLIC",
        dynamic::DT_REL => "REL",
        dynamic::DT_RELSZ => "RELSZ",
        dynamic::DT_RELENT => "RELENT",
        dynamic::DT_PLTREL => "PLTREL",
        dynamic::DT_DEBUG => "DEBUG",
        dynamic::DT_TEXTREL => "TEXTREL",
        dynamic::DT_JMPREL => "JMPREL",
        dynamic::DT_BIND_NOW => "BIND_NOW",
        dynamic::DT_INIT_ARRAY => "INIT_ARRAY",
        dynamic::DT_FINI_ARRAY => "FINI_ARRAY",
        dynamic::DT_INIT_ARRAYSZ => "INIT_ARRAYSZ",
        dynamic::DT_FINI_ARRAYSZ => "FINI_ARRAYSZ",
        dynamic::DT_RUNPATH => "RUNPATH",
        dynamic::DT_FLAGS => "FLAGS",
        dynamic::DT_GNU_HASH => "GNU_HASH",
        dynamic::DT_VERSYM => "VERSYM",
        dynamic::DT_RELACOUNT => "RELACOUNT",
        dynamic::DT_FLAGS_1 => "FLAGS_1",
        dynamic::DT_VERNEED => "VERNEED",
        dynamic::DT_VERNEEDNUM => "VERNEEDNUM",
        other => return format!("{other:#x}"),
    };
    name.to_owned()
}

/// Section flags as a `readelf` key string, e.g. `WA` or `AX`.
///
/// Bits without a letter are shown as a trailing `x`.
pub fn section_flags_string(flags: SectionFlags) -> String {
    const KEY: [(SectionFlags, char); 11] = [
        (SectionFlags::WRITE, 'W'),
        (SectionFlags::ALLOC, 'A'),
        (SectionFlags::EXECINSTR, 'X'),
        (SectionFlags::MERGE, 'M'),
        (SectionFlags::STRINGS, 'S'),
        (SectionFlags::INFO_LINK, 'I'),
        (SectionFlags::LINK_ORDER, 'L'),
        (SectionFlags::OS_NONCONFORMING, 'O'),
        (SectionFlags::GROUP, 'G'),
        (SectionFlags::TLS, 'T'),
        (SectionFlags::COMPRESSED, 'C'),
    ];
    let mut out: String = KEY
        .iter()
        .filter(|(flag, _)| flags.contains(*flag))
        .map(|&(_, c)| c)
        .collect();
    if !SectionFlags::from_bits_retain(flags.bits() & !SectionFlags::all().bits()).is_empty() {
        out.push('x');
    }
    out
}

/// Segment permissions as `RWE`, with `' '` for a cleared bit.
pub fn segment_flags_string(flags: SegmentFlags) -> String {
    [
        (SegmentFlags::R, 'R'),
        (SegmentFlags::W, 'W'),
        (SegmentFlags::X, 'E'),
    ]
    .iter()
    .map(|&(flag, c)| if flags.contains(flag) { c } else { ' ' })
    .collect()
}

/// Writes every selected view of `decoded`, separated by blank lines.
pub fn render(out: &mut impl Write, decoded: &Decoded, views: Views) -> fmt::Result {
    let mut blocks = Vec::new();
    if views.file_header {
        let mut block = String::new();
        file_header(&mut block, decoded.header())?;
        blocks.push(block);
    }
    if let Some(model) = decoded.model() {
        let writers: [(bool, fn(&mut String, &DecodedModel) -> fmt::Result); 3] = [
            (views.sections, sections),
            (views.segments, segments),
            (views.dynamic, dynamic_section),
        ];
        for (enabled, write_view) in writers {
            if enabled {
                let mut block = String::new();
                write_view(&mut block, model)?;
                blocks.push(block);
            }
        }
    }
    write!(out, "{}", blocks.join("\n"))
}

fn field(out: &mut impl Write, label: &str, value: impl fmt::Display) -> fmt::Result {
    writeln!(out, "  {:<35}{value}", format!("{label}:"))
}

/// Writes the file header block.
pub fn file_header(out: &mut impl Write, hdr: &Elf64Header) -> fmt::Result {
    writeln!(out, "ELF Header:")?;
    write!(out, "  Magic:  ")?;
    for byte in hdr.e_ident {
        write!(out, " {byte:02x}")?;
    }
    writeln!(out)?;

    let data = match hdr.endian {
        Endian::Little => "2's complement, little endian",
        Endian::Big => "2's complement, big endian",
    };
    field(out, "Class", format_args!("ELF64"))?;
    field(out, "Data", format_args!("{data}"))?;
    field(
        out,
        "Version",
        format_args!(
            "{}{}",
            hdr.ident_version(),
            if hdr.ident_version() == 1 { " (current)" } else { "" }
        ),
    )?;
    field(out, "OS/ABI", format_args!("{}", os_abi_name(hdr.os_abi())))?;
    field(out, "ABI Version", format_args!("{}", hdr.abi_version()))?;
    field(out, "Type", format_args!("{}", type_name(hdr.elf_type())))?;
    field(out, "Machine", format_args!("{}", machine_name(hdr.e_machine)))?;
    field(out, "Version", format_args!("{:#x}", hdr.e_version))?;
    field(out, "Entry point address", format_args!("{:#x}", hdr.e_entry))?;
    field(
        out,
        "Start of program headers",
        format_args!("{} (bytes into file)", hdr.e_phoff),
    )?;
    field(
        out,
        "Start of section headers",
        format_args!("{} (bytes into file)", hdr.e_shoff),
    )?;
    field(out, "Flags", format_args!("{:#x}", hdr.e_flags))?;
    field(out, "Size of this header", format_args!("{} (bytes)", hdr.e_ehsize))?;
    field(
        out,
        "Size of program headers",
        format_args!("{} (bytes)", hdr.e_phentsize),
    )?;
    field(out, "Number of program headers", format_args!("{}", hdr.e_phnum))?;
    field(
        out,
        "Size of section headers",
        format_args!("{} (bytes)", hdr.e_shentsize),
    )?;
    field(out, "Number of section headers", format_args!("{}", hdr.e_shnum))?;
    field(
        out,
        "Section header string table index",
        format_args!("{}", hdr.e_shstrndx),
    )
}

/// Writes the section header table.
pub fn sections(out: &mut impl Write, model: &DecodedModel) -> fmt::Result {
    if model.sections().is_empty() {
        return writeln!(out, "There are no sections in this file.");
    }
    writeln!(out, "Section Headers:")?;
    writeln!(
        out,
        "  [Nr] {:<17} {:<15} {:<16} {:<8} {:<16} {:<16} {:>5} {:>4} {:>4} {:>5}",
        "Name", "Type", "Address", "Offset", "Size", "EntSize", "Flags", "Link", "Info", "Align"
    )?;
    for (i, (shdr, name)) in model
        .sections()
        .iter()
        .zip(model.section_names())
        .enumerate()
    {
        writeln!(
            out,
            "  [{i:>2}] {name:<17} {:<15} {:016x} {:08x} {:016x} {:016x} {:>5} {:>4} {:>4} {:>5}",
            section_type_name(shdr.sh_type),
            shdr.sh_addr,
            shdr.sh_offset,
            shdr.sh_size,
            shdr.sh_entsize,
            section_flags_string(shdr.flags()),
            shdr.sh_link,
            shdr.sh_info,
            shdr.sh_addralign,
        )?;
    }
    writeln!(out, "Key to Flags:")?;
    writeln!(
        out,
        "  W (write), A (alloc), X (execute), M (merge), S (strings), I (info),"
    )?;
    writeln!(
        out,
        "  L (link order), O (extra OS processing required), G (group), T (TLS),"
    )?;
    writeln!(out, "  C (compressed), x (unknown)")
}

/// Writes the program header table.
pub fn segments(out: &mut impl Write, model: &DecodedModel) -> fmt::Result {
    if model.segments().is_empty() {
        return writeln!(out, "There are no program headers in this file.");
    }
    writeln!(out, "Program Headers:")?;
    writeln!(
        out,
        "  {:<14} {:<18} {:<18} {:<18} {:<18} {:<18} {:<3} {}",
        "Type", "Offset", "VirtAddr", "PhysAddr", "FileSiz", "MemSiz", "Flg", "Align"
    )?;
    for phdr in model.segments() {
        write!(
            out,
            "  {:<14} {:#018x} {:#018x} {:#018x} {:#018x} {:#018x} {} {:#x}",
            segment_type_name(phdr.p_type),
            phdr.p_offset,
            phdr.p_vaddr,
            phdr.p_paddr,
            phdr.p_filesz,
            phdr.p_memsz,
            segment_flags_string(phdr.flags()),
            phdr.p_align,
        )?;
        if phdr.is_suspicious() {
            write!(out, "  [suspicious: file size exceeds memory size]")?;
        }
        writeln!(out)?;
        if phdr.p_type == segment::PT_INTERP {
            if let Some(interp) = model.interpreter() {
                writeln!(out, "      [Requesting program interpreter: {interp}]")?;
            }
        }
    }
    Ok(())
}

/// Writes the dynamic section and the dependency list.
pub fn dynamic_section(out: &mut impl Write, model: &DecodedModel) -> fmt::Result {
    let Some((_, shdr)) = find_dynamic_section(model.sections()) else {
        return writeln!(out, "There is no dynamic section in this file.");
    };
    let info = model.dynamic();
    writeln!(
        out,
        "Dynamic section at offset {:#x} contains {} entries:",
        shdr.sh_offset,
        info.entries.len()
    )?;
    writeln!(out, "  {:<18} {:<20} Name/Value", "Tag", "Type")?;

    let mut needed = info.needed.iter();
    for entry in &info.entries {
        write!(
            out,
            "  {:#018x} {:<20} ",
            entry.d_tag,
            format!("({})", dynamic_tag_name(entry.d_tag))
        )?;
        match entry.tag() {
            DynamicTag::Needed => match needed.next() {
                Some(lib) => writeln!(out, "Shared library: [{lib}]")?,
                None => writeln!(out, "{:#x}", entry.d_un)?,
            },
            DynamicTag::SoName => {
                writeln!(out, "Library soname: [{}]", info.soname.as_deref().unwrap_or(""))?;
            }
            DynamicTag::RPath => {
                writeln!(out, "Library rpath: [{}]", info.rpath.as_deref().unwrap_or(""))?;
            }
            DynamicTag::RunPath => {
                writeln!(out, "Library runpath: [{}]", info.runpath.as_deref().unwrap_or(""))?;
            }
            DynamicTag::StrSz => writeln!(out, "{} (bytes)", entry.d_un)?,
            _ => writeln!(out, "{:#x}", entry.d_un)?,
        }
    }

    writeln!(out)?;
    if model.dependencies().is_empty() {
        return writeln!(out, "No shared library dependencies.");
    }
    writeln!(out, "Shared library dependencies:")?;
    for lib in model.dependencies() {
        writeln!(out, "  {lib}")?;
    }
    Ok(())
}

//! Machine-readable JSON report.

use std::path::Path;

use anyhow::Result;
use kestrel_elf::{Decoded, DecodedModel, Elf64Header, Endian};
use serde::Serialize;

use crate::cli::Views;
use crate::render;

/// Top-level JSON document.
#[derive(Serialize)]
pub struct Report {
    pub path: String,
    pub header: HeaderReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<SectionReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<SegmentReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<DynamicReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<String>,
}

#[derive(Serialize)]
pub struct HeaderReport {
    pub class: &'static str,
    pub endian: &'static str,
    pub os_abi: u8,
    pub abi_version: u8,
    #[serde(rename = "type")]
    pub elf_type: u16,
    pub type_name: &'static str,
    pub machine: u16,
    pub machine_name: &'static str,
    pub version: u32,
    pub entry: u64,
    pub phoff: u64,
    pub shoff: u64,
    pub flags: u32,
    pub phnum: u16,
    pub shnum: u16,
    pub shstrndx: u16,
}

#[derive(Serialize)]
pub struct SectionReport {
    pub index: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub sh_type: String,
    pub flags: String,
    pub addr: u64,
    pub offset: u64,
    pub size: u64,
    pub link: u32,
    pub info: u32,
    pub align: u64,
    pub entsize: u64,
}

#[derive(Serialize)]
pub struct SegmentReport {
    #[serde(rename = "type")]
    pub p_type: String,
    pub flags: String,
    pub offset: u64,
    pub vaddr: u64,
    pub paddr: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub align: u64,
    pub suspicious: bool,
}

#[derive(Serialize)]
pub struct DynamicReport {
    pub needed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpath: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runpath: Option<String>,
    pub entries: Vec<DynamicEntryReport>,
}

#[derive(Serialize)]
pub struct DynamicEntryReport {
    pub tag: String,
    pub value: u64,
}

impl Report {
    /// Builds the report for the views selected on the command line.
    pub fn new(path: &Path, decoded: &Decoded, views: Views) -> Self {
        let model = decoded.model();
        let pick = |enabled: bool| model.filter(|_| enabled);
        Self {
            path: path.display().to_string(),
            header: HeaderReport::new(decoded.header()),
            sections: pick(views.sections).map(section_reports),
            segments: pick(views.segments).map(segment_reports),
            dynamic: pick(views.dynamic).map(DynamicReport::new),
            interpreter: model.and_then(DecodedModel::interpreter).map(str::to_owned),
            anomalies: model
                .map(|m| m.anomalies().iter().map(ToString::to_string).collect())
                .unwrap_or_default(),
        }
    }

    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl HeaderReport {
    fn new(hdr: &Elf64Header) -> Self {
        Self {
            class: "ELF64",
            endian: match hdr.endian {
                Endian::Little => "little",
                Endian::Big => "big",
            },
            os_abi: hdr.os_abi(),
            abi_version: hdr.abi_version(),
            elf_type: hdr.e_type,
            type_name: render::type_name(hdr.elf_type()),
            machine: hdr.e_machine,
            machine_name: render::machine_name(hdr.e_machine),
            version: hdr.e_version,
            entry: hdr.e_entry,
            phoff: hdr.e_phoff,
            shoff: hdr.e_shoff,
            flags: hdr.e_flags,
            phnum: hdr.e_phnum,
            shnum: hdr.e_shnum,
            shstrndx: hdr.e_shstrndx,
        }
    }
}

fn section_reports(model: &DecodedModel) -> Vec<SectionReport> {
    model
        .sections()
        .iter()
        .zip(model.section_names())
        .enumerate()
        .map(|(index, (shdr, name))| SectionReport {
            index,
            name: name.clone(),
            sh_type: render::section_type_name(shdr.sh_type),
            flags: render::section_flags_string(shdr.flags()),
            addr: shdr.sh_addr,
            offset: shdr.sh_offset,
            size: shdr.sh_size,
            link: shdr.sh_link,
            info: shdr.sh_info,
            align: shdr.sh_addralign,
            entsize: shdr.sh_entsize,
        })
        .collect()
}

fn segment_reports(model: &DecodedModel) -> Vec<SegmentReport> {
    model
        .segments()
        .iter()
        .map(|phdr| SegmentReport {
            p_type: render::segment_type_name(phdr.p_type),
            flags: render::segment_flags_string(phdr.flags()).replace(' ', ""),
            offset: phdr.p_offset,
            vaddr: phdr.p_vaddr,
            paddr: phdr.p_paddr,
            filesz: phdr.p_filesz,
            memsz: phdr.p_memsz,
            align: phdr.p_align,
            suspicious: phdr.is_suspicious(),
        })
        .collect()
}

impl DynamicReport {
    fn new(model: &DecodedModel) -> Self {
        let info = model.dynamic();
        Self {
            needed: info.needed.clone(),
            soname: info.soname.clone(),
            rpath: info.rpath.clone(),
            runpath: info.runpath.clone(),
            entries: info
                .entries
                .iter()
                .map(|e| DynamicEntryReport {
                    tag: render::dynamic_tag_name(e.d_tag),
                    value: e.d_un,
                })
                .collect(),
        }
    }
}

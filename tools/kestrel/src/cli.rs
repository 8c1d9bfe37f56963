//! Command-line interface definitions for kestrel.

use std::path::PathBuf;

use clap::Parser;

/// Inspect the structure of 64-bit ELF files.
#[derive(Parser)]
#[command(name = "kestrel", version, about)]
pub struct Cli {
    /// ELF file to decode.
    pub path: PathBuf,

    /// Show the file header.
    #[arg(long = "file-header", short = 'H')]
    pub file_header: bool,

    /// Show the section header table.
    #[arg(long, short = 'S')]
    pub sections: bool,

    /// Show the program header table.
    #[arg(long, short = 'l')]
    pub segments: bool,

    /// Show the dynamic section and library dependencies.
    #[arg(long, short = 'd')]
    pub dynamic: bool,

    /// Show everything (the default when no other view is selected).
    #[arg(long, short = 'a')]
    pub all: bool,

    /// Only decode and show the file header; tables are never read.
    #[arg(long, conflicts_with_all = ["sections", "segments", "dynamic", "all"])]
    pub header_only: bool,

    /// Print a JSON report instead of tables.
    #[arg(long)]
    pub json: bool,

    /// Suppress everything but the requested output and errors.
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,

    /// Report pipeline stages and timings.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

/// Which parts of the model to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Views {
    pub file_header: bool,
    pub sections: bool,
    pub segments: bool,
    pub dynamic: bool,
}

impl Cli {
    /// Resolves the view toggles; no toggle at all means everything.
    pub fn views(&self) -> Views {
        if self.header_only {
            return Views {
                file_header: true,
                sections: false,
                segments: false,
                dynamic: false,
            };
        }
        let none_selected = !(self.file_header || self.sections || self.segments || self.dynamic);
        let all = self.all || none_selected;
        Views {
            file_header: all || self.file_header,
            sections: all || self.sections,
            segments: all || self.segments,
            dynamic: all || self.dynamic,
        }
    }
}

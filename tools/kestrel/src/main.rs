//! kestrel: structural ELF64 inspector.
//!
//! Pipeline: open file → decode (magic, class, header, tables, names,
//! dependencies) → render tables or a JSON report.
//!
//! Exit codes: 0 on success, 1 when the file cannot be read, 2 when it is
//! not a supported ELF64 file, 3 when its structure is malformed.

mod cli;
mod render;
mod report;
mod source;
mod verbose;

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use kestrel_elf::{DecodeDepth, Decoder, ElfError};

use verbose::{Timer, vprintln};

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    verbose::init(cli.quiet, cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: &cli::Cli) -> Result<()> {
    let views = cli.views();
    let depth = if cli.header_only {
        DecodeDepth::HeaderOnly
    } else {
        DecodeDepth::Full
    };

    vprintln!("decoding {} ({depth:?})", cli.path.display());
    let reader = source::open(&cli.path)?;
    let mut decoder = Decoder::new(reader);
    let outcome = {
        let _t = Timer::start("decode");
        decoder.decode_to(depth)
    };
    verbose::stage(decoder.stage(), decoder.has_failed());
    let decoded = outcome.with_context(|| format!("failed to decode {}", cli.path.display()))?;

    if let Some(model) = decoded.model() {
        vprintln!(
            "  {} sections, {} segments, {} dependencies",
            model.sections().len(),
            model.segments().len(),
            model.dependencies().len()
        );
        verbose::anomalies(model.anomalies());
    }

    if cli.json {
        let report = report::Report::new(&cli.path, &decoded, views);
        println!("{}", report.to_json()?);
    } else {
        let mut out = String::new();
        render::render(&mut out, &decoded, views)?;
        print!("{out}");
    }
    Ok(())
}

/// Maps an error chain to the process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ElfError>() {
        Some(
            ElfError::NotElf { .. }
            | ElfError::UnsupportedClass { .. }
            | ElfError::UnsupportedEncoding { .. },
        ) => 2,
        Some(ElfError::IoFailure(_)) => 1,
        Some(_) => 3,
        None if err.downcast_ref::<io::Error>().is_some() => 1,
        None => 3,
    }
}

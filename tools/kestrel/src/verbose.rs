//! Diagnostics on stderr, filtered by `-q` / `-v`.
//!
//! Quiet prints nothing but errors. The default level adds anomaly
//! warnings. Verbose adds the decoder stage reached and timings. Stdout is
//! left to the requested views so `--json` stays parseable.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use kestrel_elf::{Anomaly, DecodeStage};

/// Diagnostic level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet = 0,
    Default = 1,
    Verbose = 2,
}

impl Verbosity {
    /// Picks the level from the command-line switches; `-q` wins.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, true) => Self::Verbose,
            (false, false) => Self::Default,
        }
    }

    fn from_u8(level: u8) -> Self {
        match level {
            0 => Self::Quiet,
            2 => Self::Verbose,
            _ => Self::Default,
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(Verbosity::Default as u8);

pub fn init(quiet: bool, verbose: bool) {
    LEVEL.store(Verbosity::from_flags(quiet, verbose) as u8, Ordering::Relaxed);
}

fn level() -> Verbosity {
    Verbosity::from_u8(LEVEL.load(Ordering::Relaxed))
}

pub fn is_verbose() -> bool {
    level() >= Verbosity::Verbose
}

pub fn is_quiet() -> bool {
    level() == Verbosity::Quiet
}

/// `eprintln!` at verbose level only.
macro_rules! vprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::is_verbose() {
            eprintln!($($arg)*);
        }
    };
}

pub(crate) use vprintln;

/// `eprintln!` unless quiet.
macro_rules! dprintln {
    ($($arg:tt)*) => {
        if !$crate::verbose::is_quiet() {
            eprintln!($($arg)*);
        }
    };
}

/// Describes where the decoder stopped.
pub fn stage_line(stage: DecodeStage, failed: bool) -> String {
    if failed {
        format!("  failed after stage: {stage}")
    } else {
        format!("  reached stage: {stage}")
    }
}

/// Logs the decoder's final stage at verbose level.
pub fn stage(stage: DecodeStage, failed: bool) {
    vprintln!("{}", stage_line(stage, failed));
}

/// Prints one warning line per anomaly unless quiet.
pub fn anomalies(anomalies: &[Anomaly]) {
    for anomaly in anomalies {
        dprintln!("warning: {anomaly}");
    }
}

/// Prints how long a phase took when dropped, at verbose level.
pub struct Timer {
    phase: &'static str,
    start: Instant,
}

impl Timer {
    pub fn start(phase: &'static str) -> Self {
        Self {
            phase,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        vprintln!("  {} took {:.1?}", self.phase, self.start.elapsed());
    }
}

//! Progress output on stderr.
//!
//! Stdout stays empty so the pipeline log only shows what the run reports
//! here and the final error, if any.

use std::fmt::Display;

/// Stderr logger gated by the `-v` count and `--quiet`.
#[derive(Clone, Copy, Debug)]
pub struct Logger {
    verbose: u8,
    quiet: bool,
}

impl Logger {
    /// `verbose` is the `-v` count; `quiet` suppresses everything.
    pub fn new(verbose: u8, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// A logger that prints nothing.
    pub fn silent() -> Self {
        Self::new(0, true)
    }

    /// Always shown unless quiet.
    pub fn info(&self, message: impl Display) {
        if !self.quiet {
            eprintln!("{message}");
        }
    }

    /// Shown when at least `level` `-v` flags were given.
    pub fn verbose(&self, level: u8, message: impl Display) {
        if !self.quiet && self.verbose >= level {
            eprintln!("{message}");
        }
    }

    /// The `-v` count.
    pub fn level(&self) -> u8 {
        self.verbose
    }
}


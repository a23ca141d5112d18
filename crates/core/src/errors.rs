//! All errors that can be _generated_ by the compiler.
//!
//! Compilation never stops at the first problem: diagnostics are collected into [Diagnostics]
//! and the program is thrown away afterwards if there were any. Only a missing source file, or
//! hitting the diagnostic limit, stops compilation early.
use std::fmt;

use mmap_jit::MappingError;
use thiserror::Error;

/// How many diagnostics may be recorded before compilation gives up.
pub const DEFAULT_DIAGNOSTIC_LIMIT: usize = 20;

/// A single problem found while compiling, and the source line it was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostic {
    reason: Reason,
    line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// The source text could not be loaded at all.
    NoSource,
    /// A `[` that is never closed.
    UnmatchedOpenLoop,
    /// A `]` with no `[` to close.
    UnmatchedCloseLoop,
}

/// Every diagnostic recorded during one compilation, in the order they were found.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
    limit: usize,
    fatal: bool,
}

impl Diagnostic {
    pub fn new(reason: Reason, line: u32) -> Self {
        Diagnostic { reason, line }
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    /// 1-based line number; 0 when the diagnostic is not tied to a line.
    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn is_fatal(&self) -> bool {
        self.reason.is_fatal()
    }

    pub fn message(&self) -> &'static str {
        self.reason.message()
    }

    pub fn message_identifier(&self) -> u32 {
        self.reason.message_identifier()
    }
}

impl Reason {
    pub fn message_identifier(&self) -> u32 {
        use Reason::*;
        match self {
            NoSource => 0x001,
            UnmatchedOpenLoop => 0x002,
            UnmatchedCloseLoop => 0x003,
        }
    }

    pub fn message(&self) -> &'static str {
        use Reason::*;
        match self {
            NoSource => "no source loaded",
            UnmatchedOpenLoop => "missing ']'. Check that each '[' has a matching ']'",
            UnmatchedCloseLoop => "']' but no matching '['",
        }
    }

    /// Fatal reasons stop compilation immediately, regardless of how many diagnostics there are.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Reason::NoSource)
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::with_limit(DEFAULT_DIAGNOSTIC_LIMIT)
    }

    /// A limit of 0 is treated as 1: the first diagnostic is always fatal.
    pub fn with_limit(limit: usize) -> Self {
        Diagnostics {
            diagnostics: Vec::new(),
            limit: limit.max(1),
            fatal: false,
        }
    }

    /// Records a diagnostic. Returns `true` when compilation must stop now, either because the
    /// diagnostic is fatal by itself, or because the limit has been reached.
    pub fn record(&mut self, reason: Reason, line: u32) -> bool {
        self.push(Diagnostic::new(reason, line))
    }

    pub fn push(&mut self, diagnostic: Diagnostic) -> bool {
        tracing::debug!(
            reason = ?diagnostic.reason(),
            line = diagnostic.line(),
            "recorded diagnostic"
        );
        self.diagnostics.push(diagnostic);
        self.fatal |= diagnostic.is_fatal() || self.limit_reached();

        self.fatal
    }

    /// Makes everything recorded so far fatal, whatever the reasons were.
    pub fn escalate(&mut self) {
        self.fatal = true;
    }

    /// Whether compilation was (or must be) stopped early.
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    /// Whether so many diagnostics were recorded that the lot is considered fatal.
    pub fn limit_reached(&self) -> bool {
        self.diagnostics.len() >= self.limit
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn count_of(&self, reason: Reason) -> usize {
        self.iter().filter(|d| d.reason() == reason).count()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics::new()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::error::Error for Diagnostic {}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "error[{:04x}]: line {}: {}",
            self.message_identifier(),
            self.line,
            self.message()
        )
    }
}

impl std::error::Error for Diagnostics {}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for diagnostic in self.iter() {
            writeln!(f, "{}", diagnostic)?;
        }
        if self.limit_reached() {
            write!(f, "{} errors, considered fatal...", self.len())?;
        }

        Ok(())
    }
}

/// Anything that stops a compiled program from being turned into running machine code, or from
/// getting a tape to run on.
#[derive(Debug, Clone, Error)]
pub enum JitError {
    /// The code did not fit in the space reserved for it.
    #[error("machine code needs at least {needed} bytes, but only {capacity} were reserved")]
    EncodingCapacityExceeded { needed: usize, capacity: usize },
    /// A loop body is too large for a 32-bit relative jump.
    #[error("jump of {distance} bytes does not fit in a 32-bit offset")]
    JumpOutOfRange { distance: i64 },
    /// Code or tape memory could not be mapped.
    #[error("{0}")]
    Preparation(#[from] MappingError),
    #[error("native code can only run on x86-64 Unix hosts")]
    UnsupportedArchitecture,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_source_is_fatal_by_itself() {
        let mut diagnostics = Diagnostics::new();
        assert!(!diagnostics.record(Reason::UnmatchedCloseLoop, 1));
        assert!(!diagnostics.record(Reason::UnmatchedOpenLoop, 2));
        assert!(diagnostics.record(Reason::NoSource, 0));
        assert!(diagnostics.is_fatal());
    }

    #[test]
    fn reaching_the_limit_is_fatal() {
        let mut diagnostics = Diagnostics::with_limit(3);
        assert!(!diagnostics.record(Reason::UnmatchedCloseLoop, 1));
        assert!(!diagnostics.record(Reason::UnmatchedCloseLoop, 2));
        assert!(diagnostics.record(Reason::UnmatchedCloseLoop, 3));
        assert!(diagnostics.limit_reached());
    }

    #[test]
    fn limit_is_at_least_one() {
        assert_eq!(DEFAULT_DIAGNOSTIC_LIMIT, Diagnostics::new().limit());
        assert_eq!(1, Diagnostics::with_limit(0).limit());

        let mut diagnostics = Diagnostics::with_limit(0);
        assert!(diagnostics.record(Reason::UnmatchedCloseLoop, 1));
    }

    #[test]
    fn keeps_generation_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.record(Reason::UnmatchedCloseLoop, 7);
        diagnostics.record(Reason::UnmatchedOpenLoop, 2);

        let lines: Vec<_> = diagnostics.iter().map(Diagnostic::line).collect();
        assert_eq!(vec![7, 2], lines);
    }

    #[test]
    fn display_includes_identifier_and_line() {
        let diagnostic = Diagnostic::new(Reason::UnmatchedCloseLoop, 12);
        assert_eq!(
            "error[0003]: line 12: ']' but no matching '['",
            diagnostic.to_string()
        );
    }
}

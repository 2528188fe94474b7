//! Diagnostic accumulation for the Volta compiler core.
//!
//! No phase aborts on the first error; instead each phase records diagnostics
//! into a shared sink and the driver checks [`Diagnostics::has_errors`] between
//! phases.

use crate::{Position, Span, VoltaError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity level for diagnostic messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A diagnostic message with an optional location and a severity.
///
/// `Note` diagnostics may carry no span — they attach context to a preceding
/// diagnostic rather than pointing at a fresh location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self { severity: Severity::Error, message: message.into(), span: Some(span) }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self { severity: Severity::Warning, message: message.into(), span: Some(span) }
    }

    pub fn info(message: impl Into<String>, span: Span) -> Self {
        Self { severity: Severity::Info, message: message.into(), span: Some(span) }
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self { severity: Severity::Note, message: message.into(), span: None }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Collection of diagnostic messages produced by a single phase or compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
    suppressed: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, subsequent `error`/`error_at` calls are silently dropped.
    /// Used by the parser to run a speculative sub-parse (e.g. the
    /// struct-literal-vs-block heuristic) without polluting the real
    /// diagnostic count.
    pub fn suppress_errors(&mut self, flag: bool) {
        self.suppressed = flag;
    }

    pub fn error(&mut self, message: impl Into<String>, line: u32, column: u32) {
        if self.suppressed {
            return;
        }
        let pos = Position::new(line, column, 0);
        self.messages.push(Diagnostic::error(message, Span::single(pos, 0)));
    }

    pub fn error_at(&mut self, message: impl Into<String>, span: Span) {
        if self.suppressed {
            return;
        }
        self.messages.push(Diagnostic::error(message, span));
    }

    pub fn warning(&mut self, message: impl Into<String>, line: u32, column: u32) {
        let pos = Position::new(line, column, 0);
        self.messages.push(Diagnostic::warning(message, Span::single(pos, 0)));
    }

    pub fn warning_at(&mut self, message: impl Into<String>, span: Span) {
        self.messages.push(Diagnostic::warning(message, span));
    }

    pub fn info(&mut self, message: impl Into<String>, line: u32, column: u32) {
        let pos = Position::new(line, column, 0);
        self.messages.push(Diagnostic::info(message, Span::single(pos, 0)));
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.messages.push(Diagnostic::note(message));
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|d| d.severity == Severity::Error).count()
    }

    pub fn warning_count(&self) -> usize {
        self.messages.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.messages.extend(other.messages);
    }

    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter().filter(|d| d.severity == Severity::Error)
    }

    /// Emit every recorded diagnostic to `out`, in the format:
    /// `severity: message` followed by a `--> filename:line:column` location
    /// line when the diagnostic has a span, then a trailing summary line.
    /// `filenames` is indexed by a span's `file_id` (the module index a
    /// multi-module driver assigned it); a diagnostic whose `file_id` has no
    /// entry falls back to `<unknown>`.
    pub fn print_all(&self, out: &mut dyn fmt::Write, filenames: &[String]) -> fmt::Result {
        for diag in &self.messages {
            writeln!(out, "{}", diag)?;
            if let Some(span) = diag.span {
                let filename = filenames.get(span.file_id as usize).map(String::as_str).unwrap_or("<unknown>");
                writeln!(out, "  --> {}:{}:{}", filename, span.start.line, span.start.column)?;
            }
        }
        if !self.messages.is_empty() {
            writeln!(
                out,
                "{} error(s), {} warning(s)",
                self.error_count(),
                self.warning_count()
            )?;
        }
        Ok(())
    }
}

impl From<VoltaError> for Diagnostic {
    fn from(error: VoltaError) -> Self {
        let span = Span::single(Position::start(), 0);
        Diagnostic::error(error.to_string(), span)
    }
}

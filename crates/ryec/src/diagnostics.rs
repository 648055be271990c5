//! Diagnostic reporting for the Rye compiler.
//!
//! Errors are reported rustc-style to stderr with ANSI colors and an
//! optional source position. The core propagates `Diagnostic` values via
//! `DiagnosticResult`; the driver converts them into `anyhow` errors at
//! the boundary.
//!
//! Internal invariant violations (emission-stack underflow, imbalanced
//! scopes, missing attribute indices) are not `Diagnostic`s: they must
//! never fire on well-resolved input and are asserted with `panic!` so
//! tests can target them.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::ast::Position;

/// How severe a diagnostic is. Warnings are printed but do not abort
/// compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A position-anchored compiler diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Source anchor; `None` for synthesized nodes and driver errors.
    pub position: Option<Position>,
    /// Optional follow-up hint printed as a `note:` line.
    pub note: Option<String>,
}

/// Result alias used throughout the compiler core. Diagnostics are
/// boxed so the `Ok` path stays a single machine word wide.
pub type DiagnosticResult<T> = Result<T, Box<Diagnostic>>;

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            message: message.into(),
            position: None,
            note: None,
        }
    }

    /// An error without a source anchor.
    pub fn error(message: impl Into<String>) -> Box<Self> {
        Box::new(Diagnostic::new(Severity::Error, message))
    }

    /// An error anchored at `position`.
    pub fn error_at(position: &Position, message: impl Into<String>) -> Box<Self> {
        let mut d = Diagnostic::new(Severity::Error, message);
        if !position.is_none() {
            d.position = Some(position.clone());
        }
        Box::new(d)
    }

    pub fn with_note(mut self: Box<Self>, note: impl Into<String>) -> Box<Self> {
        self.note = Some(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.position {
            Some(pos) => write!(f, "{}: {}", pos, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

static DIAGNOSTICS_ENABLED: AtomicBool = AtomicBool::new(true);

/// Prints a diagnostic to stderr unless suppression is active.
pub fn emit_diagnostic(d: &Diagnostic) {
    if !DIAGNOSTICS_ENABLED.load(Ordering::SeqCst) {
        return;
    }
    let reset = "\x1b[0m";
    let (color, tag) = match d.severity {
        Severity::Error => ("\x1b[31m", "error"),
        Severity::Warning => ("\x1b[33m", "warning"),
    };
    eprintln!("{}{}{}: {}", color, tag, reset, d.message);
    if let Some(pos) = &d.position {
        eprintln!("  --> {}", pos);
    }
    if let Some(note) = &d.note {
        let blue = "\x1b[34m";
        eprintln!("{}note{}: {}", blue, reset, note);
    }
}

/// Temporarily silences diagnostic output. Used by the test suite to
/// keep stderr clean while exercising error paths. The previous state is
/// restored when the guard drops.
pub fn suppress() -> SuppressGuard {
    let prev = DIAGNOSTICS_ENABLED.swap(false, Ordering::SeqCst);
    SuppressGuard { prev }
}

pub struct SuppressGuard {
    prev: bool,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        DIAGNOSTICS_ENABLED.store(self.prev, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_position() {
        let pos = Position::new("demo.rye", 3, 7);
        let d = Diagnostic::error_at(&pos, "unknown identifier `zap`");
        assert_eq!(d.to_string(), "demo.rye:3:7: unknown identifier `zap`");
    }

    #[test]
    fn synthetic_position_is_dropped() {
        let d = Diagnostic::error_at(&Position::none(), "boom");
        assert!(d.position.is_none());
    }
}

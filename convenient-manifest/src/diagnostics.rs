//! Non-fatal diagnostics reported while reading manifests and resolving bundles.
//!
//! Components never print. They report into a [`DiagnosticSink`] handed to
//! them by the caller, which decides whether to log, collect, or both.

use std::fmt;

/// Category of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiagnosticKind {
    /// A manifest line that is neither a header, a continuation nor blank.
    UnrecognizedLine,
    /// A continuation line with no preceding header.
    OrphanContinuation,
    /// A header that appears more than once in one manifest.
    DuplicateHeader,
    /// A `;`-separated token without a `=`.
    UnparsableDirective,
    /// Two discovered bundles share a symbolic name.
    NameConflict,
    /// The manifest's `Bundle-SymbolicName` differs from the discovered name.
    SymbolicNameMismatch,
    /// A `Require-Bundle` name that no registered bundle carries.
    UnresolvedBundle,
    /// A `Fragment-Host` name that no registered bundle carries.
    UnresolvedHost,
    /// An `Import-Package` name that no parsed bundle exports.
    UnresolvedPackage,
    /// The manifest exists but could not be read.
    UnreadableManifest,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UnrecognizedLine => "unrecognized line",
            Self::OrphanContinuation => "orphan continuation",
            Self::DuplicateHeader => "duplicate header",
            Self::UnparsableDirective => "unparsable directive",
            Self::NameConflict => "name conflict",
            Self::SymbolicNameMismatch => "symbolic name mismatch",
            Self::UnresolvedBundle => "unresolved bundle",
            Self::UnresolvedHost => "unresolved fragment host",
            Self::UnresolvedPackage => "unresolved package",
            Self::UnreadableManifest => "unreadable manifest",
        };
        f.write_str(name)
    }
}

/// A single non-fatal finding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    /// What went wrong
    pub kind: DiagnosticKind,
    /// File or bundle the finding refers to
    pub origin: String,
    /// 1-based line number inside `origin`, when known
    pub line: Option<usize>,
    /// Human-readable description
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic without line information.
    pub fn new(kind: DiagnosticKind, origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin: origin.into(),
            line: None,
            message: message.into(),
        }
    }

    /// Attach a line number.
    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}({}): {}", self.origin, line, self.message),
            None => write!(f, "{}: {}", self.origin, self.message),
        }
    }
}

/// Receiver of diagnostics.
pub trait DiagnosticSink {
    /// Report one diagnostic.
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Collects diagnostics in memory.
impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Forwards every diagnostic to `tracing` at warn level and keeps a count per kind.
#[derive(Debug, Default)]
pub struct TracingSink {
    reported: Vec<DiagnosticKind>,
}

impl TracingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of diagnostics reported so far.
    pub fn count(&self) -> usize {
        self.reported.len()
    }

    /// Number of diagnostics of one kind reported so far.
    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.reported.iter().filter(|k| **k == kind).count()
    }
}

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(kind = %diagnostic.kind, "{}", diagnostic);
        self.reported.push(diagnostic.kind);
    }
}

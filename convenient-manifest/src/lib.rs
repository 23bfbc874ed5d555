//! Parser for OSGi bundle manifests (`META-INF/MANIFEST.MF`).
//!
//! The manifest format is a block of `Header: value` lines where long values
//! wrap onto continuation lines that start with a single space. Values of
//! dependency headers such as `Require-Bundle` are comma-separated lists whose
//! items carry `;key:=value` directives.
//!
//! Parsing never fails. Malformed input is reported through a
//! [`DiagnosticSink`] and the parser continues with whatever it could read.
//!
//! # Example
//!
//! ```
//! use convenient_manifest::{Manifest, Visibility};
//!
//! let text = "Bundle-Version: 1.0.0\n\
//!             Require-Bundle: org.eclipse.core.runtime;visibility:=reexport,\n \
//!              org.eclipse.ui\n";
//!
//! let mut diagnostics: Vec<convenient_manifest::Diagnostic> = Vec::new();
//! let manifest = Manifest::parse(text, "demo/MANIFEST.MF", &mut diagnostics);
//!
//! let required = manifest.values_with_directives("Require-Bundle", &mut diagnostics);
//! assert_eq!(required.len(), 2);
//! assert_eq!(required[0].value, "org.eclipse.core.runtime");
//! assert_eq!(required[0].directives.visibility(), Some(Visibility::Reexport));
//! assert!(diagnostics.is_empty());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod diagnostics;
pub mod directives;
pub mod header_block;
pub mod manifest;

pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, TracingSink};
pub use directives::{Directives, Resolution, ValueWithDirectives, Visibility};
pub use header_block::HeaderBlock;
pub use manifest::{Manifest, headers};

//! Line-level parsing of a manifest into an ordered header map.

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

/// Whether a header's content is thrown away together with its continuation lines.
///
/// Per-entry sections of signed jars start with `Name:` and carry digests;
/// neither says anything about dependencies.
fn is_reserved(name: &str) -> bool {
    name == "Name" || name.ends_with("-Digest")
}

#[allow(clippy::expect_used)]
static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z0-9_-]+)[ \t]*:").expect("header pattern is valid"));

/// Find the first `Header-Name :` on the line and return the name and the
/// untrimmed rest. Text before the name is skipped.
fn split_header_line(line: &str) -> Option<(&str, &str)> {
    let captures = HEADER.captures(line)?;
    let name = captures.get(1)?.as_str();
    let end = captures.get(0)?.end();
    Some((name, &line[end..]))
}

/// Ordered mapping of header name to raw (continuation-joined) value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeaderBlock {
    headers: IndexMap<String, String>,
}

impl HeaderBlock {
    /// Parse manifest text. `label` names the file in diagnostics.
    pub fn parse(text: &str, label: &str, sink: &mut dyn DiagnosticSink) -> Self {
        let mut headers: IndexMap<String, String> = IndexMap::new();
        // Continuation lines extend this header, reserved ones included.
        let mut last_header: Option<String> = None;

        for (index, line) in text.lines().enumerate() {
            let lineno = index + 1;

            if line.trim().is_empty() {
                continue;
            }

            if line.starts_with(char::is_whitespace) {
                let Some(header) = last_header.as_deref() else {
                    sink.report(
                        Diagnostic::new(
                            DiagnosticKind::OrphanContinuation,
                            label,
                            format!("line starts with whitespace: \"{line}\""),
                        )
                        .at_line(lineno),
                    );
                    continue;
                };
                if is_reserved(header) {
                    continue;
                }
                // Exactly one leading whitespace character marks the continuation.
                let mut chars = line.chars();
                chars.next();
                if let Some(value) = headers.get_mut(header) {
                    value.push_str(chars.as_str());
                }
                continue;
            }

            if let Some((name, value)) = split_header_line(line) {
                last_header = Some(name.to_string());
                if is_reserved(name) {
                    continue;
                }
                let value = value.trim_start().to_string();
                if headers.insert(name.to_string(), value).is_some() {
                    sink.report(
                        Diagnostic::new(
                            DiagnosticKind::DuplicateHeader,
                            label,
                            format!("duplicate header \"{name}\""),
                        )
                        .at_line(lineno),
                    );
                }
                continue;
            }

            sink.report(
                Diagnostic::new(
                    DiagnosticKind::UnrecognizedLine,
                    label,
                    format!("unrecognized line \"{line}\""),
                )
                .at_line(lineno),
            );
        }

        Self { headers }
    }

    /// Raw value of a header.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Whether the header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// Headers in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether no header was read.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

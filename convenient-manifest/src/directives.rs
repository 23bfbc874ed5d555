//! Splitting header values into a primary token and `;key:=value` directives.

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""[^"]*""#).expect("quoted-string pattern is valid"));

/// Remove every double-quoted substring, quotes included.
///
/// Version ranges such as `"[1.0,2.0)"` contain commas and semicolons that must
/// not split the value. Their content is lost.
pub fn strip_quoted(raw: &str) -> String {
    QUOTED.replace_all(raw, "").into_owned()
}

/// `visibility` directive of a `Require-Bundle` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Dependency classes stay internal to the requiring bundle (OSGi default).
    Private,
    /// Dependency classes are re-exported to the requiring bundle's consumers.
    Reexport,
}

impl Visibility {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "private" => Some(Self::Private),
            "reexport" => Some(Self::Reexport),
            _ => None,
        }
    }
}

/// `resolution` directive of a `Require-Bundle` or `Import-Package` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// The reference must resolve (OSGi default).
    Mandatory,
    /// The reference may be missing.
    Optional,
}

impl Resolution {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "mandatory" => Some(Self::Mandatory),
            "optional" => Some(Self::Optional),
            _ => None,
        }
    }
}

/// Directive and attribute map of one header value item.
///
/// Keys are unique; a repeated key keeps its first position and its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    entries: IndexMap<String, String>,
}

impl Directives {
    /// Raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether `key` was given.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Set a value, replacing any earlier one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// The `visibility` directive, if present and recognized.
    pub fn visibility(&self) -> Option<Visibility> {
        self.get("visibility").and_then(Visibility::parse)
    }

    /// The `resolution` directive, if present and recognized.
    pub fn resolution(&self) -> Option<Resolution> {
        self.get("resolution").and_then(Resolution::parse)
    }

    /// Whether the entry is marked `resolution:=optional`.
    pub fn is_optional(&self) -> bool {
        self.resolution() == Some(Resolution::Optional)
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One parsed value: the primary token plus its directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueWithDirectives {
    /// Primary token, e.g. a bundle or package name
    pub value: String,
    /// Directives attached with `;`
    pub directives: Directives,
}

impl ValueWithDirectives {
    /// Parse a single (already quote-stripped) item.
    ///
    /// `origin` and `header` are only used to describe dropped tokens.
    pub fn parse_item(item: &str, origin: &str, header: &str, sink: &mut dyn DiagnosticSink) -> Self {
        let mut tokens = item.trim().split(';');
        let value = tokens.next().unwrap_or_default().trim().to_string();
        let mut directives = Directives::default();

        for token in tokens {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let Some((key, val)) = token.split_once('=') else {
                sink.report(Diagnostic::new(
                    DiagnosticKind::UnparsableDirective,
                    origin,
                    format!("unparsable directive in {header}: \"{token}\""),
                ));
                continue;
            };
            let key = key.strip_suffix(':').unwrap_or(key).trim();
            directives.insert(key, val.trim());
        }

        Self { value, directives }
    }

    /// Parse a scalar header value.
    pub fn parse_scalar(raw: &str, origin: &str, header: &str, sink: &mut dyn DiagnosticSink) -> Self {
        Self::parse_item(&strip_quoted(raw), origin, header, sink)
    }

    /// Parse a comma-separated header value. Items with an empty primary token are skipped.
    pub fn parse_list(raw: &str, origin: &str, header: &str, sink: &mut dyn DiagnosticSink) -> Vec<Self> {
        strip_quoted(raw)
            .split(',')
            .filter(|item| !item.trim().is_empty())
            .map(|item| Self::parse_item(item, origin, header, sink))
            .filter(|parsed| !parsed.value.is_empty())
            .collect()
    }
}

impl fmt::Display for ValueWithDirectives {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)?;
        for (key, value) in self.directives.iter() {
            write!(f, ";{key}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostic;

    fn list(raw: &str) -> (Vec<ValueWithDirectives>, Vec<Diagnostic>) {
        let mut diags: Vec<Diagnostic> = Vec::new();
        let values = ValueWithDirectives::parse_list(raw, "test", "Require-Bundle", &mut diags);
        (values, diags)
    }

    #[test]
    fn directive_with_colon_equals() {
        let (values, diags) = list("pkg;visibility:=reexport");
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, "pkg");
        assert_eq!(values[0].directives.get("visibility"), Some("reexport"));
        assert_eq!(values[0].directives.visibility(), Some(Visibility::Reexport));
        assert!(diags.is_empty());
    }

    #[test]
    fn attribute_with_plain_equals() {
        let (values, _) = list("org.a;bundle-version=3.0");
        assert_eq!(values[0].directives.get("bundle-version"), Some("3.0"));
    }

    #[test]
    fn malformed_pair_is_dropped_without_affecting_siblings() {
        let (values, diags) = list("org.a;garbage;visibility:=reexport;resolution:=optional");
        assert_eq!(values[0].directives.len(), 2);
        assert_eq!(values[0].directives.visibility(), Some(Visibility::Reexport));
        assert!(values[0].directives.is_optional());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::UnparsableDirective);
        assert!(diags[0].message.contains("garbage"));
    }

    #[test]
    fn quoted_ranges_do_not_split_items() {
        let (values, diags) = list(
            "org.eclipse.core.runtime;bundle-version=\"[3.2.0,4.0.0)\",org.eclipse.ui;visibility:=reexport",
        );
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].value, "org.eclipse.core.runtime");
        assert_eq!(values[0].directives.get("bundle-version"), Some(""));
        assert_eq!(values[1].value, "org.eclipse.ui");
        assert!(diags.is_empty());
    }

    #[test]
    fn whitespace_around_items_and_tokens_is_trimmed() {
        let (values, _) = list(" org.a ; visibility := reexport , org.b ");
        assert_eq!(values[0].value, "org.a");
        assert_eq!(values[0].directives.get("visibility"), Some("reexport"));
        assert_eq!(values[1].value, "org.b");
    }

    #[test]
    fn last_directive_occurrence_wins() {
        let (values, _) = list("org.a;visibility:=reexport;visibility:=private");
        assert_eq!(values[0].directives.visibility(), Some(Visibility::Private));
        assert_eq!(values[0].directives.len(), 1);
    }

    #[test]
    fn empty_items_and_trailing_separators_are_skipped() {
        let (values, diags) = list("org.a;,, org.b;");
        let names: Vec<_> = values.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(names, vec!["org.a", "org.b"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn unknown_visibility_is_absent() {
        let (values, _) = list("org.a;visibility:=public");
        assert!(values[0].directives.contains("visibility"));
        assert_eq!(values[0].directives.visibility(), None);
    }

    #[test]
    fn scalar_does_not_split_on_commas() {
        let mut diags: Vec<Diagnostic> = Vec::new();
        let value = ValueWithDirectives::parse_scalar(
            "org.eclipse.swt;bundle-version=\"[3.0.0,4.0.0)\"",
            "test",
            "Fragment-Host",
            &mut diags,
        );
        assert_eq!(value.value, "org.eclipse.swt");
        assert!(diags.is_empty());
    }

    #[test]
    fn strip_quoted_keeps_unbalanced_quote() {
        assert_eq!(strip_quoted("a\"b\"c\"d"), "ac\"d");
    }

    #[test]
    fn display_renders_directives() {
        let (values, _) = list("org.a;visibility:=reexport");
        assert_eq!(values[0].to_string(), "org.a;visibility=reexport");
    }
}

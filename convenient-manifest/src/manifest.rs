//! Typed access to the headers of one manifest.

use crate::diagnostics::DiagnosticSink;
use crate::directives::ValueWithDirectives;
use crate::header_block::HeaderBlock;

/// Header names read by the resolver.
pub mod headers {
    /// Bundle identity
    pub const BUNDLE_SYMBOLIC_NAME: &str = "Bundle-SymbolicName";
    /// Declared version, may contain the `qualifier` token
    pub const BUNDLE_VERSION: &str = "Bundle-Version";
    /// Required bundles by symbolic name
    pub const REQUIRE_BUNDLE: &str = "Require-Bundle";
    /// Host this fragment attaches to
    pub const FRAGMENT_HOST: &str = "Fragment-Host";
    /// Packages offered to other bundles
    pub const EXPORT_PACKAGE: &str = "Export-Package";
    /// Packages needed from other bundles
    pub const IMPORT_PACKAGE: &str = "Import-Package";
    /// Classpath inside the bundle
    pub const BUNDLE_CLASSPATH: &str = "Bundle-ClassPath";
    /// Host flag that publishes fragment classes as API
    pub const ECLIPSE_EXTENSIBLE_API: &str = "Eclipse-ExtensibleAPI";
}

/// A parsed manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    headers: HeaderBlock,
    label: String,
}

impl Manifest {
    /// Parse manifest text; `label` identifies the file in diagnostics.
    pub fn parse(text: &str, label: impl Into<String>, sink: &mut dyn DiagnosticSink) -> Self {
        let label = label.into();
        let headers = HeaderBlock::parse(text, &label, sink);
        Self { headers, label }
    }

    /// File label used in diagnostics.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Underlying header block.
    pub fn headers(&self) -> &HeaderBlock {
        &self.headers
    }

    /// Primary token of a scalar header, directives dropped.
    pub fn value(&self, name: &str, sink: &mut dyn DiagnosticSink) -> Option<String> {
        self.value_with_directives(name, sink).map(|v| v.value)
    }

    /// Scalar header parsed into value and directives.
    pub fn value_with_directives(
        &self,
        name: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<ValueWithDirectives> {
        self.headers
            .get(name)
            .map(|raw| ValueWithDirectives::parse_scalar(raw, &self.label, name, sink))
    }

    /// List-valued header; empty when absent.
    pub fn values_with_directives(
        &self,
        name: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> Vec<ValueWithDirectives> {
        self.headers
            .get(name)
            .map(|raw| ValueWithDirectives::parse_list(raw, &self.label, name, sink))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Diagnostic, DiagnosticKind};

    const MANIFEST: &str = "Manifest-Version: 1.0\n\
Bundle-ManifestVersion: 2\n\
Bundle-SymbolicName: org.example.core;singleton:=true\n\
Bundle-Version: 1.2.0.qualifier\n\
Require-Bundle: org.eclipse.core.runtime;bundle-version=\"[3.4.0,4.0.0)\";visibil\n ity:=reexport,org.eclipse.osgi\n\
Export-Package: org.example.core,\n org.example.core.internal;x-internal:=true\n\
Eclipse-ExtensibleAPI: true\n";

    #[test]
    fn reads_scalar_and_list_headers() {
        let mut diags: Vec<Diagnostic> = Vec::new();
        let manifest = Manifest::parse(MANIFEST, "core/META-INF/MANIFEST.MF", &mut diags);

        assert_eq!(
            manifest.value(headers::BUNDLE_SYMBOLIC_NAME, &mut diags),
            Some("org.example.core".to_string())
        );
        assert_eq!(
            manifest.value(headers::BUNDLE_VERSION, &mut diags),
            Some("1.2.0.qualifier".to_string())
        );

        let required = manifest.values_with_directives(headers::REQUIRE_BUNDLE, &mut diags);
        assert_eq!(required.len(), 2);
        assert_eq!(required[0].value, "org.eclipse.core.runtime");
        assert_eq!(required[0].directives.get("visibility"), Some("reexport"));
        assert_eq!(required[1].value, "org.eclipse.osgi");

        let exports = manifest.values_with_directives(headers::EXPORT_PACKAGE, &mut diags);
        let names: Vec<_> = exports.iter().map(|e| e.value.as_str()).collect();
        assert_eq!(names, vec!["org.example.core", "org.example.core.internal"]);

        assert!(diags.is_empty());
    }

    #[test]
    fn absent_headers() {
        let mut diags: Vec<Diagnostic> = Vec::new();
        let manifest = Manifest::parse("Bundle-Version: 1.0\n", "m", &mut diags);
        assert!(manifest.value(headers::FRAGMENT_HOST, &mut diags).is_none());
        assert!(
            manifest
                .values_with_directives(headers::IMPORT_PACKAGE, &mut diags)
                .is_empty()
        );
    }

    #[test]
    fn directive_diagnostics_carry_the_manifest_label() {
        let mut diags: Vec<Diagnostic> = Vec::new();
        let manifest = Manifest::parse("Import-Package: org.a;oops\n", "a/MANIFEST.MF", &mut diags);
        let imports = manifest.values_with_directives(headers::IMPORT_PACKAGE, &mut diags);
        assert_eq!(imports.len(), 1);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::UnparsableDirective);
        assert_eq!(diags[0].origin, "a/MANIFEST.MF");
    }
}

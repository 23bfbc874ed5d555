// Bundle registry: arena storage, name and package indexes, and the
// two-phase dependency resolution (eager by name, then by package).

use crate::bundle::{
    Bundle, BundleId, BundleLocation, BundleState, PackageImport, Requirement, Source, SourceId,
    SourceKind, substitute_qualifier,
};
use convenient_manifest::{
    Diagnostic, DiagnosticKind, DiagnosticSink, Manifest, ValueWithDirectives, Visibility, headers,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

/// What kind of reference failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// `Require-Bundle` entry
    RequiredBundle,
    /// `Fragment-Host` name
    FragmentHost,
    /// `Import-Package` entry
    ImportedPackage,
}

impl ReferenceKind {
    fn diagnostic_kind(self) -> DiagnosticKind {
        match self {
            Self::RequiredBundle => DiagnosticKind::UnresolvedBundle,
            Self::FragmentHost => DiagnosticKind::UnresolvedHost,
            Self::ImportedPackage => DiagnosticKind::UnresolvedPackage,
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequiredBundle => f.write_str("required bundle"),
            Self::FragmentHost => f.write_str("fragment host"),
            Self::ImportedPackage => f.write_str("imported package"),
        }
    }
}

/// A lookup that found nothing, kept for the end-of-run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedReference {
    /// Requested bundle or package name
    pub name: String,
    /// Bundle whose manifest asked for it
    pub requested_by: BundleId,
    /// Where the reference came from
    pub kind: ReferenceKind,
}

/// Header values needed by the resolver, extracted from one manifest.
#[derive(Debug, Default)]
struct ManifestFields {
    symbolic_name: Option<String>,
    version: Option<String>,
    requires: Vec<ValueWithDirectives>,
    fragment_host: Option<String>,
    exports: Vec<String>,
    imports: Vec<PackageImport>,
    classpath: Vec<String>,
    extensible_api: bool,
}

impl ManifestFields {
    fn extract(manifest: &Manifest, sink: &mut dyn DiagnosticSink) -> Self {
        let names = |values: Vec<ValueWithDirectives>| -> Vec<String> {
            values.into_iter().map(|v| v.value).collect()
        };

        Self {
            symbolic_name: manifest.value(headers::BUNDLE_SYMBOLIC_NAME, sink),
            version: manifest.value(headers::BUNDLE_VERSION, sink),
            requires: manifest.values_with_directives(headers::REQUIRE_BUNDLE, sink),
            fragment_host: manifest
                .value(headers::FRAGMENT_HOST, sink)
                .filter(|host| !host.is_empty()),
            exports: names(manifest.values_with_directives(headers::EXPORT_PACKAGE, sink)),
            imports: manifest
                .values_with_directives(headers::IMPORT_PACKAGE, sink)
                .into_iter()
                .map(|v| PackageImport {
                    optional: v.directives.is_optional(),
                    name: v.value,
                })
                .collect(),
            classpath: names(manifest.values_with_directives(headers::BUNDLE_CLASSPATH, sink)),
            extensible_api: manifest
                .value(headers::ECLIPSE_EXTENSIBLE_API, sink)
                .is_some_and(|v| v == "true"),
        }
    }
}

/// All bundles known to a run, with the indexes used for resolution.
///
/// Bundles live in an arena and refer to each other by [`BundleId`]. Names map
/// to the most recently registered bundle.
#[derive(Debug, Default)]
pub struct BundleRegistry {
    // Primary storage, indexed by id
    bundles: Vec<Bundle>,
    sources: Vec<Source>,

    // Indices for lookup
    name_to_bundle: HashMap<String, BundleId>,
    package_to_bundle: HashMap<String, BundleId>,
    fragments: HashMap<BundleId, Vec<BundleId>>,

    // Misses, reported at the end of the run
    unresolved_bundles: Vec<UnresolvedReference>,
    unresolved_packages: Vec<UnresolvedReference>,

    next_bundle_id: u32,
    next_source_id: u32,
    indexed: bool,
}

impl BundleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // === Sources ===

    /// Register a source folder.
    pub fn add_source(
        &mut self,
        kind: SourceKind,
        path: impl Into<PathBuf>,
        qualifier: Option<String>,
    ) -> SourceId {
        let id = SourceId(self.next_source_id);
        self.next_source_id += 1;
        self.sources.push(Source {
            id,
            kind,
            path: path.into(),
            qualifier,
        });
        id
    }

    /// Get a source by id
    pub fn source(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(id.index())
    }

    /// All sources in registration order.
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    // === Bundle Management ===

    /// Register a discovered bundle. A name registered before is taken over by
    /// the new bundle and the conflict is reported.
    pub fn add_bundle(
        &mut self,
        name: impl Into<String>,
        source: SourceId,
        location: BundleLocation,
        sink: &mut dyn DiagnosticSink,
    ) -> BundleId {
        let name = name.into();
        let id = BundleId(self.next_bundle_id);
        self.next_bundle_id += 1;

        let bundle = Bundle::new(id, name.clone(), source, location);

        if let Some(previous) = self.name_to_bundle.insert(name.clone(), id) {
            let message = format!(
                "Name conflict: bundle {name} is defined in {} and {}; using the latter",
                self.origin(previous),
                self.describe_origin(&bundle),
            );
            sink.report(Diagnostic::new(DiagnosticKind::NameConflict, &name, message));
        }

        self.bundles.push(bundle);
        id
    }

    /// Get a bundle by ID
    pub fn bundle(&self, id: BundleId) -> Option<&Bundle> {
        self.bundles.get(id.index())
    }

    /// Get a mutable reference to a bundle
    pub fn bundle_mut(&mut self, id: BundleId) -> Option<&mut Bundle> {
        self.bundles.get_mut(id.index())
    }

    /// All bundles in registration order, shadowed ones included.
    pub fn bundles(&self) -> impl Iterator<Item = &Bundle> {
        self.bundles.iter()
    }

    /// Number of registered bundles.
    pub fn bundle_count(&self) -> usize {
        self.bundles.len()
    }

    /// Find the bundle currently registered under `name`.
    pub fn find_bundle(&self, name: &str) -> Option<BundleId> {
        self.name_to_bundle.get(name).copied()
    }

    /// Bundles discovered in `source`, in discovery order.
    pub fn bundles_in_source(&self, source: SourceId) -> Vec<BundleId> {
        self.bundles
            .iter()
            .filter(|b| b.source == source)
            .map(|b| b.id)
            .collect()
    }

    /// Look a bundle up by name, recording a miss against `requested_by`.
    pub fn lookup(&mut self, name: &str, requested_by: BundleId) -> Option<BundleId> {
        self.resolve_name(name, requested_by, ReferenceKind::RequiredBundle)
    }

    fn resolve_name(
        &mut self,
        name: &str,
        requested_by: BundleId,
        kind: ReferenceKind,
    ) -> Option<BundleId> {
        let found = self.find_bundle(name);
        if found.is_none() {
            self.unresolved_bundles.push(UnresolvedReference {
                name: name.to_string(),
                requested_by,
                kind,
            });
        }
        found
    }

    /// `name (location) from <source>` for messages.
    pub fn origin(&self, id: BundleId) -> String {
        self.bundle(id)
            .map_or_else(|| format!("{id:?}"), |b| self.describe_origin(b))
    }

    fn describe_origin(&self, bundle: &Bundle) -> String {
        match self.source(bundle.source) {
            Some(source) => format!("{} in {source}", bundle.location),
            None => bundle.location.to_string(),
        }
    }

    // === Phase 1: parse on demand ===

    /// Read a bundle's manifest and fill in its descriptor.
    ///
    /// Required bundles are resolved by name right away. Returns `false` if
    /// the bundle was already parsed or does not exist.
    pub fn parse_bundle(&mut self, id: BundleId, sink: &mut dyn DiagnosticSink) -> bool {
        let Some(bundle) = self.bundles.get(id.index()) else {
            return false;
        };
        if bundle.is_parsed() {
            return false;
        }

        let name = bundle.name.clone();
        let label = bundle.location.manifest_label();
        let qualifier = self
            .source(bundle.source)
            .and_then(|s| s.qualifier.clone());

        let text = match bundle.location.read_manifest() {
            Ok(text) => text,
            Err(e) => {
                sink.report(Diagnostic::new(
                    DiagnosticKind::UnreadableManifest,
                    &label,
                    format!("cannot read manifest of {name}: {e}"),
                ));
                None
            }
        };

        let fields = match text {
            Some(text) => {
                let manifest = Manifest::parse(&text, &label, sink);
                ManifestFields::extract(&manifest, sink)
            }
            None => {
                debug!("{} has no manifest", name);
                ManifestFields::default()
            }
        };

        if let Some(symbolic) = fields.symbolic_name.as_deref()
            && symbolic != name
        {
            sink.report(Diagnostic::new(
                DiagnosticKind::SymbolicNameMismatch,
                &label,
                format!("Bundle-SymbolicName {symbolic} differs from discovered name {name}"),
            ));
        }

        let mut required = Vec::with_capacity(fields.requires.len());
        for entry in &fields.requires {
            let target = if entry.directives.is_optional() {
                let found = self.find_bundle(&entry.value);
                if found.is_none() {
                    debug!("{}: optional bundle {} not found", name, entry.value);
                }
                found
            } else {
                self.lookup(&entry.value, id)
            };
            if let Some(target) = target {
                required.push(Requirement {
                    bundle: target,
                    reexported: entry.directives.visibility() == Some(Visibility::Reexport),
                });
            }
        }

        let version = fields.version.unwrap_or_default();
        let qualified_version = substitute_qualifier(&version, qualifier.as_deref());

        if let Some(bundle) = self.bundles.get_mut(id.index()) {
            bundle.version = version;
            bundle.qualified_version = qualified_version;
            bundle.required = required;
            bundle.fragment_host = fields.fragment_host;
            bundle.exported_packages = fields.exports;
            bundle.imported_packages = fields.imports;
            bundle.raw_classpath = fields.classpath;
            bundle.extensible_api = fields.extensible_api;
            bundle.state = BundleState::Parsed;
        }

        debug!("Parsed {}", name);
        true
    }

    /// Parse everything reachable from `initial` along required-bundle edges.
    ///
    /// Breadth-first; every bundle is parsed once. Returns the visit order.
    pub fn parse_closure(
        &mut self,
        initial: &[BundleId],
        sink: &mut dyn DiagnosticSink,
    ) -> Vec<BundleId> {
        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();
        for &id in initial {
            if visited.insert(id) {
                queue.push_back(id);
            }
        }

        let mut order = Vec::new();
        while let Some(id) = queue.pop_front() {
            self.parse_bundle(id, sink);
            order.push(id);

            let Some(bundle) = self.bundle(id) else {
                continue;
            };
            for requirement in &bundle.required {
                if visited.insert(requirement.bundle) {
                    queue.push_back(requirement.bundle);
                }
            }
        }

        info!(
            "Parsed {} bundles reachable from {} selected",
            order.len(),
            initial.len()
        );
        order
    }

    // === Phase 2: global indexes ===

    /// Build the fragment and package indexes and resolve package imports.
    ///
    /// Runs over parsed bundles only; a second call does nothing.
    pub fn build_indexes(&mut self) {
        if self.indexed {
            return;
        }
        self.index_fragments();
        self.index_packages();
        self.resolve_packages();
        self.indexed = true;
    }

    fn index_fragments(&mut self) {
        let fragments: Vec<(BundleId, String)> = self
            .bundles
            .iter()
            .filter(|b| b.is_parsed())
            .filter_map(|b| b.fragment_host.clone().map(|host| (b.id, host)))
            .collect();

        for (fragment, host_name) in fragments {
            let Some(host) = self.resolve_name(&host_name, fragment, ReferenceKind::FragmentHost)
            else {
                continue;
            };
            self.fragments.entry(host).or_default().push(fragment);
            if let Some(bundle) = self.bundles.get_mut(fragment.index()) {
                bundle.host = Some(host);
            }
        }

        debug!("Indexed fragments of {} hosts", self.fragments.len());
    }

    fn index_packages(&mut self) {
        for bundle in self.bundles.iter().filter(|b| b.is_parsed()) {
            for package in &bundle.exported_packages {
                self.package_to_bundle.insert(package.clone(), bundle.id);
            }
        }

        debug!("Indexed {} exported packages", self.package_to_bundle.len());
    }

    fn resolve_packages(&mut self) {
        let imports: Vec<(BundleId, Vec<PackageImport>)> = self
            .bundles
            .iter()
            .filter(|b| b.is_parsed() && !b.imported_packages.is_empty())
            .map(|b| (b.id, b.imported_packages.clone()))
            .collect();

        for (id, imports) in imports {
            for import in imports {
                let Some(owner) = self.package_to_bundle.get(&import.name).copied() else {
                    if import.optional {
                        debug!("Optional package {} not exported by any bundle", import.name);
                    } else {
                        self.unresolved_packages.push(UnresolvedReference {
                            name: import.name,
                            requested_by: id,
                            kind: ReferenceKind::ImportedPackage,
                        });
                    }
                    continue;
                };

                let Some(bundle) = self.bundles.get_mut(id.index()) else {
                    continue;
                };
                if owner == id || bundle.host == Some(owner) || bundle.requires(owner) {
                    continue;
                }
                bundle.required.push(Requirement {
                    bundle: owner,
                    reexported: false,
                });
            }
        }
    }

    // === Index queries ===

    /// Fragments attached to `host`, in registration order.
    pub fn fragments_of(&self, host: BundleId) -> &[BundleId] {
        self.fragments.get(&host).map_or(&[], Vec::as_slice)
    }

    /// Bundle exporting `package`.
    pub fn exporter_of(&self, package: &str) -> Option<BundleId> {
        self.package_to_bundle.get(package).copied()
    }

    /// Bundle names (required or fragment host) that did not resolve.
    pub fn unresolved_bundles(&self) -> &[UnresolvedReference] {
        &self.unresolved_bundles
    }

    /// Package imports that did not resolve.
    pub fn unresolved_packages(&self) -> &[UnresolvedReference] {
        &self.unresolved_packages
    }

    /// Whether any mandatory reference failed to resolve.
    pub fn has_unresolved(&self) -> bool {
        !self.unresolved_bundles.is_empty() || !self.unresolved_packages.is_empty()
    }

    /// One diagnostic per unresolved reference, bundles before packages.
    pub fn unresolved_diagnostics(&self) -> Vec<Diagnostic> {
        self.unresolved_bundles
            .iter()
            .chain(&self.unresolved_packages)
            .map(|r| {
                let requester = self
                    .bundle(r.requested_by)
                    .map_or_else(|| format!("{:?}", r.requested_by), |b| b.name.clone());
                Diagnostic::new(
                    r.kind.diagnostic_kind(),
                    requester.clone(),
                    format!("{} {} (requested by {requester})", r.kind, r.name),
                )
            })
            .collect()
    }
}

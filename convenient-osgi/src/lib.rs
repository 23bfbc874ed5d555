//! OSGi bundle resolution and build planning.
//!
//! Bundles are registered by name and location, then resolved in two phases:
//!
//! 1. [`BundleRegistry::parse_closure`] parses every bundle reachable from the
//!    selection along `Require-Bundle` edges, resolving those names eagerly.
//! 2. [`BundleRegistry::build_indexes`] groups fragments under their hosts and
//!    turns `Import-Package` entries into requirements on the exporting bundle.
//!
//! [`BuildPlan::construct`] then orders the bundles so that every bundle comes
//! after its requirements, and [`execute_plan`] hands them to a
//! [`Materializer`] while propagating classpaths.
//!
//! # Example
//!
//! ```
//! use convenient_osgi::{BuildPlan, BundleLocation, BundleRegistry, PlacementTable, SourceKind};
//!
//! let mut registry = BundleRegistry::new();
//! let mut diagnostics: Vec<convenient_osgi::Diagnostic> = Vec::new();
//! let source = registry.add_source(SourceKind::Binary, "plugins", None);
//!
//! let inline = |manifest: &str| BundleLocation::Inline {
//!     label: "inline".to_string(),
//!     manifest: Some(manifest.to_string()),
//! };
//! let app = registry.add_bundle("app", source, inline("Require-Bundle: core\n"), &mut diagnostics);
//! registry.add_bundle("core", source, inline("Export-Package: org.core\n"), &mut diagnostics);
//!
//! registry.parse_closure(&[app], &mut diagnostics);
//! registry.build_indexes();
//!
//! let plan = BuildPlan::construct(&registry, &[app], &PlacementTable::with_defaults()).unwrap();
//! let names: Vec<_> = plan.iter().map(|id| registry.bundle(id).unwrap().name.as_str()).collect();
//! assert_eq!(names, ["core", "app"]);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod bundle;
pub mod classpath;
pub mod execute;
pub mod plan;
pub mod registry;
pub mod selection;

pub use bundle::{
    Bundle, BundleId, BundleLocation, BundleState, ClasspathEntry, LocationError, MANIFEST_PATH,
    PackageImport, Requirement, Source, SourceId, SourceKind,
};
pub use classpath::{compile_classpath, post_build};
pub use execute::{
    ExecuteError, ExecutionSummary, MaterializeError, MaterializeRequest, Materializer,
    execute_plan,
};
pub use plan::{BuildPlan, FragmentPlacement, PlacementTable, PlanError};
pub use registry::{BundleRegistry, ReferenceKind, UnresolvedReference};
pub use selection::{SelectionError, SelectionRule, select};

pub use convenient_manifest::{Diagnostic, DiagnosticKind, DiagnosticSink, TracingSink};

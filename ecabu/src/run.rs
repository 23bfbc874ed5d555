//! One run: discovery, selection, resolution, planning and building.

use crate::config::Options;
use crate::discovery::find_bundles;
use crate::error::EcabuError;
use crate::materialize::JavacMaterializer;
use convenient_osgi::{
    BuildPlan, BundleRegistry, ClasspathEntry, DiagnosticSink, ReferenceKind, SelectionRule,
    SourceKind, TracingSink, UnresolvedReference, execute_plan, select,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// One entry of the build plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedBundle {
    /// Symbolic name
    pub name: String,
    /// Version with the qualifier substituted
    pub version: String,
    /// Binary or source bundle
    pub kind: SourceKind,
    /// Directory, jar or label the bundle was read from
    pub location: String,
    /// Host name for fragments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment_host: Option<String>,
}

/// What a run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Bundles in build order
    pub plan: Vec<PlannedBundle>,
    /// Bundles built (zero for dry runs)
    pub built: usize,
    /// Classpaths propagated before everything they re-export was ready
    pub forced: usize,
    /// `name (required by X)` lines for unresolved bundles
    pub unresolved_bundles: Vec<String>,
    /// `name (imported by X)` lines for unresolved packages
    pub unresolved_packages: Vec<String>,
    /// Manifest and registry diagnostics reported along the way
    pub diagnostics: usize,
    /// Exported classpath of each built bundle
    pub classpaths: BTreeMap<String, Vec<ClasspathEntry>>,
}

/// Run with the given options.
///
/// # Errors
///
/// Any [`EcabuError`]; see [`EcabuError::exit_code`] for how they map to
/// process exit codes.
pub fn run(options: &Options) -> Result<RunReport, EcabuError> {
    let mut sink = TracingSink::new();
    let mut registry = BundleRegistry::new();

    let mut rules = Vec::new();
    let mut sources = Vec::new();
    for spec in &options.sources {
        let id = registry.add_source(spec.kind, &spec.path, spec.qualifier.clone());
        if spec.include {
            rules.push(SelectionRule::IncludeSource(id));
        }
        sources.push(id);
    }
    rules.extend(options.bundles.iter().cloned().map(SelectionRule::IncludeBundle));

    show_options_summary(&registry, &rules);

    for id in sources {
        find_bundles(&mut registry, id, &mut sink)?;
    }

    let selected = select(&registry, &rules)?;
    let parsed = registry.parse_closure(&selected, &mut sink);
    registry.build_indexes();
    info!("{} bundles resolved", parsed.len());

    let mut report = RunReport {
        unresolved_bundles: describe_unresolved(&registry, registry.unresolved_bundles()),
        unresolved_packages: describe_unresolved(&registry, registry.unresolved_packages()),
        ..RunReport::default()
    };
    if registry.has_unresolved() {
        if !options.allow_unresolved {
            show_unresolved(&report, true);
            error!("Stop.");
            return Err(EcabuError::Unresolved {
                bundles: report.unresolved_bundles.len(),
                packages: report.unresolved_packages.len(),
            });
        }
        show_unresolved(&report, false);
        for diagnostic in registry.unresolved_diagnostics() {
            sink.report(diagnostic);
        }
    }

    let plan = BuildPlan::construct(&registry, &selected, &options.placement)?;
    report.plan = plan
        .iter()
        .filter_map(|id| registry.bundle(id))
        .map(|bundle| PlannedBundle {
            name: bundle.name.clone(),
            version: bundle.qualified_version.clone(),
            kind: registry
                .source(bundle.source)
                .map_or(SourceKind::Binary, |s| s.kind),
            location: bundle.location.to_string(),
            fragment_host: bundle.fragment_host.clone(),
        })
        .collect();
    info!("Build plan has {} bundles", report.plan.len());

    if options.print_plan {
        match serde_json::to_string_pretty(&report.plan) {
            Ok(json) => println!("{json}"),
            Err(e) => warn!("Cannot serialize the build plan: {}", e),
        }
    }

    if options.dry_run {
        for (index, planned) in report.plan.iter().enumerate() {
            info!("[{}/{}] {} {} ({})", index + 1, report.plan.len(), planned.name, planned.version, planned.location);
        }
        report.diagnostics = sink.count();
        info!("Dry run, nothing built.");
        return Ok(report);
    }

    std::fs::create_dir_all(&options.output_dir)?;
    let mut materializer = JavacMaterializer::new(
        &options.output_dir,
        &options.javac,
        options.javac_args.clone(),
    );
    let summary = execute_plan(&mut registry, &plan, &mut materializer)?;
    report.built = summary.built;
    report.forced = summary.forced;
    report.classpaths = plan
        .iter()
        .filter_map(|id| registry.bundle(id))
        .map(|bundle| (bundle.name.clone(), bundle.exported_classpath.clone()))
        .collect();
    report.diagnostics = sink.count();

    info!("Done.");
    Ok(report)
}

fn show_options_summary(registry: &BundleRegistry, rules: &[SelectionRule]) {
    info!("OPTIONS SUMMARY");
    info!("{}", plural(registry.sources().len(), "source"));
    for source in registry.sources() {
        info!(" - {}", source);
    }
    info!("{}", plural(rules.len(), "rule"));
    for rule in rules {
        info!(" - {}", rule.describe(registry));
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

fn describe_unresolved(registry: &BundleRegistry, references: &[UnresolvedReference]) -> Vec<String> {
    references
        .iter()
        .map(|reference| {
            let requester = registry
                .bundle(reference.requested_by)
                .map_or_else(|| format!("{:?}", reference.requested_by), |b| b.name.clone());
            let relation = match reference.kind {
                ReferenceKind::RequiredBundle => "required by",
                ReferenceKind::FragmentHost => "host of",
                ReferenceKind::ImportedPackage => "imported by",
            };
            format!("{} ({relation} {requester})", reference.name)
        })
        .collect()
}

fn show_unresolved(report: &RunReport, fatal: bool) {
    let lists = [
        ("Unresolved bundles:", &report.unresolved_bundles),
        ("Unresolved packages:", &report.unresolved_packages),
    ];
    for (title, lines) in lists {
        if lines.is_empty() {
            continue;
        }
        if fatal {
            error!("{}", title);
            for line in lines {
                error!(" - {}", line);
            }
        } else {
            warn!("{}", title);
            for line in lines {
                warn!(" - {}", line);
            }
        }
    }
    debug!(
        "{} unresolved bundles, {} unresolved packages",
        report.unresolved_bundles.len(),
        report.unresolved_packages.len()
    );
}

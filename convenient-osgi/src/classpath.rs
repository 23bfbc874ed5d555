// Classpath propagation along re-export and extensible-API fragment edges

use crate::bundle::{Bundle, BundleId, BundleState, ClasspathEntry};
use crate::registry::BundleRegistry;
use std::collections::HashSet;

/// Store the build step's output for a bundle.
pub fn record_own_classpath(registry: &mut BundleRegistry, id: BundleId, own: Vec<ClasspathEntry>) {
    if let Some(bundle) = registry.bundle_mut(id) {
        bundle.own_classpath = own;
        bundle.state = BundleState::Materialized;
    }
}

/// Whether everything `id` re-exports has its final exported classpath.
///
/// Re-exported requirements and, for extensible-API hosts, fragments must be
/// propagated first.
pub fn can_propagate(registry: &BundleRegistry, id: BundleId) -> bool {
    let Some(bundle) = registry.bundle(id) else {
        return false;
    };
    if bundle.state() != BundleState::Materialized {
        return false;
    }
    let propagated =
        |dep: BundleId| registry.bundle(dep).is_some_and(|b| b.state() == BundleState::Propagated);

    let deps_ready = bundle
        .required
        .iter()
        .filter(|r| r.reexported)
        .all(|r| propagated(r.bundle));
    let fragments_ready =
        !bundle.extensible_api || registry.fragments_of(id).iter().all(|&f| propagated(f));

    deps_ready && fragments_ready
}

/// Compute the exported classpath of `id` and mark it propagated.
///
/// Own entries first, then each re-exported requirement's exported classpath,
/// then (extensible-API hosts only) each fragment's. Nothing is de-duplicated.
pub fn post_build(registry: &mut BundleRegistry, id: BundleId) {
    let Some(bundle) = registry.bundle(id) else {
        return;
    };

    let mut exported = bundle.own_classpath.clone();
    for requirement in bundle.required.iter().filter(|r| r.reexported) {
        if let Some(dep) = registry.bundle(requirement.bundle) {
            exported.extend(dep.exported_classpath.iter().cloned());
        }
    }
    if bundle.extensible_api {
        for &fragment in registry.fragments_of(id) {
            if let Some(fragment) = registry.bundle(fragment) {
                exported.extend(fragment.exported_classpath.iter().cloned());
            }
        }
    }

    if let Some(bundle) = registry.bundle_mut(id) {
        bundle.exported_classpath = exported;
        bundle.state = BundleState::Propagated;
    }
}

/// Classpath needed to compile `id`.
///
/// The classpaths of its requirements; a fragment also sees its host and the
/// host's requirements. A bundle still waiting for propagation contributes its
/// own classpath. Order-preserving with duplicates removed.
pub fn compile_classpath(registry: &BundleRegistry, id: BundleId) -> Vec<ClasspathEntry> {
    let mut entries = Vec::new();
    let Some(bundle) = registry.bundle(id) else {
        return entries;
    };

    let of_requirements = |owner: BundleId, entries: &mut Vec<ClasspathEntry>| {
        if let Some(owner) = registry.bundle(owner) {
            for requirement in &owner.required {
                if let Some(dep) = registry.bundle(requirement.bundle) {
                    entries.extend(visible_classpath(dep).iter().cloned());
                }
            }
        }
    };

    of_requirements(id, &mut entries);

    if let Some(host) = bundle.host.and_then(|h| registry.bundle(h)) {
        entries.extend(visible_classpath(host).iter().cloned());
        of_requirements(host.id, &mut entries);
    }

    let mut seen = HashSet::new();
    entries.retain(|entry| seen.insert(entry.clone()));
    entries
}

fn visible_classpath(bundle: &Bundle) -> &[ClasspathEntry] {
    if bundle.state() == BundleState::Propagated {
        &bundle.exported_classpath
    } else {
        &bundle.own_classpath
    }
}

//! Finding bundles in source folders.

use crate::error::ConfigError;
use convenient_osgi::{BundleLocation, BundleRegistry, DiagnosticSink, MANIFEST_PATH, SourceId, SourceKind};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const PLUGIN_XML_PATH: &str = "plugin.xml";
const FRAGMENT_XML_PATH: &str = "fragment.xml";

#[allow(clippy::expect_used)]
static VERSION_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_\d+(?:\.\d+(?:\.[\w-]+)*)?$").expect("version suffix pattern is valid")
});

/// Drop a trailing `_<version>` from a binary bundle's file or folder name.
pub fn strip_version_suffix(name: &str) -> &str {
    match VERSION_SUFFIX.find(name) {
        Some(m) => &name[..m.start()],
        None => name,
    }
}

/// Whether a directory looks like a bundle.
pub fn is_bundle_dir(dir: &Path) -> bool {
    [MANIFEST_PATH, PLUGIN_XML_PATH, FRAGMENT_XML_PATH]
        .iter()
        .any(|marker| dir.join(marker).is_file())
}

/// Register every bundle in `source` and return how many were found.
///
/// Only direct children are looked at, in file name order.
///
/// # Errors
///
/// Returns [`ConfigError::MissingSource`] if the folder does not exist.
pub fn find_bundles(
    registry: &mut BundleRegistry,
    source: SourceId,
    sink: &mut dyn DiagnosticSink,
) -> Result<usize, ConfigError> {
    let Some(spec) = registry.source(source).cloned() else {
        return Ok(0);
    };
    if !spec.path.is_dir() {
        return Err(ConfigError::MissingSource(spec.path));
    }

    info!("Searching for bundles: {}...", spec);
    let mut found = 0;

    let entries = WalkDir::new(&spec.path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", spec.path.display(), e);
                continue;
            }
        };
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();

        let candidate = if entry.file_type().is_dir() || path.is_dir() {
            if !is_bundle_dir(path) {
                continue;
            }
            let name = match spec.kind {
                SourceKind::Binary => strip_version_suffix(&file_name),
                SourceKind::Source => file_name.as_ref(),
            };
            Some((name.to_string(), BundleLocation::Directory(path.to_path_buf())))
        } else if spec.kind == SourceKind::Binary {
            file_name.strip_suffix(".jar").map(|stem| {
                (
                    strip_version_suffix(stem).to_string(),
                    BundleLocation::Archive(path.to_path_buf()),
                )
            })
        } else {
            None
        };

        if let Some((name, location)) = candidate {
            debug!("Found {} at {}", name, location);
            registry.add_bundle(name, source, location, sink);
            found += 1;
        }
    }

    info!("... {} found", found);
    Ok(found)
}

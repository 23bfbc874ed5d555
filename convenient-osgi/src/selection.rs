//! Rules that pick the bundles a run starts from.

use crate::bundle::{BundleId, SourceId};
use crate::registry::BundleRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::info;

/// Selection failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// A rule names a bundle nobody registered
    #[error("Unknown bundle: {0}")]
    UnknownBundle(String),

    /// A rule refers to a source that was never added
    #[error("Unknown source: {0:?}")]
    UnknownSource(SourceId),

    /// The rules selected nothing
    #[error("No bundles selected for building. Stop.")]
    NothingSelected,
}

/// One selection step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionRule {
    /// Every bundle discovered in a source
    IncludeSource(SourceId),
    /// The bundle registered under a symbolic name
    IncludeBundle(String),
}

impl SelectionRule {
    /// Human-readable form, resolving source ids against `registry`.
    pub fn describe(&self, registry: &BundleRegistry) -> String {
        match self {
            Self::IncludeSource(id) => match registry.source(*id) {
                Some(source) => format!("include all bundles from {source}"),
                None => format!("include all bundles from {id:?}"),
            },
            Self::IncludeBundle(name) => format!("include bundle {name}"),
        }
    }
}

/// Apply `rules` in order and return the selected bundles without duplicates.
///
/// # Errors
///
/// Fails on a rule that refers to something unknown, or when nothing was selected.
pub fn select(
    registry: &BundleRegistry,
    rules: &[SelectionRule],
) -> Result<Vec<BundleId>, SelectionError> {
    let mut selected = Vec::new();
    let mut seen = HashSet::new();

    for rule in rules {
        info!("Processing rule: {}", rule.describe(registry));

        let candidates = match rule {
            SelectionRule::IncludeSource(source) => {
                if registry.source(*source).is_none() {
                    return Err(SelectionError::UnknownSource(*source));
                }
                registry
                    .bundles_in_source(*source)
                    .into_iter()
                    .filter(|id| {
                        // Shadowed bundles lost their name to a later registration.
                        registry
                            .bundle(*id)
                            .is_some_and(|b| registry.find_bundle(&b.name) == Some(*id))
                    })
                    .collect()
            }
            SelectionRule::IncludeBundle(name) => vec![
                registry
                    .find_bundle(name)
                    .ok_or_else(|| SelectionError::UnknownBundle(name.clone()))?,
            ],
        };

        for id in candidates {
            if seen.insert(id) {
                selected.push(id);
            }
        }
        info!("... {} bundles selected", selected.len());
    }

    if selected.is_empty() {
        return Err(SelectionError::NothingSelected);
    }
    Ok(selected)
}

//! Running a [`BuildPlan`] through a [`Materializer`].

use crate::bundle::{Bundle, BundleId, ClasspathEntry, Source};
use crate::classpath::{can_propagate, compile_classpath, post_build, record_own_classpath};
use crate::plan::BuildPlan;
use crate::registry::BundleRegistry;
use std::io;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure of the build step for one bundle
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// The compiler ran and reported errors
    #[error("Compilation of {bundle} failed: {message}")]
    CompileFailed {
        /// Bundle name
        bundle: String,
        /// Exit status or compiler output
        message: String,
    },

    /// File system error while building
    #[error("IO error while building {bundle}: {source}")]
    Io {
        /// Bundle name
        bundle: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Any other failure
    #[error("Cannot build {bundle}: {message}")]
    Failed {
        /// Bundle name
        bundle: String,
        /// What went wrong
        message: String,
    },
}

/// Plan execution failures
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The build step failed
    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    /// The plan refers to a bundle that is not in the registry
    #[error("Unknown bundle id: {0:?}")]
    UnknownBundle(BundleId),
}

/// Everything the build step gets to know about one bundle.
#[derive(Debug)]
pub struct MaterializeRequest<'a> {
    /// Bundle to build
    pub bundle: &'a Bundle,
    /// Folder the bundle was discovered in
    pub source: Option<&'a Source>,
    /// Host of a fragment
    pub host: Option<&'a Bundle>,
    /// Classpath to compile against
    pub compile_classpath: Vec<ClasspathEntry>,
}

/// Produces a bundle's own classpath, compiling it if needed.
pub trait Materializer {
    /// Build one bundle.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn materialize(
        &mut self,
        request: &MaterializeRequest<'_>,
    ) -> Result<Vec<ClasspathEntry>, MaterializeError>;
}

/// Counts from one execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Bundles materialized
    pub built: usize,
    /// Bundles propagated out of order because they wait on each other
    pub forced: usize,
}

/// Materialize every planned bundle in order and propagate classpaths.
///
/// A bundle's exported classpath is finalized once its re-exported
/// requirements and (for extensible-API hosts) its fragments are finalized.
/// Bundles still waiting after the last build are finalized in plan order.
///
/// # Errors
///
/// Stops at the first [`MaterializeError`].
pub fn execute_plan(
    registry: &mut BundleRegistry,
    plan: &BuildPlan,
    materializer: &mut dyn Materializer,
) -> Result<ExecutionSummary, ExecuteError> {
    let mut summary = ExecutionSummary::default();
    let mut pending: Vec<BundleId> = Vec::new();
    let total = plan.len();

    for (index, id) in plan.iter().enumerate() {
        let own = {
            let bundle = registry.bundle(id).ok_or(ExecuteError::UnknownBundle(id))?;
            info!("[{}/{}] Building {}", index + 1, total, bundle.full_name());
            let request = MaterializeRequest {
                bundle,
                source: registry.source(bundle.source),
                host: bundle.host.and_then(|h| registry.bundle(h)),
                compile_classpath: compile_classpath(registry, id),
            };
            materializer.materialize(&request)?
        };
        debug!("{} classpath entries for {:?}", own.len(), id);

        record_own_classpath(registry, id, own);
        summary.built += 1;
        pending.push(id);
        propagate_ready(registry, &mut pending);
    }

    for id in pending {
        warn!(
            "Propagating classpath of {} before its re-exported bundles",
            registry.origin(id)
        );
        post_build(registry, id);
        summary.forced += 1;
    }

    Ok(summary)
}

fn propagate_ready(registry: &mut BundleRegistry, pending: &mut Vec<BundleId>) {
    loop {
        let Some(position) = pending.iter().position(|&id| can_propagate(registry, id)) else {
            return;
        };
        let id = pending.remove(position);
        post_build(registry, id);
    }
}

//! Linearizing resolved bundles into a build order.
//!
//! Dependencies come first (post-order over required bundles). Fragments are
//! placed right after their host, or right before it for hosts registered as
//! [`FragmentPlacement::AfterFragments`].

use crate::bundle::BundleId;
use crate::registry::BundleRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// Hosts whose fragments must be built before the host itself.
const AFTER_FRAGMENTS_DEFAULTS: &[&str] = &["org.eclipse.swt"];

/// Plan construction failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// Required bundles form a cycle
    #[error("Dependency cycle: {}", chain.join(" -> "))]
    Cycle {
        /// Bundle names along the cycle; the first name is repeated at the end
        chain: Vec<String>,
    },

    /// An id that is not in the registry
    #[error("Unknown bundle id: {0:?}")]
    UnknownBundle(BundleId),
}

/// Where a host goes relative to its fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FragmentPlacement {
    /// Host first, then its fragments
    #[default]
    BeforeFragments,
    /// Fragments first, then the host
    AfterFragments,
}

/// Per-name overrides of [`FragmentPlacement`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementTable {
    overrides: HashMap<String, FragmentPlacement>,
}

impl PlacementTable {
    /// Empty table: every host is built before its fragments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the built-in overrides (`org.eclipse.swt` after its fragments).
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for name in AFTER_FRAGMENTS_DEFAULTS {
            table.set(*name, FragmentPlacement::AfterFragments);
        }
        table
    }

    /// Override placement for a host.
    pub fn set(&mut self, name: impl Into<String>, placement: FragmentPlacement) {
        self.overrides.insert(name.into(), placement);
    }

    /// Placement for a host.
    pub fn placement(&self, name: &str) -> FragmentPlacement {
        self.overrides.get(name).copied().unwrap_or_default()
    }

    /// Number of overrides.
    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    /// Whether there are no overrides.
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

/// Ordered build sequence. No bundle appears twice.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildPlan {
    order: Vec<BundleId>,
    #[serde(skip)]
    members: HashSet<BundleId>,
}

impl BuildPlan {
    /// Plan the given selection.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::Cycle`] if required bundles depend on each other.
    pub fn construct(
        registry: &BundleRegistry,
        selected: &[BundleId],
        placement: &PlacementTable,
    ) -> Result<Self, PlanError> {
        let mut plan = Self::default();
        for &id in selected {
            plan.contribute(registry, placement, id)?;
        }
        debug!("Planned {} bundles from {} selected", plan.len(), selected.len());
        Ok(plan)
    }

    /// Add `id` and everything it needs. Bundles already planned are skipped.
    ///
    /// # Errors
    ///
    /// See [`BuildPlan::construct`].
    pub fn contribute(
        &mut self,
        registry: &BundleRegistry,
        placement: &PlacementTable,
        id: BundleId,
    ) -> Result<(), PlanError> {
        let mut planner = Planner {
            registry,
            placement,
            plan: self,
            in_progress: Vec::new(),
        };
        planner.contribute(id)
    }

    /// Bundles in build order.
    pub fn order(&self) -> &[BundleId] {
        &self.order
    }

    /// Iterate in build order.
    pub fn iter(&self) -> impl Iterator<Item = BundleId> + '_ {
        self.order.iter().copied()
    }

    /// Whether `id` is planned.
    pub fn contains(&self, id: BundleId) -> bool {
        self.members.contains(&id)
    }

    /// Index of `id` in the build order.
    pub fn position(&self, id: BundleId) -> Option<usize> {
        self.order.iter().position(|&planned| planned == id)
    }

    /// Number of planned bundles.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is planned.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn push(&mut self, id: BundleId) {
        if self.members.insert(id) {
            self.order.push(id);
        }
    }
}

struct Planner<'a> {
    registry: &'a BundleRegistry,
    placement: &'a PlacementTable,
    plan: &'a mut BuildPlan,
    // Bundles on the current contribution path, outermost first
    in_progress: Vec<BundleId>,
}

impl Planner<'_> {
    fn contribute(&mut self, id: BundleId) -> Result<(), PlanError> {
        if self.plan.contains(id) {
            return Ok(());
        }
        let registry = self.registry;
        let bundle = registry.bundle(id).ok_or(PlanError::UnknownBundle(id))?;

        // A fragment reached on its own is placed by its host.
        if let Some(host) = bundle.host
            && !self.plan.contains(host)
            && !self.in_progress.contains(&host)
        {
            self.contribute(host)?;
            if self.plan.contains(id) {
                return Ok(());
            }
        }

        if self.in_progress.contains(&id) {
            return Err(self.cycle_error(id));
        }
        self.in_progress.push(id);

        for requirement in &bundle.required {
            self.contribute(requirement.bundle)?;
        }

        let fragments = registry.fragments_of(id);
        match self.placement.placement(&bundle.name) {
            FragmentPlacement::BeforeFragments => {
                self.plan.push(id);
                for &fragment in fragments {
                    self.contribute(fragment)?;
                }
            }
            FragmentPlacement::AfterFragments => {
                for &fragment in fragments {
                    self.contribute(fragment)?;
                }
                self.plan.push(id);
            }
        }

        self.in_progress.pop();
        Ok(())
    }

    fn cycle_error(&self, id: BundleId) -> PlanError {
        let start = self
            .in_progress
            .iter()
            .position(|&p| p == id)
            .unwrap_or_default();
        let name = |id: BundleId| {
            self.registry
                .bundle(id)
                .map_or_else(|| format!("{id:?}"), |b| b.name.clone())
        };
        let mut chain: Vec<String> = self.in_progress[start..].iter().map(|&p| name(p)).collect();
        chain.push(name(id));
        PlanError::Cycle { chain }
    }
}

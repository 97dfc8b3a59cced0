//! Exploration orchestrator
//!
//! Sequences the compound "I visited this place" operation:
//!
//! ```text
//! Idle → MarkingVisited → [ExploringChildren] → [SavingJournal] → Refreshing → Idle
//! ```
//!
//! Steps run strictly in order. A failure stops the remaining steps and is
//! reported in the outcome, but the closing tree refetch always runs and the
//! phase always returns to `Idle`. Nothing committed on the backend is rolled
//! back.
//!
//! The current phase is published on a `tokio::sync::watch` channel so any
//! front end can reflect progress without polling.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use waypoint_client::ExplorerBackend;
use waypoint_types::{GeoPoint, UserId, Waypoint, WaypointId, WaypointNode};

use crate::config::ExplorationConfig;
use crate::dedup::{collect_known_identities, filter_candidates};
use crate::error::{ExplorerError, Result};
use crate::tree::TraversalLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExplorationPhase {
    Idle,
    MarkingVisited,
    ExploringChildren,
    SavingJournal,
    Refreshing,
}

impl ExplorationPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, ExplorationPhase::Idle)
    }
}

/// Discovery parameters for one exploration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplorationPlan {
    pub radius_m: f64,
    pub child_count: usize,
    pub overfetch_factor: usize,
}

impl ExplorationPlan {
    /// The root's first exploration seeds more branches than ordinary nodes.
    pub fn for_target(config: &ExplorationConfig, is_root: bool) -> Self {
        Self {
            radius_m: config.search_radius_m,
            child_count: if is_root {
                config.root_child_count
            } else {
                config.child_count
            },
            overfetch_factor: config.overfetch_factor,
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.child_count.saturating_mul(self.overfetch_factor)
    }
}

/// Everything the orchestrator needs to know about the visited node
#[derive(Debug, Clone, PartialEq)]
pub struct VisitRequest {
    pub user_id: UserId,
    pub node_id: WaypointId,
    pub position: GeoPoint,
    pub has_children: bool,
    pub is_root: bool,
    pub journal: Option<String>,
}

impl VisitRequest {
    pub fn for_node(user_id: UserId, node: &WaypointNode, is_root: bool) -> Self {
        Self {
            user_id,
            node_id: node.id,
            position: node.position,
            has_children: !node.children.is_empty(),
            is_root,
            journal: None,
        }
    }

    /// Attach journal text; blank text counts as none.
    pub fn with_journal(mut self, text: Option<&str>) -> Self {
        self.journal = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        self
    }
}

/// Result of the discovery step
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryOutcome {
    pub parent: Waypoint,
    /// Ids attached by this exploration, in attach order. Empty when every
    /// candidate was already known.
    pub attached: Vec<WaypointId>,
    pub candidates_seen: usize,
}

#[derive(Debug)]
pub struct VisitOutcome {
    pub marked_visited: bool,
    pub discovery: Option<DiscoveryOutcome>,
    pub journal_saved: bool,
    /// First failure among the mutating steps
    pub error: Option<ExplorerError>,
    /// Closing refetch; runs regardless of `error`
    pub refreshed: Result<WaypointNode>,
}

impl VisitOutcome {
    pub fn attached(&self) -> &[WaypointId] {
        self.discovery
            .as_ref()
            .map(|d| d.attached.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct StepsTaken {
    marked_visited: bool,
    discovery: Option<DiscoveryOutcome>,
    journal_saved: bool,
}

// ============================================================================
// DISCOVERY
// ============================================================================

/// Discover, deduplicate and attach new children under `parent_id`.
///
/// Identities are collected from a fresh fetch of the user's tree so places
/// attached elsewhere since the caller's snapshot are still excluded. When no
/// candidate survives, the parent is returned unchanged.
pub async fn explore_waypoint<B>(
    backend: &B,
    user_id: UserId,
    parent_id: WaypointId,
    position: GeoPoint,
    plan: &ExplorationPlan,
    limits: TraversalLimits,
) -> Result<DiscoveryOutcome>
where
    B: ExplorerBackend + ?Sized,
{
    let tree = backend.fetch_tree(user_id).await?;
    let known = collect_known_identities(&tree, limits)?;

    let candidates = backend
        .discover_nearby(position, plan.radius_m, plan.fetch_count())
        .await?;
    let candidates_seen = candidates.len();
    let accepted = filter_candidates(candidates, &known, plan.child_count);

    debug!(
        parent_id,
        candidates_seen,
        known = known.len(),
        accepted = accepted.len(),
        "filtered discovery candidates"
    );

    if accepted.is_empty() {
        info!(parent_id, "no novel places nearby, leaving parent unchanged");
        let parent = backend.fetch_waypoint(parent_id).await?;
        return Ok(DiscoveryOutcome {
            parent,
            attached: Vec::new(),
            candidates_seen,
        });
    }

    let ids: Vec<WaypointId> = accepted.iter().map(|c| c.id).collect();
    let parent = backend.attach_children(parent_id, &ids).await?;
    info!(parent_id, attached = ids.len(), "attached new children");
    Ok(DiscoveryOutcome {
        parent,
        attached: ids,
        candidates_seen,
    })
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Returns the phase to `Idle` however `run` exits.
struct PhaseGuard<'a>(&'a watch::Sender<ExplorationPhase>);

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(ExplorationPhase::Idle);
    }
}

pub struct ExplorationOrchestrator<B: ExplorerBackend + ?Sized> {
    backend: Arc<B>,
    config: ExplorationConfig,
    limits: TraversalLimits,
    phase: watch::Sender<ExplorationPhase>,
}

impl<B: ExplorerBackend + ?Sized> ExplorationOrchestrator<B> {
    pub fn new(backend: Arc<B>, config: ExplorationConfig, limits: TraversalLimits) -> Self {
        let (phase, _) = watch::channel(ExplorationPhase::Idle);
        Self {
            backend,
            config,
            limits,
            phase,
        }
    }

    pub fn phase(&self) -> ExplorationPhase {
        *self.phase.borrow()
    }

    pub fn is_busy(&self) -> bool {
        !self.phase().is_idle()
    }

    pub fn subscribe(&self) -> watch::Receiver<ExplorationPhase> {
        self.phase.subscribe()
    }

    pub fn config(&self) -> &ExplorationConfig {
        &self.config
    }

    fn enter(&self, phase: ExplorationPhase) {
        debug!(?phase, "exploration phase");
        self.phase.send_replace(phase);
    }

    /// Run the whole visit sequence.
    ///
    /// Fails only with `OperationInFlight` when another run has not finished;
    /// step failures are carried in [`VisitOutcome::error`].
    pub async fn run(&self, request: &VisitRequest) -> Result<VisitOutcome> {
        let acquired = self.phase.send_if_modified(|phase| {
            if phase.is_idle() {
                *phase = ExplorationPhase::MarkingVisited;
                true
            } else {
                false
            }
        });
        if !acquired {
            return Err(ExplorerError::OperationInFlight);
        }
        let _guard = PhaseGuard(&self.phase);

        info!(
            user_id = request.user_id,
            node_id = request.node_id,
            "visit started"
        );

        let mut steps = StepsTaken::default();
        let error = match self.run_steps(request, &mut steps).await {
            Ok(()) => None,
            Err(e) => {
                warn!(node_id = request.node_id, error = %e, "visit step failed");
                Some(e)
            }
        };

        self.enter(ExplorationPhase::Refreshing);
        let refreshed = self
            .backend
            .fetch_tree(request.user_id)
            .await
            .map_err(ExplorerError::from);

        info!(
            node_id = request.node_id,
            marked_visited = steps.marked_visited,
            journal_saved = steps.journal_saved,
            failed = error.is_some(),
            "visit finished"
        );

        Ok(VisitOutcome {
            marked_visited: steps.marked_visited,
            discovery: steps.discovery,
            journal_saved: steps.journal_saved,
            error,
            refreshed,
        })
    }

    async fn run_steps(&self, request: &VisitRequest, steps: &mut StepsTaken) -> Result<()> {
        self.enter(ExplorationPhase::MarkingVisited);
        self.backend.mark_visited(request.node_id).await?;
        steps.marked_visited = true;

        if !request.has_children {
            self.enter(ExplorationPhase::ExploringChildren);
            let plan = ExplorationPlan::for_target(&self.config, request.is_root);
            let discovery = explore_waypoint(
                self.backend.as_ref(),
                request.user_id,
                request.node_id,
                request.position,
                &plan,
                self.limits,
            )
            .await?;
            steps.discovery = Some(discovery);
        }

        if let Some(text) = &request.journal {
            self.enter(ExplorationPhase::SavingJournal);
            self.backend
                .save_journal_entry(request.node_id, request.user_id, text)
                .await?;
            steps.journal_saved = true;
        }
        Ok(())
    }
}

//! Explorer session
//!
//! Owns everything a front end renders for one viewer: the active user,
//! the current tree snapshot, the layout position cache, presentation state,
//! the orchestrator and the user-visible error.
//!
//! Every tree fetch is tagged with the user id and a generation counter.
//! `switch_user` bumps the generation, so a fetch started for the previous
//! user is discarded when it lands instead of overwriting the new tree.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use waypoint_client::ExplorerBackend;
use waypoint_layout::{PositionCache, RadialLayout, RadialLayoutEngine};
use waypoint_types::{JournalEntry, User, UserId, WaypointId, WaypointNode};

use crate::config::ExplorerConfig;
use crate::error::{ErrorState, ExplorerError, Result};
use crate::orchestrator::{ExplorationOrchestrator, ExplorationPhase, VisitRequest};
use crate::presentation::{PresentationState, Reconciler};
use crate::tree::{find, validate};

/// Shown while the user record is unavailable
pub const USER_PLACEHOLDER: &str = "…";

/// A fetched tree together with the identity it was fetched for
#[derive(Debug, Clone, PartialEq)]
pub struct TreeSnapshot {
    pub user_id: UserId,
    pub generation: u64,
    pub tree: WaypointNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotDisposition {
    Applied,
    /// Fetched for a previous user or generation
    Discarded,
}

/// Summary of a finished `request_visit`
#[derive(Debug, Clone, PartialEq)]
pub struct VisitReport {
    pub node_id: WaypointId,
    pub marked_visited: bool,
    pub attached: Vec<WaypointId>,
    pub journal_saved: bool,
    pub error: Option<String>,
}

pub struct ExplorerSession<B: ExplorerBackend + ?Sized> {
    backend: Arc<B>,
    config: ExplorerConfig,
    user_id: UserId,
    generation: u64,
    tree: Option<WaypointNode>,
    user: Option<User>,
    roster: Vec<User>,
    positions: PositionCache,
    layout_engine: RadialLayoutEngine,
    reconciler: Reconciler,
    orchestrator: ExplorationOrchestrator<B>,
    error: Option<ErrorState>,
}

impl<B: ExplorerBackend + ?Sized> ExplorerSession<B> {
    pub fn new(backend: Arc<B>, config: ExplorerConfig) -> Self {
        let limits = config.traversal;
        let layout_engine =
            RadialLayoutEngine::new(config.layout.radius_unit).with_max_depth(limits.max_depth);
        let orchestrator =
            ExplorationOrchestrator::new(backend.clone(), config.exploration.clone(), limits);
        Self {
            backend,
            user_id: config.user_id,
            config,
            generation: 0,
            tree: None,
            user: None,
            roster: Vec::new(),
            positions: PositionCache::new(),
            layout_engine,
            reconciler: Reconciler::new(limits),
            orchestrator,
            error: None,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn tree(&self) -> Option<&WaypointNode> {
        self.tree.as_ref()
    }

    pub fn presentation(&self) -> &PresentationState {
        self.reconciler.state()
    }

    pub fn error(&self) -> Option<&ErrorState> {
        self.error.as_ref()
    }

    /// Clear a dismissible error. Blocking errors stay until a fetch succeeds.
    pub fn dismiss_error(&mut self) -> bool {
        if self.error.as_ref().is_some_and(|e| !e.is_blocking()) {
            self.error = None;
            true
        } else {
            false
        }
    }

    pub fn phase(&self) -> ExplorationPhase {
        self.orchestrator.phase()
    }

    pub fn is_visiting(&self) -> bool {
        self.orchestrator.is_busy()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<ExplorationPhase> {
        self.orchestrator.subscribe()
    }

    pub fn positions(&self) -> &PositionCache {
        &self.positions
    }

    /// Display name of the active user, or a placeholder
    pub fn user_label(&self) -> &str {
        self.user
            .as_ref()
            .map(|u| u.username.as_str())
            .unwrap_or(USER_PLACEHOLDER)
    }

    pub fn roster(&self) -> &[User] {
        &self.roster
    }

    // ------------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------------

    /// Switch the active user. All derived state is reset at once; the new
    /// tree arrives with the next `refresh`.
    pub fn switch_user(&mut self, user_id: UserId) {
        info!(from = self.user_id, to = user_id, "switching user");
        self.user_id = user_id;
        self.generation += 1;
        self.tree = None;
        self.user = None;
        self.error = None;
        self.positions.clear();
        self.reconciler.reset();
    }

    /// Fetch display records for `ids`; users that cannot be fetched are skipped.
    pub async fn load_roster(&mut self, ids: &[UserId]) -> &[User] {
        let mut roster = Vec::with_capacity(ids.len());
        for id in ids {
            match self.backend.fetch_user(*id).await {
                Ok(user) => roster.push(user),
                Err(e) => debug!(user_id = *id, error = %e, "skipping user in roster"),
            }
        }
        self.roster = roster;
        &self.roster
    }

    // ------------------------------------------------------------------------
    // Tree synchronization
    // ------------------------------------------------------------------------

    pub async fn fetch_snapshot(&self) -> Result<TreeSnapshot> {
        let tree = self.backend.fetch_tree(self.user_id).await?;
        Ok(TreeSnapshot {
            user_id: self.user_id,
            generation: self.generation,
            tree,
        })
    }

    /// Replace the current tree with `snapshot` and reconcile presentation
    /// state, unless the snapshot belongs to another user or generation.
    pub fn apply_snapshot(&mut self, snapshot: TreeSnapshot) -> Result<SnapshotDisposition> {
        if snapshot.user_id != self.user_id || snapshot.generation != self.generation {
            warn!(
                snapshot_user = snapshot.user_id,
                snapshot_generation = snapshot.generation,
                user_id = self.user_id,
                generation = self.generation,
                "discarding stale tree snapshot"
            );
            return Ok(SnapshotDisposition::Discarded);
        }

        let limits = self.config.traversal;
        let checked = validate(&snapshot.tree, limits)
            .map_err(ExplorerError::from)
            .and_then(|stats| {
                self.reconciler
                    .reconcile(&snapshot.tree)
                    .map_err(ExplorerError::from)?;
                Ok(stats)
            });

        match checked {
            Ok(stats) => {
                debug!(
                    user_id = self.user_id,
                    nodes = stats.nodes,
                    visited = stats.visited,
                    "tree snapshot applied"
                );
                self.tree = Some(snapshot.tree);
                if self.error.as_ref().is_some_and(ErrorState::is_blocking) {
                    self.error = None;
                }
                Ok(SnapshotDisposition::Applied)
            }
            Err(e) => {
                self.fail_blocking(&e);
                Err(e)
            }
        }
    }

    /// Fetch and apply the active user's tree. Also refreshes the user record;
    /// a missing user only affects the label.
    pub async fn refresh(&mut self) -> Result<SnapshotDisposition> {
        self.user = match self.backend.fetch_user(self.user_id).await {
            Ok(user) => Some(user),
            Err(e) => {
                debug!(user_id = self.user_id, error = %e, "user record unavailable");
                None
            }
        };

        match self.fetch_snapshot().await {
            Ok(snapshot) => self.apply_snapshot(snapshot),
            Err(e) => {
                self.fail_blocking(&e);
                Err(e)
            }
        }
    }

    fn fail_blocking(&mut self, err: &ExplorerError) {
        warn!(user_id = self.user_id, error = %err, "tree unavailable");
        self.tree = None;
        self.error = Some(ErrorState::blocking(err));
    }

    // ------------------------------------------------------------------------
    // Interaction
    // ------------------------------------------------------------------------

    /// Select a node and acknowledge its pulse. False when no tree is loaded
    /// or `id` is not in it.
    pub fn click(&mut self, id: WaypointId) -> Result<bool> {
        let Some(tree) = self.tree.as_ref() else {
            return Ok(false);
        };
        Ok(self.reconciler.click(tree, id)?)
    }

    /// Close the selection. Refused while a visit is in flight.
    pub fn deselect(&mut self) -> bool {
        if self.is_visiting() {
            return false;
        }
        self.reconciler.deselect();
        true
    }

    /// Radial layout of the current tree; cached positions never move.
    pub fn layout(&mut self) -> Result<RadialLayout> {
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| ExplorerError::NotFound("no tree loaded".to_string()))?;
        Ok(self.layout_engine.layout(tree, &mut self.positions)?)
    }

    pub async fn journal_entry(&self, node_id: WaypointId) -> Result<Option<JournalEntry>> {
        Ok(self
            .backend
            .fetch_journal_entry(node_id, self.user_id)
            .await?)
    }

    /// Mark `node_id` visited, explore it when it is a leaf, save the journal
    /// text, then refetch and reconcile.
    ///
    /// Step failures become a dismissible error and are reported in the
    /// returned summary; the refetch still runs. A refetch that fails or is
    /// rejected leaves a blocking error and is reported when no step failed.
    /// Only a second concurrent call or an unknown node fail the call itself.
    pub async fn request_visit(
        &mut self,
        node_id: WaypointId,
        journal: Option<&str>,
    ) -> Result<VisitReport> {
        if self.is_visiting() {
            return Err(ExplorerError::OperationInFlight);
        }
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| ExplorerError::NotFound("no tree loaded".to_string()))?;
        let node = find(tree, node_id, self.config.traversal)?
            .ok_or_else(|| ExplorerError::NotFound(format!("waypoint {node_id}")))?;

        let request = VisitRequest::for_node(self.user_id, node, node_id == tree.id)
            .with_journal(journal);
        let generation = self.generation;

        self.reconciler.request_pulse(node_id);
        let outcome = self.orchestrator.run(&request).await?;

        if let Some(err) = &outcome.error {
            self.error = Some(ErrorState::dismissible(err));
        }
        let attached = outcome.attached().to_vec();

        // Committed steps are reported even when the refetched tree is unusable;
        // the blocking error is already recorded by then.
        let refresh_error = match outcome.refreshed {
            Ok(tree) => self
                .apply_snapshot(TreeSnapshot {
                    user_id: request.user_id,
                    generation,
                    tree,
                })
                .err(),
            Err(e) => {
                self.fail_blocking(&e);
                Some(e)
            }
        };

        Ok(VisitReport {
            node_id,
            marked_visited: outcome.marked_visited,
            attached,
            journal_saved: outcome.journal_saved,
            error: outcome
                .error
                .as_ref()
                .or(refresh_error.as_ref())
                .map(ToString::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_client::{BackendOp, InMemoryBackend, Place};
    use waypoint_types::GeoPoint;

    fn session() -> ExplorerSession<InMemoryBackend> {
        let backend = Arc::new(InMemoryBackend::new());
        let root = WaypointNode::new(1, "Start", GeoPoint::new(40.744, -74.032))
            .with_children(vec![WaypointNode::new(2, "Pier", GeoPoint::new(40.745, -74.03))]);
        backend.insert_user_tree(1, "ada", &root);
        ExplorerSession::new(backend, ExplorerConfig::default())
    }

    #[tokio::test]
    async fn test_refresh_loads_tree_and_label() {
        let mut s = session();
        assert_eq!(s.user_label(), USER_PLACEHOLDER);
        assert_eq!(s.refresh().await.unwrap(), SnapshotDisposition::Applied);
        assert_eq!(s.tree().map(|t| t.id), Some(1));
        assert_eq!(s.user_label(), "ada");
        assert_eq!(s.presentation().selected_id, Some(1));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_blocking() {
        let mut s = session();
        s.refresh().await.unwrap();
        s.backend.fail(BackendOp::FetchTree);

        assert!(s.refresh().await.is_err());
        assert!(s.tree().is_none());
        assert!(s.error().unwrap().is_blocking());
        assert!(!s.dismiss_error());

        s.backend.clear_failures();
        s.refresh().await.unwrap();
        assert!(s.error().is_none());
    }

    #[tokio::test]
    async fn test_layout_requires_tree() {
        let mut s = session();
        assert!(matches!(s.layout(), Err(ExplorerError::NotFound(_))));
        s.refresh().await.unwrap();
        let layout = s.layout().unwrap();
        assert_eq!(layout.len(), 2);
        assert_eq!(s.positions().len(), 2);
    }

    #[tokio::test]
    async fn test_visit_unknown_node_fails() {
        let mut s = session();
        s.refresh().await.unwrap();
        assert!(matches!(
            s.request_visit(99, None).await,
            Err(ExplorerError::NotFound(_))
        ));
        assert!(s.reconciler.pending_pulse().is_none());
    }

    #[tokio::test]
    async fn test_rejected_refetch_still_reports_visit() {
        let backend = Arc::new(InMemoryBackend::new());
        let root = WaypointNode::new(1, "Start", GeoPoint::new(40.744, -74.032));
        backend.insert_user_tree(1, "ada", &root);
        backend.add_places([Place::new("osm:9", "Pier", GeoPoint::new(40.745, -74.03))]);
        let mut config = ExplorerConfig::default();
        config.traversal.max_depth = 0;
        let mut s = ExplorerSession::new(backend.clone(), config);
        s.refresh().await.unwrap();

        let report = s.request_visit(1, None).await.unwrap();
        assert!(report.marked_visited);
        assert_eq!(report.attached, vec![2]);
        assert!(report.error.unwrap().contains("depth"));
        assert!(s.tree().is_none());
        assert!(s.error().unwrap().is_blocking());

        let committed = backend.fetch_tree(1).await.unwrap();
        assert!(committed.visited);
        assert_eq!(committed.children.len(), 1);
    }

    #[tokio::test]
    async fn test_roster_skips_missing_users() {
        let mut s = session();
        let roster = s.load_roster(&[1, 2]).await;
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].username, "ada");
    }
}

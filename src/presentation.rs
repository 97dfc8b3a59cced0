//! Selection / animation reconciler
//!
//! Keeps selection, the pulsing set and camera targets stable across tree
//! replacements. State is held by id only; every replacement re-resolves
//! those ids against the new tree.
//!
//! ## Lifecycle
//!
//! ```text
//! first load:   selected = root, fit = whole tree
//! replacement:  selected re-resolved (root if gone), pan = selected node
//! request_pulse(p) ... next reconcile: pulsing ∪= unvisited children of p
//! click(id):    pulsing -= {id}, selected = id, pan = id
//! reset():      everything back to empty (identity switch)
//! ```

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::debug;
use waypoint_layout::GeoBounds;
use waypoint_types::{GeoPoint, WaypointId, WaypointNode};

use crate::error::MalformedTreeError;
use crate::tree::{find, flatten, TraversalLimits};

/// Padding around fit boxes, as a fraction of the box size
const FIT_PADDING: f64 = 0.1;

// ============================================================================
// PRESENTATION STATE
// ============================================================================

/// Node the viewport should centre on
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PanTarget {
    pub id: WaypointId,
    pub position: GeoPoint,
}

impl PanTarget {
    fn of(node: &WaypointNode) -> Self {
        Self {
            id: node.id,
            position: node.position,
        }
    }
}

/// Node set the viewport should zoom to contain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FitTarget {
    /// Whole tree, on first load
    Tree(GeoBounds),
    /// A pulse parent and its newly pulsed children
    Nodes {
        ids: Vec<WaypointId>,
        bounds: GeoBounds,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PresentationState {
    pub selected_id: Option<WaypointId>,
    pub pulsing_ids: BTreeSet<WaypointId>,
    pub pan_target: Option<PanTarget>,
    pub fit_target: Option<FitTarget>,
}

impl PresentationState {
    pub fn is_pulsing(&self, id: WaypointId) -> bool {
        self.pulsing_ids.contains(&id)
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

#[derive(Debug, Default)]
pub struct Reconciler {
    state: PresentationState,
    pending_pulse: Option<WaypointId>,
    /// Ids the user clicked; never pulsed again
    acknowledged: HashSet<WaypointId>,
    /// Set once the current user's first tree has been reconciled
    loaded: bool,
    limits: TraversalLimits,
}

impl Reconciler {
    pub fn new(limits: TraversalLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &PresentationState {
        &self.state
    }

    pub fn pending_pulse(&self) -> Option<WaypointId> {
        self.pending_pulse
    }

    /// Ask the next `reconcile` to pulse the unvisited children of `parent_id`.
    /// Single-shot; a later request replaces an unconsumed one.
    pub fn request_pulse(&mut self, parent_id: WaypointId) {
        self.pending_pulse = Some(parent_id);
    }

    /// Re-derive presentation state for a freshly replaced tree.
    pub fn reconcile(
        &mut self,
        tree: &WaypointNode,
    ) -> Result<&PresentationState, MalformedTreeError> {
        match self.state.selected_id {
            Some(id) => match find(tree, id, self.limits)? {
                Some(node) => self.state.pan_target = Some(PanTarget::of(node)),
                None => {
                    debug!(id, root = tree.id, "selected node vanished, falling back to root");
                    self.state.selected_id = Some(tree.id);
                    self.state.pan_target = Some(PanTarget::of(tree));
                }
            },
            None => self.state.selected_id = Some(tree.id),
        }

        if !self.loaded {
            let positions: Vec<GeoPoint> = flatten(tree, self.limits)?
                .iter()
                .map(|f| f.node.position)
                .collect();
            self.state.fit_target =
                GeoBounds::from_points(&positions).map(|b| FitTarget::Tree(b.padded(FIT_PADDING)));
            self.loaded = true;
        }

        if let Some(parent_id) = self.pending_pulse.take() {
            self.apply_pulse(tree, parent_id)?;
        }
        Ok(&self.state)
    }

    fn apply_pulse(
        &mut self,
        tree: &WaypointNode,
        parent_id: WaypointId,
    ) -> Result<(), MalformedTreeError> {
        let Some(parent) = find(tree, parent_id, self.limits)? else {
            debug!(parent_id, "pulse parent not in tree, dropping request");
            return Ok(());
        };

        let fresh: Vec<&WaypointNode> = parent
            .children
            .iter()
            .filter(|c| !c.visited && !self.acknowledged.contains(&c.id))
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }

        self.state.pulsing_ids.extend(fresh.iter().map(|c| c.id));

        let mut ids = vec![parent.id];
        ids.extend(fresh.iter().map(|c| c.id));
        let positions: Vec<GeoPoint> = std::iter::once(parent.position)
            .chain(fresh.iter().map(|c| c.position))
            .collect();
        if let Some(bounds) = GeoBounds::from_points(&positions) {
            self.state.fit_target = Some(FitTarget::Nodes {
                ids,
                bounds: bounds.padded(FIT_PADDING),
            });
        }
        debug!(
            parent_id,
            pulsing = self.state.pulsing_ids.len(),
            "pulse applied"
        );
        Ok(())
    }

    /// Select `id` and acknowledge its pulse. Returns false, changing
    /// nothing, when `id` is not in `tree`.
    pub fn click(
        &mut self,
        tree: &WaypointNode,
        id: WaypointId,
    ) -> Result<bool, MalformedTreeError> {
        let Some(node) = find(tree, id, self.limits)? else {
            return Ok(false);
        };
        self.state.pulsing_ids.remove(&id);
        self.acknowledged.insert(id);
        self.state.selected_id = Some(id);
        self.state.pan_target = Some(PanTarget::of(node));
        Ok(true)
    }

    pub fn deselect(&mut self) {
        self.state.selected_id = None;
        self.state.pan_target = None;
    }

    pub fn reset(&mut self) {
        self.state = PresentationState::default();
        self.pending_pulse = None;
        self.acknowledged.clear();
        self.loaded = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn leaf(id: WaypointId, lat: f64) -> WaypointNode {
        WaypointNode::new(id, format!("wp-{id}"), GeoPoint::new(lat, -74.0))
    }

    fn root_with(children: Vec<WaypointNode>) -> WaypointNode {
        leaf(1, 40.0).with_children(children)
    }

    #[test]
    fn test_first_load_selects_root_and_fits_tree() {
        let mut rec = Reconciler::default();
        let tree = root_with(vec![leaf(2, 40.1)]);
        let state = rec.reconcile(&tree).unwrap();
        assert_eq!(state.selected_id, Some(1));
        assert!(matches!(state.fit_target, Some(FitTarget::Tree(_))));
        assert!(state.pulsing_ids.is_empty());
    }

    #[test]
    fn test_selection_survives_replacement() {
        let mut rec = Reconciler::default();
        let tree = root_with(vec![leaf(2, 40.1), leaf(3, 40.2)]);
        rec.reconcile(&tree).unwrap();
        assert!(rec.click(&tree, 3).unwrap());

        let replaced = root_with(vec![leaf(2, 40.1), leaf(3, 40.2), leaf(4, 40.3)]);
        assert_eq!(rec.reconcile(&replaced).unwrap().selected_id, Some(3));
    }

    #[test]
    fn test_missing_selection_falls_back_to_root() {
        let mut rec = Reconciler::default();
        let tree = root_with(vec![leaf(2, 40.1)]);
        rec.reconcile(&tree).unwrap();
        rec.click(&tree, 2).unwrap();

        let state = rec.reconcile(&root_with(vec![])).unwrap();
        assert_eq!(state.selected_id, Some(1));
        assert_eq!(state.pan_target.map(|p| p.id), Some(1));
    }

    #[test]
    fn test_pulse_is_monotonic_and_single_shot() {
        let mut rec = Reconciler::default();
        let mut tree = root_with(vec![leaf(2, 40.1)]);
        rec.reconcile(&tree).unwrap();
        rec.request_pulse(1);
        rec.reconcile(&tree).unwrap();
        assert_eq!(rec.state().pulsing_ids, BTreeSet::from([2]));
        assert!(rec.pending_pulse().is_none());

        tree.children[0] = leaf(2, 40.1).with_children(vec![leaf(5, 40.5), leaf(6, 40.6)]);
        rec.request_pulse(2);
        let state = rec.reconcile(&tree).unwrap();
        assert_eq!(state.pulsing_ids, BTreeSet::from([2, 5, 6]));
        match &state.fit_target {
            Some(FitTarget::Nodes { ids, .. }) => assert_eq!(ids, &vec![2, 5, 6]),
            other => panic!("expected node fit, got {other:?}"),
        }
    }

    #[test]
    fn test_pulse_skips_visited_children() {
        let mut rec = Reconciler::default();
        let visited = leaf(3, 40.2).visited_at(chrono::NaiveDateTime::default());
        let tree = root_with(vec![leaf(2, 40.1), visited]);
        rec.request_pulse(1);
        let state = rec.reconcile(&tree).unwrap();
        assert_eq!(state.pulsing_ids, BTreeSet::from([2]));
    }

    #[test]
    fn test_click_clears_only_that_pulse() {
        let mut rec = Reconciler::default();
        let tree = root_with(vec![leaf(2, 40.1), leaf(3, 40.2)]);
        rec.request_pulse(1);
        rec.reconcile(&tree).unwrap();

        assert!(rec.click(&tree, 2).unwrap());
        assert_eq!(rec.state().pulsing_ids, BTreeSet::from([3]));
        assert_eq!(rec.state().selected_id, Some(2));
        assert_eq!(rec.state().pan_target.map(|p| p.position.lat), Some(40.1));

        // acknowledged nodes are not pulsed again
        rec.request_pulse(1);
        rec.reconcile(&tree).unwrap();
        assert_eq!(rec.state().pulsing_ids, BTreeSet::from([3]));
    }

    #[test]
    fn test_click_unknown_id_is_ignored() {
        let mut rec = Reconciler::default();
        let tree = root_with(vec![]);
        rec.reconcile(&tree).unwrap();
        assert!(!rec.click(&tree, 99).unwrap());
        assert_eq!(rec.state().selected_id, Some(1));
    }

    #[test]
    fn test_replacement_repans_to_selected_node() {
        let mut rec = Reconciler::default();
        let tree = root_with(vec![leaf(2, 40.1)]);
        rec.reconcile(&tree).unwrap();
        rec.click(&tree, 2).unwrap();

        let moved = root_with(vec![leaf(2, 40.4)]);
        let state = rec.reconcile(&moved).unwrap();
        assert_eq!(state.selected_id, Some(2));
        assert_eq!(state.pan_target.map(|p| p.position.lat), Some(40.4));
    }

    #[test]
    fn test_deselect_keeps_pulse_fit_on_next_reconcile() {
        let mut rec = Reconciler::default();
        let tree = root_with(vec![leaf(2, 40.1), leaf(3, 40.2)]);
        rec.reconcile(&tree).unwrap();
        rec.request_pulse(1);
        rec.reconcile(&tree).unwrap();
        let pulse_fit = rec.state().fit_target.clone();
        assert!(matches!(pulse_fit, Some(FitTarget::Nodes { .. })));

        rec.deselect();
        let state = rec.reconcile(&tree).unwrap();
        assert_eq!(state.selected_id, Some(1));
        assert_eq!(state.fit_target, pulse_fit);
        assert!(state.pan_target.is_none());
    }

    #[test]
    fn test_reset_restores_first_load_fit() {
        let mut rec = Reconciler::default();
        let tree = root_with(vec![leaf(2, 40.1)]);
        rec.request_pulse(1);
        rec.reconcile(&tree).unwrap();
        assert!(matches!(rec.state().fit_target, Some(FitTarget::Nodes { .. })));

        rec.reset();
        let state = rec.reconcile(&tree).unwrap();
        assert!(matches!(state.fit_target, Some(FitTarget::Tree(_))));
    }

    #[test]
    fn test_reset_and_deselect() {
        let mut rec = Reconciler::default();
        let tree = root_with(vec![leaf(2, 40.1)]);
        rec.request_pulse(1);
        rec.reconcile(&tree).unwrap();
        rec.click(&tree, 2).unwrap();

        rec.deselect();
        assert_eq!(rec.state().selected_id, None);
        assert!(rec.state().pan_target.is_none());

        rec.request_pulse(1);
        rec.reset();
        assert_eq!(rec.state(), &PresentationState::default());
        assert!(rec.pending_pulse().is_none());
    }
}

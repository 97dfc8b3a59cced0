//! Candidate deduplication against a user's tree
//!
//! Discovery returns places near a point with no knowledge of the user's
//! tree. Before attaching, every candidate whose external ref or display
//! name already occurs anywhere in the tree is discarded, as is any
//! repeat within the same batch. Matching is exact string equality.

use std::collections::HashSet;
use std::ops::ControlFlow;

use waypoint_types::{CandidateWaypoint, WaypointNode};

use crate::error::MalformedTreeError;
use crate::tree::{walk, TraversalLimits};

/// Discovery requests this many times the desired count to survive filtering
pub const OVERFETCH_FACTOR: usize = 5;

/// External refs and names already present in a tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownIdentities {
    pub external_refs: HashSet<String>,
    pub names: HashSet<String>,
}

impl KnownIdentities {
    /// A candidate is known if either its external ref or its name is.
    pub fn is_known(&self, candidate: &CandidateWaypoint) -> bool {
        let ref_known = candidate
            .external_ref
            .as_ref()
            .is_some_and(|r| self.external_refs.contains(r));
        ref_known || self.names.contains(&candidate.name)
    }

    fn remember(&mut self, external_ref: Option<&String>, name: &str) {
        if let Some(r) = external_ref {
            self.external_refs.insert(r.clone());
        }
        self.names.insert(name.to_string());
    }

    pub fn len(&self) -> usize {
        self.external_refs.len() + self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.external_refs.is_empty() && self.names.is_empty()
    }
}

/// Every external ref and name in `tree`.
pub fn collect_known_identities(
    tree: &WaypointNode,
    limits: TraversalLimits,
) -> Result<KnownIdentities, MalformedTreeError> {
    let mut known = KnownIdentities::default();
    walk(tree, limits, |node, _, _| {
        known.remember(node.external_ref.as_ref(), &node.name);
        ControlFlow::Continue(())
    })?;
    Ok(known)
}

/// Keep at most `desired` novel candidates, in input order.
pub fn filter_candidates(
    candidates: Vec<CandidateWaypoint>,
    known: &KnownIdentities,
    desired: usize,
) -> Vec<CandidateWaypoint> {
    let mut batch = KnownIdentities::default();
    let mut accepted = Vec::with_capacity(desired.min(candidates.len()));

    for candidate in candidates {
        if accepted.len() == desired {
            break;
        }
        if known.is_known(&candidate) || batch.is_known(&candidate) {
            continue;
        }
        batch.remember(candidate.external_ref.as_ref(), &candidate.name);
        accepted.push(candidate);
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use waypoint_types::{GeoPoint, Waypoint};

    fn candidate(id: i64, external_ref: &str, name: &str) -> CandidateWaypoint {
        Waypoint::from(
            &WaypointNode::new(id, name, GeoPoint::default()).with_external_ref(external_ref),
        )
    }

    fn tree() -> WaypointNode {
        WaypointNode::new(1, "Home", GeoPoint::default())
            .with_external_ref("node/1")
            .with_children(vec![
                WaypointNode::new(2, "Museum", GeoPoint::default()).with_external_ref("node/2")
            ])
    }

    #[test]
    fn test_collect_known_identities() {
        let known = collect_known_identities(&tree(), TraversalLimits::default()).unwrap();
        assert!(known.external_refs.contains("node/2"));
        assert!(known.names.contains("Home"));
        assert_eq!(known.len(), 4);
    }

    #[test]
    fn test_filter_drops_known_ref_or_name() {
        let known = collect_known_identities(&tree(), TraversalLimits::default()).unwrap();
        let candidates = vec![
            candidate(10, "node/2", "Renamed museum"),
            candidate(11, "node/11", "Home"),
            candidate(12, "node/12", "Park"),
        ];
        let kept = filter_candidates(candidates, &known, 3);
        assert_eq!(kept.iter().map(|c| c.id).collect::<Vec<_>>(), vec![12]);
    }

    #[test]
    fn test_filter_truncates_in_order_and_dedups_batch() {
        let known = KnownIdentities::default();
        let candidates = vec![
            candidate(10, "node/10", "Cafe"),
            candidate(11, "node/11", "Cafe"),
            candidate(12, "node/12", "Park"),
            candidate(13, "node/13", "Shop"),
            candidate(14, "node/14", "Pier"),
        ];
        let kept = filter_candidates(candidates, &known, 3);
        assert_eq!(kept.iter().map(|c| c.id).collect::<Vec<_>>(), vec![10, 12, 13]);
    }

    #[test]
    fn test_filter_zero_desired() {
        let kept = filter_candidates(
            vec![candidate(10, "node/10", "Cafe")],
            &KnownIdentities::default(),
            0,
        );
        assert!(kept.is_empty());
    }
}

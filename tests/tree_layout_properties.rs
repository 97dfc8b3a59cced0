//! Property tests for tree traversal, deduplication and radial layout.
//!
//! Trees are generated from a parent vector: node `i` (for `i >= 1`) hangs
//! under node `parents[i] % i`, which yields every tree shape up to the size
//! bound with ids `1..=n`.

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use waypoint_explorer::dedup::{collect_known_identities, filter_candidates};
use waypoint_explorer::tree::{find, find_path, flatten, leaf_count, node_count, validate};
use waypoint_explorer::{GeoPoint, PositionCache, RadialLayoutEngine, TraversalLimits, WaypointNode};
use waypoint_layout::{AngularSpan, Branch, RADIUS_UNIT};
use waypoint_types::{Waypoint, WaypointId};

fn build(parents: &[usize]) -> WaypointNode {
    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, p) in parents.iter().enumerate() {
        let idx = i + 1;
        children.entry(p % idx).or_default().push(idx);
    }
    fn make(idx: usize, children: &HashMap<usize, Vec<usize>>) -> WaypointNode {
        let kids = children
            .get(&idx)
            .map(|c| c.iter().map(|k| make(*k, children)).collect())
            .unwrap_or_default();
        let id = idx as WaypointId + 1;
        WaypointNode::new(id, format!("place-{id}"), GeoPoint::new(40.0, -74.0))
            .with_external_ref(format!("osm:{id}"))
            .with_children(kids)
    }
    make(0, &children)
}

fn arb_tree() -> impl Strategy<Value = WaypointNode> {
    prop::collection::vec(any::<usize>(), 0..40).prop_map(|p| build(&p))
}

/// Append a leaf with a fresh id under the node at pre-order index `at`.
fn grow(tree: &mut WaypointNode, at: usize, new_id: WaypointId) {
    fn visit(
        node: &mut WaypointNode,
        at: usize,
        counter: &mut usize,
        new_id: WaypointId,
    ) -> bool {
        if *counter == at {
            node.children.push(WaypointNode::new(new_id, "new", GeoPoint::default()));
            return true;
        }
        *counter += 1;
        node.children.iter_mut().any(|c| visit(c, at, counter, new_id))
    }
    visit(tree, at, &mut 0, new_id);
}

proptest! {
    #[test]
    fn prop_find_matches_membership(tree in arb_tree(), probe in 0i64..60) {
        let limits = TraversalLimits::default();
        let n = node_count(&tree) as i64;
        let found = find(&tree, probe, limits).unwrap();
        if (1..=n).contains(&probe) {
            prop_assert_eq!(found.map(|f| f.id), Some(probe));
            let path = find_path(&tree, probe, limits).unwrap().unwrap();
            prop_assert_eq!(path.first().copied(), Some(1));
            prop_assert_eq!(path.last().copied(), Some(probe));
        } else {
            prop_assert!(found.is_none());
        }
    }

    #[test]
    fn prop_flatten_is_consistent(tree in arb_tree()) {
        let limits = TraversalLimits::default();
        let flat = flatten(&tree, limits).unwrap();
        prop_assert_eq!(flat.len(), node_count(&tree));
        prop_assert_eq!(flat.iter().filter(|f| f.node.is_leaf()).count(), leaf_count(&tree));
        for entry in &flat {
            prop_assert_eq!(entry.ancestors.len(), entry.depth);
        }
        let stats = validate(&tree, limits).unwrap();
        prop_assert_eq!(stats.nodes, flat.len());
    }

    #[test]
    fn prop_layout_is_idempotent(tree in arb_tree()) {
        let engine = RadialLayoutEngine::new(RADIUS_UNIT);
        let mut cache = PositionCache::new();
        let first = engine.layout(&tree, &mut cache).unwrap();
        let second = engine.layout(&tree, &mut cache).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_layout_growth_never_moves_nodes(
        tree in arb_tree(),
        at in any::<prop::sample::Index>(),
    ) {
        let engine = RadialLayoutEngine::new(RADIUS_UNIT);
        let mut cache = PositionCache::new();
        let before = engine.layout(&tree, &mut cache).unwrap();

        let mut grown = tree.clone();
        let new_id = node_count(&tree) as WaypointId + 1;
        grow(&mut grown, at.index(node_count(&tree)), new_id);
        let after = engine.layout(&grown, &mut cache).unwrap();

        prop_assert_eq!(after.len(), before.len() + 1);
        for node in &before.nodes {
            prop_assert_eq!(after.position(node.id), Some(node.position));
        }
    }

    #[test]
    fn prop_branch_is_inherited_from_root_child(tree in arb_tree()) {
        let engine = RadialLayoutEngine::new(RADIUS_UNIT);
        let layout = engine.layout(&tree, &mut PositionCache::new()).unwrap();
        let root_children: Vec<WaypointId> = tree.children.iter().map(|c| c.id).collect();
        let flat = flatten(&tree, TraversalLimits::default()).unwrap();

        for entry in flat {
            let branch = layout.node(entry.node.id).unwrap().branch;
            let head = entry
                .ancestors
                .get(1)
                .copied()
                .or((entry.depth == 1).then_some(entry.node.id));
            match head {
                None => prop_assert_eq!(branch, Branch::Root),
                Some(head) => {
                    let index = root_children.iter().position(|c| *c == head).unwrap();
                    prop_assert_eq!(branch, Branch::Index(index));
                }
            }
        }
    }

    #[test]
    fn prop_partition_sums_to_parent(weights in prop::collection::vec(1usize..20, 1..12)) {
        let parent = AngularSpan { start: 0.3, end: 2.1 };
        let spans = parent.partition(&weights);
        prop_assert_eq!(spans.len(), weights.len());
        prop_assert_eq!(spans[0].start, parent.start);
        prop_assert_eq!(spans.last().unwrap().end, parent.end);
        for pair in spans.windows(2) {
            prop_assert_eq!(pair[0].end, pair[1].start);
        }
        let total: usize = weights.iter().sum();
        for (span, w) in spans.iter().zip(&weights) {
            let expected = parent.width() * *w as f64 / total as f64;
            prop_assert!((span.width() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn prop_filter_never_returns_known(
        tree in arb_tree(),
        refs in prop::collection::vec(1i64..80, 0..30),
        desired in 0usize..8,
    ) {
        let known = collect_known_identities(&tree, TraversalLimits::default()).unwrap();
        let candidates: Vec<Waypoint> = refs
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let id = 1000 + i as WaypointId;
                Waypoint::from(
                    &WaypointNode::new(id, format!("place-{r}"), GeoPoint::default())
                        .with_external_ref(format!("osm:{r}")),
                )
            })
            .collect();

        let kept = filter_candidates(candidates, &known, desired);
        prop_assert!(kept.len() <= desired);
        for c in &kept {
            prop_assert!(!known.is_known(c));
        }
        let names: HashSet<&str> = kept.iter().map(|c| c.name.as_str()).collect();
        prop_assert_eq!(names.len(), kept.len());
    }
}

#[test]
fn test_leaf_weighted_spans_two_one_one() {
    // root → [a(2 leaves), b, c]
    let tree = build(&[0, 0, 0, 1, 1]);
    assert_eq!(
        tree.children.iter().map(leaf_count).collect::<Vec<_>>(),
        vec![2, 1, 1]
    );

    let engine = RadialLayoutEngine::new(RADIUS_UNIT);
    let layout = engine.layout(&tree, &mut PositionCache::new()).unwrap();
    let angle = |id: WaypointId| {
        let p = layout.position(id).unwrap();
        p.y.atan2(p.x).rem_euclid(std::f64::consts::TAU)
    };
    let tau = std::f64::consts::TAU;
    assert!((angle(2) - tau / 4.0).abs() < 1e-9);
    assert!((angle(3) - tau * 5.0 / 8.0).abs() < 1e-9);
    assert!((angle(4) - tau * 7.0 / 8.0).abs() < 1e-9);
}

//! Tree model traversal
//!
//! Trees arrive from the backend as immutable values and are replaced
//! wholesale on every fetch. Everything here works by id: callers hold a
//! `WaypointId` across refreshes and re-resolve it with [`find`].
//!
//! The backend builds trees as strict hierarchies, so there is no cycle
//! detection. Walks are still bounded by [`TraversalLimits::max_depth`] so a
//! corrupt payload fails with [`MalformedTreeError`] instead of running away.

use std::collections::HashSet;
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use waypoint_types::{WaypointId, WaypointNode};

use crate::error::MalformedTreeError;

pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalLimits {
    pub max_depth: usize,
}

impl Default for TraversalLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// One entry of a flattened tree
#[derive(Debug, Clone, PartialEq)]
pub struct FlatNode<'a> {
    pub node: &'a WaypointNode,
    pub depth: usize,
    /// Ancestor ids, root first, excluding the node itself
    pub ancestors: Vec<WaypointId>,
}

/// Summary produced by [`validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    pub nodes: usize,
    pub leaves: usize,
    pub visited: usize,
    pub max_depth: usize,
}

/// Depth-first pre-order walk with the ancestor chain of every node.
///
/// `visit` may stop the walk early by returning `ControlFlow::Break`.
pub fn walk<'a, F>(
    tree: &'a WaypointNode,
    limits: TraversalLimits,
    mut visit: F,
) -> Result<(), MalformedTreeError>
where
    F: FnMut(&'a WaypointNode, usize, &[WaypointId]) -> ControlFlow<()>,
{
    let mut stack: Vec<(&'a WaypointNode, usize)> = vec![(tree, 0)];
    let mut path: Vec<WaypointId> = Vec::new();

    while let Some((node, depth)) = stack.pop() {
        if depth > limits.max_depth {
            return Err(MalformedTreeError::DepthExceeded {
                id: node.id,
                limit: limits.max_depth,
            });
        }
        path.truncate(depth);
        if visit(node, depth, &path).is_break() {
            return Ok(());
        }
        path.push(node.id);
        stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
    }
    Ok(())
}

/// First node with `id` in pre-order, or `None`.
pub fn find(
    tree: &WaypointNode,
    id: WaypointId,
    limits: TraversalLimits,
) -> Result<Option<&WaypointNode>, MalformedTreeError> {
    let mut found = None;
    walk(tree, limits, |node, _, _| {
        if node.id == id {
            found = Some(node);
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;
    Ok(found)
}

/// Ids from the root down to and including `id`.
pub fn find_path(
    tree: &WaypointNode,
    id: WaypointId,
    limits: TraversalLimits,
) -> Result<Option<Vec<WaypointId>>, MalformedTreeError> {
    let mut found = None;
    walk(tree, limits, |node, _, ancestors| {
        if node.id == id {
            let mut path = ancestors.to_vec();
            path.push(id);
            found = Some(path);
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;
    Ok(found)
}

/// Parent of `id`; `None` for the root or an absent id.
pub fn parent_of(
    tree: &WaypointNode,
    id: WaypointId,
    limits: TraversalLimits,
) -> Result<Option<&WaypointNode>, MalformedTreeError> {
    let mut found = None;
    walk(tree, limits, |node, _, _| {
        if node.children.iter().any(|c| c.id == id) {
            found = Some(node);
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;
    Ok(found)
}

/// Linear pre-order view of the whole tree.
pub fn flatten(
    tree: &WaypointNode,
    limits: TraversalLimits,
) -> Result<Vec<FlatNode<'_>>, MalformedTreeError> {
    let mut out = Vec::new();
    walk(tree, limits, |node, depth, ancestors| {
        out.push(FlatNode {
            node,
            depth,
            ancestors: ancestors.to_vec(),
        });
        ControlFlow::Continue(())
    })?;
    Ok(out)
}

/// Leaves under `node`; a childless node counts as one.
pub fn leaf_count(node: &WaypointNode) -> usize {
    if node.children.is_empty() {
        1
    } else {
        node.children.iter().map(leaf_count).sum()
    }
}

pub fn node_count(node: &WaypointNode) -> usize {
    1 + node.children.iter().map(node_count).sum::<usize>()
}

/// Check a freshly fetched tree: depth bound and id uniqueness.
pub fn validate(
    tree: &WaypointNode,
    limits: TraversalLimits,
) -> Result<TreeStats, MalformedTreeError> {
    let mut seen = HashSet::new();
    let mut stats = TreeStats::default();
    let mut duplicate = None;

    walk(tree, limits, |node, depth, _| {
        if !seen.insert(node.id) {
            duplicate = Some(node.id);
            return ControlFlow::Break(());
        }
        stats.nodes += 1;
        stats.max_depth = stats.max_depth.max(depth);
        if node.is_leaf() {
            stats.leaves += 1;
        }
        if node.visited {
            stats.visited += 1;
        }
        ControlFlow::Continue(())
    })?;

    match duplicate {
        Some(id) => Err(MalformedTreeError::DuplicateId { id }),
        None => Ok(stats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use waypoint_types::GeoPoint;

    fn node(id: WaypointId, children: Vec<WaypointNode>) -> WaypointNode {
        WaypointNode::new(id, format!("wp-{id}"), GeoPoint::default()).with_children(children)
    }

    /// 1 ─┬─ 2 ─┬─ 4
    ///    │     └─ 5
    ///    └─ 3 ─── 6
    fn sample() -> WaypointNode {
        node(
            1,
            vec![
                node(2, vec![node(4, vec![]), node(5, vec![])]),
                node(3, vec![node(6, vec![])]),
            ],
        )
    }

    fn chain(len: usize) -> WaypointNode {
        let mut tree = node(len as WaypointId, vec![]);
        for id in (0..len as WaypointId).rev() {
            tree = node(id, vec![tree]);
        }
        tree
    }

    #[test]
    fn test_find_present_and_absent() {
        let tree = sample();
        let limits = TraversalLimits::default();
        for id in 1..=6 {
            assert_eq!(find(&tree, id, limits).unwrap().map(|n| n.id), Some(id));
        }
        assert!(find(&tree, 42, limits).unwrap().is_none());
    }

    #[test]
    fn test_flatten_is_preorder_with_ancestors() {
        let tree = sample();
        let flat = flatten(&tree, TraversalLimits::default()).unwrap();
        let ids: Vec<_> = flat.iter().map(|f| f.node.id).collect();
        assert_eq!(ids, vec![1, 2, 4, 5, 3, 6]);
        assert_eq!(flat[3].ancestors, vec![1, 2]);
        assert_eq!(flat[3].depth, 2);
        assert_eq!(flat[5].ancestors, vec![1, 3]);
        assert!(flat[0].ancestors.is_empty());
    }

    #[test]
    fn test_find_path_and_parent() {
        let tree = sample();
        let limits = TraversalLimits::default();
        assert_eq!(find_path(&tree, 6, limits).unwrap(), Some(vec![1, 3, 6]));
        assert_eq!(find_path(&tree, 1, limits).unwrap(), Some(vec![1]));
        assert_eq!(parent_of(&tree, 5, limits).unwrap().map(|n| n.id), Some(2));
        assert!(parent_of(&tree, 1, limits).unwrap().is_none());
    }

    #[test]
    fn test_counts() {
        let tree = sample();
        assert_eq!(leaf_count(&tree), 3);
        assert_eq!(node_count(&tree), 6);
        assert_eq!(leaf_count(&node(9, vec![])), 1);
    }

    #[test]
    fn test_depth_bound_fails_malformed() {
        let tree = chain(70);
        let err = find(&tree, 70, TraversalLimits::default()).unwrap_err();
        assert_eq!(err, MalformedTreeError::DepthExceeded { id: 65, limit: 64 });

        let deep_ok = chain(64);
        assert!(find(&deep_ok, 64, TraversalLimits::default())
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let tree = node(1, vec![node(2, vec![]), node(2, vec![])]);
        assert_eq!(
            validate(&tree, TraversalLimits::default()).unwrap_err(),
            MalformedTreeError::DuplicateId { id: 2 }
        );
    }

    #[test]
    fn test_validate_stats() {
        let mut tree = sample();
        tree.visited = true;
        let stats = validate(&tree, TraversalLimits::default()).unwrap();
        assert_eq!(
            stats,
            TreeStats {
                nodes: 6,
                leaves: 3,
                visited: 1,
                max_depth: 2,
            }
        );
    }
}

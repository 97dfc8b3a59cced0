//! Radial layout - leaf-weighted angular partitioning
//!
//! The root sits at the origin with the full circle `[0, 2π)`. Each node's
//! span is split among its children in `children` order, proportionally to
//! each child subtree's leaf count (a childless node counts as one leaf).
//! A node is placed at the middle angle of its span, `depth * radius_unit`
//! away from the origin.
//!
//! Positions are memoized in a [`PositionCache`] keyed by waypoint id. Trees
//! are replaced wholesale on every fetch, so the cache is the only thing that
//! survives a refresh: a node that was placed once keeps its position forever,
//! even when later growth would give it a different span.

use std::collections::HashMap;
use std::f64::consts::TAU;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use waypoint_types::{WaypointId, WaypointNode};

// =============================================================================
// LAYOUT CONSTANTS
// =============================================================================

/// Distance between depth rings, in graph units
pub const RADIUS_UNIT: f64 = 170.0;

/// Deepest tree the engine will walk before giving up
pub const DEFAULT_MAX_DEPTH: usize = 64;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutError {
    #[error("tree deeper than {limit} levels at node {id}")]
    DepthExceeded { id: WaypointId, limit: usize },
}

/// Graph-space position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const ORIGIN: Point2 = Point2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn polar(radius: f64, angle: f64) -> Self {
        Self {
            x: radius * angle.cos(),
            y: radius * angle.sin(),
        }
    }
}

/// Exploration branch a node belongs to.
///
/// Each direct child of the root opens a branch; descendants inherit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Branch {
    Root,
    Index(usize),
}

impl Branch {
    pub fn color_index(&self) -> Option<usize> {
        match self {
            Branch::Root => None,
            Branch::Index(i) => Some(*i),
        }
    }
}

/// Half-open angular interval `[start, end)` in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularSpan {
    pub start: f64,
    pub end: f64,
}

impl AngularSpan {
    pub const FULL: AngularSpan = AngularSpan {
        start: 0.0,
        end: TAU,
    };

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    pub fn mid(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    /// Split this span into consecutive sub-spans proportional to `weights`.
    ///
    /// The last sub-span ends exactly at `self.end` so no angle is lost to
    /// rounding. Returns an empty vec for empty or all-zero weights.
    pub fn partition(&self, weights: &[usize]) -> Vec<AngularSpan> {
        let total: usize = weights.iter().sum();
        if total == 0 {
            return Vec::new();
        }
        let width = self.width();
        let mut cursor = self.start;
        let mut spans = Vec::with_capacity(weights.len());
        for (i, weight) in weights.iter().enumerate() {
            let end = if i + 1 == weights.len() {
                self.end
            } else {
                cursor + width * (*weight as f64) / (total as f64)
            };
            spans.push(AngularSpan { start: cursor, end });
            cursor = end;
        }
        spans
    }
}

/// One placed node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutNode {
    pub id: WaypointId,
    pub position: Point2,
    pub depth: usize,
    pub branch: Branch,
}

/// Parent → child edge, coloured by the child's branch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutEdge {
    pub parent: WaypointId,
    pub child: WaypointId,
    pub branch: Branch,
}

/// Output of one layout pass, nodes in pre-order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RadialLayout {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
}

impl RadialLayout {
    pub fn node(&self, id: WaypointId) -> Option<&LayoutNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn position(&self, id: WaypointId) -> Option<Point2> {
        self.node(id).map(|n| n.position)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// =============================================================================
// POSITION CACHE
// =============================================================================

/// Id-keyed position memo, owned by whoever owns the viewing session.
///
/// Entries are created on first placement and only dropped by [`clear`](Self::clear)
/// when the viewing identity changes.
#[derive(Debug, Clone, Default)]
pub struct PositionCache {
    positions: HashMap<WaypointId, Point2>,
}

impl PositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: WaypointId) -> Option<Point2> {
        self.positions.get(&id).copied()
    }

    pub fn contains(&self, id: WaypointId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }

    fn get_or_place(&mut self, id: WaypointId, place: impl FnOnce() -> Point2) -> Point2 {
        *self.positions.entry(id).or_insert_with(place)
    }
}

// =============================================================================
// ENGINE
// =============================================================================

#[derive(Debug, Clone)]
pub struct RadialLayoutEngine {
    radius_unit: f64,
    max_depth: usize,
}

impl Default for RadialLayoutEngine {
    fn default() -> Self {
        Self::new(RADIUS_UNIT)
    }
}

impl RadialLayoutEngine {
    pub fn new(radius_unit: f64) -> Self {
        Self {
            radius_unit,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn radius_unit(&self) -> f64 {
        self.radius_unit
    }

    /// Place every node of `tree`, reusing cached positions verbatim.
    pub fn layout(
        &self,
        tree: &WaypointNode,
        cache: &mut PositionCache,
    ) -> Result<RadialLayout, LayoutError> {
        let mut leaves = HashMap::new();
        self.count_leaves(tree, 0, &mut leaves)?;

        let mut out = RadialLayout::default();
        self.place(
            tree,
            Placement {
                depth: 0,
                span: AngularSpan::FULL,
                parent: None,
                branch: Branch::Root,
            },
            &leaves,
            cache,
            &mut out,
        );
        debug!(
            nodes = out.nodes.len(),
            cached = cache.len(),
            "radial layout pass"
        );
        Ok(out)
    }

    /// Post-order leaf counts for every subtree, memoized by id.
    fn count_leaves(
        &self,
        node: &WaypointNode,
        depth: usize,
        leaves: &mut HashMap<WaypointId, usize>,
    ) -> Result<usize, LayoutError> {
        if depth > self.max_depth {
            return Err(LayoutError::DepthExceeded {
                id: node.id,
                limit: self.max_depth,
            });
        }
        let count = if node.children.is_empty() {
            1
        } else {
            let mut sum = 0;
            for child in &node.children {
                sum += self.count_leaves(child, depth + 1, leaves)?;
            }
            sum
        };
        leaves.insert(node.id, count);
        Ok(count)
    }

    fn place(
        &self,
        node: &WaypointNode,
        at: Placement,
        leaves: &HashMap<WaypointId, usize>,
        cache: &mut PositionCache,
        out: &mut RadialLayout,
    ) {
        let radius = at.depth as f64 * self.radius_unit;
        let position = cache.get_or_place(node.id, || Point2::polar(radius, at.span.mid()));

        out.nodes.push(LayoutNode {
            id: node.id,
            position,
            depth: at.depth,
            branch: at.branch,
        });
        if let Some(parent) = at.parent {
            out.edges.push(LayoutEdge {
                parent,
                child: node.id,
                branch: at.branch,
            });
        }

        if node.children.is_empty() {
            return;
        }

        let weights: Vec<usize> = node
            .children
            .iter()
            .map(|c| leaves.get(&c.id).copied().unwrap_or(1))
            .collect();
        let spans = at.span.partition(&weights);

        for (i, (child, span)) in node.children.iter().zip(spans).enumerate() {
            let branch = match at.branch {
                Branch::Root => Branch::Index(i),
                inherited => inherited,
            };
            self.place(
                child,
                Placement {
                    depth: at.depth + 1,
                    span,
                    parent: Some(node.id),
                    branch,
                },
                leaves,
                cache,
                out,
            );
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    depth: usize,
    span: AngularSpan,
    parent: Option<WaypointId>,
    branch: Branch,
}

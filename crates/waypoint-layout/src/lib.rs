//! Waypoint tree layout
//!
//! Pure geometry for rendering collaborators:
//! - `radial` - angle-partitioned radial placement with id-keyed position memoization
//! - `colors` - branch and category palettes
//! - `bounds` - bounding boxes and auto-fit zoom for pan/fit targets
//!
//! Nothing here performs I/O or owns rendering; outputs are plain
//! `(id, position, branch, depth)` tuples.

pub mod bounds;
pub mod colors;
pub mod radial;

pub use bounds::{GeoBounds, GraphBounds};
pub use colors::{branch_palette, node_fill, BranchPalette, Rgb, BRANCH_COLORS};
pub use radial::{
    AngularSpan, Branch, LayoutEdge, LayoutError, LayoutNode, Point2, PositionCache,
    RadialLayout, RadialLayoutEngine, RADIUS_UNIT,
};

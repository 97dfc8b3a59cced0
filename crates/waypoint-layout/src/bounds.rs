//! Bounding boxes and auto-fit
//!
//! `GeoBounds` frames a node set on the map; `GraphBounds` frames it in the
//! radial graph and computes the zoom that fits it into a viewport.

use serde::Serialize;
use waypoint_types::GeoPoint;

use crate::radial::Point2;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Fraction of the viewport the content may occupy
const FIT_MARGIN: f64 = 0.9;

const MIN_AUTO_ZOOM: f64 = 0.1;
const MAX_AUTO_ZOOM: f64 = 2.0;

/// Graph-space padding around node centres, so markers are not clipped
const GRAPH_PADDING: f64 = 50.0;

// =============================================================================
// GEO BOUNDS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    /// Smallest box containing every point; `None` for an empty set.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a GeoPoint>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self {
            south: first.lat,
            west: first.lon,
            north: first.lat,
            east: first.lon,
        };
        for p in iter {
            bounds.south = bounds.south.min(p.lat);
            bounds.north = bounds.north.max(p.lat);
            bounds.west = bounds.west.min(p.lon);
            bounds.east = bounds.east.max(p.lon);
        }
        Some(bounds)
    }

    /// Grow each side by `ratio` of the box size.
    pub fn padded(&self, ratio: f64) -> Self {
        let dlat = (self.north - self.south) * ratio;
        let dlon = (self.east - self.west) * ratio;
        Self {
            south: self.south - dlat,
            west: self.west - dlon,
            north: self.north + dlat,
            east: self.east + dlon,
        }
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }

    pub fn contains(&self, p: &GeoPoint) -> bool {
        (self.south..=self.north).contains(&p.lat) && (self.west..=self.east).contains(&p.lon)
    }
}

// =============================================================================
// GRAPH BOUNDS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GraphBounds {
    pub min: Point2,
    pub max: Point2,
}

impl GraphBounds {
    /// Padded box around node centres; `None` for an empty set.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point2>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let (mut min, mut max) = (first, first);
        for p in iter {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some(Self {
            min: Point2::new(min.x - GRAPH_PADDING, min.y - GRAPH_PADDING),
            max: Point2::new(max.x + GRAPH_PADDING, max.y + GRAPH_PADDING),
        })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point2 {
        Point2::new((self.min.x + self.max.x) / 2.0, (self.min.y + self.max.y) / 2.0)
    }

    /// Zoom that fits the box into a `width × height` viewport with margin.
    pub fn fit_zoom(&self, viewport_width: f64, viewport_height: f64) -> f64 {
        if self.width() < 1.0 || self.height() < 1.0 {
            return 1.0;
        }
        let zoom_x = viewport_width * FIT_MARGIN / self.width();
        let zoom_y = viewport_height * FIT_MARGIN / self.height();
        zoom_x.min(zoom_y).clamp(MIN_AUTO_ZOOM, MAX_AUTO_ZOOM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_bounds_empty() {
        assert!(GeoBounds::from_points(&[] as &[GeoPoint]).is_none());
    }

    #[test]
    fn test_geo_bounds_contains_all_points() {
        let points = [
            GeoPoint::new(40.74, -74.03),
            GeoPoint::new(40.75, -74.02),
            GeoPoint::new(40.73, -74.04),
        ];
        let bounds = GeoBounds::from_points(&points).unwrap();
        assert!(points.iter().all(|p| bounds.contains(p)));
        assert_eq!(bounds.south, 40.73);
        assert_eq!(bounds.east, -74.02);

        let padded = bounds.padded(0.5);
        assert!(padded.north > bounds.north && padded.west < bounds.west);
        assert!((padded.center().lat - bounds.center().lat).abs() < 1e-12);
    }

    #[test]
    fn test_graph_fit_zoom_clamped() {
        let tiny = GraphBounds::from_points(&[Point2::ORIGIN]).unwrap();
        assert_eq!(tiny.width(), 100.0);
        assert_eq!(tiny.fit_zoom(1000.0, 1000.0), MAX_AUTO_ZOOM);

        let huge =
            GraphBounds::from_points(&[Point2::new(-50_000.0, 0.0), Point2::new(50_000.0, 10.0)])
                .unwrap();
        assert_eq!(huge.fit_zoom(800.0, 600.0), MIN_AUTO_ZOOM);
    }

    #[test]
    fn test_graph_fit_zoom_picks_tighter_axis() {
        let bounds =
            GraphBounds::from_points(&[Point2::new(-350.0, -50.0), Point2::new(350.0, 50.0)])
                .unwrap();
        // 800 x 200 box into 1000 x 1000: x axis is the constraint
        let zoom = bounds.fit_zoom(1000.0, 1000.0);
        assert!((zoom - 900.0 / 800.0).abs() < 1e-9);
        assert_eq!(bounds.center(), Point2::ORIGIN);
    }
}

//! Shared API Types for the waypoint explorer
//!
//! This crate is the SINGLE SOURCE OF TRUTH for all types crossing the backend boundary.
//!
//! ## Boundaries
//!
//! ```text
//! ┌──────────────────┐         ┌──────────────────┐
//! │  Waypoint API    │  JSON   │  Explorer engine │
//! │  (backend)       │ ◄─────► │  (this client)   │
//! └──────────────────┘         └──────────────────┘
//! ```
//!
//! ## Rules
//!
//! 1. All wire types live here - no inline struct definitions in clients
//! 2. Field names follow the backend JSON (`api_id`, `visited_at`, `child_ids`)
//! 3. Trees are values: a fetched `WaypointNode` is never mutated, only replaced

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Stable waypoint identifier, unique within a user's tree and never reused.
pub type WaypointId = i64;

/// User identifier.
pub type UserId = i64;

// ============================================================================
// GEOGRAPHY
// ============================================================================

/// WGS84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in metres (haversine, mean earth radius).
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_008.8;
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

// ============================================================================
// CATEGORY
// ============================================================================

/// Place category tag as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Museum,
    Restaurant,
    Shop,
    Attraction,
    Park,
    Cafe,
    Other,
}

impl std::str::FromStr for Category {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "museum" => Self::Museum,
            "restaurant" => Self::Restaurant,
            "shop" => Self::Shop,
            "attraction" => Self::Attraction,
            "park" => Self::Park,
            "cafe" => Self::Cafe,
            _ => Self::Other,
        })
    }
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Museum => "museum",
            Self::Restaurant => "restaurant",
            Self::Shop => "shop",
            Self::Attraction => "attraction",
            Self::Park => "park",
            Self::Cafe => "cafe",
            Self::Other => "other",
        }
    }
}

// ============================================================================
// WAYPOINT TREE
// ============================================================================

/// One node of a user's waypoint tree, with its children nested in insertion order.
///
/// Returned by `GET /api/waypoint/tree/<user_id>`. Instances are replaced
/// wholesale on every fetch; hold ids, never references, across refreshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointNode {
    pub id: WaypointId,

    /// External-source identifier (e.g. `node/123456`), unique across the user's tree
    #[serde(rename = "api_id", default)]
    pub external_ref: Option<String>,

    /// Display name, not guaranteed unique
    pub name: String,

    #[serde(flatten)]
    pub position: GeoPoint,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub visited: bool,

    #[serde(default)]
    pub visited_at: Option<NaiveDateTime>,

    #[serde(default)]
    pub children: Vec<WaypointNode>,
}

impl WaypointNode {
    /// Create an unvisited, childless node
    pub fn new(id: WaypointId, name: impl Into<String>, position: GeoPoint) -> Self {
        Self {
            id,
            external_ref: None,
            name: name.into(),
            position,
            category: None,
            visited: false,
            visited_at: None,
            children: Vec::new(),
        }
    }

    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_children(mut self, children: Vec<WaypointNode>) -> Self {
        self.children = children;
        self
    }

    pub fn visited_at(mut self, at: NaiveDateTime) -> Self {
        self.visited = true;
        self.visited_at = Some(at);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn category_tag(&self) -> Option<Category> {
        self.category.as_deref().and_then(|c| c.parse().ok())
    }
}

// ============================================================================
// FLAT WAYPOINT
// ============================================================================

/// Flat waypoint record with child ids instead of nested children.
///
/// Returned by `GET /api/waypoint/<id>`, `PATCH .../visited`, `PATCH .../children`
/// and by nearby discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: WaypointId,
    #[serde(rename = "api_id", default)]
    pub external_ref: Option<String>,
    pub name: String,
    #[serde(flatten)]
    pub position: GeoPoint,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub visited: bool,
    #[serde(default)]
    pub visited_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub children: Vec<WaypointId>,
}

/// A nearby place returned by discovery. It already exists on the backend
/// (created or found by `api_id`) but is not yet attached to any parent.
pub type CandidateWaypoint = Waypoint;

impl From<&WaypointNode> for Waypoint {
    fn from(node: &WaypointNode) -> Self {
        Self {
            id: node.id,
            external_ref: node.external_ref.clone(),
            name: node.name.clone(),
            position: node.position,
            category: node.category.clone(),
            visited: node.visited,
            visited_at: node.visited_at,
            children: node.children.iter().map(|c| c.id).collect(),
        }
    }
}

impl Waypoint {
    /// Expand into a childless tree node
    pub fn into_leaf(self) -> WaypointNode {
        WaypointNode {
            id: self.id,
            external_ref: self.external_ref,
            name: self.name,
            position: self.position,
            category: self.category,
            visited: self.visited,
            visited_at: self.visited_at,
            children: Vec::new(),
        }
    }
}

// ============================================================================
// USER & JOURNAL
// ============================================================================

/// User record, used for display only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub root_waypoint_id: Option<WaypointId>,
}

/// Free-text journal entry for a (waypoint, user) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: i64,
    pub waypoint_id: WaypointId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: NaiveDateTime,
}

// ============================================================================
// REQUEST BODIES
// ============================================================================

/// `PATCH /api/waypoint/<id>/visited`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetVisitedRequest {
    pub visited: bool,
}

/// `POST /api/waypoint/osm`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverNearbyRequest {
    pub lat: f64,
    pub lon: f64,
    /// Search radius in metres
    pub radius: f64,
    pub num: usize,
}

/// `PATCH /api/waypoint/<id>/children`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddChildrenRequest {
    pub child_ids: Vec<WaypointId>,
}

/// `POST /api/journal`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveJournalRequest {
    pub waypoint_id: WaypointId,
    pub user_id: UserId,
    pub content: String,
}

/// Error body returned by the backend on 4xx/5xx
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

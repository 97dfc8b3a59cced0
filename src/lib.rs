//! Waypoint Explorer - tree synchronization and presentation engine
//!
//! A user explores real-world places arranged as a tree rooted at a starting
//! location. Visiting a leaf discovers new nearby children. This crate keeps
//! a front end's view of that tree consistent while it grows:
//!
//! - `tree` - id-based traversal over immutable tree snapshots
//! - `dedup` - filters discovery candidates already present in the tree
//! - `presentation` - selection, pulsing set and camera targets across refetches
//! - `orchestrator` - the single-flight "visit" workflow
//! - `session` - the surface a renderer talks to
//!
//! Layout lives in `waypoint-layout`, backend access in `waypoint-client`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use waypoint_explorer::{ExplorerConfig, ExplorerSession, HttpBackend};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ExplorerConfig::default();
//! let backend = Arc::new(HttpBackend::new(&config.api.base_url)?);
//! let mut session = ExplorerSession::new(backend, config);
//!
//! session.refresh().await?;
//! let report = session.request_visit(1, Some("Great view")).await?;
//! println!("attached {:?}", report.attached);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Configuration and tracing
pub mod config;
pub mod telemetry;

// Tree model and derived state
pub mod dedup;
pub mod presentation;
pub mod tree;

// Workflow and front-end surface
pub mod orchestrator;
pub mod session;

pub use config::{ConfigLoader, ExplorerConfig};
pub use error::{ErrorSeverity, ErrorState, ExplorerError, MalformedTreeError, Result};
pub use orchestrator::{
    explore_waypoint, DiscoveryOutcome, ExplorationOrchestrator, ExplorationPhase,
    ExplorationPlan, VisitOutcome, VisitRequest,
};
pub use presentation::{FitTarget, PanTarget, PresentationState, Reconciler};
pub use session::{ExplorerSession, SnapshotDisposition, TreeSnapshot, VisitReport};
pub use tree::TraversalLimits;

pub use waypoint_client::{ClientError, ExplorerBackend, HttpBackend, InMemoryBackend};
pub use waypoint_layout::{Branch, LayoutNode, PositionCache, RadialLayout, RadialLayoutEngine};
pub use waypoint_types::{GeoPoint, UserId, WaypointId, WaypointNode};

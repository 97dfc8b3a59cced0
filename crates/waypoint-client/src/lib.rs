//! ExplorerBackend trait: the sole API boundary between the explorer engine and the
//! waypoint backend. The engine depends on this crate, never on a transport directly.

pub mod error;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use waypoint_types::{
    CandidateWaypoint, GeoPoint, JournalEntry, User, UserId, Waypoint, WaypointId, WaypointNode,
};

pub use error::ClientError;
pub use http::HttpBackend;
pub use memory::{BackendOp, InMemoryBackend, Place};

pub type Result<T> = std::result::Result<T, ClientError>;

#[async_trait]
pub trait ExplorerBackend: Send + Sync {
    /// Full current tree for a user, rooted at the user's root waypoint.
    async fn fetch_tree(&self, user_id: UserId) -> Result<WaypointNode>;

    /// One waypoint as a flat record.
    async fn fetch_waypoint(&self, id: WaypointId) -> Result<Waypoint>;

    /// Mark a waypoint visited. Calling twice with the same id is a no-op success.
    async fn mark_visited(&self, id: WaypointId) -> Result<Waypoint>;

    /// Nearby places within `radius_m` metres, at most `count`.
    /// Results are not deduplicated against any user's tree.
    async fn discover_nearby(
        &self,
        position: GeoPoint,
        radius_m: f64,
        count: usize,
    ) -> Result<Vec<CandidateWaypoint>>;

    /// Append children to a parent, preserving existing order.
    /// Fails with `NotFound` when the parent no longer exists.
    async fn attach_children(
        &self,
        parent_id: WaypointId,
        child_ids: &[WaypointId],
    ) -> Result<Waypoint>;

    /// Store free text for a (waypoint, user) pair, replacing any prior entry.
    async fn save_journal_entry(
        &self,
        waypoint_id: WaypointId,
        user_id: UserId,
        text: &str,
    ) -> Result<JournalEntry>;

    /// Journal entry for a (waypoint, user) pair; `None` when none was written.
    async fn fetch_journal_entry(
        &self,
        waypoint_id: WaypointId,
        user_id: UserId,
    ) -> Result<Option<JournalEntry>>;

    async fn fetch_user(&self, user_id: UserId) -> Result<User>;
}

//! In-process [`ExplorerBackend`] with the same semantics as the REST backend.
//!
//! Used by integration tests and the offline demo. Discovery is served from a
//! fixed pool of [`Place`]s filtered by distance; discovered places become
//! waypoints (found by external ref when they already exist), exactly like the
//! backend's create-or-get behaviour.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;
use waypoint_types::{
    CandidateWaypoint, GeoPoint, JournalEntry, User, UserId, Waypoint, WaypointId, WaypointNode,
};

use crate::{ClientError, ExplorerBackend, Result};

/// Backend operations, used for call recording and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    FetchTree,
    FetchWaypoint,
    MarkVisited,
    DiscoverNearby,
    AttachChildren,
    SaveJournal,
    FetchJournal,
    FetchUser,
}

/// A real-world place the discovery provider knows about
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub external_ref: String,
    pub name: String,
    pub position: GeoPoint,
    pub category: Option<String>,
}

impl Place {
    pub fn new(
        external_ref: impl Into<String>,
        name: impl Into<String>,
        position: GeoPoint,
    ) -> Self {
        Self {
            external_ref: external_ref.into(),
            name: name.into(),
            position,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    waypoints: BTreeMap<WaypointId, Waypoint>,
    users: BTreeMap<UserId, User>,
    journal: BTreeMap<(WaypointId, UserId), JournalEntry>,
    places: Vec<Place>,
    next_waypoint_id: WaypointId,
    next_journal_id: i64,
    failures: HashSet<BackendOp>,
    calls: Vec<BackendOp>,
}

impl MemoryState {
    /// Record the call and fail it when a failure was injected for `op`.
    fn enter(&mut self, op: BackendOp) -> Result<()> {
        self.calls.push(op);
        if self.failures.contains(&op) {
            return Err(ClientError::Transport(format!("injected failure: {op:?}")));
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> WaypointId {
        self.next_waypoint_id += 1;
        self.next_waypoint_id
    }

    fn waypoint(&self, id: WaypointId) -> Result<&Waypoint> {
        self.waypoints
            .get(&id)
            .ok_or_else(|| ClientError::NotFound(format!("waypoint {id}")))
    }

    fn insert_node(&mut self, node: &WaypointNode) {
        self.next_waypoint_id = self.next_waypoint_id.max(node.id);
        self.waypoints.insert(node.id, Waypoint::from(node));
        for child in &node.children {
            self.insert_node(child);
        }
    }

    fn find_by_ref(&self, external_ref: &str) -> Option<WaypointId> {
        self.waypoints
            .values()
            .find(|w| w.external_ref.as_deref() == Some(external_ref))
            .map(|w| w.id)
    }

    /// Rebuild the nested tree, skipping ids already emitted so a corrupt
    /// child list can never recurse forever.
    fn build_tree(
        &self,
        id: WaypointId,
        seen: &mut HashSet<WaypointId>,
    ) -> Option<WaypointNode> {
        if !seen.insert(id) {
            return None;
        }
        let waypoint = self.waypoints.get(&id)?;
        let children = waypoint
            .children
            .iter()
            .filter_map(|child| self.build_tree(*child, seen))
            .collect();
        let mut node = waypoint.clone().into_leaf();
        node.children = children;
        Some(node)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panicked test thread must not poison the fixture for the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a user whose tree is `tree`, storing every node.
    pub fn insert_user_tree(&self, user_id: UserId, username: &str, tree: &WaypointNode) {
        let mut state = self.state();
        state.insert_node(tree);
        state.users.insert(
            user_id,
            User {
                id: user_id,
                username: username.to_string(),
                root_waypoint_id: Some(tree.id),
            },
        );
    }

    pub fn add_place(&self, place: Place) {
        self.state().places.push(place);
    }

    pub fn add_places(&self, places: impl IntoIterator<Item = Place>) {
        self.state().places.extend(places);
    }

    /// Make every subsequent call of `op` fail with a transport error.
    pub fn fail(&self, op: BackendOp) {
        self.state().failures.insert(op);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<BackendOp> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn waypoint(&self, id: WaypointId) -> Option<Waypoint> {
        self.state().waypoints.get(&id).cloned()
    }

    pub fn journal(&self, waypoint_id: WaypointId, user_id: UserId) -> Option<JournalEntry> {
        self.state().journal.get(&(waypoint_id, user_id)).cloned()
    }
}

#[async_trait]
impl ExplorerBackend for InMemoryBackend {
    async fn fetch_tree(&self, user_id: UserId) -> Result<WaypointNode> {
        let mut state = self.state();
        state.enter(BackendOp::FetchTree)?;
        let root_id = state
            .users
            .get(&user_id)
            .and_then(|u| u.root_waypoint_id)
            .ok_or_else(|| ClientError::NotFound(format!("waypoint tree for user {user_id}")))?;
        state
            .build_tree(root_id, &mut HashSet::new())
            .ok_or_else(|| ClientError::NotFound(format!("root waypoint {root_id}")))
    }

    async fn fetch_waypoint(&self, id: WaypointId) -> Result<Waypoint> {
        let mut state = self.state();
        state.enter(BackendOp::FetchWaypoint)?;
        state.waypoint(id).cloned()
    }

    async fn mark_visited(&self, id: WaypointId) -> Result<Waypoint> {
        let mut state = self.state();
        state.enter(BackendOp::MarkVisited)?;
        let waypoint = state
            .waypoints
            .get_mut(&id)
            .ok_or_else(|| ClientError::NotFound(format!("waypoint {id}")))?;
        if !waypoint.visited {
            waypoint.visited = true;
            waypoint.visited_at = Some(chrono::Utc::now().naive_utc());
        }
        Ok(waypoint.clone())
    }

    async fn discover_nearby(
        &self,
        position: GeoPoint,
        radius_m: f64,
        count: usize,
    ) -> Result<Vec<CandidateWaypoint>> {
        let mut state = self.state();
        state.enter(BackendOp::DiscoverNearby)?;

        let nearby: Vec<Place> = state
            .places
            .iter()
            .filter(|p| p.position.distance_m(&position) <= radius_m)
            .take(count)
            .cloned()
            .collect();

        let mut results = Vec::with_capacity(nearby.len());
        for place in nearby {
            let id = match state.find_by_ref(&place.external_ref) {
                Some(id) => id,
                None => {
                    let id = state.allocate_id();
                    state.waypoints.insert(
                        id,
                        Waypoint {
                            id,
                            external_ref: Some(place.external_ref.clone()),
                            name: place.name.clone(),
                            position: place.position,
                            category: place.category.clone(),
                            visited: false,
                            visited_at: None,
                            children: Vec::new(),
                        },
                    );
                    id
                }
            };
            results.push(state.waypoint(id)?.clone());
        }
        debug!(found = results.len(), radius_m, "in-memory discovery");
        Ok(results)
    }

    async fn attach_children(
        &self,
        parent_id: WaypointId,
        child_ids: &[WaypointId],
    ) -> Result<Waypoint> {
        let mut state = self.state();
        state.enter(BackendOp::AttachChildren)?;
        let parent = state
            .waypoints
            .get_mut(&parent_id)
            .ok_or_else(|| ClientError::NotFound(format!("waypoint {parent_id}")))?;
        for child in child_ids {
            if !parent.children.contains(child) {
                parent.children.push(*child);
            }
        }
        Ok(parent.clone())
    }

    async fn save_journal_entry(
        &self,
        waypoint_id: WaypointId,
        user_id: UserId,
        text: &str,
    ) -> Result<JournalEntry> {
        let mut state = self.state();
        state.enter(BackendOp::SaveJournal)?;
        if text.trim().is_empty() {
            return Err(ClientError::Rejected(
                "waypoint_id, user_id, and content are required".to_string(),
            ));
        }
        state.waypoint(waypoint_id)?;
        if !state.users.contains_key(&user_id) {
            return Err(ClientError::NotFound(format!("user {user_id}")));
        }
        state.next_journal_id += 1;
        let entry = JournalEntry {
            id: state.next_journal_id,
            waypoint_id,
            user_id,
            content: text.trim().to_string(),
            created_at: chrono::Utc::now().naive_utc(),
        };
        state.journal.insert((waypoint_id, user_id), entry.clone());
        Ok(entry)
    }

    async fn fetch_journal_entry(
        &self,
        waypoint_id: WaypointId,
        user_id: UserId,
    ) -> Result<Option<JournalEntry>> {
        let mut state = self.state();
        state.enter(BackendOp::FetchJournal)?;
        Ok(state.journal.get(&(waypoint_id, user_id)).cloned())
    }

    async fn fetch_user(&self, user_id: UserId) -> Result<User> {
        let mut state = self.state();
        state.enter(BackendOp::FetchUser)?;
        state
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("user {user_id}")))
    }
}

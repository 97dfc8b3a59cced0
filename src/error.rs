//! Error handling for the explorer engine
//!
//! One taxonomy for everything the engine surfaces: transport failures,
//! missing entities, malformed trees, single-flight violations and bad
//! configuration. Exhausting discovery candidates is deliberately absent:
//! zero novel places is a normal outcome, not an error.

use thiserror::Error;
use waypoint_client::ClientError;
use waypoint_layout::LayoutError;
use waypoint_types::WaypointId;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed tree: {0}")]
    MalformedTree(#[from] MalformedTreeError),

    #[error("An exploration is already in progress")]
    OperationInFlight,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Structural violations found while walking a tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedTreeError {
    #[error("depth exceeds {limit} at node {id}")]
    DepthExceeded { id: WaypointId, limit: usize },

    #[error("node id {id} appears more than once")]
    DuplicateId { id: WaypointId },
}

impl From<ClientError> for ExplorerError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound(what) => ExplorerError::NotFound(what),
            other => ExplorerError::Transport(other.to_string()),
        }
    }
}

impl From<LayoutError> for MalformedTreeError {
    fn from(err: LayoutError) -> Self {
        match err {
            LayoutError::DepthExceeded { id, limit } => {
                MalformedTreeError::DepthExceeded { id, limit }
            }
        }
    }
}

impl From<LayoutError> for ExplorerError {
    fn from(err: LayoutError) -> Self {
        ExplorerError::MalformedTree(err.into())
    }
}

pub type Result<T> = std::result::Result<T, ExplorerError>;

// ============================================================================
// USER-VISIBLE ERROR STATE
// ============================================================================

/// How an error is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ErrorSeverity {
    /// No tree can be shown until the next successful fetch
    Blocking,
    /// Shown over the current tree; the user may dismiss it
    Dismissible,
}

/// Error as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ErrorState {
    pub message: String,
    pub severity: ErrorSeverity,
}

impl ErrorState {
    pub fn blocking(err: &ExplorerError) -> Self {
        Self {
            message: err.to_string(),
            severity: ErrorSeverity::Blocking,
        }
    }

    pub fn dismissible(err: &ExplorerError) -> Self {
        Self {
            message: err.to_string(),
            severity: ErrorSeverity::Dismissible,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == ErrorSeverity::Blocking
    }
}

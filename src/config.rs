//! Explorer configuration
//!
//! Loaded from YAML, then overridden from the environment:
//!
//! | Variable            | Overrides          |
//! |---------------------|--------------------|
//! | `EXPLORER_CONFIG`   | config file path   |
//! | `EXPLORER_API_URL`  | `api.base_url`     |
//! | `EXPLORER_USER_ID`  | `user_id`          |
//! | `EXPLORER_LOG`      | `log_filter`       |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use waypoint_types::UserId;

use crate::dedup::OVERFETCH_FACTOR;
use crate::error::ExplorerError;
use crate::tree::TraversalLimits;

pub const DEFAULT_CONFIG_PATH: &str = "config/explorer.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub api: ApiConfig,
    pub exploration: ExplorationConfig,
    pub layout: LayoutConfig,
    pub traversal: TraversalLimits,
    /// User whose tree is opened on start
    pub user_id: UserId,
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            exploration: ExplorationConfig::default(),
            layout: LayoutConfig::default(),
            traversal: TraversalLimits::default(),
            user_id: 1,
            log_filter: "waypoint_explorer=info,waypoint_client=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    pub search_radius_m: f64,
    /// Children sought when exploring an ordinary leaf
    pub child_count: usize,
    /// Children sought on the root's first exploration
    pub root_child_count: usize,
    pub overfetch_factor: usize,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            search_radius_m: 500.0,
            child_count: 3,
            root_child_count: 5,
            overfetch_factor: OVERFETCH_FACTOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub radius_unit: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            radius_unit: waypoint_layout::RADIUS_UNIT,
        }
    }
}

impl ExplorerConfig {
    pub fn validate(&self) -> std::result::Result<(), ExplorerError> {
        let invalid = |msg: &str| Err(ExplorerError::Config(msg.to_string()));

        if let Err(e) = url::Url::parse(&self.api.base_url) {
            return Err(ExplorerError::Config(format!(
                "api.base_url {:?} is not a URL: {e}",
                self.api.base_url
            )));
        }
        if self.api.timeout_secs == 0 {
            return invalid("api.timeout_secs must be positive");
        }
        let exploration = &self.exploration;
        if !(exploration.search_radius_m.is_finite() && exploration.search_radius_m > 0.0) {
            return invalid("exploration.search_radius_m must be positive");
        }
        if exploration.child_count == 0 || exploration.root_child_count == 0 {
            return invalid("exploration child counts must be positive");
        }
        if exploration.overfetch_factor == 0 {
            return invalid("exploration.overfetch_factor must be positive");
        }
        if !(self.layout.radius_unit.is_finite() && self.layout.radius_unit > 0.0) {
            return invalid("layout.radius_unit must be positive");
        }
        if self.traversal.max_depth == 0 {
            return invalid("traversal.max_depth must be positive");
        }
        Ok(())
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> std::result::Result<(), ExplorerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("EXPLORER_API_URL") {
            self.api.base_url = url;
        }
        if let Some(user) = lookup("EXPLORER_USER_ID") {
            self.user_id = user.trim().parse().map_err(|_| {
                ExplorerError::Config(format!("EXPLORER_USER_ID is not an id: {user}"))
            })?;
        }
        if let Some(filter) = lookup("EXPLORER_LOG") {
            self.log_filter = filter;
        }
        Ok(())
    }
}

// ============================================================================
// LOADER
// ============================================================================

pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create loader from EXPLORER_CONFIG env var or default to "config/explorer.yaml"
    pub fn from_env() -> Self {
        let path =
            std::env::var("EXPLORER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file (defaults when it does not exist), apply environment
    /// overrides and validate.
    pub fn load(&self) -> Result<ExplorerConfig> {
        let mut config = self.load_file()?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn load_file(&self) -> Result<ExplorerConfig> {
        if !self.path.exists() {
            info!(
                "No configuration at {}, using defaults",
                self.path.display()
            );
            return Ok(ExplorerConfig::default());
        }

        info!("Loading explorer configuration from {}", self.path.display());
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let config: ExplorerConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(config)
    }
}

//! Planner configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{PlannerError, PlannerResult};

/// Widest leaf set the join search can represent
pub const MAX_JOIN_LEAVES_LIMIT: usize = 64;

/// How a nested-loop join restarts its right input for the next left
/// tuple
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewindStrategy {
    /// Mark the right input at its first tuple and reset to the mark.
    /// Inputs that cannot mark are buffered.
    #[default]
    Mark,
    /// Call `initialize()` on the right input again
    Reinitialize,
}

/// Join planner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Rewind strategy for the right input of every planned join
    pub join_rewind: RewindStrategy,

    /// Reject queries joining more leaves than this.
    /// Default: 16, never more than 64
    pub max_join_leaves: usize,

    /// Log the chosen plan at info level
    pub log_plans: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            join_rewind: RewindStrategy::Mark,
            max_join_leaves: 16,
            log_plans: false,
        }
    }
}

impl PlannerConfig {
    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json_str(json: &str) -> PlannerResult<Self> {
        let config: PlannerConfig = serde_json::from_str(json)
            .map_err(|e| PlannerError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> PlannerResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlannerError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    fn validate(self) -> PlannerResult<Self> {
        if self.max_join_leaves == 0 || self.max_join_leaves > MAX_JOIN_LEAVES_LIMIT {
            return Err(PlannerError::Config(format!(
                "max_join_leaves must be between 1 and {}, got {}",
                MAX_JOIN_LEAVES_LIMIT, self.max_join_leaves
            )));
        }
        Ok(self)
    }
}

use serde::{Deserialize, Serialize};

/// Lane manager configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneConfig {
    /// Record a history entry for every lane mutation.
    #[serde(default)]
    pub history_enabled: bool,
}

impl LaneConfig {
    pub fn with_history() -> Self {
        Self {
            history_enabled: true,
        }
    }
}

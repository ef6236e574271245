use std::time::Duration;

use cvc_model::ReleaseType;
use serde::{Deserialize, Serialize};

/// Configuration for the tag/snap engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapConfig {
    /// Run the build pipeline when a tag or snap does not ask for it.
    pub build_by_default: bool,
    /// Maximum wall-clock time allowed for one build pipeline run.
    pub build_timeout: Duration,
    /// Skip tests in every build.
    pub skip_tests: bool,
    /// Release type used when a tag names none.
    pub default_release: ReleaseType,
    /// Author recorded in version logs.
    pub author: String,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            build_by_default: false,
            build_timeout: Duration::from_secs(300),
            skip_tests: false,
            default_release: ReleaseType::Patch,
            author: "unknown".to_string(),
        }
    }
}

impl SnapConfig {
    /// Builds always run, bounded by `timeout`.
    pub fn with_build(timeout: Duration) -> Self {
        Self {
            build_by_default: true,
            build_timeout: timeout,
            ..Default::default()
        }
    }
}

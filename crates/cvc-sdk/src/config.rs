use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cvc_lanes::LaneConfig;
use cvc_model::ReleaseType;
use cvc_snap::SnapConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Configuration for one scope.
///
/// Every field has a default, so a TOML file only names what it changes:
///
/// ```toml
/// name = "org.design"
/// path = ".cvc"
/// lane_history = true
///
/// [build]
/// enabled = true
/// timeout_secs = 120
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Scope name; also the name other scopes export to.
    pub name: String,
    /// Where objects, refs and the working area are persisted. `None` keeps
    /// everything in memory.
    pub path: Option<PathBuf>,
    /// Record lane history entries.
    pub lane_history: bool,
    /// Release applied by a tag that names none.
    pub default_release: ReleaseType,
    /// Author recorded in version and lane logs.
    pub author: String,
    pub build: BuildConfig,
    pub log: LogConfig,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            name: "local".to_string(),
            path: None,
            lane_history: false,
            default_release: ReleaseType::Patch,
            author: "unknown".to_string(),
            build: BuildConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Run the build pipeline on every tag and snap unless told otherwise.
    pub enabled: bool,
    pub timeout_secs: u64,
    pub skip_tests: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: 300,
            skip_tests: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` overrides it.
    pub level: String,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

impl ScopeConfig {
    /// An in-memory scope called `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A scope persisted under `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn from_toml_str(contents: &str) -> SdkResult<Self> {
        toml::from_str(contents).map_err(|e| SdkError::Config {
            path: None,
            message: e.to_string(),
        })
    }

    /// Read a TOML config file. A relative `path` inside it is resolved
    /// against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&contents).map_err(|e| SdkError::Config {
            path: Some(path.to_path_buf()),
            message: e.to_string(),
        })?;
        if let (Some(scope_path), Some(dir)) = (&config.path, path.parent()) {
            if scope_path.is_relative() {
                config.path = Some(dir.join(scope_path));
            }
        }
        Ok(config)
    }

    pub fn lane_config(&self) -> LaneConfig {
        LaneConfig {
            history_enabled: self.lane_history,
        }
    }

    pub fn snap_config(&self) -> SnapConfig {
        SnapConfig {
            build_by_default: self.build.enabled,
            build_timeout: Duration::from_secs(self.build.timeout_secs),
            skip_tests: self.build.skip_tests,
            default_release: self.default_release,
            author: self.author.clone(),
        }
    }
}

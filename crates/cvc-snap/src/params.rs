//! Tag and snap request options.

use cvc_model::ReleaseType;
use cvc_types::ComponentId;
use serde::{Deserialize, Serialize};

use crate::error::{SnapError, SnapResult};

/// Options shared by tag and snap.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Components to version. Empty selects every new or modified one.
    pub ids: Vec<ComponentId>,
    pub message: Option<String>,
    /// Also version selected components that have no changes.
    pub unmodified: bool,
    pub skip_auto_tag: bool,
    /// Run the build pipeline. `None` follows the engine config.
    pub build: Option<bool>,
    pub skip_tests: bool,
    pub skip_tasks: Vec<String>,
    /// Record failed builds as `failed` and version anyway.
    pub ignore_build_errors: bool,
    /// Abort the whole batch on the first build failure.
    pub fail_fast: bool,
}

/// Options for a snap: an untagged version identified by its hash.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SnapParams {
    #[serde(flatten)]
    pub options: BatchOptions,
}

/// Options for a tag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TagParams {
    #[serde(flatten)]
    pub options: BatchOptions,
    /// Exact version for every selected component.
    pub ver: Option<String>,
    /// Release type by name (`major`, `prerelease`, ...).
    pub increment: Option<String>,
    pub prerelease_id: Option<String>,
    pub patch: bool,
    pub minor: bool,
    pub major: bool,
    /// Shorthand for `increment = prerelease`. A non-empty value is also the
    /// prerelease identifier.
    pub pre_release: Option<String>,
    /// How many times to apply the bump.
    pub increment_by: u32,
    /// Allow an explicit version lower than the newest tag.
    pub ignore_newest_version: bool,
    /// Record intended versions only; persist nothing.
    pub soft: bool,
    /// Tag exactly the soft-tagged components with their recorded versions.
    pub persist: bool,
}

impl Default for TagParams {
    fn default() -> Self {
        Self {
            options: BatchOptions::default(),
            ver: None,
            increment: None,
            prerelease_id: None,
            patch: false,
            minor: false,
            major: false,
            pre_release: None,
            increment_by: 1,
            ignore_newest_version: false,
            soft: false,
            persist: false,
        }
    }
}

/// The bump a tag applies to components without an explicit version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReleaseBump {
    pub release: ReleaseType,
    pub pre_id: Option<String>,
}

/// Check a tag request's release options and derive its bump.
///
/// `default_release` applies when no option names one.
pub fn validate_options(
    params: &TagParams,
    default_release: ReleaseType,
) -> SnapResult<ReleaseBump> {
    let increment = params.increment.as_deref();
    if params.prerelease_id.is_some() && !matches!(increment, Some(i) if is_pre_increment(i)) {
        return Err(SnapError::validation(
            "--prerelease-id should be entered along with --increment flag, while --increment must be one of the following: [prepatch, prerelease, preminor, premajor]",
        ));
    }

    let flags = [params.patch, params.minor, params.major, params.pre_release.is_some()];
    if flags.iter().filter(|f| **f).count() > 1 {
        return Err(SnapError::validation(
            "you can use only one of the following - patch, minor, major, pre-release",
        ));
    }

    let release = match increment {
        Some(name) => name.parse::<ReleaseType>().map_err(|_| {
            let allowed: Vec<&str> = ReleaseType::ALL.iter().map(ReleaseType::as_str).collect();
            SnapError::validation(format!(
                "invalid increment-level \"{name}\".\nsemver allows the following options only: {}",
                allowed.join(", ")
            ))
        })?,
        None if params.major => ReleaseType::Major,
        None if params.minor => ReleaseType::Minor,
        None if params.patch => ReleaseType::Patch,
        None if params.pre_release.is_some() => ReleaseType::Prerelease,
        None => default_release,
    };

    let pre_id = params
        .prerelease_id
        .clone()
        .or_else(|| params.pre_release.clone().filter(|id| !id.is_empty()));

    Ok(ReleaseBump { release, pre_id })
}

fn is_pre_increment(name: &str) -> bool {
    name.parse::<ReleaseType>().map_or(false, |r| r.is_pre())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(params: TagParams) -> SnapResult<ReleaseBump> {
        validate_options(&params, ReleaseType::Patch)
    }

    #[test]
    fn defaults_to_patch() {
        let bump = check(TagParams::default()).unwrap();
        assert_eq!(bump.release, ReleaseType::Patch);
        assert_eq!(bump.pre_id, None);
    }

    #[test]
    fn configured_default_applies() {
        let bump = validate_options(&TagParams::default(), ReleaseType::Minor).unwrap();
        assert_eq!(bump.release, ReleaseType::Minor);
    }

    #[test]
    fn more_than_one_release_flag_fails() {
        let err = check(TagParams {
            patch: true,
            major: true,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "you can use only one of the following - patch, minor, major, pre-release"
        );
    }

    #[test]
    fn invalid_increment_fails() {
        let err = check(TagParams {
            increment: Some("huge".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, SnapError::Validation(_)));
        assert!(err.to_string().contains("invalid increment-level \"huge\""));
    }

    #[test]
    fn prerelease_id_needs_pre_increment() {
        let err = check(TagParams {
            prerelease_id: Some("dev".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().starts_with("--prerelease-id should be entered"));

        let err = check(TagParams {
            prerelease_id: Some("dev".into()),
            increment: Some("minor".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, SnapError::Validation(_)));

        let bump = check(TagParams {
            prerelease_id: Some("dev".into()),
            increment: Some("preminor".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(bump.release, ReleaseType::Preminor);
        assert_eq!(bump.pre_id.as_deref(), Some("dev"));
    }

    #[test]
    fn pre_release_sugar_sets_type_and_id() {
        let bump = check(TagParams {
            pre_release: Some("beta".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(bump.release, ReleaseType::Prerelease);
        assert_eq!(bump.pre_id.as_deref(), Some("beta"));

        let bump = check(TagParams {
            pre_release: Some(String::new()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(bump.pre_id, None);
    }

    #[test]
    fn sugar_flags_map_to_release_types() {
        let major = check(TagParams {
            major: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(major.release, ReleaseType::Major);
        let minor = check(TagParams {
            minor: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(minor.release, ReleaseType::Minor);
    }
}

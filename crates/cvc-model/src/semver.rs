use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// How to derive the next version from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Major,
    Premajor,
    Minor,
    Preminor,
    #[default]
    Patch,
    Prepatch,
    Prerelease,
}

impl ReleaseType {
    pub const ALL: [ReleaseType; 7] = [
        Self::Major,
        Self::Premajor,
        Self::Minor,
        Self::Preminor,
        Self::Patch,
        Self::Prepatch,
        Self::Prerelease,
    ];

    /// Returns `true` for the release types that produce a pre-release.
    pub fn is_pre(&self) -> bool {
        matches!(
            self,
            Self::Premajor | Self::Preminor | Self::Prepatch | Self::Prerelease
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Premajor => "premajor",
            Self::Minor => "minor",
            Self::Preminor => "preminor",
            Self::Patch => "patch",
            Self::Prepatch => "prepatch",
            Self::Prerelease => "prerelease",
        }
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ModelError::InvalidReleaseType(s.to_string()))
    }
}

/// One dot-separated pre-release identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PreId {
    Numeric(u64),
    Alpha(String),
}

impl PreId {
    fn parse(s: &str) -> Option<Self> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return None;
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            if s.len() > 1 && s.starts_with('0') {
                return None;
            }
            return s.parse().ok().map(Self::Numeric);
        }
        Some(Self::Alpha(s.to_string()))
    }
}

impl Ord for PreId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.cmp(b),
            (Self::Numeric(_), Self::Alpha(_)) => Ordering::Less,
            (Self::Alpha(_), Self::Numeric(_)) => Ordering::Greater,
            (Self::Alpha(a), Self::Alpha(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for PreId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Alpha(s) => f.write_str(s),
        }
    }
}

/// A semantic version `MAJOR.MINOR.PATCH[-PRE]`, ordered by semver precedence.
///
/// Build metadata is not supported: `+` is reserved for dependency policy
/// markers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Vec<PreId>,
}

impl SemVer {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Vec::new(),
        }
    }

    /// `0.0.0`, the base a component's first tag bumps from.
    pub const fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn parse(input: &str) -> ModelResult<Self> {
        let invalid = |reason: &str| ModelError::InvalidSemVer {
            input: input.to_string(),
            reason: reason.to_string(),
        };
        let (core, pre) = match input.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (input, None),
        };
        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid("expected MAJOR.MINOR.PATCH"));
        }
        let mut nums = [0u64; 3];
        for (slot, part) in nums.iter_mut().zip(&parts) {
            if part.is_empty() || (part.len() > 1 && part.starts_with('0')) {
                return Err(invalid("malformed numeric component"));
            }
            *slot = part.parse().map_err(|_| invalid("malformed numeric component"))?;
        }
        let pre = match pre {
            Some(p) => p
                .split('.')
                .map(PreId::parse)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| invalid("malformed pre-release identifier"))?,
            None => Vec::new(),
        };
        Ok(Self {
            major: nums[0],
            minor: nums[1],
            patch: nums[2],
            pre,
        })
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// The next version after one `release` step.
    ///
    /// Follows npm semver: `patch` on `1.2.3-dev.0` yields `1.2.3`,
    /// `prerelease` on `1.2.3` yields `1.2.4-0` (or `1.2.4-<id>.0`), and
    /// `prerelease` with a different identifier restarts the counter.
    /// Fails when a numeric part would overflow.
    pub fn bump(&self, release: ReleaseType, pre_id: Option<&str>) -> ModelResult<Self> {
        let mut next = self.clone();
        match release {
            ReleaseType::Major => {
                if !(self.is_prerelease() && self.minor == 0 && self.patch == 0) {
                    next.major = self.increment(self.major)?;
                }
                next.minor = 0;
                next.patch = 0;
                next.pre.clear();
            }
            ReleaseType::Minor => {
                if !(self.is_prerelease() && self.patch == 0) {
                    next.minor = self.increment(self.minor)?;
                }
                next.patch = 0;
                next.pre.clear();
            }
            ReleaseType::Patch => {
                if !self.is_prerelease() {
                    next.patch = self.increment(self.patch)?;
                }
                next.pre.clear();
            }
            ReleaseType::Premajor => {
                next = Self::new(self.increment(self.major)?, 0, 0);
                next.pre = Self::fresh_pre(pre_id);
            }
            ReleaseType::Preminor => {
                next = Self::new(self.major, self.increment(self.minor)?, 0);
                next.pre = Self::fresh_pre(pre_id);
            }
            ReleaseType::Prepatch => {
                next = Self::new(self.major, self.minor, self.increment(self.patch)?);
                next.pre = Self::fresh_pre(pre_id);
            }
            ReleaseType::Prerelease => {
                if !self.is_prerelease() {
                    return self.bump(ReleaseType::Prepatch, pre_id);
                }
                let same_id = match (pre_id, self.pre.first()) {
                    (None, _) => true,
                    (Some(id), Some(PreId::Alpha(current))) => id == current,
                    (Some(_), _) => false,
                };
                if !same_id {
                    next.pre = Self::fresh_pre(pre_id);
                } else if let Some(PreId::Numeric(n)) =
                    next.pre.iter_mut().rev().find(|p| matches!(p, PreId::Numeric(_)))
                {
                    *n = self.increment(*n)?;
                } else {
                    next.pre.push(PreId::Numeric(0));
                }
            }
        }
        Ok(next)
    }

    /// Apply `release` `times` times (`patch` by 2: `0.0.1` becomes `0.0.3`).
    pub fn bump_by(
        &self,
        release: ReleaseType,
        times: u32,
        pre_id: Option<&str>,
    ) -> ModelResult<Self> {
        (0..times.max(1)).try_fold(self.clone(), |v, _| v.bump(release, pre_id))
    }

    fn increment(&self, part: u64) -> ModelResult<u64> {
        part.checked_add(1).ok_or_else(|| ModelError::InvalidSemVer {
            input: self.to_string(),
            reason: "version number overflows on bump".to_string(),
        })
    }

    fn fresh_pre(pre_id: Option<&str>) -> Vec<PreId> {
        match pre_id {
            Some(id) => vec![PreId::Alpha(id.to_string()), PreId::Numeric(0)],
            None => vec![PreId::Numeric(0)],
        }
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            let pre: Vec<String> = self.pre.iter().map(ToString::to_string).collect();
            write!(f, "-{}", pre.join("."))?;
        }
        Ok(())
    }
}

impl FromStr for SemVer {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SemVer {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemVer {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

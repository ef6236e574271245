//! Canonical ref names and their validation.
//!
//! Valid ref names:
//! - Must be non-empty and start with `refs/`
//! - Must not contain whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..`
//! - Segments between slashes must be non-empty

use cvc_types::{ComponentId, LaneId};

use crate::error::{RefError, Result};

pub const COMPONENTS_PREFIX: &str = "refs/components/";
pub const LANES_PREFIX: &str = "refs/lanes/";
pub const LANE_HISTORY_PREFIX: &str = "refs/lane-history/";

/// Characters that are forbidden anywhere in a ref name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

/// Ref of a component's current record. Scope is not part of the name.
pub fn component_ref(id: &ComponentId) -> String {
    format!("{COMPONENTS_PREFIX}{}", id.key())
}

/// Ref of a lane's current state.
pub fn lane_ref(id: &LaneId) -> String {
    format!("{LANES_PREFIX}{id}")
}

/// Ref of a lane's history log.
pub fn lane_history_ref(id: &LaneId) -> String {
    format!("{LANE_HISTORY_PREFIX}{id}")
}

/// Component identity key from a component ref name.
pub fn component_key(ref_name: &str) -> Option<&str> {
    ref_name.strip_prefix(COMPONENTS_PREFIX)
}

/// Lane id from a lane ref name.
pub fn lane_id(ref_name: &str) -> Option<LaneId> {
    ref_name
        .strip_prefix(LANES_PREFIX)
        .and_then(|rest| LaneId::parse(rest).ok())
}

/// Validate a canonical ref name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use cvc_refs::names::validate_ref_name;
///
/// assert!(validate_ref_name("refs/components/ui/button").is_ok());
/// assert!(validate_ref_name("refs/lanes/a..b").is_err());
/// ```
pub fn validate_ref_name(name: &str) -> Result<()> {
    let invalid = |reason: String| RefError::InvalidRefName {
        name: name.to_string(),
        reason,
    };
    if !name.starts_with("refs/") {
        return Err(invalid("must start with 'refs/'".into()));
    }
    if let Some(ch) = FORBIDDEN_CHARS.iter().find(|ch| name.contains(**ch)) {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid("must not contain '..'".into()));
    }
    if name.split('/').any(str::is_empty) {
        return Err(invalid("must not contain empty segments".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_ref_ignores_scope() {
        let id = ComponentId::parse("ui/button").unwrap();
        assert_eq!(component_ref(&id), "refs/components/ui/button");
        assert_eq!(component_ref(&id.with_scope("org.remote")), component_ref(&id));
        assert_eq!(component_key(&component_ref(&id)), Some("ui/button"));
    }

    #[test]
    fn lane_refs_roundtrip() {
        let lane = LaneId::new("stage").unwrap();
        assert_eq!(lane_ref(&lane), "refs/lanes/stage");
        assert_eq!(lane_history_ref(&lane), "refs/lane-history/stage");
        assert_eq!(lane_id(&lane_ref(&lane)), Some(lane.clone()));

        let scoped = lane.with_scope("org.remote");
        assert_eq!(lane_id(&lane_ref(&scoped)), Some(scoped));
    }

    #[test]
    fn validation() {
        assert!(validate_ref_name("refs/lanes/stage").is_ok());
        assert!(validate_ref_name("").is_err());
        assert!(validate_ref_name("lanes/stage").is_err());
        assert!(validate_ref_name("refs//x").is_err());
        assert!(validate_ref_name("refs/x/").is_err());
        assert!(validate_ref_name("refs/has space").is_err());
    }
}

//! Core reference types.

use std::collections::BTreeMap;

use cvc_types::{LaneId, ObjectId, MAIN_LANE};
use serde::{Deserialize, Serialize};

use crate::error::{RefError, Result};

/// The active history: main, or a lane.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Head {
    #[default]
    Main,
    Lane(LaneId),
}

impl Head {
    pub fn lane(&self) -> Option<&LaneId> {
        match self {
            Head::Main => None,
            Head::Lane(id) => Some(id),
        }
    }

    pub fn is_main(&self) -> bool {
        matches!(self, Head::Main)
    }

    pub fn name(&self) -> String {
        match self {
            Head::Main => MAIN_LANE.to_string(),
            Head::Lane(id) => id.to_string(),
        }
    }
}

/// One compare-and-swap step.
///
/// `expected: None` means "the ref must not exist"; `new: None` deletes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefUpdate {
    pub name: String,
    pub expected: Option<ObjectId>,
    pub new: Option<ObjectId>,
}

impl RefUpdate {
    /// Create a ref that must not exist yet.
    pub fn create(name: impl Into<String>, new: ObjectId) -> Self {
        Self {
            name: name.into(),
            expected: None,
            new: Some(new),
        }
    }

    /// Move a ref from `expected` (or from nothing) to `new`.
    pub fn swap(name: impl Into<String>, expected: Option<ObjectId>, new: ObjectId) -> Self {
        Self {
            name: name.into(),
            expected,
            new: Some(new),
        }
    }

    /// Delete a ref currently at `expected`.
    pub fn delete(name: impl Into<String>, expected: ObjectId) -> Self {
        Self {
            name: name.into(),
            expected: Some(expected),
            new: None,
        }
    }
}

/// The whole ref table: what backends hold and persist.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefTable {
    #[serde(default)]
    pub refs: BTreeMap<String, ObjectId>,
    #[serde(default)]
    pub head: Head,
}

impl RefTable {
    /// Check every expectation, then apply every update. All or nothing.
    pub fn apply(&mut self, updates: &[RefUpdate]) -> Result<()> {
        for update in updates {
            let actual = self.refs.get(&update.name).copied();
            if actual != update.expected {
                return Err(RefError::ConcurrentModification {
                    name: update.name.clone(),
                    expected: render(update.expected),
                    actual: render(actual),
                });
            }
        }
        for update in updates {
            match update.new {
                Some(id) => {
                    self.refs.insert(update.name.clone(), id);
                }
                None => {
                    self.refs.remove(&update.name);
                }
            }
        }
        Ok(())
    }

    pub fn list(&self, prefix: &str) -> Vec<(String, ObjectId)> {
        self.refs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

fn render(id: Option<ObjectId>) -> String {
    id.map_or_else(|| "nothing".to_string(), |id| id.short_hex())
}

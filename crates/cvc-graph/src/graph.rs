//! History walks over versions stored in an [`ObjectStore`].

use std::collections::{BinaryHeap, HashMap, HashSet};

use cvc_model::Version;
use cvc_store::{ObjectStore, StoreError};
use cvc_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

/// How one head relates to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Divergence {
    /// Same version (or both absent).
    Same,
    /// The first head contains the second and more.
    Ahead,
    /// The second head contains the first and more.
    Behind,
    /// Neither contains the other.
    Diverged,
}

/// Read-only view of version history in a store.
pub struct VersionGraph<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> VersionGraph<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Load a version that must exist.
    pub fn load_version(&self, id: &ObjectId) -> GraphResult<Version> {
        let obj = self.store.get(id)?;
        Ok(Version::from_stored_object(&obj)?)
    }

    fn load_parent(&self, child: ObjectId, parent: ObjectId) -> GraphResult<Version> {
        match self.store.get(&parent) {
            Ok(obj) => Ok(Version::from_stored_object(&obj)?),
            Err(StoreError::NotFound(_)) => Err(GraphError::MissingParent { child, parent }),
            Err(e) => Err(e.into()),
        }
    }

    /// Every version reachable from `head`, newest (highest sequence) first.
    ///
    /// No head means no history: `Ok(vec![])`. A dangling parent fails with
    /// [`GraphError::MissingParent`].
    pub fn history(&self, head: Option<ObjectId>) -> GraphResult<Vec<(ObjectId, Version)>> {
        let Some(head) = head else {
            return Ok(Vec::new());
        };
        let mut seen = HashSet::new();
        let mut frontier = BinaryHeap::new();
        let mut pending: HashMap<ObjectId, Version> = HashMap::new();
        let mut result = Vec::new();

        let first = self.load_version(&head)?;
        seen.insert(head);
        frontier.push((first.sequence, head));
        pending.insert(head, first);

        while let Some((_, id)) = frontier.pop() {
            let Some(version) = pending.remove(&id) else {
                continue;
            };
            for parent in &version.parents {
                if seen.insert(*parent) {
                    let loaded = self.load_parent(id, *parent)?;
                    frontier.push((loaded.sequence, *parent));
                    pending.insert(*parent, loaded);
                }
            }
            result.push((id, version));
        }
        Ok(result)
    }

    /// Returns `true` if `ancestor` is `descendant` or reachable from it.
    pub fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> GraphResult<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        let floor = self.load_version(ancestor)?.sequence;
        let mut seen = HashSet::new();
        let mut stack = vec![(*descendant, self.load_version(descendant)?)];
        seen.insert(*descendant);

        while let Some((id, version)) = stack.pop() {
            for parent in &version.parents {
                if parent == ancestor {
                    return Ok(true);
                }
                if seen.insert(*parent) {
                    let loaded = self.load_parent(id, *parent)?;
                    // Sequences strictly decrease towards the roots.
                    if loaded.sequence > floor {
                        stack.push((*parent, loaded));
                    }
                }
            }
        }
        Ok(false)
    }

    /// The most recent version both `a` and `b` descend from.
    pub fn merge_base(&self, a: &ObjectId, b: &ObjectId) -> GraphResult<Option<ObjectId>> {
        if a == b {
            return Ok(Some(*a));
        }
        let ancestors_a: HashMap<ObjectId, u64> = self
            .history(Some(*a))?
            .into_iter()
            .map(|(id, v)| (id, v.sequence))
            .collect();
        let mut best: Option<(u64, ObjectId)> = None;
        for (id, version) in self.history(Some(*b))? {
            if ancestors_a.contains_key(&id) {
                let candidate = (version.sequence, id);
                if best.map_or(true, |b| candidate > b) {
                    best = Some(candidate);
                }
            }
        }
        Ok(best.map(|(_, id)| id))
    }

    /// How `a` relates to `b`.
    pub fn compare(&self, a: &ObjectId, b: &ObjectId) -> GraphResult<Divergence> {
        if a == b {
            return Ok(Divergence::Same);
        }
        if self.is_ancestor(b, a)? {
            return Ok(Divergence::Ahead);
        }
        if self.is_ancestor(a, b)? {
            return Ok(Divergence::Behind);
        }
        Ok(Divergence::Diverged)
    }

    /// Like [`compare`](Self::compare) but for heads that may not exist yet.
    pub fn compare_heads(
        &self,
        a: Option<&ObjectId>,
        b: Option<&ObjectId>,
    ) -> GraphResult<Divergence> {
        match (a, b) {
            (None, None) => Ok(Divergence::Same),
            (Some(_), None) => Ok(Divergence::Ahead),
            (None, Some(_)) => Ok(Divergence::Behind),
            (Some(a), Some(b)) => self.compare(a, b),
        }
    }

    /// Check that every version under `head` is present. Returns the count.
    pub fn verify_history(&self, head: &ObjectId) -> GraphResult<usize> {
        Ok(self.history(Some(*head))?.len())
    }
}

use std::fmt;

use cvc_crypto::ContentHasher;
use cvc_store::{ObjectKind, StoreResult, StoredObject};
use cvc_types::{LaneId, ObjectId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::ModelResult;

const ENTRY_HASHER: ContentHasher = ContentHasher::new("cvc-lane-history-entry-v1");

/// The mutation a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneOperation {
    Create,
    Snap,
    Merge,
    Restore,
}

impl fmt::Display for LaneOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Snap => "snap",
            Self::Merge => "merge",
            Self::Restore => "restore",
        };
        f.write_str(s)
    }
}

/// One recorded lane mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Hex digest of the entry content and its position.
    pub id: String,
    /// The lane object that resulted from the mutation.
    pub lane_state: ObjectId,
    pub operation: LaneOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Affected components rendered `id@version`.
    #[serde(default)]
    pub components: Vec<String>,
    pub timestamp: Timestamp,
}

/// Append-only log of a lane's mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneHistory {
    pub lane: LaneId,
    #[serde(default)]
    pub entries: Vec<HistoryEntry>,
}

impl LaneHistory {
    pub fn new(lane: LaneId) -> Self {
        Self {
            lane,
            entries: Vec::new(),
        }
    }

    /// Append an entry and return its id.
    pub fn append(
        &mut self,
        lane_state: ObjectId,
        operation: LaneOperation,
        message: Option<String>,
        components: Vec<String>,
        timestamp: Timestamp,
    ) -> ModelResult<String> {
        let position = self.entries.len() as u64;
        let digest = ENTRY_HASHER.hash_json(&(
            position,
            &lane_state,
            operation,
            &message,
            &components,
            timestamp,
        ))?;
        let id = digest.to_hex();
        self.entries.push(HistoryEntry {
            id: id.clone(),
            lane_state,
            operation,
            message,
            components,
            timestamp,
        });
        Ok(id)
    }

    pub fn entry(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        StoredObject::encode(ObjectKind::LaneHistory, self)
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.decode(ObjectKind::LaneHistory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> LaneHistory {
        LaneHistory::new(LaneId::new("stage").unwrap())
    }

    #[test]
    fn append_preserves_order() {
        let mut h = history();
        let first = h
            .append(
                ObjectId::from_bytes(b"s1"),
                LaneOperation::Create,
                None,
                vec![],
                Timestamp::from_millis(1),
            )
            .unwrap();
        let second = h
            .append(
                ObjectId::from_bytes(b"s2"),
                LaneOperation::Snap,
                Some("snap (fix)".into()),
                vec!["comp1@abc".into()],
                Timestamp::from_millis(2),
            )
            .unwrap();
        assert_eq!(h.len(), 2);
        assert_ne!(first, second);
        assert_eq!(h.latest().unwrap().id, second);
        assert_eq!(h.entry(&first).unwrap().operation, LaneOperation::Create);
    }

    #[test]
    fn identical_content_at_different_positions_gets_distinct_ids() {
        let mut h = history();
        let state = ObjectId::from_bytes(b"same");
        let at = Timestamp::from_millis(7);
        let a = h.append(state, LaneOperation::Snap, None, vec![], at).unwrap();
        let b = h.append(state, LaneOperation::Snap, None, vec![], at).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn stored_roundtrip() {
        let mut h = history();
        let state = ObjectId::from_bytes(b"s");
        h.append(state, LaneOperation::Restore, None, vec![], Timestamp::from_millis(3))
            .unwrap();
        let decoded = LaneHistory::from_stored_object(&h.to_stored_object().unwrap()).unwrap();
        assert_eq!(decoded, h);
        assert_eq!(LaneOperation::Restore.to_string(), "restore");
    }
}

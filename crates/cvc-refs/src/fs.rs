//! File-backed reference store: one `refs.json` per scope.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use cvc_store::fsutil::atomic_write;
use cvc_types::ObjectId;
use tracing::debug;

use crate::error::{RefError, Result};
use crate::names::validate_ref_name;
use crate::traits::RefStore;
use crate::types::{Head, RefTable, RefUpdate};

const REFS_FILE: &str = "refs.json";

/// Reference store persisted as a single JSON document.
///
/// The table is cached in memory; every mutation is applied to a copy,
/// written to a temp file, fsynced and renamed over `refs.json`, and only
/// then becomes the cached state. A failed write leaves both the file and
/// the cache unchanged.
#[derive(Debug)]
pub struct FsRefStore {
    path: PathBuf,
    table: Mutex<RefTable>,
}

impl FsRefStore {
    /// Open (creating if needed) the ref table under `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let path = root.join(REFS_FILE);
        let table = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| RefError::Serialization(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RefTable::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    fn persist(&self, table: &RefTable) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(table)
            .map_err(|e| RefError::Serialization(e.to_string()))?;
        atomic_write(&self.path, &bytes)?;
        Ok(())
    }
}

impl RefStore for FsRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<ObjectId>> {
        let table = self.table.lock().expect("lock poisoned");
        Ok(table.refs.get(name).copied())
    }

    fn update_refs(&self, updates: &[RefUpdate]) -> Result<()> {
        for update in updates {
            validate_ref_name(&update.name)?;
        }
        let mut table = self.table.lock().expect("lock poisoned");
        let mut next = table.clone();
        next.apply(updates)?;
        self.persist(&next)?;
        *table = next;
        debug!(count = updates.len(), path = %self.path.display(), "refs persisted");
        Ok(())
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, ObjectId)>> {
        let table = self.table.lock().expect("lock poisoned");
        Ok(table.list(prefix))
    }

    fn head(&self) -> Result<Head> {
        Ok(self.table.lock().expect("lock poisoned").head.clone())
    }

    fn set_head(&self, head: &Head) -> Result<()> {
        let mut table = self.table.lock().expect("lock poisoned");
        let mut next = table.clone();
        next.head = head.clone();
        self.persist(&next)?;
        *table = next;
        Ok(())
    }
}

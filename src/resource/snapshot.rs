//! Snapshot Store
//!
//! One directory per run (`{state_dir}/{env}_{timestamp}/`) holding one
//! pretty-printed JSON file per resource kind. Run directories are claimed
//! exclusively and snapshot files are never replaced: they are written once,
//! at stop time, and only ever read afterwards.

use super::collection::{ResourceCollection, ResourceKind};
use crate::error::{HaltError, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Default parent of all run directories
pub const DEFAULT_STATE_DIR: &str = "restore_states";

/// Highest `_<n>` suffix tried when runs collide on the same second
const MAX_RUN_SUFFIX: u32 = 100;

/// Snapshot files for a single run directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Store rooted at an existing or future run directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Claim a fresh run directory: `{state_dir}/{run_name}`, or
    /// `{run_name}_<n>` when an earlier run already owns that name
    pub fn create_run(state_dir: &Path, run_name: &str) -> Result<Self> {
        std::fs::create_dir_all(state_dir)?;

        for sequence in 1..=MAX_RUN_SUFFIX {
            let name = if sequence == 1 {
                run_name.to_string()
            } else {
                format!("{}_{}", run_name, sequence)
            };
            let root = state_dir.join(name);
            match std::fs::create_dir(&root) {
                Ok(()) => {
                    tracing::debug!("Claimed run directory {}", root.display());
                    return Ok(Self::new(root));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(HaltError::SnapshotExists(state_dir.join(run_name)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, kind: ResourceKind) -> PathBuf {
        self.root.join(format!("{}.json", kind.snapshot_name()))
    }

    /// Persist a collection. The file appears atomically and an existing
    /// snapshot is never replaced ([`HaltError::SnapshotExists`]).
    pub fn save(&self, kind: ResourceKind, collection: &ResourceCollection) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;

        let mut buf = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        collection.document().serialize(&mut serializer)?;
        buf.push(b'\n');

        let path = self.path_for(kind);
        let tmp = self.root.join(format!(
            ".{}.{}.tmp",
            kind.snapshot_name(),
            uuid::Uuid::new_v4()
        ));

        // hard_link refuses to replace an existing file, unlike rename
        let published = std::fs::write(&tmp, &buf).and_then(|_| std::fs::hard_link(&tmp, &path));
        let _ = std::fs::remove_file(&tmp);
        match published {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(HaltError::SnapshotExists(path));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            "Saved {} {} to {}",
            collection.len(),
            collection.key(),
            path.display()
        );
        Ok(path)
    }

    /// Load a kind's snapshot; [`HaltError::NotFound`] if it was never written
    pub fn load(&self, kind: ResourceKind) -> Result<ResourceCollection> {
        let path = self.path_for(kind);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HaltError::NotFound(path));
            }
            Err(e) => return Err(e.into()),
        };

        let document: Value = serde_json::from_str(&content)?;
        let collection = ResourceCollection::from_document(kind.aggregate_key(), document)
            .ok_or_else(|| {
                HaltError::Protocol(format!(
                    "Snapshot {} has no '{}' array",
                    path.display(),
                    kind.aggregate_key()
                ))
            })?;

        tracing::info!("Loaded {} {} from {}", collection.len(), collection.key(), path.display());
        Ok(collection)
    }

    /// Like [`load`](Self::load) but maps a missing file to `None`
    pub fn load_optional(&self, kind: ResourceKind) -> Result<Option<ResourceCollection>> {
        match self.load(kind) {
            Ok(collection) => Ok(Some(collection)),
            Err(HaltError::NotFound(path)) => {
                tracing::warn!("No snapshot at {}, nothing to restore", path.display());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

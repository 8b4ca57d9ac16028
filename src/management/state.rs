use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    Res,
    types::{NameToIdEntry, OperationLogEntry, RemovalLog, UnfollowLogEntry},
};

/// Maximum operation log entries kept in the blob.
const MAX_OPERATIONS: usize = 200;

/// Everything spurge persists locally, stored as one JSON blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LocalState {
    #[serde(default)]
    pub unfollow_log: Vec<UnfollowLogEntry>,

    /// Removal logs keyed by banned artist id.
    #[serde(default)]
    pub artist_removals: BTreeMap<String, RemovalLog>,

    /// Removal logs keyed by normalized label.
    #[serde(default)]
    pub label_removals: BTreeMap<String, RemovalLog>,

    /// Name to id decisions, keyed by canonical and raw name.
    #[serde(default)]
    pub name_to_id: BTreeMap<String, NameToIdEntry>,

    #[serde(default)]
    pub operation_log: Vec<OperationLogEntry>,
}

impl LocalState {
    pub fn push_operation(&mut self, entry: OperationLogEntry) {
        self.operation_log.push(entry);
        if self.operation_log.len() > MAX_OPERATIONS {
            let excess = self.operation_log.len() - MAX_OPERATIONS;
            self.operation_log.drain(..excess);
        }
    }
}

/// Load-mutate-save access to the state blob.
///
/// Every mutation re-reads the whole blob, applies the change to that copy and
/// writes it back, so a reader never observes a half-written state.
#[derive(Debug, Clone)]
pub struct StateManager {
    path: PathBuf,
}

impl StateManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// State manager for the default blob inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("state.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the blob. A missing file is an empty state.
    pub async fn load(&self) -> Res<LocalState> {
        match async_fs::read_to_string(&self.path).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LocalState::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn persist(&self, state: &LocalState) -> Res<()> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        async_fs::write(&tmp, json).await?;
        async_fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Loads the blob, applies `mutate` and saves the result.
    pub async fn update<F, T>(&self, mutate: F) -> Res<T>
    where
        F: FnOnce(&mut LocalState) -> T,
    {
        let mut state = self.load().await?;
        let result = mutate(&mut state);
        self.persist(&state).await?;
        Ok(result)
    }

    /// Removes the blob entirely.
    pub async fn clear(&self) -> Res<()> {
        match async_fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

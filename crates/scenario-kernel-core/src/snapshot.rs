use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use ulid::Ulid;

use crate::store::StoreState;
use crate::EngineError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct SnapshotId(pub Ulid);

impl SnapshotId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SnapshotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named, saved scenario. Independent of the undo/redo timeline.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub saved_at: OffsetDateTime,
    pub fingerprint: String,
    pub state: StoreState,
}

/// Saved scenarios in creation order.
///
/// Names may repeat; lookups by name resolve to the most recently saved match.
#[derive(Debug, Clone, Default)]
pub struct SnapshotManager {
    snapshots: Vec<Snapshot>,
}

impl SnapshotManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Save `state` under `name`, stamped with the current UTC time.
    ///
    /// # Errors
    /// Returns [`EngineError::Validation`] when `name` is blank.
    pub fn save(&mut self, name: &str, state: StoreState) -> Result<&Snapshot, EngineError> {
        self.save_at(name, state, OffsetDateTime::now_utc())
    }

    /// # Errors
    /// Returns [`EngineError::Validation`] when `name` is blank.
    pub fn save_at(
        &mut self,
        name: &str,
        state: StoreState,
        saved_at: OffsetDateTime,
    ) -> Result<&Snapshot, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation("scenario name MUST NOT be empty".to_string()));
        }

        let index = self.snapshots.len();
        self.snapshots.push(Snapshot {
            id: SnapshotId::new(),
            name: name.to_string(),
            saved_at,
            fingerprint: state.fingerprint(),
            state,
        });
        Ok(&self.snapshots[index])
    }

    /// State of the most recent snapshot named `name`. The snapshot stays stored.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] when no snapshot carries that name.
    pub fn load(&self, name: &str) -> Result<&StoreState, EngineError> {
        self.find(name)
            .map(|snapshot| &snapshot.state)
            .ok_or_else(|| {
                EngineError::NotFound(format!("scenario `{}` does not exist", name.trim()))
            })
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Snapshot> {
        let name = name.trim();
        self.snapshots.iter().rev().find(|snapshot| snapshot.name == name)
    }

    #[must_use]
    pub fn list(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// How many snapshots share `name`; more than one means `load` picks the newest.
    #[must_use]
    pub fn names_in_use(&self, name: &str) -> usize {
        let name = name.trim();
        self.snapshots.iter().filter(|snapshot| snapshot.name == name).count()
    }
}

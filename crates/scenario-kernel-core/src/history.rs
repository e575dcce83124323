use serde::{Deserialize, Serialize};

use crate::store::StoreState;

/// Which operation produced a history entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HistoryLabel {
    Seed,
    Insert,
    Update,
    Delete,
    Reorder,
    LoadScenario,
    Reset,
}

impl HistoryLabel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Reorder => "reorder",
            Self::LoadScenario => "load_scenario",
            Self::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistoryEntry {
    pub sequence: u64,
    pub label: HistoryLabel,
    pub state: StoreState,
}

/// Linear undo/redo timeline.
///
/// Entry 0 is always the seed. `cursor` points at the displayed entry and stays within
/// `0..entries.len()`.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    next_sequence: u64,
}

impl HistoryLog {
    #[must_use]
    pub fn new(seed: StoreState) -> Self {
        Self {
            entries: vec![HistoryEntry { sequence: 0, label: HistoryLabel::Seed, state: seed }],
            cursor: 0,
            next_sequence: 1,
        }
    }

    /// Append a state after a mutation, dropping any redo branch first.
    ///
    /// Returns the sequence number of the new entry.
    pub fn record(&mut self, label: HistoryLabel, state: StoreState) -> u64 {
        self.entries.truncate(self.cursor + 1);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push(HistoryEntry { sequence, label, state });
        self.cursor = self.entries.len() - 1;
        sequence
    }

    /// Step back one entry. At the seed this is a no-op returning the current state.
    pub fn undo(&mut self) -> &StoreState {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
        self.current()
    }

    /// Step forward one entry. At the tail this is a no-op returning the current state.
    pub fn redo(&mut self) -> &StoreState {
        if self.cursor + 1 < self.entries.len() {
            self.cursor += 1;
        }
        self.current()
    }

    #[must_use]
    pub fn current(&self) -> &StoreState {
        &self.current_entry().state
    }

    #[must_use]
    pub fn current_entry(&self) -> &HistoryEntry {
        &self.entries[self.cursor]
    }

    #[must_use]
    pub fn seed(&self) -> &StoreState {
        &self.entries[0].state
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: the seed entry cannot be removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}

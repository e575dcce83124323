//! Versioned scenario state engine for dashboard widgets.
//!
//! One [`ScenarioEngine`] owns the live record collection of a single widget together with its
//! linear undo/redo history, its named scenario snapshots, the active filter, and the derivation
//! that turns the filtered records into analytics. Everything is in-memory and single-owner.

mod derive;
mod diff;
mod engine;
mod filter;
mod history;
mod record;
mod schema;
mod snapshot;
mod store;

pub use derive::{
    CountRule, Derivation, DerivationProfile, DerivedView, Point, RadarRule, RecordInsight,
    RecordPredicate, ScoreMethod, ScoreOutcome, ScoreRule, TierBand, TierScale, Trend, TrendRule,
    WeightedField, UNKNOWN_GROUP, UNKNOWN_TIER,
};
pub use diff::{diff_states, FieldChange, StateDiff};
pub use engine::ScenarioEngine;
pub use filter::{apply_filter, FilterPredicate, FilterState};
pub use history::{HistoryEntry, HistoryLabel, HistoryLog};
pub use record::{FieldPatch, FieldValue, Record, RecordDraft, RecordId};
pub use schema::{FieldKind, FieldSpec, Schema};
pub use snapshot::{Snapshot, SnapshotId, SnapshotManager};
pub use store::{EntityStore, StoreState};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("range error: index {index} is out of bounds for {len} records")]
    Range { index: usize, len: usize },
}

impl EngineError {
    /// Stable short code for UI surfaces that branch on the error kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Range { .. } => "range",
        }
    }
}

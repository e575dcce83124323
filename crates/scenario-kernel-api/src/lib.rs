use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use scenario_kernel_core::{
    diff_states, DerivationProfile, DerivedView, EngineError, FieldPatch, FilterPredicate,
    FilterState, HistoryLabel, Record, RecordDraft, RecordId, ScenarioEngine, Snapshot, SnapshotId,
    StateDiff, StoreState,
};
use scenario_kernel_widgets::Widget;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

pub mod export;

pub const API_CONTRACT_VERSION: &str = "api.v1";

/// Points at a record either by id or by its current position in the store.
///
/// Seed ids are minted fresh on every open, so scripts usually address seed records by position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RecordRef {
    Position(usize),
    Id(RecordId),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SessionCommand {
    Insert { record: RecordDraft },
    Update { record: RecordRef, patch: FieldPatch },
    Delete { record: RecordRef },
    Reorder { record: RecordRef, to: usize },
    Undo,
    Redo,
    SaveScenario { name: String },
    LoadScenario { name: String },
    SetFilter { name: String, predicate: FilterPredicate },
    RemoveFilter { name: String },
    ClearFilter,
    Reset,
}

impl SessionCommand {
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Reorder { .. } => "reorder",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::SaveScenario { .. } => "save_scenario",
            Self::LoadScenario { .. } => "load_scenario",
            Self::SetFilter { .. } => "set_filter",
            Self::RemoveFilter { .. } => "remove_filter",
            Self::ClearFilter => "clear_filter",
            Self::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommandOutcome {
    pub op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<RecordId>,
    pub history_cursor: usize,
    pub history_len: usize,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScriptFailure {
    pub index: usize,
    pub op: &'static str,
    pub code: &'static str,
    pub message: String,
}

/// Result of replaying a command list. Commands before `failure.index` stay applied.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScriptRun {
    pub applied: usize,
    pub outcomes: Vec<CommandOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ScriptFailure>,
}

impl ScriptRun {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HistorySummary {
    pub cursor: usize,
    pub len: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    pub sequence: u64,
    pub label: HistoryLabel,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScenarioSummary {
    pub id: SnapshotId,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub saved_at: OffsetDateTime,
    pub fingerprint: String,
    pub records: usize,
    /// Changes from the saved scenario to the live collection.
    pub drift: StateDiff,
}

impl ScenarioSummary {
    fn new(snapshot: &Snapshot, live: &StoreState) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name.clone(),
            saved_at: snapshot.saved_at,
            fingerprint: snapshot.fingerprint.clone(),
            records: snapshot.state.len(),
            drift: diff_states(&snapshot.state, live),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionReport {
    pub contract_version: String,
    pub widget: Widget,
    pub domain: String,
    pub history: HistorySummary,
    pub fingerprint: String,
    pub filter: FilterState,
    /// Filtered records in store order.
    pub records: Vec<Record>,
    pub derived: DerivedView,
    pub scenarios: Vec<ScenarioSummary>,
}

/// One widget's engine plus the command surface the CLI and scripts drive.
#[derive(Debug, Clone)]
pub struct WidgetSession {
    widget: Widget,
    engine: ScenarioEngine,
}

impl WidgetSession {
    /// Open a freshly seeded session, optionally with an overriding derivation profile.
    ///
    /// # Errors
    /// Returns an error when the profile or the widget's built-in seed is rejected.
    pub fn open(widget: Widget, profile: Option<DerivationProfile>) -> Result<Self> {
        let engine = match profile {
            Some(profile) => widget.open_with_profile(profile),
            None => widget.open(),
        }
        .with_context(|| format!("failed to open widget `{widget}`"))?;
        Ok(Self { widget, engine })
    }

    #[must_use]
    pub fn widget(&self) -> Widget {
        self.widget
    }

    #[must_use]
    pub fn engine(&self) -> &ScenarioEngine {
        &self.engine
    }

    /// Apply one command.
    ///
    /// # Errors
    /// Returns the engine's rejection; a rejected command leaves the session unchanged.
    pub fn apply(&mut self, command: SessionCommand) -> Result<CommandOutcome, EngineError> {
        let op = command.op();
        let record_id = match command {
            SessionCommand::Insert { record } => Some(self.engine.insert(record)?),
            SessionCommand::Update { record, patch } => {
                let id = self.resolve(record)?;
                self.engine.update(id, patch)?;
                Some(id)
            }
            SessionCommand::Delete { record } => {
                let id = self.resolve(record)?;
                self.engine.delete(id)?;
                Some(id)
            }
            SessionCommand::Reorder { record, to } => {
                let id = self.resolve(record)?;
                self.engine.reorder(id, to)?;
                Some(id)
            }
            SessionCommand::Undo => {
                self.engine.undo();
                None
            }
            SessionCommand::Redo => {
                self.engine.redo();
                None
            }
            SessionCommand::SaveScenario { name } => {
                self.engine.save_scenario(&name)?;
                None
            }
            SessionCommand::LoadScenario { name } => {
                self.engine.load_scenario(&name)?;
                None
            }
            SessionCommand::SetFilter { name, predicate } => {
                self.engine.set_filter(&name, predicate);
                None
            }
            SessionCommand::RemoveFilter { name } => {
                self.engine.remove_filter(&name);
                None
            }
            SessionCommand::ClearFilter => {
                self.engine.clear_filter();
                None
            }
            SessionCommand::Reset => {
                self.engine.reset();
                None
            }
        };
        debug!(widget = %self.widget, op, "command applied");
        Ok(self.outcome(op, record_id))
    }

    /// Apply commands in order, stopping at the first rejection.
    pub fn run_script(&mut self, commands: Vec<SessionCommand>) -> ScriptRun {
        let mut outcomes = Vec::with_capacity(commands.len());
        for (index, command) in commands.into_iter().enumerate() {
            let op = command.op();
            match self.apply(command) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    debug!(widget = %self.widget, index, op, code = err.code(), "script stopped");
                    return ScriptRun {
                        applied: outcomes.len(),
                        outcomes,
                        failure: Some(ScriptFailure {
                            index,
                            op,
                            code: err.code(),
                            message: err.to_string(),
                        }),
                    };
                }
            }
        }
        ScriptRun { applied: outcomes.len(), outcomes, failure: None }
    }

    #[must_use]
    pub fn report(&self) -> SessionReport {
        let history = self.engine.history();
        let current = history.current_entry();
        let live = self.engine.state();
        SessionReport {
            contract_version: API_CONTRACT_VERSION.to_string(),
            widget: self.widget,
            domain: self.engine.schema().domain.clone(),
            history: HistorySummary {
                cursor: history.cursor(),
                len: history.len(),
                can_undo: history.can_undo(),
                can_redo: history.can_redo(),
                sequence: current.sequence,
                label: current.label,
            },
            fingerprint: live.fingerprint(),
            filter: self.engine.filter().clone(),
            records: self.engine.visible_records(),
            derived: self.engine.derive(),
            scenarios: self
                .engine
                .scenarios()
                .iter()
                .map(|snapshot| ScenarioSummary::new(snapshot, live))
                .collect(),
        }
    }

    /// CSV of the current view. Reads only; history is untouched.
    #[must_use]
    pub fn export_csv(&self) -> String {
        export::render_csv(&self.engine)
    }

    fn resolve(&self, target: RecordRef) -> Result<RecordId, EngineError> {
        match target {
            RecordRef::Id(id) => Ok(id),
            RecordRef::Position(index) => {
                let state = self.engine.state();
                state
                    .records()
                    .get(index)
                    .map(|record| record.id)
                    .ok_or(EngineError::Range { index, len: state.len() })
            }
        }
    }

    fn outcome(&self, op: &'static str, record_id: Option<RecordId>) -> CommandOutcome {
        let history = self.engine.history();
        CommandOutcome {
            op,
            record_id,
            history_cursor: history.cursor(),
            history_len: history.len(),
            fingerprint: self.engine.state().fingerprint(),
        }
    }
}

/// Load a derivation profile from `.yaml`, `.yml`, or `.json`.
///
/// # Errors
/// Returns an error when the file cannot be read, has an unsupported extension, fails to parse,
/// or describes an invalid profile.
pub fn load_profile(path: &Path) -> Result<DerivationProfile> {
    let profile: DerivationProfile = read_config(path, "profile")?;
    profile.validate().with_context(|| format!("profile {} is invalid", path.display()))?;
    Ok(profile)
}

/// Load a command script: a list of [`SessionCommand`] in JSON or YAML.
///
/// # Errors
/// Returns an error when the file cannot be read or parsed.
pub fn load_script(path: &Path) -> Result<Vec<SessionCommand>> {
    read_config(path, "script")
}

fn read_config<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} file {}", path.display()))?;
    let extension =
        path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("yaml" | "yml") => serde_yaml::from_str(&body)
            .with_context(|| format!("failed to parse {what} YAML {}", path.display())),
        Some("json") => serde_json::from_str(&body)
            .with_context(|| format!("failed to parse {what} JSON {}", path.display())),
        _ => Err(anyhow!(
            "unsupported {what} file {} (expected .json, .yaml, or .yml)",
            path.display()
        )),
    }
}

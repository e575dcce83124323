use tracing::{debug, info};

use crate::derive::{Derivation, DerivationProfile};
use crate::diff::{diff_states, StateDiff};
use crate::filter::{apply_filter, FilterPredicate, FilterState};
use crate::history::{HistoryLabel, HistoryLog};
use crate::record::{FieldPatch, Record, RecordDraft, RecordId};
use crate::schema::Schema;
use crate::snapshot::{Snapshot, SnapshotManager};
use crate::store::{EntityStore, StoreState};
use crate::EngineError;

/// State engine owned by one widget instance.
///
/// Mutations go through the entity store and are recorded in the history log only after they
/// succeed; a rejected operation leaves store, history, and snapshots exactly as they were.
#[derive(Debug, Clone)]
pub struct ScenarioEngine<D = DerivationProfile> {
    store: EntityStore,
    history: HistoryLog,
    snapshots: SnapshotManager,
    filter: FilterState,
    derivation: D,
}

impl<D> ScenarioEngine<D>
where
    D: Derivation,
{
    /// Build an engine over a validated seed collection.
    ///
    /// # Errors
    /// Returns [`EngineError::Validation`] when the schema or any seed record is malformed.
    pub fn new(schema: Schema, seed: Vec<RecordDraft>, derivation: D) -> Result<Self, EngineError> {
        let store = EntityStore::seeded(schema, seed)?;
        let history = HistoryLog::new(store.state().clone());
        debug!(domain = %store.schema().domain, records = store.state().len(), "engine seeded");
        Ok(Self {
            store,
            history,
            snapshots: SnapshotManager::new(),
            filter: FilterState::new(),
            derivation,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        self.store.schema()
    }

    #[must_use]
    pub fn state(&self) -> &StoreState {
        self.store.state()
    }

    #[must_use]
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    #[must_use]
    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    #[must_use]
    pub fn derivation(&self) -> &D {
        &self.derivation
    }

    /// # Errors
    /// Returns [`EngineError::Validation`] when the draft fails the schema or carries an id
    /// this engine has already issued.
    pub fn insert(&mut self, draft: RecordDraft) -> Result<RecordId, EngineError> {
        let (id, state) = self.store.insert(draft).inspect_err(|err| self.rejected("insert", err))?;
        self.commit(HistoryLabel::Insert, state, Some(id));
        Ok(id)
    }

    /// # Errors
    /// Returns [`EngineError::NotFound`] for an unknown id, or [`EngineError::Validation`] when
    /// the patched record fails the schema.
    pub fn update(&mut self, id: RecordId, patch: FieldPatch) -> Result<&StoreState, EngineError> {
        let state = self.store.update(id, patch).inspect_err(|err| self.rejected("update", err))?;
        self.commit(HistoryLabel::Update, state, Some(id));
        Ok(self.store.state())
    }

    /// # Errors
    /// Returns [`EngineError::NotFound`] for an unknown id.
    pub fn delete(&mut self, id: RecordId) -> Result<&StoreState, EngineError> {
        let state = self.store.delete(id).inspect_err(|err| self.rejected("delete", err))?;
        self.commit(HistoryLabel::Delete, state, Some(id));
        Ok(self.store.state())
    }

    /// # Errors
    /// Returns [`EngineError::NotFound`] for an unknown id or [`EngineError::Range`] for an
    /// out-of-bounds target index.
    pub fn reorder(&mut self, id: RecordId, new_index: usize) -> Result<&StoreState, EngineError> {
        let state =
            self.store.reorder(id, new_index).inspect_err(|err| self.rejected("reorder", err))?;
        self.commit(HistoryLabel::Reorder, state, Some(id));
        Ok(self.store.state())
    }

    /// Step back one history entry; a no-op at the seed.
    pub fn undo(&mut self) -> &StoreState {
        let state = self.history.undo().clone();
        debug!(domain = %self.schema().domain, cursor = self.history.cursor(), "undo");
        self.store.replace(state);
        self.store.state()
    }

    /// Step forward one history entry; a no-op at the tail.
    pub fn redo(&mut self) -> &StoreState {
        let state = self.history.redo().clone();
        debug!(domain = %self.schema().domain, cursor = self.history.cursor(), "redo");
        self.store.replace(state);
        self.store.state()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Return to the seed collection as a new, undoable mutation.
    pub fn reset(&mut self) -> &StoreState {
        let seed = self.history.seed().clone();
        self.store.replace(seed.clone());
        self.commit(HistoryLabel::Reset, seed, None);
        self.store.state()
    }

    /// Save the live collection under `name`.
    ///
    /// # Errors
    /// Returns [`EngineError::Validation`] when `name` is blank.
    pub fn save_scenario(&mut self, name: &str) -> Result<&Snapshot, EngineError> {
        let reused = self.snapshots.names_in_use(name) > 0;
        let state = self.store.state().clone();
        let domain = &self.store.schema().domain;
        let snapshot = match self.snapshots.save(name, state) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                debug!(
                    %domain,
                    op = "save_scenario",
                    code = err.code(),
                    %err,
                    "operation rejected"
                );
                return Err(err);
            }
        };
        if reused {
            debug!(%domain, name = %snapshot.name, "scenario name reused; loads resolve to newest");
        }
        info!(
            %domain,
            name = %snapshot.name,
            fingerprint = %snapshot.fingerprint,
            "scenario saved"
        );
        Ok(snapshot)
    }

    /// Replace the live collection with the newest scenario named `name`.
    ///
    /// The load is recorded as a mutation, so it can be undone.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] when no scenario carries that name.
    pub fn load_scenario(&mut self, name: &str) -> Result<&StoreState, EngineError> {
        let state = self
            .snapshots
            .load(name)
            .inspect_err(|err| self.rejected("load_scenario", err))?
            .clone();
        info!(domain = %self.schema().domain, name = name.trim(), "scenario loaded");
        self.store.replace(state.clone());
        self.commit(HistoryLabel::LoadScenario, state, None);
        Ok(self.store.state())
    }

    #[must_use]
    pub fn scenarios(&self) -> &[Snapshot] {
        self.snapshots.list()
    }

    /// What changed between the newest scenario named `name` and the live collection.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] when no scenario carries that name.
    pub fn diff_against_scenario(&self, name: &str) -> Result<StateDiff, EngineError> {
        let saved = self.snapshots.load(name)?;
        Ok(diff_states(saved, self.store.state()))
    }

    pub fn set_filter(&mut self, name: &str, predicate: FilterPredicate) {
        self.filter.set(name, predicate);
    }

    pub fn remove_filter(&mut self, name: &str) -> Option<FilterPredicate> {
        self.filter.remove(name)
    }

    pub fn clear_filter(&mut self) {
        self.filter.clear();
    }

    /// Filtered records in store order.
    #[must_use]
    pub fn visible_records(&self) -> Vec<Record> {
        apply_filter(self.store.state().records(), &self.filter)
    }

    /// Recompute analytics for the live collection under the active filter.
    #[must_use]
    pub fn derive(&self) -> D::View {
        self.derivation.derive(self.store.state().records(), &self.filter)
    }

    fn commit(&mut self, label: HistoryLabel, state: StoreState, id: Option<RecordId>) {
        let sequence = self.history.record(label, state);
        debug!(
            domain = %self.store.schema().domain,
            op = label.as_str(),
            id = ?id.map(|id| id.to_string()),
            sequence,
            records = self.store.state().len(),
            "mutation recorded"
        );
    }

    fn rejected(&self, op: &str, err: &EngineError) {
        debug!(
            domain = %self.store.schema().domain,
            op,
            code = err.code(),
            %err,
            "operation rejected"
        );
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::derive::{ScoreMethod, ScoreRule, TierScale, WeightedField};
    use crate::record::FieldValue;
    use crate::schema::FieldSpec;

    fn schema() -> Schema {
        match Schema::new(
            "scores",
            vec![
                FieldSpec::text("name").required(),
                FieldSpec::bounded("score", 0.0, 10.0),
                FieldSpec::category("squad", &["first", "academy"]),
                FieldSpec::text("tier").derived(),
            ],
        ) {
            Ok(schema) => schema,
            Err(err) => panic!("fixture schema should be valid: {err}"),
        }
    }

    fn profile() -> DerivationProfile {
        DerivationProfile {
            scores: vec![ScoreRule {
                name: "form".to_string(),
                method: ScoreMethod::WeightedMean,
                components: vec![WeightedField::new("score", 1.0)],
                tiers: TierScale::new(&[(4.0, "critical"), (7.0, "monitor")], "healthy"),
            }],
            averages: vec!["score".to_string()],
            ..DerivationProfile::default()
        }
    }

    fn engine(seed: Vec<RecordDraft>) -> ScenarioEngine {
        match ScenarioEngine::new(schema(), seed, profile()) {
            Ok(engine) => engine,
            Err(err) => panic!("fixture engine should build: {err}"),
        }
    }

    fn ok<T>(result: Result<T, EngineError>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("operation should succeed: {err}"),
        }
    }

    fn names(records: &[Record]) -> Vec<String> {
        records.iter().filter_map(|record| record.text("name")).map(ToString::to_string).collect()
    }

    fn score_patch(score: i32) -> FieldPatch {
        FieldPatch::from([("score".to_string(), Some(FieldValue::from(score)))])
    }

    #[test]
    fn crud_round_trip_updates_derived_average_and_undoes_to_empty() {
        let mut engine = engine(Vec::new());
        let id = ok(engine.insert(RecordDraft::new().with("name", "X").with("score", 3)));
        assert_eq!(engine.state().len(), 1);
        assert_eq!(engine.derive().averages.get("score"), Some(&Some(3.0)));

        ok(engine.update(id, score_patch(9)));
        let view = engine.derive();
        assert_eq!(view.averages.get("score"), Some(&Some(9.0)));
        assert_eq!(
            view.insight(id).map(|insight| insight.scores["form"].tier.as_str()),
            Some("healthy")
        );

        ok(engine.delete(id));
        assert!(engine.state().is_empty());

        engine.undo();
        engine.undo();
        engine.undo();
        assert!(engine.state().is_empty());
        assert_eq!(engine.history().cursor(), 0);
        assert!(!engine.can_undo());
    }

    #[test]
    fn reorder_result_is_visible_through_filters() {
        let mut engine = engine(vec![
            RecordDraft::new().with("name", "A").with("squad", "first"),
            RecordDraft::new().with("name", "B").with("squad", "academy"),
            RecordDraft::new().with("name", "C").with("squad", "first"),
        ]);
        let c = engine.state().records()[2].id;
        ok(engine.reorder(c, 0));
        assert_eq!(names(engine.state().records()), vec!["C", "A", "B"]);

        engine.set_filter("squad", FilterPredicate::category_in("squad", &["first"]));
        assert_eq!(names(&engine.visible_records()), vec!["C", "A"]);
        assert_eq!(engine.derive().records.first().map(|insight| insight.id), Some(c));

        assert!(matches!(engine.reorder(c, 3), Err(EngineError::Range { index: 3, len: 3 })));
    }

    #[test]
    fn new_mutation_after_undo_discards_redo() {
        let mut engine = engine(Vec::new());
        ok(engine.insert(RecordDraft::new().with("name", "A")));
        ok(engine.insert(RecordDraft::new().with("name", "B")));
        engine.undo();
        ok(engine.insert(RecordDraft::new().with("name", "C")));

        let before_redo = engine.state().clone();
        assert!(!engine.can_redo());
        assert_eq!(engine.redo(), &before_redo);
        assert_eq!(names(engine.state().records()), vec!["A", "C"]);
    }

    #[test]
    fn failed_mutations_are_not_recorded() {
        let mut engine = engine(vec![RecordDraft::new().with("name", "A")]);
        let before = engine.state().clone();
        assert!(engine.insert(RecordDraft::new().with("name", "")).is_err());
        assert!(engine.update(RecordId::new(), score_patch(1)).is_err());
        assert!(engine.load_scenario("nope").is_err());
        assert_eq!(engine.history().len(), 1);
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn undone_insert_keeps_its_id_reserved_for_redo() {
        let mut engine = engine(Vec::new());
        let id = RecordId::new();
        ok(engine.insert(RecordDraft::new().with_id(id).with("name", "Original")));
        let inserted = engine.state().clone();
        assert!(engine.save_scenario("before").is_ok());

        engine.undo();
        let reused = engine.insert(RecordDraft::new().with_id(id).with("name", "Impostor"));
        assert!(matches!(reused, Err(EngineError::Validation(_))));
        assert!(engine.can_redo());
        assert_eq!(engine.redo(), &inserted);

        ok(engine.delete(id));
        let reused = engine.insert(RecordDraft::new().with_id(id).with("name", "Impostor"));
        assert!(matches!(reused, Err(EngineError::Validation(_))));
        let diff = ok(engine.diff_against_scenario("before"));
        assert_eq!(diff.removed, vec![id]);
        assert!(diff.changed.is_empty());

        // Loading the scenario brings the original record back under its own id.
        assert_eq!(ok(engine.load_scenario("before")), &inserted);
    }

    #[test]
    fn derived_fields_are_never_stored() {
        let mut engine = engine(Vec::new());
        let id = ok(engine.insert(RecordDraft::new().with("name", "A").with("tier", "healthy")));
        assert!(engine.state().get(id).is_some_and(|record| record.field("tier").is_none()));
    }

    #[test]
    fn scenario_round_trip_survives_later_mutations_and_is_undoable() {
        let mut engine = engine(vec![RecordDraft::new().with("name", "A").with("score", 2)]);
        let a = engine.state().records()[0].id;
        ok(engine.insert(RecordDraft::new().with("name", "B")));
        let saved = engine.state().clone();
        assert!(engine.save_scenario("two players").is_ok());

        ok(engine.delete(a));
        ok(engine.insert(RecordDraft::new().with("name", "Z")));
        let diff = ok(engine.diff_against_scenario("two players"));
        assert_eq!(diff.removed, vec![a]);
        assert_eq!(diff.added.len(), 1);

        let history_before_load = engine.history().len();
        assert_eq!(ok(engine.load_scenario("two players")), &saved);
        assert_eq!(engine.history().len(), history_before_load + 1);
        assert!(ok(engine.diff_against_scenario("two players")).is_empty());

        engine.undo();
        assert_eq!(names(engine.state().records()), vec!["B", "Z"]);
        assert_eq!(engine.scenarios().len(), 1);
    }

    #[test]
    fn reset_returns_to_seed_and_can_be_undone() {
        let mut engine = engine(vec![RecordDraft::new().with("name", "A")]);
        let seed = engine.state().clone();
        ok(engine.insert(RecordDraft::new().with("name", "B")));
        let edited = engine.state().clone();

        assert_eq!(engine.reset(), &seed);
        assert_eq!(engine.undo(), &edited);
    }

    #[test]
    fn filter_changes_do_not_touch_history() {
        let mut engine = engine(vec![RecordDraft::new().with("name", "A")]);
        engine.set_filter("search", FilterPredicate::text("zzz"));
        assert!(engine.visible_records().is_empty());
        assert_eq!(engine.derive().visible, 0);
        engine.clear_filter();
        assert_eq!(engine.visible_records().len(), 1);
        assert_eq!(engine.history().len(), 1);
    }

    #[derive(Debug, Clone)]
    enum Mutation {
        Insert(i32),
        UpdateFirst(i32),
        DeleteLast,
        MoveLastToFront,
    }

    fn mutation() -> impl Strategy<Value = Mutation> {
        prop_oneof![
            (0..=10).prop_map(Mutation::Insert),
            (0..=10).prop_map(Mutation::UpdateFirst),
            Just(Mutation::DeleteLast),
            Just(Mutation::MoveLastToFront),
        ]
    }

    fn apply(engine: &mut ScenarioEngine, mutation: &Mutation) -> bool {
        let ids = engine.state().ids();
        match mutation {
            Mutation::Insert(score) => engine
                .insert(RecordDraft::new().with("name", "P").with("score", *score))
                .is_ok(),
            Mutation::UpdateFirst(score) => {
                ids.first().is_some_and(|id| engine.update(*id, score_patch(*score)).is_ok())
            }
            Mutation::DeleteLast => ids.last().is_some_and(|id| engine.delete(*id).is_ok()),
            Mutation::MoveLastToFront => {
                ids.last().is_some_and(|id| engine.reorder(*id, 0).is_ok())
            }
        }
    }

    proptest! {
        #[test]
        fn property_undo_all_then_redo_all_is_inverse(
            mutations in proptest::collection::vec(mutation(), 0..16)
        ) {
            let mut engine = engine(vec![RecordDraft::new().with("name", "seed").with("score", 5)]);
            let seed = engine.state().clone();
            let applied = mutations.iter().filter(|mutation| apply(&mut engine, mutation)).count();
            let last = engine.state().clone();
            prop_assert_eq!(engine.history().len(), applied + 1);

            for _ in 0..applied {
                engine.undo();
            }
            prop_assert_eq!(engine.state(), &seed);
            for _ in 0..applied {
                engine.redo();
            }
            prop_assert_eq!(engine.state(), &last);
        }

        #[test]
        fn property_mutation_after_undo_makes_redo_a_no_op(
            mutations in proptest::collection::vec(mutation(), 1..8),
            extra in mutation(),
        ) {
            let mut engine = engine(vec![RecordDraft::new().with("name", "seed")]);
            for mutation in &mutations {
                apply(&mut engine, mutation);
            }
            engine.undo();
            if apply(&mut engine, &extra) {
                let after = engine.state().clone();
                prop_assert!(!engine.can_redo());
                prop_assert_eq!(engine.redo(), &after);
            }
        }

        #[test]
        fn property_scenario_load_restores_saved_records(
            before in proptest::collection::vec(mutation(), 0..6),
            after in proptest::collection::vec(mutation(), 0..6),
        ) {
            let mut engine = engine(vec![RecordDraft::new().with("name", "seed")]);
            for mutation in &before {
                apply(&mut engine, mutation);
            }
            let saved = engine.state().clone();
            prop_assert!(engine.save_scenario("plan").is_ok());
            for mutation in &after {
                apply(&mut engine, mutation);
            }
            prop_assert_eq!(engine.load_scenario("plan").cloned(), Ok(saved));
        }
    }
}

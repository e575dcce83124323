use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::record::{FieldPatch, Record, RecordDraft, RecordId};
use crate::schema::Schema;
use crate::EngineError;

/// Immutable ordered collection of records.
///
/// Order is the display order; it carries no meaning beyond manual ranking.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct StoreState {
    records: Vec<Record>,
}

impl StoreState {
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    #[must_use]
    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }

    #[must_use]
    pub fn ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|record| record.id).collect()
    }

    /// Content digest of the ordered records, formatted as `sha256:<hex>`.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for record in &self.records {
            hasher.update(record.id.to_string().as_bytes());
            hasher.update([0x1f]);
            // BTreeMap field order keeps the encoding canonical.
            match serde_json::to_vec(&record.fields) {
                Ok(bytes) => hasher.update(&bytes),
                Err(_) => hasher.update(b"<unencodable>"),
            }
            hasher.update([0x1e]);
        }
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }
}

/// The live record collection of one widget.
///
/// Every mutation builds a new [`StoreState`]; the previous state value is never touched, so
/// history entries and snapshots can hold plain clones.
///
/// Record ids are never reused: the store remembers every id it has issued or accepted, so a
/// deleted record's id cannot be handed to a different record later.
#[derive(Debug, Clone)]
pub struct EntityStore {
    schema: Schema,
    current: StoreState,
    issued: BTreeSet<RecordId>,
}

impl EntityStore {
    /// Create a store from a seed collection.
    ///
    /// # Errors
    /// Returns [`EngineError::Validation`] when a seed record fails the schema or two seed
    /// records share an id.
    pub fn seeded(schema: Schema, seed: Vec<RecordDraft>) -> Result<Self, EngineError> {
        schema.validate_self()?;
        let mut seen = BTreeSet::new();
        let mut records = Vec::with_capacity(seed.len());
        for draft in seed {
            let id = draft.id.unwrap_or_default();
            if !seen.insert(id) {
                return Err(EngineError::Validation(format!("duplicate seed record id {id}")));
            }
            let fields = schema.validate(draft.fields)?;
            records.push(Record { id, fields });
        }
        Ok(Self { schema, current: StoreState { records }, issued: seen })
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn state(&self) -> &StoreState {
        &self.current
    }

    /// Append a record, assigning a fresh id when the draft carries none.
    ///
    /// # Errors
    /// Returns [`EngineError::Validation`] when the draft fails the schema or carries an id the
    /// store has already issued, even if that record has since been deleted.
    pub fn insert(&mut self, draft: RecordDraft) -> Result<(RecordId, StoreState), EngineError> {
        let id = draft.id.unwrap_or_default();
        if self.issued.contains(&id) {
            return Err(EngineError::Validation(format!("record id {id} was already issued")));
        }
        let fields = self.schema.validate(draft.fields)?;
        self.issued.insert(id);

        let mut records = self.current.records.clone();
        records.push(Record { id, fields });
        Ok((id, self.commit(records)))
    }

    /// Apply a field patch to one record. The id and position never change.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] for an unknown id and [`EngineError::Validation`] when
    /// the patched record fails the schema.
    pub fn update(&mut self, id: RecordId, patch: FieldPatch) -> Result<StoreState, EngineError> {
        let index = self.index_of(id)?;
        let mut fields = self.current.records[index].fields.clone();
        for (name, value) in patch {
            match value {
                Some(value) => {
                    fields.insert(name, value);
                }
                None => {
                    fields.remove(&name);
                }
            }
        }
        let fields = self.schema.validate(fields)?;

        let mut records = self.current.records.clone();
        records[index] = Record { id, fields };
        Ok(self.commit(records))
    }

    /// # Errors
    /// Returns [`EngineError::NotFound`] for an unknown id.
    pub fn delete(&mut self, id: RecordId) -> Result<StoreState, EngineError> {
        let index = self.index_of(id)?;
        let mut records = self.current.records.clone();
        records.remove(index);
        Ok(self.commit(records))
    }

    /// Move one record to `new_index`, shifting the records in between.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] for an unknown id and [`EngineError::Range`] when
    /// `new_index` is not a valid position.
    pub fn reorder(&mut self, id: RecordId, new_index: usize) -> Result<StoreState, EngineError> {
        let index = self.index_of(id)?;
        let len = self.current.records.len();
        if new_index >= len {
            return Err(EngineError::Range { index: new_index, len });
        }
        let mut records = self.current.records.clone();
        let record = records.remove(index);
        records.insert(new_index, record);
        Ok(self.commit(records))
    }

    /// Swap in a previously produced state (undo, redo, scenario load).
    pub fn replace(&mut self, state: StoreState) {
        self.issued.extend(state.records.iter().map(|record| record.id));
        self.current = state;
    }

    fn index_of(&self, id: RecordId) -> Result<usize, EngineError> {
        self.current
            .position(id)
            .ok_or_else(|| EngineError::NotFound(format!("record {id} does not exist")))
    }

    fn commit(&mut self, records: Vec<Record>) -> StoreState {
        self.current = StoreState { records };
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;
    use crate::schema::FieldSpec;

    fn schema() -> Schema {
        match Schema::new(
            "roster",
            vec![FieldSpec::text("name").required(), FieldSpec::bounded("score", 0.0, 10.0)],
        ) {
            Ok(schema) => schema,
            Err(err) => panic!("fixture schema should be valid: {err}"),
        }
    }

    fn store_with(names: &[&str]) -> (EntityStore, Vec<RecordId>) {
        let ids = names.iter().map(|_| RecordId::new()).collect::<Vec<_>>();
        let seed = names
            .iter()
            .zip(&ids)
            .map(|(name, id)| RecordDraft::new().with_id(*id).with("name", *name))
            .collect();
        match EntityStore::seeded(schema(), seed) {
            Ok(store) => (store, ids),
            Err(err) => panic!("fixture seed should be valid: {err}"),
        }
    }

    fn names(state: &StoreState) -> Vec<&str> {
        state.records().iter().filter_map(|record| record.text("name")).collect()
    }

    #[test]
    fn insert_assigns_id_and_appends() {
        let (mut store, _) = store_with(&["A"]);
        let draft = RecordDraft::new().with("name", "B").with("score", 4);
        let (id, state) = match store.insert(draft) {
            Ok(result) => result,
            Err(err) => panic!("insert should succeed: {err}"),
        };
        assert_eq!(names(&state), vec!["A", "B"]);
        assert_eq!(state.position(id), Some(1));
        assert_eq!(store.state(), &state);
    }

    #[test]
    fn failed_operations_leave_the_store_untouched() {
        let (mut store, ids) = store_with(&["A", "B"]);
        let before = store.state().clone();

        assert!(matches!(
            store.insert(RecordDraft::new().with("score", 3)),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            store.insert(RecordDraft::new().with_id(ids[0]).with("name", "dup")),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(store.delete(RecordId::new()), Err(EngineError::NotFound(_))));
        assert!(matches!(
            store.update(ids[0], FieldPatch::from([("score".to_string(), Some(99.into()))])),
            Err(EngineError::Validation(_))
        ));
        assert_eq!(store.reorder(ids[1], 2), Err(EngineError::Range { index: 2, len: 2 }));

        assert_eq!(store.state(), &before);
    }

    #[test]
    fn deleted_ids_are_never_reissued() {
        let (mut store, ids) = store_with(&["Original", "B"]);
        let seeded = store.state().clone();
        if let Err(err) = store.delete(ids[0]) {
            panic!("delete should succeed: {err}");
        }
        let after_delete = store.state().clone();

        let reused = store.insert(RecordDraft::new().with_id(ids[0]).with("name", "Impostor"));
        assert!(matches!(reused, Err(EngineError::Validation(_))));
        assert_eq!(store.state(), &after_delete);
        assert_eq!(store.state().len(), 1);

        // Bringing back an earlier state keeps working and still blocks the id afterwards.
        store.replace(seeded.clone());
        assert_eq!(store.state(), &seeded);
        if let Err(err) = store.delete(ids[0]) {
            panic!("delete should succeed: {err}");
        }
        let reused = store.insert(RecordDraft::new().with_id(ids[0]).with("name", "Impostor"));
        assert!(matches!(reused, Err(EngineError::Validation(_))));
    }

    #[test]
    fn rejected_insert_does_not_reserve_its_id() {
        let (mut store, _) = store_with(&["A"]);
        let id = RecordId::new();
        let invalid = store.insert(RecordDraft::new().with_id(id).with("score", 3));
        assert!(matches!(invalid, Err(EngineError::Validation(_))));

        match store.insert(RecordDraft::new().with_id(id).with("name", "B")) {
            Ok((inserted, state)) => {
                assert_eq!(inserted, id);
                assert_eq!(state.position(id), Some(1));
            }
            Err(err) => panic!("a rejected draft should not burn its id: {err}"),
        }
    }

    #[test]
    fn update_patches_fields_and_removes_with_none() {
        let (mut store, ids) = store_with(&["A", "B"]);
        let patch = FieldPatch::from([("score".to_string(), Some(FieldValue::Number(9.0)))]);
        let state = match store.update(ids[1], patch) {
            Ok(state) => state,
            Err(err) => panic!("update should succeed: {err}"),
        };
        assert_eq!(state.get(ids[1]).and_then(|record| record.number("score")), Some(9.0));
        assert_eq!(state.position(ids[1]), Some(1));

        let state = match store.update(ids[1], FieldPatch::from([("score".to_string(), None)])) {
            Ok(state) => state,
            Err(err) => panic!("update should succeed: {err}"),
        };
        assert_eq!(state.get(ids[1]).and_then(|record| record.number("score")), None);

        let cleared = store.update(ids[1], FieldPatch::from([("name".to_string(), None)]));
        assert!(matches!(cleared, Err(EngineError::Validation(_))));
    }

    #[test]
    fn reorder_moves_record_to_front() {
        let (mut store, ids) = store_with(&["A", "B", "C"]);
        let state = match store.reorder(ids[2], 0) {
            Ok(state) => state,
            Err(err) => panic!("reorder should succeed: {err}"),
        };
        assert_eq!(names(&state), vec!["C", "A", "B"]);

        let state = match store.reorder(ids[2], 2) {
            Ok(state) => state,
            Err(err) => panic!("reorder should succeed: {err}"),
        };
        assert_eq!(names(&state), vec!["A", "B", "C"]);
    }

    #[test]
    fn earlier_states_are_unaffected_by_later_mutations() {
        let (mut store, ids) = store_with(&["A", "B"]);
        let before = store.state().clone();
        let after = match store.delete(ids[0]) {
            Ok(state) => state,
            Err(err) => panic!("delete should succeed: {err}"),
        };
        assert_eq!(before.len(), 2);
        assert_eq!(after.len(), 1);
        assert!(before.get(ids[0]).is_some());
    }

    #[test]
    fn seed_rejects_duplicate_ids() {
        let id = RecordId::new();
        let seed = vec![
            RecordDraft::new().with_id(id).with("name", "A"),
            RecordDraft::new().with_id(id).with("name", "B"),
        ];
        assert!(matches!(EntityStore::seeded(schema(), seed), Err(EngineError::Validation(_))));
    }

    #[test]
    fn fingerprint_tracks_content_and_order() {
        let (mut store, ids) = store_with(&["A", "B"]);
        let original = store.state().fingerprint();
        assert!(original.starts_with("sha256:"));
        assert_eq!(original, store.state().clone().fingerprint());

        let moved = match store.reorder(ids[1], 0) {
            Ok(state) => state,
            Err(err) => panic!("reorder should succeed: {err}"),
        };
        assert_ne!(moved.fingerprint(), original);
    }
}

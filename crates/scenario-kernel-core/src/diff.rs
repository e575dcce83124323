use std::collections::BTreeSet;

use serde::Serialize;

use crate::record::RecordId;
use crate::store::StoreState;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldChange {
    pub id: RecordId,
    /// Names of fields added, removed, or modified.
    pub fields: Vec<String>,
}

/// Record-level difference between two store states.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StateDiff {
    pub added: Vec<RecordId>,
    pub removed: Vec<RecordId>,
    pub changed: Vec<FieldChange>,
    /// Records present in both states whose relative order changed. Only the fewest records
    /// that explain the new order are listed; neighbours shifted by a move are not.
    pub moved: Vec<RecordId>,
}

impl StateDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && self.moved.is_empty()
    }
}

#[must_use]
pub fn diff_states(before: &StoreState, after: &StoreState) -> StateDiff {
    let mut diff = StateDiff::default();

    for record in after.records() {
        match before.get(record.id) {
            None => diff.added.push(record.id),
            Some(previous) => {
                let names = previous
                    .fields
                    .keys()
                    .chain(record.fields.keys())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .filter(|name| previous.fields.get(*name) != record.fields.get(*name))
                    .cloned()
                    .collect::<Vec<_>>();
                if !names.is_empty() {
                    diff.changed.push(FieldChange { id: record.id, fields: names });
                }
            }
        }
    }

    diff.removed = before
        .records()
        .iter()
        .filter(|record| after.get(record.id).is_none())
        .map(|record| record.id)
        .collect();

    // Compare the order of the surviving records only; inserts and deletes alone are not moves.
    let kept_before =
        before.ids().into_iter().filter(|id| after.get(*id).is_some()).collect::<Vec<_>>();
    let kept_after =
        after.ids().into_iter().filter(|id| before.get(*id).is_some()).collect::<Vec<_>>();
    diff.moved = moved_ids(&kept_before, &kept_after);

    diff
}

/// Ids of `after` that fall outside a longest common subsequence of the two orders.
///
/// Both slices hold the same ids. On ties the earlier id in `after` is reported, so a record
/// pulled forward is listed rather than the one it jumped over.
fn moved_ids(before: &[RecordId], after: &[RecordId]) -> Vec<RecordId> {
    let (rows, cols) = (before.len(), after.len());
    // lcs[i][j] is the common subsequence length of before[i..] and after[j..].
    let mut lcs = vec![vec![0_usize; cols + 1]; rows + 1];
    for i in (0..rows).rev() {
        for j in (0..cols).rev() {
            lcs[i][j] = if before[i] == after[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut moved = Vec::new();
    let (mut i, mut j) = (0, 0);
    while j < cols {
        if i < rows && before[i] == after[j] {
            i += 1;
            j += 1;
        } else if i < rows && lcs[i + 1][j] > lcs[i][j + 1] {
            i += 1;
        } else {
            moved.push(after[j]);
            j += 1;
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldPatch, RecordDraft};
    use crate::schema::{FieldSpec, Schema};
    use crate::store::EntityStore;

    fn seeded(names: &[&str]) -> (EntityStore, Vec<RecordId>) {
        let schema = match Schema::new(
            "diff",
            vec![FieldSpec::text("name").required(), FieldSpec::number("score")],
        ) {
            Ok(schema) => schema,
            Err(err) => panic!("fixture schema should be valid: {err}"),
        };
        let ids = names.iter().map(|_| RecordId::new()).collect::<Vec<_>>();
        let seed = names
            .iter()
            .zip(&ids)
            .map(|(name, id)| RecordDraft::new().with_id(*id).with("name", *name))
            .collect();
        match EntityStore::seeded(schema, seed) {
            Ok(store) => (store, ids),
            Err(err) => panic!("fixture seed should be valid: {err}"),
        }
    }

    #[test]
    fn identical_states_have_an_empty_diff() {
        let (store, _) = seeded(&["A", "B"]);
        assert!(diff_states(store.state(), store.state()).is_empty());
    }

    #[test]
    fn diff_reports_added_removed_changed_and_moved() {
        let (mut store, ids) = seeded(&["A", "B", "C"]);
        let before = store.state().clone();

        let applied = store.delete(ids[0]).and_then(|_| {
            store.update(ids[1], FieldPatch::from([("score".to_string(), Some(5.into()))]))
        });
        assert!(applied.is_ok());
        assert!(store.reorder(ids[2], 0).is_ok());
        let (added, after) = match store.insert(RecordDraft::new().with("name", "D")) {
            Ok(result) => result,
            Err(err) => panic!("insert should succeed: {err}"),
        };

        let diff = diff_states(&before, &after);
        assert_eq!(diff.added, vec![added]);
        assert_eq!(diff.removed, vec![ids[0]]);
        assert_eq!(
            diff.changed,
            vec![FieldChange { id: ids[1], fields: vec!["score".to_string()] }]
        );
        assert_eq!(diff.moved, vec![ids[2]]);
    }

    #[test]
    fn a_single_reorder_reports_only_the_record_that_moved() {
        let (mut store, ids) = seeded(&["A", "B", "C", "D"]);
        let before = store.state().clone();

        let to_front = match store.reorder(ids[2], 0) {
            Ok(state) => state,
            Err(err) => panic!("reorder should succeed: {err}"),
        };
        assert_eq!(diff_states(&before, &to_front).moved, vec![ids[2]]);

        store.replace(before.clone());
        let to_back = match store.reorder(ids[0], 3) {
            Ok(state) => state,
            Err(err) => panic!("reorder should succeed: {err}"),
        };
        assert_eq!(diff_states(&before, &to_back).moved, vec![ids[0]]);
    }

    #[test]
    fn reversed_order_moves_all_but_one_record() {
        let (store, ids) = seeded(&["A", "B", "C"]);
        let before = store.state().clone();
        let reversed = match EntityStore::seeded(
            store.schema().clone(),
            ids.iter()
                .rev()
                .zip(["C", "B", "A"])
                .map(|(id, name)| RecordDraft::new().with_id(*id).with("name", name))
                .collect(),
        ) {
            Ok(store) => store.state().clone(),
            Err(err) => panic!("reversed seed should be valid: {err}"),
        };

        let diff = diff_states(&before, &reversed);
        assert_eq!(diff.moved.len(), 2);
        assert!(diff.changed.is_empty());
        assert!(diff.added.is_empty() && diff.removed.is_empty());
    }
}

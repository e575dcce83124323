use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::record::{FieldValue, Record};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterPredicate {
    /// Case-insensitive substring match. With no fields named, every text-bearing field is
    /// searched.
    TextContains {
        needle: String,
        #[serde(default)]
        fields: Vec<String>,
    },
    /// The field's text value is one of `values`.
    CategoryIn { field: String, values: BTreeSet<String> },
    /// The field's list shares at least one label with `values`.
    TagIn { field: String, values: BTreeSet<String> },
}

impl FilterPredicate {
    #[must_use]
    pub fn text(needle: &str) -> Self {
        Self::TextContains { needle: needle.to_string(), fields: Vec::new() }
    }

    #[must_use]
    pub fn category_in(field: &str, values: &[&str]) -> Self {
        Self::CategoryIn {
            field: field.to_string(),
            values: values.iter().map(ToString::to_string).collect(),
        }
    }

    #[must_use]
    pub fn tag_in(field: &str, values: &[&str]) -> Self {
        Self::TagIn {
            field: field.to_string(),
            values: values.iter().map(ToString::to_string).collect(),
        }
    }

    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::TextContains { needle, fields } => {
                let needle = needle.trim().to_lowercase();
                if needle.is_empty() {
                    return true;
                }
                let contains = |value: &FieldValue| {
                    value
                        .text_fragments()
                        .into_iter()
                        .any(|fragment| fragment.to_lowercase().contains(&needle))
                };
                if fields.is_empty() {
                    record.fields.values().any(contains)
                } else {
                    fields.iter().filter_map(|name| record.field(name)).any(contains)
                }
            }
            Self::CategoryIn { field, values } => {
                values.is_empty()
                    || record.text(field).is_some_and(|value| values.contains(value))
            }
            Self::TagIn { field, values } => {
                values.is_empty()
                    || record.field(field).is_some_and(|value| {
                        value.text_fragments().iter().any(|tag| values.contains(*tag))
                    })
            }
        }
    }
}

/// Active view parameters. Not versioned: changing it never touches history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FilterState {
    predicates: BTreeMap<String, FilterPredicate>,
}

impl FilterState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: &str, predicate: FilterPredicate) -> Self {
        self.set(name, predicate);
        self
    }

    /// Install or replace the predicate stored under `name`.
    pub fn set(&mut self, name: &str, predicate: FilterPredicate) {
        self.predicates.insert(name.to_string(), predicate);
    }

    pub fn remove(&mut self, name: &str) -> Option<FilterPredicate> {
        self.predicates.remove(name)
    }

    pub fn clear(&mut self) {
        self.predicates.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FilterPredicate> {
        self.predicates.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterPredicate)> {
        self.predicates.iter().map(|(name, predicate)| (name.as_str(), predicate))
    }

    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.predicates.values().all(|predicate| predicate.matches(record))
    }
}

/// Order-preserving subset of `records` that passes every predicate in `filter`.
#[must_use]
pub fn apply_filter(records: &[Record], filter: &FilterState) -> Vec<Record> {
    records.iter().filter(|record| filter.matches(record)).cloned().collect()
}

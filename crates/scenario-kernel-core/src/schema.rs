use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::record::FieldValue;
use crate::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Flag,
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Text,
    Category {
        allowed: Vec<String>,
    },
    /// List of text labels.
    Tags,
    /// Chronological list of numbers, oldest first.
    Series,
    /// Free-form list of text entries (comments, log lines).
    Notes,
}

impl FieldKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Number { .. } => "number",
            Self::Text => "text",
            Self::Category { .. } => "category",
            Self::Tags => "tags",
            Self::Series => "series",
            Self::Notes => "notes",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Recomputed on read; stripped from every write.
    #[serde(default)]
    pub derived: bool,
}

impl FieldSpec {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self { name: name.to_string(), kind, required: false, derived: false }
    }

    #[must_use]
    pub fn flag(name: &str) -> Self {
        Self::new(name, FieldKind::Flag)
    }

    #[must_use]
    pub fn number(name: &str) -> Self {
        Self::new(name, FieldKind::Number { min: None, max: None })
    }

    #[must_use]
    pub fn bounded(name: &str, min: f64, max: f64) -> Self {
        Self::new(name, FieldKind::Number { min: Some(min), max: Some(max) })
    }

    #[must_use]
    pub fn text(name: &str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    #[must_use]
    pub fn category(name: &str, allowed: &[&str]) -> Self {
        Self::new(
            name,
            FieldKind::Category { allowed: allowed.iter().map(ToString::to_string).collect() },
        )
    }

    #[must_use]
    pub fn tags(name: &str) -> Self {
        Self::new(name, FieldKind::Tags)
    }

    #[must_use]
    pub fn series(name: &str) -> Self {
        Self::new(name, FieldKind::Series)
    }

    #[must_use]
    pub fn notes(name: &str) -> Self {
        Self::new(name, FieldKind::Notes)
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn derived(mut self) -> Self {
        self.derived = true;
        self
    }

    fn check(&self, value: &FieldValue) -> Result<(), EngineError> {
        let mismatch = || {
            EngineError::Validation(format!(
                "field `{}` expects {} but got {}",
                self.name,
                self.kind.as_str(),
                value.kind_name()
            ))
        };

        match (&self.kind, value) {
            (FieldKind::Flag, FieldValue::Flag(_)) => Ok(()),
            (FieldKind::Number { min, max }, FieldValue::Number(number)) => {
                if !number.is_finite() {
                    return Err(EngineError::Validation(format!(
                        "field `{}` MUST be a finite number",
                        self.name
                    )));
                }
                if min.is_some_and(|min| *number < min) || max.is_some_and(|max| *number > max) {
                    return Err(EngineError::Validation(format!(
                        "field `{}` value {number} is outside [{}, {}]",
                        self.name,
                        min.map_or_else(|| "-inf".to_string(), |min| min.to_string()),
                        max.map_or_else(|| "inf".to_string(), |max| max.to_string()),
                    )));
                }
                Ok(())
            }
            (FieldKind::Text, FieldValue::Text(text)) => {
                if self.required && text.trim().is_empty() {
                    return Err(EngineError::Validation(format!(
                        "field `{}` MUST NOT be empty",
                        self.name
                    )));
                }
                Ok(())
            }
            (FieldKind::Category { allowed }, FieldValue::Text(text)) => {
                if allowed.iter().any(|candidate| candidate == text) {
                    Ok(())
                } else {
                    Err(EngineError::Validation(format!(
                        "field `{}` value `{text}` is not one of [{}]",
                        self.name,
                        allowed.join(", ")
                    )))
                }
            }
            (FieldKind::Tags | FieldKind::Notes, FieldValue::List(items)) => {
                if items.iter().all(|item| matches!(item, FieldValue::Text(_))) {
                    Ok(())
                } else {
                    Err(mismatch())
                }
            }
            (FieldKind::Series, FieldValue::List(items)) => {
                if items.iter().all(|item| item.as_number().is_some_and(f64::is_finite)) {
                    Ok(())
                } else {
                    Err(mismatch())
                }
            }
            _ => Err(mismatch()),
        }
    }
}

/// Field layout of one widget's records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    pub domain: String,
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    /// Build a schema, rejecting malformed field declarations.
    ///
    /// # Errors
    /// Returns [`EngineError::Validation`] for a blank domain, blank or duplicate field names,
    /// or a field that is both required and derived.
    pub fn new(domain: &str, fields: Vec<FieldSpec>) -> Result<Self, EngineError> {
        let schema = Self { domain: domain.to_string(), fields };
        schema.validate_self()?;
        Ok(schema)
    }

    /// # Errors
    /// Returns [`EngineError::Validation`] when the declaration is inconsistent.
    pub fn validate_self(&self) -> Result<(), EngineError> {
        if self.domain.trim().is_empty() {
            return Err(EngineError::Validation("schema domain MUST be provided".to_string()));
        }
        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(EngineError::Validation(format!(
                    "schema `{}` declares a field with an empty name",
                    self.domain
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(EngineError::Validation(format!(
                    "schema `{}` declares field `{}` twice",
                    self.domain, field.name
                )));
            }
            if field.required && field.derived {
                return Err(EngineError::Validation(format!(
                    "field `{}` cannot be both required and derived",
                    field.name
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Names of stored (non-derived) fields in declaration order.
    pub fn stored_field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter(|field| !field.derived).map(|field| field.name.as_str())
    }

    /// Structural check of one record's fields. Derived fields are dropped from the result.
    ///
    /// # Errors
    /// Returns [`EngineError::Validation`] for unknown fields, wrong value kinds, out-of-range
    /// numbers, disallowed categories, or missing required fields.
    pub fn validate(
        &self,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<BTreeMap<String, FieldValue>, EngineError> {
        let mut cleaned = BTreeMap::new();
        for (name, value) in fields {
            let Some(spec) = self.field(&name) else {
                return Err(EngineError::Validation(format!(
                    "field `{name}` is not declared for `{}`",
                    self.domain
                )));
            };
            if spec.derived {
                continue;
            }
            spec.check(&value)?;
            cleaned.insert(name, value);
        }

        for spec in self.fields.iter().filter(|field| field.required) {
            if !cleaned.contains_key(&spec.name) {
                return Err(EngineError::Validation(format!(
                    "field `{}` is required for `{}`",
                    spec.name, self.domain
                )));
            }
        }

        Ok(cleaned)
    }
}

//! Pure recomputation of analytics from the filtered record set.
//!
//! Nothing here is stored. A [`DerivedView`] exists only as the return value of
//! [`Derivation::derive`] for one `(records, filter)` pair; weights and thresholds come from the
//! injected [`DerivationProfile`], never from constants in this module.

use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::filter::{apply_filter, FilterState};
use crate::record::{FieldValue, Record, RecordId};
use crate::EngineError;

/// Tier reported when a record carries none of a score's inputs.
pub const UNKNOWN_TIER: &str = "unknown";
/// Group key for records missing the grouping field.
pub const UNKNOWN_GROUP: &str = "unknown";

/// Seam for widget-specific analytics. Implementations must be pure.
pub trait Derivation {
    type View;

    fn derive(&self, records: &[Record], filter: &FilterState) -> Self::View;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMethod {
    /// `Σ wᵢ·vᵢ / Σ wᵢ`
    WeightedMean,
    /// `Σ wᵢ·vᵢ`
    WeightedSum,
    /// `min wᵢ·vᵢ`
    Minimum,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightedField {
    pub field: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl WeightedField {
    #[must_use]
    pub fn new(field: &str, weight: f64) -> Self {
        Self { field: field.to_string(), weight }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierBand {
    pub below: f64,
    pub label: String,
}

/// Maps a numeric score onto qualitative tiers.
///
/// A score takes the label of the lowest band whose `below` threshold it falls under, or `top`
/// when it clears every band.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierScale {
    pub bands: Vec<TierBand>,
    pub top: String,
}

impl TierScale {
    #[must_use]
    pub fn new(bands: &[(f64, &str)], top: &str) -> Self {
        Self {
            bands: bands
                .iter()
                .map(|(below, label)| TierBand { below: *below, label: (*label).to_string() })
                .collect(),
            top: top.to_string(),
        }
    }

    #[must_use]
    pub fn classify(&self, score: f64) -> &str {
        self.bands
            .iter()
            .filter(|band| score < band.below)
            .min_by(|lhs, rhs| lhs.below.total_cmp(&rhs.below))
            .map_or(self.top.as_str(), |band| band.label.as_str())
    }

    /// Every label this scale can produce, lowest band first.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        let mut bands = self.bands.iter().collect::<Vec<_>>();
        bands.sort_by(|lhs, rhs| lhs.below.total_cmp(&rhs.below));
        let mut labels = bands.into_iter().map(|band| band.label.as_str()).collect::<Vec<_>>();
        labels.push(self.top.as_str());
        labels
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreRule {
    pub name: String,
    pub method: ScoreMethod,
    pub components: Vec<WeightedField>,
    pub tiers: TierScale,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreOutcome {
    pub value: Option<f64>,
    pub tier: String,
}

impl ScoreRule {
    /// Numeric score for one record. Absent components count as `0`; a record with none of the
    /// components has no score.
    #[must_use]
    pub fn score(&self, record: &Record) -> Option<f64> {
        let values = self
            .components
            .iter()
            .map(|component| (component.weight, record.number(&component.field)))
            .collect::<Vec<_>>();
        if values.iter().all(|(_, value)| value.is_none()) {
            return None;
        }

        let weighted = values.iter().map(|(weight, value)| weight * value.unwrap_or(0.0));
        match self.method {
            ScoreMethod::WeightedSum => Some(weighted.sum()),
            ScoreMethod::WeightedMean => {
                let total_weight = values.iter().map(|(weight, _)| weight).sum::<f64>();
                if total_weight > 0.0 {
                    Some(weighted.sum::<f64>() / total_weight)
                } else {
                    None
                }
            }
            ScoreMethod::Minimum => weighted.reduce(f64::min),
        }
    }

    #[must_use]
    pub fn evaluate(&self, record: &Record) -> ScoreOutcome {
        let value = self.score(record);
        let tier = value.map_or(UNKNOWN_TIER, |score| self.tiers.classify(score)).to_string();
        ScoreOutcome { value, tier }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordPredicate {
    /// Field equals `value`, or, for list fields, contains it.
    Equals { field: String, value: FieldValue },
    Below { field: String, threshold: f64 },
    AtLeast { field: String, threshold: f64 },
    FlagSet { field: String },
    /// The named score classified the record into `tier`.
    TierIs { score: String, tier: String },
}

impl RecordPredicate {
    fn matches(&self, record: &Record, insight: &RecordInsight) -> bool {
        match self {
            Self::Equals { field, value } => record.field(field).is_some_and(|actual| {
                actual == value || actual.as_list().is_some_and(|items| items.contains(value))
            }),
            Self::Below { field, threshold } => {
                record.number(field).is_some_and(|number| number < *threshold)
            }
            Self::AtLeast { field, threshold } => {
                record.number(field).is_some_and(|number| number >= *threshold)
            }
            Self::FlagSet { field } => {
                record.field(field).and_then(FieldValue::as_flag).unwrap_or(false)
            }
            Self::TierIs { score, tier } => {
                insight.scores.get(score).is_some_and(|outcome| &outcome.tier == tier)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountRule {
    pub name: String,
    pub predicate: RecordPredicate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Steady,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendRule {
    pub name: String,
    pub field: String,
    pub min_delta: f64,
}

impl TrendRule {
    /// Compare the two most recent numeric entries of the series field.
    #[must_use]
    pub fn classify(&self, record: &Record) -> Trend {
        let series = record.field(&self.field).map(FieldValue::numeric_series).unwrap_or_default();
        let [.., previous, latest] = series.as_slice() else {
            return Trend::Unknown;
        };
        let delta = latest - previous;
        if delta >= self.min_delta && delta > 0.0 {
            Trend::Up
        } else if delta <= -self.min_delta && delta < 0.0 {
            Trend::Down
        } else {
            Trend::Steady
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Radar-chart geometry: axis `i` of `N` sits at angle `2π·i/N`, radius `base + scale·value`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RadarRule {
    pub axes: Vec<String>,
    pub base: f64,
    pub scale: f64,
    #[serde(default)]
    pub center: Point,
}

impl RadarRule {
    #[must_use]
    pub fn project(&self, record: &Record) -> Vec<Point> {
        #[allow(clippy::cast_precision_loss)]
        let count = self.axes.len() as f64;
        self.axes
            .iter()
            .enumerate()
            .map(|(index, axis)| {
                #[allow(clippy::cast_precision_loss)]
                let angle = TAU * index as f64 / count;
                let radius = self.base + self.scale * record.number(axis).unwrap_or(0.0);
                Point {
                    x: self.center.x + radius * angle.cos(),
                    y: self.center.y + radius * angle.sin(),
                }
            })
            .collect()
    }
}

/// Configured analytics for one widget. Loaded from YAML/JSON or built in code.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DerivationProfile {
    #[serde(default)]
    pub scores: Vec<ScoreRule>,
    #[serde(default)]
    pub counts: Vec<CountRule>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub averages: Vec<String>,
    #[serde(default)]
    pub trends: Vec<TrendRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radar: Option<RadarRule>,
}

impl DerivationProfile {
    /// Reject profiles that could only produce nonsense.
    ///
    /// # Errors
    /// Returns [`EngineError::Validation`] for duplicate rule names, non-finite or negative
    /// weights, negative trend deltas, radar rules without axes, or count rules that reference
    /// an undeclared score.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut score_names = BTreeSet::new();
        for rule in &self.scores {
            if !score_names.insert(rule.name.as_str()) {
                return Err(EngineError::Validation(format!(
                    "score `{}` is declared twice",
                    rule.name
                )));
            }
            if rule.components.is_empty() {
                return Err(EngineError::Validation(format!(
                    "score `{}` MUST name at least one component",
                    rule.name
                )));
            }
            if rule.components.iter().any(|component| {
                !component.weight.is_finite() || component.weight < 0.0
            }) {
                return Err(EngineError::Validation(format!(
                    "score `{}` weights MUST be finite and >= 0",
                    rule.name
                )));
            }
            if rule.tiers.bands.iter().any(|band| !band.below.is_finite()) {
                return Err(EngineError::Validation(format!(
                    "score `{}` tier thresholds MUST be finite",
                    rule.name
                )));
            }
        }

        let mut count_names = BTreeSet::new();
        for rule in &self.counts {
            if !count_names.insert(rule.name.as_str()) {
                return Err(EngineError::Validation(format!(
                    "count `{}` is declared twice",
                    rule.name
                )));
            }
            if let RecordPredicate::TierIs { score, .. } = &rule.predicate {
                if !score_names.contains(score.as_str()) {
                    return Err(EngineError::Validation(format!(
                        "count `{}` references unknown score `{score}`",
                        rule.name
                    )));
                }
            }
        }

        for rule in &self.trends {
            if !rule.min_delta.is_finite() || rule.min_delta < 0.0 {
                return Err(EngineError::Validation(format!(
                    "trend `{}` min_delta MUST be finite and >= 0",
                    rule.name
                )));
            }
        }

        if let Some(radar) = &self.radar {
            if radar.axes.is_empty() {
                return Err(EngineError::Validation("radar MUST declare axes".to_string()));
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn insight(&self, record: &Record) -> RecordInsight {
        RecordInsight {
            id: record.id,
            scores: self
                .scores
                .iter()
                .map(|rule| (rule.name.clone(), rule.evaluate(record)))
                .collect(),
            trends: self
                .trends
                .iter()
                .map(|rule| (rule.name.clone(), rule.classify(record)))
                .collect(),
            radar: self.radar.as_ref().map(|radar| radar.project(record)),
        }
    }
}

/// Per-record derived values, in filtered display order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecordInsight {
    pub id: RecordId,
    pub scores: BTreeMap<String, ScoreOutcome>,
    pub trends: BTreeMap<String, Trend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radar: Option<Vec<Point>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DerivedView {
    /// Records in the store before filtering.
    pub total: usize,
    /// Records passing the filter; every aggregate below is over this subset.
    pub visible: usize,
    pub counts: BTreeMap<String, usize>,
    pub groups: BTreeMap<String, BTreeMap<String, usize>>,
    pub averages: BTreeMap<String, Option<f64>>,
    pub tier_counts: BTreeMap<String, BTreeMap<String, usize>>,
    pub records: Vec<RecordInsight>,
}

impl DerivedView {
    #[must_use]
    pub fn insight(&self, id: RecordId) -> Option<&RecordInsight> {
        self.records.iter().find(|insight| insight.id == id)
    }
}

impl Derivation for DerivationProfile {
    type View = DerivedView;

    fn derive(&self, records: &[Record], filter: &FilterState) -> DerivedView {
        let visible = apply_filter(records, filter);
        let insights = visible.iter().map(|record| self.insight(record)).collect::<Vec<_>>();

        let counts = self
            .counts
            .iter()
            .map(|rule| {
                let count = visible
                    .iter()
                    .zip(&insights)
                    .filter(|(record, insight)| rule.predicate.matches(record, insight))
                    .count();
                (rule.name.clone(), count)
            })
            .collect();

        let groups = self
            .group_by
            .iter()
            .map(|field| {
                let mut buckets = BTreeMap::<String, usize>::new();
                for record in &visible {
                    let key = record.text(field).unwrap_or(UNKNOWN_GROUP).to_string();
                    *buckets.entry(key).or_default() += 1;
                }
                (field.clone(), buckets)
            })
            .collect();

        let averages = self
            .averages
            .iter()
            .map(|field| {
                let numbers =
                    visible.iter().filter_map(|record| record.number(field)).collect::<Vec<_>>();
                #[allow(clippy::cast_precision_loss)]
                let average = (!numbers.is_empty())
                    .then(|| numbers.iter().sum::<f64>() / numbers.len() as f64);
                (field.clone(), average)
            })
            .collect();

        let tier_counts = self
            .scores
            .iter()
            .map(|rule| {
                let mut buckets = rule
                    .tiers
                    .labels()
                    .into_iter()
                    .map(|label| (label.to_string(), 0_usize))
                    .collect::<BTreeMap<_, _>>();
                for insight in &insights {
                    if let Some(outcome) = insight.scores.get(&rule.name) {
                        *buckets.entry(outcome.tier.clone()).or_default() += 1;
                    }
                }
                (rule.name.clone(), buckets)
            })
            .collect();

        DerivedView {
            total: records.len(),
            visible: visible.len(),
            counts,
            groups,
            averages,
            tier_counts,
            records: insights,
        }
    }
}

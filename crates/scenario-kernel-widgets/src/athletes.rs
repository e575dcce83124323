//! Squad readiness widget.

use scenario_kernel_core::{
    CountRule, DerivationProfile, EngineError, FieldSpec, FieldValue, RecordDraft,
    RecordPredicate, Schema, ScoreMethod, ScoreRule, TierScale, TrendRule, WeightedField,
};

pub const READINESS: &str = "readiness";

/// # Errors
/// Returns [`EngineError::Validation`] if the declaration is inconsistent.
pub fn schema() -> Result<Schema, EngineError> {
    Schema::new(
        "athletes",
        vec![
            FieldSpec::text("name").required(),
            FieldSpec::category("position", &["GK", "DF", "MF", "FW"]).required(),
            FieldSpec::category("squad_role", &["starter", "rotation", "academy"]),
            FieldSpec::bounded("sleep_quality", 0.0, 10.0),
            FieldSpec::bounded("freshness", 0.0, 10.0),
            FieldSpec::bounded("mood", 0.0, 10.0),
            FieldSpec::series("wellness_history"),
            FieldSpec::flag("injured"),
            FieldSpec::tags("tags"),
            FieldSpec::notes("notes"),
            FieldSpec::number(READINESS).derived(),
        ],
    )
}

#[allow(clippy::too_many_arguments)]
fn athlete(
    name: &str,
    position: &str,
    squad_role: &str,
    sleep_quality: f64,
    freshness: f64,
    mood: f64,
    wellness_history: Vec<f64>,
    injured: bool,
) -> RecordDraft {
    RecordDraft::new()
        .with("name", name)
        .with("position", position)
        .with("squad_role", squad_role)
        .with("sleep_quality", sleep_quality)
        .with("freshness", freshness)
        .with("mood", mood)
        .with("wellness_history", wellness_history)
        .with("injured", injured)
}

#[must_use]
pub fn seed() -> Vec<RecordDraft> {
    vec![
        athlete("Marta Silva", "FW", "starter", 8.0, 7.5, 8.0, vec![7.0, 7.4, 8.1], false)
            .with("tags", vec!["captain"]),
        athlete("Jonas Berg", "DF", "starter", 5.5, 4.0, 6.0, vec![7.2, 6.8, 5.1], false)
            .with("notes", vec![FieldValue::from("Heavy minutes after cup replay")]),
        athlete("Ikenna Obi", "MF", "rotation", 7.0, 6.5, 7.0, vec![6.5, 6.6, 6.8], false),
        athlete("Lea Hoffmann", "GK", "starter", 6.0, 7.0, 5.5, vec![6.0, 6.2, 6.1], false),
        athlete("Tomas Novak", "DF", "rotation", 3.5, 2.5, 4.0, vec![5.0, 4.1, 3.2], true)
            .with("tags", vec!["rehab"]),
        athlete("Aiko Tanaka", "MF", "academy", 8.5, 9.0, 8.0, vec![7.8, 8.3, 8.6], false)
            .with("tags", vec!["u21"]),
        athlete("Rafael Costa", "FW", "rotation", 7.0, 6.5, 6.5, vec![6.1, 5.9, 6.0], false),
        // Fresh signing: no wellness data captured yet.
        RecordDraft::new()
            .with("name", "Noah Reyes")
            .with("position", "MF")
            .with("squad_role", "academy"),
    ]
}

#[must_use]
pub fn profile() -> DerivationProfile {
    DerivationProfile {
        scores: vec![ScoreRule {
            name: READINESS.to_string(),
            method: ScoreMethod::WeightedMean,
            components: vec![
                WeightedField::new("sleep_quality", 1.0),
                WeightedField::new("freshness", 1.5),
                WeightedField::new("mood", 1.0),
            ],
            tiers: TierScale::new(&[(4.5, "critical"), (6.5, "monitor")], "healthy"),
        }],
        counts: vec![
            CountRule {
                name: "critical".to_string(),
                predicate: RecordPredicate::TierIs {
                    score: READINESS.to_string(),
                    tier: "critical".to_string(),
                },
            },
            CountRule {
                name: "injured".to_string(),
                predicate: RecordPredicate::FlagSet { field: "injured".to_string() },
            },
            CountRule {
                name: "starters".to_string(),
                predicate: RecordPredicate::Equals {
                    field: "squad_role".to_string(),
                    value: FieldValue::from("starter"),
                },
            },
        ],
        group_by: vec!["position".to_string(), "squad_role".to_string()],
        averages: vec!["sleep_quality".to_string(), "freshness".to_string(), "mood".to_string()],
        trends: vec![TrendRule {
            name: "wellness".to_string(),
            field: "wellness_history".to_string(),
            min_delta: 0.5,
        }],
        radar: None,
    }
}

//! Compliance tracker. The weakest control decides an item's tier.

use scenario_kernel_core::{
    CountRule, DerivationProfile, EngineError, FieldSpec, RecordDraft, RecordPredicate, Schema,
    ScoreMethod, ScoreRule, TierScale, WeightedField,
};

pub const CONTROL_STRENGTH: &str = "control_strength";

/// # Errors
/// Returns [`EngineError::Validation`] if the declaration is inconsistent.
pub fn schema() -> Result<Schema, EngineError> {
    Schema::new(
        "compliance",
        vec![
            FieldSpec::text("item").required(),
            FieldSpec::category(
                "category",
                &["safeguarding", "medical", "financial", "governance", "facilities"],
            )
            .required(),
            FieldSpec::text("owner"),
            FieldSpec::bounded("documentation", 0.0, 100.0),
            FieldSpec::bounded("training", 0.0, 100.0),
            FieldSpec::bounded("audit", 0.0, 100.0),
            FieldSpec::flag("overdue"),
            FieldSpec::tags("tags"),
            FieldSpec::notes("evidence"),
            FieldSpec::text("risk_tier").derived(),
        ],
    )
}

fn item(
    item: &str,
    category: &str,
    owner: &str,
    controls: [f64; 3],
    overdue: bool,
) -> RecordDraft {
    let [documentation, training, audit] = controls;
    RecordDraft::new()
        .with("item", item)
        .with("category", category)
        .with("owner", owner)
        .with("documentation", documentation)
        .with("training", training)
        .with("audit", audit)
        .with("overdue", overdue)
}

#[must_use]
pub fn seed() -> Vec<RecordDraft> {
    vec![
        item(
            "DBS checks for academy coaches",
            "safeguarding",
            "Helen Ward",
            [95.0, 88.0, 90.0],
            false,
        ),
        item("Concussion protocol sign-off", "medical", "Dr. Amal Haddad", [80.0, 45.0, 70.0], true)
            .with("evidence", vec!["Two physios still to complete module 3"]),
        item("Player agent fee register", "financial", "Oscar Lund", [60.0, 75.0, 65.0], false),
        item(
            "Board conflict-of-interest returns",
            "governance",
            "Ruth Adeyemi",
            [100.0, 100.0, 98.0],
            false,
        ),
        item("Stadium safety certificate", "facilities", "Ben Carter", [85.0, 90.0, 30.0], true)
            .with("tags", vec!["licensing"]),
    ]
}

#[must_use]
pub fn profile() -> DerivationProfile {
    DerivationProfile {
        scores: vec![ScoreRule {
            name: CONTROL_STRENGTH.to_string(),
            method: ScoreMethod::Minimum,
            components: vec![
                WeightedField::new("documentation", 1.0),
                WeightedField::new("training", 1.0),
                WeightedField::new("audit", 1.0),
            ],
            tiers: TierScale::new(&[(50.0, "critical"), (75.0, "monitor")], "healthy"),
        }],
        counts: vec![
            CountRule {
                name: "overdue".to_string(),
                predicate: RecordPredicate::FlagSet { field: "overdue".to_string() },
            },
            CountRule {
                name: "critical".to_string(),
                predicate: RecordPredicate::TierIs {
                    score: CONTROL_STRENGTH.to_string(),
                    tier: "critical".to_string(),
                },
            },
        ],
        group_by: vec!["category".to_string()],
        averages: vec!["documentation".to_string(), "training".to_string(), "audit".to_string()],
        trends: Vec::new(),
        radar: None,
    }
}

//! Club KPI board.

use scenario_kernel_core::{
    CountRule, DerivationProfile, EngineError, FieldSpec, RecordDraft, RecordPredicate, Schema,
    ScoreMethod, ScoreRule, TierScale, TrendRule, WeightedField,
};

pub const PROGRESS: &str = "progress_score";

/// # Errors
/// Returns [`EngineError::Validation`] if the declaration is inconsistent.
pub fn schema() -> Result<Schema, EngineError> {
    Schema::new(
        "kpis",
        vec![
            FieldSpec::text("title").required(),
            FieldSpec::category(
                "department",
                &["performance", "medical", "commercial", "academy", "operations"],
            )
            .required(),
            FieldSpec::text("owner"),
            FieldSpec::bounded("progress", 0.0, 100.0),
            FieldSpec::category("due_quarter", &["Q1", "Q2", "Q3", "Q4"]),
            FieldSpec::series("progress_history"),
            FieldSpec::notes("comments"),
            FieldSpec::text("status").derived(),
        ],
    )
}

fn kpi(
    title: &str,
    department: &str,
    owner: &str,
    due_quarter: &str,
    progress_history: Vec<f64>,
) -> RecordDraft {
    let progress = progress_history.last().copied().unwrap_or(0.0);
    RecordDraft::new()
        .with("title", title)
        .with("department", department)
        .with("owner", owner)
        .with("due_quarter", due_quarter)
        .with("progress", progress)
        .with("progress_history", progress_history)
}

#[must_use]
pub fn seed() -> Vec<RecordDraft> {
    vec![
        kpi(
            "Reduce soft-tissue injuries",
            "medical",
            "Dr. Amal Haddad",
            "Q2",
            vec![40.0, 55.0, 68.0],
        ),
        kpi("Season ticket renewals", "commercial", "Priya Nair", "Q1", vec![70.0, 84.0, 91.0]),
        kpi(
            "Academy graduates to first team",
            "academy",
            "Stefan Ilic",
            "Q4",
            vec![20.0, 25.0, 25.0],
        ),
        kpi(
            "High-intensity running per match",
            "performance",
            "Claire Dubois",
            "Q3",
            vec![60.0, 58.0, 49.0],
        ),
        kpi("Matchday catering satisfaction", "operations", "Ben Carter", "Q2", vec![100.0])
            .with("comments", vec!["Target met after kiosk refit"]),
        kpi("Sponsorship pipeline value", "commercial", "Priya Nair", "Q3", vec![30.0, 45.0, 78.0]),
    ]
}

#[must_use]
pub fn profile() -> DerivationProfile {
    DerivationProfile {
        scores: vec![ScoreRule {
            name: PROGRESS.to_string(),
            method: ScoreMethod::WeightedMean,
            components: vec![WeightedField::new("progress", 1.0)],
            tiers: TierScale::new(&[(50.0, "off_track"), (80.0, "at_risk")], "on_track"),
        }],
        counts: vec![
            CountRule {
                name: "off_track".to_string(),
                predicate: RecordPredicate::TierIs {
                    score: PROGRESS.to_string(),
                    tier: "off_track".to_string(),
                },
            },
            CountRule {
                name: "completed".to_string(),
                predicate: RecordPredicate::AtLeast {
                    field: "progress".to_string(),
                    threshold: 100.0,
                },
            },
        ],
        group_by: vec!["department".to_string(), "due_quarter".to_string()],
        averages: vec!["progress".to_string()],
        trends: vec![TrendRule {
            name: "progress".to_string(),
            field: "progress_history".to_string(),
            min_delta: 2.0,
        }],
        radar: None,
    }
}

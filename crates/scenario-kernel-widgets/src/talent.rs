//! Talent pipeline widget: six-axis player profiles with radar geometry.

use scenario_kernel_core::{
    CountRule, DerivationProfile, EngineError, FieldSpec, FieldValue, Point, RadarRule,
    RecordDraft, RecordPredicate, Schema, ScoreMethod, ScoreRule, TierScale, TrendRule,
    WeightedField,
};

pub const RETENTION: &str = "retention";

/// Radar axes in drawing order. Axis 0 points along +x.
pub const AXES: [&str; 6] =
    ["physical", "technical", "tactical", "psychological", "contractual", "social"];

/// # Errors
/// Returns [`EngineError::Validation`] if the declaration is inconsistent.
pub fn schema() -> Result<Schema, EngineError> {
    let mut fields = vec![
        FieldSpec::text("name").required(),
        FieldSpec::category("stage", &["scouted", "trial", "academy", "first_team", "loan"])
            .required(),
        FieldSpec::bounded("age", 14.0, 40.0),
    ];
    fields.extend(AXES.iter().map(|axis| FieldSpec::bounded(axis, 0.0, 100.0)));
    fields.extend([
        FieldSpec::series("form_history"),
        FieldSpec::tags("tags"),
        FieldSpec::notes("scouting_notes"),
        FieldSpec::text("retention_tier").derived(),
    ]);
    Schema::new("talent", fields)
}

fn prospect(name: &str, stage: &str, age: f64, axes: [f64; 6]) -> RecordDraft {
    let base = RecordDraft::new().with("name", name).with("stage", stage).with("age", age);
    AXES.iter().zip(axes).fold(base, |draft, (axis, value)| draft.with(axis, value))
}

#[must_use]
pub fn seed() -> Vec<RecordDraft> {
    vec![
        prospect("Ada Mensah", "first_team", 24.0, [80.0, 85.0, 78.0, 70.0, 60.0, 75.0])
            .with("form_history", vec![70.0, 74.0, 78.0]),
        prospect("Luca Ferri", "loan", 20.0, [60.0, 55.0, 50.0, 40.0, 30.0, 65.0])
            .with("form_history", vec![65.0, 60.0, 52.0])
            .with(
                "scouting_notes",
                vec![FieldValue::from("Parent club wants him back in January")],
            ),
        prospect("Sami Kallio", "academy", 17.0, [55.0, 70.0, 60.0, 75.0, 80.0, 50.0])
            .with("form_history", vec![60.0, 61.0, 62.0])
            .with("tags", vec!["homegrown"]),
        prospect("Diego Ramos", "trial", 19.0, [40.0, 35.0, 30.0, 30.0, 20.0, 45.0])
            .with("form_history", vec![50.0]),
        prospect("Yara Haddad", "academy", 16.0, [65.0, 60.0, 55.0, 50.0, 45.0, 70.0])
            .with("form_history", vec![55.0, 58.0, 61.0])
            .with("tags", vec!["homegrown", "u17"]),
        prospect("Kofi Asante", "scouted", 18.0, [70.0, 65.0, 60.0, 55.0, 50.0, 60.0]),
    ]
}

#[must_use]
pub fn profile() -> DerivationProfile {
    DerivationProfile {
        scores: vec![ScoreRule {
            name: RETENTION.to_string(),
            method: ScoreMethod::WeightedMean,
            components: AXES
                .iter()
                .map(|axis| {
                    let weight =
                        if matches!(*axis, "contractual" | "psychological") { 1.5 } else { 1.0 };
                    WeightedField::new(axis, weight)
                })
                .collect(),
            tiers: TierScale::new(&[(40.0, "critical"), (65.0, "monitor")], "healthy"),
        }],
        counts: vec![
            CountRule {
                name: "critical".to_string(),
                predicate: RecordPredicate::TierIs {
                    score: RETENTION.to_string(),
                    tier: "critical".to_string(),
                },
            },
            CountRule {
                name: "academy".to_string(),
                predicate: RecordPredicate::Equals {
                    field: "stage".to_string(),
                    value: FieldValue::from("academy"),
                },
            },
        ],
        group_by: vec!["stage".to_string()],
        averages: AXES.iter().map(ToString::to_string).collect(),
        trends: vec![TrendRule {
            name: "form".to_string(),
            field: "form_history".to_string(),
            min_delta: 3.0,
        }],
        radar: Some(RadarRule {
            axes: AXES.iter().map(ToString::to_string).collect(),
            base: 10.0,
            scale: 0.9,
            center: Point { x: 120.0, y: 120.0 },
        }),
    }
}

#[cfg(test)]
mod tests {
    use scenario_kernel_core::{FieldPatch, Trend};

    use super::*;

    fn open() -> scenario_kernel_core::ScenarioEngine {
        match crate::Widget::Talent.open() {
            Ok(engine) => engine,
            Err(err) => panic!("talent should open: {err}"),
        }
    }

    #[test]
    fn contractual_and_psychological_axes_weigh_more() {
        let engine = open();
        let view = engine.derive();
        let ada = &view.records[0].scores[RETENTION];
        // (80 + 85 + 78 + 1.5·70 + 1.5·60 + 75) / 7
        assert!(ada.value.is_some_and(|value| (value - 513.0 / 7.0).abs() < 1e-9));
        assert_eq!(ada.tier, "healthy");

        let tiers = view
            .records
            .iter()
            .map(|insight| insight.scores[RETENTION].tier.as_str())
            .collect::<Vec<_>>();
        assert_eq!(tiers, vec!["healthy", "monitor", "healthy", "critical", "monitor", "monitor"]);
        assert_eq!(view.counts.get("critical"), Some(&1));
        assert_eq!(view.counts.get("academy"), Some(&2));
        assert_eq!(view.groups["stage"].get("academy"), Some(&2));
    }

    #[test]
    fn form_trend_uses_last_two_ratings() {
        let view = open().derive();
        let trends = view
            .records
            .iter()
            .map(|insight| insight.trends["form"])
            .collect::<Vec<_>>();
        assert_eq!(
            trends,
            vec![Trend::Up, Trend::Down, Trend::Steady, Trend::Unknown, Trend::Up, Trend::Unknown]
        );
    }

    #[test]
    fn radar_points_follow_axis_angles() {
        let view = open().derive();
        let Some(points) = view.records[0].radar.as_ref() else {
            panic!("talent view should carry radar geometry");
        };
        assert_eq!(points.len(), AXES.len());
        // physical = 80 at angle 0: radius 10 + 0.9·80 = 82
        assert!((points[0].x - 202.0).abs() < 1e-9);
        assert!((points[0].y - 120.0).abs() < 1e-9);
        // psychological = 70 at angle π: radius 73
        assert!((points[3].x - 47.0).abs() < 1e-9);
        assert!((points[3].y - 120.0).abs() < 1e-6);
    }

    #[test]
    fn contract_extension_lifts_a_loanee_out_of_monitor() {
        let mut engine = open();
        let id = engine.state().records()[1].id;
        let patch = FieldPatch::from([
            ("contractual".to_string(), Some(FieldValue::from(90))),
            ("psychological".to_string(), Some(FieldValue::from(85))),
        ]);
        assert!(engine.update(id, patch).is_ok());
        // (60 + 55 + 50 + 1.5·85 + 1.5·90 + 65) / 7 = 492.5 / 7 ≈ 70.4
        let view = engine.derive();
        assert_eq!(
            view.insight(id).map(|insight| insight.scores[RETENTION].tier.as_str()),
            Some("healthy")
        );

        engine.undo();
        let view = engine.derive();
        assert_eq!(
            view.insight(id).map(|insight| insight.scores[RETENTION].tier.as_str()),
            Some("monitor")
        );
    }
}

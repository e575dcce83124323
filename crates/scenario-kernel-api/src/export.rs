//! CSV export of the current view.
//!
//! Columns are the schema's stored fields in declaration order followed by a value and a tier
//! column per score rule. Lists are joined with `;`.

use std::borrow::Cow;

use scenario_kernel_core::ScenarioEngine;

#[must_use]
pub fn render_csv(engine: &ScenarioEngine) -> String {
    let fields = engine.schema().stored_field_names().collect::<Vec<_>>();
    let scores =
        engine.derivation().scores.iter().map(|rule| rule.name.as_str()).collect::<Vec<_>>();

    let mut header = fields.iter().map(|name| (*name).to_string()).collect::<Vec<_>>();
    for score in &scores {
        header.push((*score).to_string());
        header.push(format!("{score}_tier"));
    }

    let mut out = String::new();
    push_row(&mut out, &header);

    let state = engine.state();
    let view = engine.derive();
    for insight in &view.records {
        let Some(record) = state.get(insight.id) else {
            continue;
        };
        let mut row = fields
            .iter()
            .map(|name| record.field(name).map(ToString::to_string).unwrap_or_default())
            .collect::<Vec<_>>();
        for score in &scores {
            let outcome = insight.scores.get(*score);
            row.push(
                outcome
                    .and_then(|outcome| outcome.value)
                    .map(|value| format!("{value:.2}"))
                    .unwrap_or_default(),
            );
            row.push(outcome.map(|outcome| outcome.tier.clone()).unwrap_or_default());
        }
        push_row(&mut out, &row);
    }
    out
}

fn push_row(out: &mut String, cells: &[String]) {
    let line = cells.iter().map(|cell| quote(cell)).collect::<Vec<_>>().join(",");
    out.push_str(&line);
    out.push('\n');
}

fn quote(cell: &str) -> Cow<'_, str> {
    if cell.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", cell.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(cell)
    }
}

//! Leaf hex cell construction from scored tables.
//!
//! Joins the distinct (cell, context, target value) combinations in the
//! record set against the reliable rows of a score table, then groups
//! the surviving combinations per cell into the scored payload the
//! rollup and the map layers consume.

use std::collections::BTreeMap;

use anomaly_map_dataset_models::{Column, ObservationRecord};
use anomaly_map_stats::score::expected_by_context;
use anomaly_map_stats_models::{ContextKey, ScoreTable};

use crate::{AnomalyDetail, HexCell};

/// One distinct scored combination inside a cell, ordered so iteration
/// and tie-breaks are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Combination {
    lc_type: String,
    fips: String,
    context: ContextKey,
    target_value: String,
}

/// Builds leaf-resolution hex cells from a record set and its score
/// table.
///
/// Only reliable rows participate. Per cell: `count` is the number of
/// distinct scored combinations, the displayed land cover and county
/// come from the smallest combination key, and the anomaly detail comes
/// from the highest-surprisal combination (ties keep the smallest key).
/// The `expected_k` most expected values of the anomaly's context are
/// summarized into its `expected` string.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn leaf_cells(
    records: &[ObservationRecord],
    table: &ScoreTable,
    context_cols: &[Column],
    target: Column,
    expected_k: usize,
) -> Vec<HexCell> {
    // Reliable (context, target value) -> (surprisal, prob).
    let mut reliable: BTreeMap<(&ContextKey, &str), (f64, f64)> = BTreeMap::new();
    for row in table.rows.iter().filter(|row| row.reliable) {
        reliable.insert(
            (&row.context, row.target_value.as_str()),
            (row.surprisal, row.prob),
        );
    }

    let expected = expected_by_context(table, expected_k);

    // Distinct scored combinations per cell.
    let mut by_cell: BTreeMap<u64, Vec<Combination>> = BTreeMap::new();
    for record in records {
        let context = ContextKey(context_cols.iter().map(|col| record.value(*col)).collect());
        let target_value = record.value(target);
        if !reliable.contains_key(&(&context, target_value.as_str())) {
            continue;
        }
        let combos = by_cell.entry(record.h3).or_default();
        let combo = Combination {
            lc_type: record.lc_type.clone(),
            fips: record.fips.to_string(),
            context,
            target_value,
        };
        if !combos.contains(&combo) {
            combos.push(combo);
        }
    }

    let mut cells = Vec::with_capacity(by_cell.len());
    for (h3, mut combos) in by_cell {
        combos.sort();

        let mut max_surprisal = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut top: Option<(&Combination, f64, f64)> = None;
        for combo in &combos {
            let (surprisal, prob) = reliable[&(&combo.context, combo.target_value.as_str())];
            max_surprisal = max_surprisal.max(surprisal);
            sum += surprisal;
            // Strictly-greater keeps the smallest combination on ties.
            if top.is_none_or(|(_, best, _)| surprisal > best) {
                top = Some((combo, surprisal, prob));
            }
        }

        let anomaly = top.map(|(combo, _, prob)| AnomalyDetail {
            value: combo.target_value.clone(),
            prob,
            context: combo.context.display(context_cols),
            expected: expected
                .get(&combo.context)
                .map(|values| format_expected(values)),
        });

        cells.push(HexCell {
            h3,
            count: combos.len() as u64,
            lc_type: combos.first().map(|combo| combo.lc_type.clone()),
            fips: combos.first().map(|combo| combo.fips.clone()),
            max_surprisal: Some(max_surprisal),
            mean_surprisal: Some(sum / combos.len() as f64),
            anomaly,
        });
    }

    cells
}

/// Formats the expected-value summary, e.g. `"Red (72%), Blue (18%)"`.
fn format_expected(values: &[(String, f64)]) -> String {
    let parts: Vec<String> = values
        .iter()
        .map(|(value, prob)| format!("{value} ({:.0}%)", prob * 100.0))
        .collect();
    parts.join(", ")
}

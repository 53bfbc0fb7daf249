//! Surprisal scoring: shrunk probabilities with a reliability gate.
//!
//! Blends each context's observed frequency toward the global prior
//! with pseudo-count weight α, then scores unexpectedness as
//! `-ln(prob)`. Rows whose context or target value is missing from the
//! companion tables are dropped (inner-join semantics).

use std::collections::BTreeMap;

use anomaly_map_stats_models::{
    ContextKey, CountySummary, ProbabilityRow, ScoreTable, SufficientStats,
};

/// Scores every (context, target value) cell of a sufficient-statistics
/// table.
///
/// For α > 0 and 0 ≤ count ≤ `context_total` the shrunk probability is
/// strictly inside (0, 1), so the surprisal is always finite.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score(stats: &SufficientStats, alpha: f64, min_support: u64) -> ScoreTable {
    let mut rows = Vec::with_capacity(stats.counts.len());

    for (key, &count) in &stats.counts {
        let Some(&context_total) = stats.context_totals.get(&key.context) else {
            continue;
        };
        let Some(&p_global) = stats.global_prior.get(&key.target_value) else {
            continue;
        };

        let prob = (count as f64 + alpha * p_global) / (context_total as f64 + alpha);
        rows.push(ProbabilityRow {
            context: key.context.clone(),
            target_value: key.target_value.clone(),
            count,
            context_total,
            p_global,
            prob,
            surprisal: -prob.ln(),
            reliable: context_total >= min_support,
        });
    }

    ScoreTable {
        alpha,
        min_support,
        rows,
    }
}

/// Sorts rows most-anomalous-first: descending surprisal, ties broken
/// by target value then context, ascending.
pub fn sort_most_anomalous_first(rows: &mut [ProbabilityRow]) {
    rows.sort_by(|a, b| {
        b.surprisal
            .total_cmp(&a.surprisal)
            .then_with(|| a.target_value.cmp(&b.target_value))
            .then_with(|| a.context.cmp(&b.context))
    });
}

/// Returns, per context, the `k` most expected target values among
/// reliable rows: ascending surprisal, ties broken by target value.
#[must_use]
pub fn expected_by_context(table: &ScoreTable, k: usize) -> BTreeMap<ContextKey, Vec<(String, f64)>> {
    let mut by_context: BTreeMap<ContextKey, Vec<&ProbabilityRow>> = BTreeMap::new();
    for row in table.rows.iter().filter(|row| row.reliable) {
        by_context.entry(row.context.clone()).or_default().push(row);
    }

    by_context
        .into_iter()
        .map(|(context, mut rows)| {
            rows.sort_by(|a, b| {
                a.surprisal
                    .total_cmp(&b.surprisal)
                    .then_with(|| a.target_value.cmp(&b.target_value))
            });
            let top = rows
                .into_iter()
                .take(k)
                .map(|row| (row.target_value.clone(), row.prob))
                .collect();
            (context, top)
        })
        .collect()
}

/// Summarizes reliable rows per county.
///
/// `fips_index` is the position of the FIPS column within the context
/// key. The top anomaly is the reliable row with the highest surprisal;
/// ties keep the row with the smaller (context, target value) key.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn county_summaries(table: &ScoreTable, fips_index: usize) -> BTreeMap<String, CountySummary> {
    struct Accumulator {
        max: f64,
        sum: f64,
        rows: u64,
        total_rows: u64,
        top_value: String,
        top_surprisal: f64,
    }

    let mut by_county: BTreeMap<String, Accumulator> = BTreeMap::new();

    for row in table.rows.iter().filter(|row| row.reliable) {
        let Some(fips) = row.context.0.get(fips_index) else {
            continue;
        };
        let entry = by_county
            .entry(fips.clone())
            .or_insert_with(|| Accumulator {
                max: f64::NEG_INFINITY,
                sum: 0.0,
                rows: 0,
                total_rows: 0,
                top_value: String::new(),
                top_surprisal: f64::NEG_INFINITY,
            });

        entry.max = entry.max.max(row.surprisal);
        entry.sum += row.surprisal;
        entry.rows += 1;
        entry.total_rows += row.context_total;
        // Strictly-greater keeps the first (smallest-keyed) row on ties.
        if row.surprisal > entry.top_surprisal {
            entry.top_surprisal = row.surprisal;
            entry.top_value = row.target_value.clone();
        }
    }

    by_county
        .into_iter()
        .map(|(fips, acc)| {
            (
                fips,
                CountySummary {
                    max_surprisal: acc.max,
                    mean_surprisal: acc.sum / acc.rows as f64,
                    total_rows: acc.total_rows,
                    top_anomaly_value: acc.top_value,
                    top_anomaly_surprisal: acc.top_surprisal,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anomaly_map_dataset_models::Column;
    use anomaly_map_stats_models::CountKey;
    use std::collections::BTreeMap;

    fn stats() -> SufficientStats {
        let forest = ContextKey(vec!["Forest".to_string()]);
        let mut counts = BTreeMap::new();
        counts.insert(
            CountKey {
                context: forest.clone(),
                target_value: "Red".to_string(),
            },
            40,
        );
        counts.insert(
            CountKey {
                context: forest.clone(),
                target_value: "Blue".to_string(),
            },
            10,
        );
        let mut context_totals = BTreeMap::new();
        context_totals.insert(forest, 50);
        let mut global_prior = BTreeMap::new();
        global_prior.insert("Red".to_string(), 0.3);
        global_prior.insert("Blue".to_string(), 0.7);

        SufficientStats {
            context_cols: vec![Column::LcType],
            target: Column::Color,
            counts,
            context_totals,
            global_prior,
        }
    }

    #[test]
    fn worked_example() {
        // prob(Forest, Red) = (40 + 10 * 0.3) / (50 + 10) = 43 / 60.
        let table = score(&stats(), 10.0, 30);
        let red = table
            .rows
            .iter()
            .find(|row| row.target_value == "Red")
            .unwrap();
        assert!((red.prob - 43.0 / 60.0).abs() < 1e-12);
        assert!((red.surprisal - 0.333).abs() < 1e-3);
        assert!(red.reliable);
    }

    #[test]
    fn probabilities_stay_strictly_inside_unit_interval() {
        let table = score(&stats(), 10.0, 30);
        for row in &table.rows {
            assert!(row.prob > 0.0 && row.prob < 1.0);
            assert!(row.surprisal >= 0.0);
            assert!((row.surprisal - (-row.prob.ln())).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn surprisal_strictly_decreases_as_probability_increases() {
        let table = score(&stats(), 10.0, 30);
        let mut rows = table.rows.clone();
        rows.sort_by(|a, b| a.prob.total_cmp(&b.prob));
        for pair in rows.windows(2) {
            assert!(pair[0].prob < pair[1].prob);
            assert!(pair[0].surprisal > pair[1].surprisal);
        }
    }

    #[test]
    fn reliability_boundary_is_inclusive() {
        let at_boundary = score(&stats(), 10.0, 50);
        assert!(at_boundary.rows.iter().all(|row| row.reliable));
        let above_boundary = score(&stats(), 10.0, 51);
        assert!(above_boundary.rows.iter().all(|row| !row.reliable));
    }

    #[test]
    fn unmatched_prior_rows_are_dropped() {
        let mut stats = stats();
        stats.global_prior.remove("Blue");
        let table = score(&stats, 10.0, 30);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].target_value, "Red");
    }

    #[test]
    fn anomalous_sort_is_descending_with_stable_ties() {
        let mut table = score(&stats(), 10.0, 30);
        sort_most_anomalous_first(&mut table.rows);
        for pair in table.rows.windows(2) {
            assert!(pair[0].surprisal >= pair[1].surprisal);
        }
        // Blue (10/50 vs prior 0.7) is the anomaly here.
        assert_eq!(table.rows[0].target_value, "Blue");
    }

    #[test]
    fn expected_values_rank_by_probability() {
        let table = score(&stats(), 10.0, 30);
        let expected = expected_by_context(&table, 3);
        let forest = &expected[&ContextKey(vec!["Forest".to_string()])];
        assert_eq!(forest[0].0, "Red");
        assert_eq!(forest.len(), 2);
    }

    #[test]
    fn county_summary_aggregates_reliable_rows() {
        let county_a = ContextKey(vec!["06001".to_string(), "Forest".to_string()]);
        let county_b = ContextKey(vec!["06075".to_string(), "Urban".to_string()]);
        let mut counts = BTreeMap::new();
        counts.insert(
            CountKey {
                context: county_a.clone(),
                target_value: "Red".to_string(),
            },
            40,
        );
        counts.insert(
            CountKey {
                context: county_a.clone(),
                target_value: "Blue".to_string(),
            },
            10,
        );
        counts.insert(
            CountKey {
                context: county_b.clone(),
                target_value: "Blue".to_string(),
            },
            20,
        );
        let mut context_totals = BTreeMap::new();
        context_totals.insert(county_a, 50);
        context_totals.insert(county_b, 20);
        let mut global_prior = BTreeMap::new();
        global_prior.insert("Red".to_string(), 0.5);
        global_prior.insert("Blue".to_string(), 0.5);
        let stats = SufficientStats {
            context_cols: vec![Column::Fips, Column::LcType],
            target: Column::Color,
            counts,
            context_totals,
            global_prior,
        };

        let table = score(&stats, 10.0, 30);
        let summaries = county_summaries(&table, 0);

        // The 20-observation county fails the support gate entirely.
        assert_eq!(summaries.len(), 1);
        let summary = &summaries["06001"];
        assert_eq!(summary.total_rows, 100);
        assert_eq!(summary.top_anomaly_value, "Blue");
        assert!(summary.max_surprisal >= summary.mean_surprisal);
    }
}

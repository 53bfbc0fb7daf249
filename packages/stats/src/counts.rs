//! Count aggregation: raw observations into sufficient statistics.
//!
//! Groups the record set into per-(context, target) counts, per-context
//! totals, and the global target prior. Grouping is exhaustive over
//! every combination present in the data.

use std::collections::BTreeMap;
use std::str::FromStr as _;

use anomaly_map_dataset_models::{Column, ObservationRecord};
use anomaly_map_stats_models::{ContextKey, CountKey, SufficientStats};

use crate::StatsError;

/// Parses request column names against the registered set.
///
/// # Errors
///
/// Returns [`StatsError::InvalidColumn`] for any name outside the set.
pub fn resolve_columns(names: &[String]) -> Result<Vec<Column>, StatsError> {
    names
        .iter()
        .map(|name| {
            Column::from_str(name).map_err(|_| StatsError::InvalidColumn { name: name.clone() })
        })
        .collect()
}

/// Aggregates records into sufficient statistics, with the global prior
/// computed over the same records.
///
/// # Errors
///
/// Returns [`StatsError::InvalidRequest`] if no context column is given
/// or the target is also a context column, and [`StatsError::NoData`]
/// if the record set is empty.
pub fn aggregate<'a, I>(
    records: I,
    context_cols: &[Column],
    target: Column,
) -> Result<SufficientStats, StatsError>
where
    I: IntoIterator<Item = &'a ObservationRecord>,
{
    validate(context_cols, target)?;

    let mut counts: BTreeMap<CountKey, u64> = BTreeMap::new();
    let mut context_totals: BTreeMap<ContextKey, u64> = BTreeMap::new();
    let mut target_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut total: u64 = 0;

    for record in records {
        let context = context_key(record, context_cols);
        let target_value = record.value(target);

        *counts
            .entry(CountKey {
                context: context.clone(),
                target_value: target_value.clone(),
            })
            .or_insert(0) += 1;
        *context_totals.entry(context).or_insert(0) += 1;
        *target_counts.entry(target_value).or_insert(0) += 1;
        total += 1;
    }

    if total == 0 {
        return Err(StatsError::NoData {
            message: "record set is empty".to_string(),
        });
    }

    Ok(SufficientStats {
        context_cols: context_cols.to_vec(),
        target,
        counts,
        context_totals,
        global_prior: prior_from(&target_counts, total),
    })
}

/// Aggregates a scoped record subset while taking the global prior from
/// a different (typically wider) population.
///
/// Used for single-county detail, where counts come from the county but
/// the prior stays dataset-wide.
///
/// # Errors
///
/// Same conditions as [`aggregate`]; `NoData` if either population is
/// empty.
pub fn aggregate_with_prior<'a, 'b, I, P>(
    records: I,
    prior_source: P,
    context_cols: &[Column],
    target: Column,
) -> Result<SufficientStats, StatsError>
where
    I: IntoIterator<Item = &'a ObservationRecord>,
    P: IntoIterator<Item = &'b ObservationRecord>,
{
    validate(context_cols, target)?;

    let mut counts: BTreeMap<CountKey, u64> = BTreeMap::new();
    let mut context_totals: BTreeMap<ContextKey, u64> = BTreeMap::new();
    let mut scoped_total: u64 = 0;

    for record in records {
        let context = context_key(record, context_cols);
        *counts
            .entry(CountKey {
                context: context.clone(),
                target_value: record.value(target),
            })
            .or_insert(0) += 1;
        *context_totals.entry(context).or_insert(0) += 1;
        scoped_total += 1;
    }

    if scoped_total == 0 {
        return Err(StatsError::NoData {
            message: "scoped record set is empty".to_string(),
        });
    }

    let mut target_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut prior_total: u64 = 0;
    for record in prior_source {
        *target_counts.entry(record.value(target)).or_insert(0) += 1;
        prior_total += 1;
    }

    if prior_total == 0 {
        return Err(StatsError::NoData {
            message: "prior population is empty".to_string(),
        });
    }

    Ok(SufficientStats {
        context_cols: context_cols.to_vec(),
        target,
        counts,
        context_totals,
        global_prior: prior_from(&target_counts, prior_total),
    })
}

fn validate(context_cols: &[Column], target: Column) -> Result<(), StatsError> {
    if context_cols.is_empty() {
        return Err(StatsError::InvalidRequest {
            message: "at least one context column is required".to_string(),
        });
    }
    if context_cols.contains(&target) {
        return Err(StatsError::InvalidRequest {
            message: format!("target column '{target}' cannot also be a context column"),
        });
    }
    Ok(())
}

fn context_key(record: &ObservationRecord, context_cols: &[Column]) -> ContextKey {
    ContextKey(context_cols.iter().map(|col| record.value(*col)).collect())
}

#[allow(clippy::cast_precision_loss)]
fn prior_from(target_counts: &BTreeMap<String, u64>, total: u64) -> BTreeMap<String, f64> {
    target_counts
        .iter()
        .map(|(value, count)| (value.clone(), *count as f64 / total as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anomaly_map_geography_models::CountyFips;

    fn record(fips: u32, lc: &str, color: &str) -> ObservationRecord {
        ObservationRecord {
            h3: 0x0895_3082_813f_ffff,
            fips: CountyFips::new(fips),
            lc_type: lc.to_string(),
            bldg_type: "Wood".to_string(),
            occupancy: "RES".to_string(),
            color: color.to_string(),
        }
    }

    fn sample() -> Vec<ObservationRecord> {
        let mut records = Vec::new();
        for _ in 0..40 {
            records.push(record(6001, "Forest", "Red"));
        }
        for _ in 0..10 {
            records.push(record(6001, "Forest", "Blue"));
        }
        for _ in 0..50 {
            records.push(record(6075, "Urban", "Blue"));
        }
        records
    }

    #[test]
    fn totals_equal_sum_of_counts_per_context() {
        let records = sample();
        let stats = aggregate(&records, &[Column::LcType], Column::Color).unwrap();

        for (context, total) in &stats.context_totals {
            let sum: u64 = stats
                .counts
                .iter()
                .filter(|(key, _)| &key.context == context)
                .map(|(_, count)| *count)
                .sum();
            assert_eq!(sum, *total);
        }
    }

    #[test]
    fn prior_sums_to_one() {
        let records = sample();
        let stats = aggregate(&records, &[Column::LcType], Column::Color).unwrap();
        let sum: f64 = stats.global_prior.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn expected_counts() {
        let records = sample();
        let stats = aggregate(&records, &[Column::LcType], Column::Color).unwrap();

        let forest_red = CountKey {
            context: ContextKey(vec!["Forest".to_string()]),
            target_value: "Red".to_string(),
        };
        assert_eq!(stats.counts[&forest_red], 40);
        assert_eq!(
            stats.context_totals[&ContextKey(vec!["Forest".to_string()])],
            50
        );
        assert!((stats.global_prior["Blue"] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn rejects_empty_context() {
        let records = sample();
        let result = aggregate(&records, &[], Column::Color);
        assert!(matches!(result, Err(StatsError::InvalidRequest { .. })));
    }

    #[test]
    fn rejects_target_in_context() {
        let records = sample();
        let result = aggregate(&records, &[Column::Color], Column::Color);
        assert!(matches!(result, Err(StatsError::InvalidRequest { .. })));
    }

    #[test]
    fn rejects_unknown_column_name() {
        let names = vec!["lc_type".to_string(), "geometry".to_string()];
        let result = resolve_columns(&names);
        assert!(matches!(
            result,
            Err(StatsError::InvalidColumn { name }) if name == "geometry"
        ));
    }

    #[test]
    fn empty_records_is_no_data() {
        let result = aggregate(&[], &[Column::LcType], Column::Color);
        assert!(matches!(result, Err(StatsError::NoData { .. })));
    }

    #[test]
    fn scoped_prior_comes_from_wider_population() {
        let records = sample();
        let county: Vec<&ObservationRecord> = records
            .iter()
            .filter(|r| r.fips == CountyFips::new(6001))
            .collect();
        let stats =
            aggregate_with_prior(county, &records, &[Column::LcType], Column::Color).unwrap();

        // Counts are county-scoped, the prior is dataset-wide.
        assert_eq!(
            stats.context_totals[&ContextKey(vec!["Forest".to_string()])],
            50
        );
        assert!((stats.global_prior["Blue"] - 0.6).abs() < 1e-12);
    }
}

//! Jensen-Shannon divergence between categorical distributions.
//!
//! Distributions are Laplace-smoothed over the union of categories
//! observed in either population, so divergence is always finite. The
//! natural logarithm is used throughout (matching surprisal), which
//! bounds the divergence by ln 2.

use std::collections::{BTreeMap, BTreeSet};

use anomaly_map_dataset_models::{Column, ObservationRecord};
use anomaly_map_geography_models::{CountyFips, CountyPair};
use anomaly_map_stats_models::{
    DistributionEntry, FeatureComparison, FeatureDistribution, MergeGroup, MergedComparison,
    PairDivergence, StratifiedDivergence,
};

use crate::StatsError;

/// Pseudo-count added to every union category before normalizing.
pub const LAPLACE_PSEUDOCOUNT: f64 = 1.0;

/// Upper bound of the Jensen-Shannon divergence under the natural log.
pub const JSD_MAX: f64 = std::f64::consts::LN_2;

/// Counts category occurrences of one column over a record set.
#[must_use]
pub fn category_counts<'a, I>(records: I, column: Column) -> BTreeMap<String, u64>
where
    I: IntoIterator<Item = &'a ObservationRecord>,
{
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.value(column)).or_insert(0) += 1;
    }
    counts
}

/// Applies category-merge groups to a count table.
///
/// Labels listed in a group are re-counted under the group name;
/// unmapped labels pass through unchanged.
#[must_use]
pub fn apply_merge_groups(
    counts: &BTreeMap<String, u64>,
    groups: &[MergeGroup],
) -> BTreeMap<String, u64> {
    let mapping: BTreeMap<&str, &str> = groups
        .iter()
        .flat_map(|group| {
            group
                .members
                .iter()
                .map(move |member| (member.as_str(), group.name.as_str()))
        })
        .collect();

    let mut merged: BTreeMap<String, u64> = BTreeMap::new();
    for (label, count) in counts {
        let key = mapping
            .get(label.as_str())
            .map_or_else(|| label.clone(), |group| (*group).to_string());
        *merged.entry(key).or_insert(0) += count;
    }
    merged
}

/// Jensen-Shannon divergence between two count tables after Laplace
/// smoothing over the category union.
///
/// Symmetric, and zero for identical inputs. Returns 0 when both tables
/// are empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn jensen_shannon(a: &BTreeMap<String, u64>, b: &BTreeMap<String, u64>) -> f64 {
    let union: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    if union.is_empty() {
        return 0.0;
    }

    let smoothed = |counts: &BTreeMap<String, u64>| -> Vec<f64> {
        let raw: Vec<f64> = union
            .iter()
            .map(|value| counts.get(*value).copied().unwrap_or(0) as f64 + LAPLACE_PSEUDOCOUNT)
            .collect();
        let sum: f64 = raw.iter().sum();
        raw.into_iter().map(|count| count / sum).collect()
    };

    let p = smoothed(a);
    let q = smoothed(b);

    let mut divergence = 0.0;
    for (pi, qi) in p.iter().zip(&q) {
        let mi = f64::midpoint(*pi, *qi);
        divergence += 0.5 * pi * (pi / mi).ln();
        divergence += 0.5 * qi * (qi / mi).ln();
    }
    // Floating-point noise can land a hair below zero for identical
    // inputs.
    divergence.max(0.0)
}

/// Builds side-by-side distributions of one feature for two
/// populations.
///
/// Entries cover the category union, sorted by combined count
/// descending with ties broken by label; `unique` flags categories
/// absent from the other population, `is_group` flags merge-group
/// names.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn feature_distribution(
    counts_a: &BTreeMap<String, u64>,
    counts_b: &BTreeMap<String, u64>,
    total_a: u64,
    total_b: u64,
    group_names: &BTreeSet<String>,
) -> (FeatureDistribution, FeatureDistribution) {
    let union: BTreeSet<&String> = counts_a.keys().chain(counts_b.keys()).collect();

    let mut ordered: Vec<&String> = union.into_iter().collect();
    ordered.sort_by(|x, y| {
        let combined =
            |value: &String| counts_a.get(value).unwrap_or(&0) + counts_b.get(value).unwrap_or(&0);
        combined(y).cmp(&combined(x)).then_with(|| x.cmp(y))
    });

    let build = |own: &BTreeMap<String, u64>,
                 other: &BTreeMap<String, u64>,
                 total: u64|
     -> FeatureDistribution {
        let entries = ordered
            .iter()
            .map(|value| {
                let count = own.get(*value).copied().unwrap_or(0);
                DistributionEntry {
                    value: (*value).clone(),
                    count,
                    proportion: if total == 0 {
                        0.0
                    } else {
                        count as f64 / total as f64
                    },
                    unique: own.contains_key(*value) && !other.contains_key(*value),
                    is_group: group_names.contains(*value),
                }
            })
            .collect();
        FeatureDistribution {
            entries,
            vocab_size: own.len(),
        }
    };

    (
        build(counts_a, counts_b, total_a),
        build(counts_b, counts_a, total_b),
    )
}

/// Compares one categorical feature between two populations.
///
/// Reports both distributions and the Jensen-Shannon divergence; when
/// merge groups are supplied the merged recomputation is included with
/// the numeric and percentage difference, separating label
/// fragmentation from substantive divergence.
///
/// # Errors
///
/// Returns [`StatsError::NoData`] if either population is empty.
#[allow(clippy::cast_possible_truncation)]
pub fn compare_feature(
    population_a: &[&ObservationRecord],
    population_b: &[&ObservationRecord],
    feature: Column,
    merge_groups: &[MergeGroup],
) -> Result<FeatureComparison, StatsError> {
    if population_a.is_empty() || population_b.is_empty() {
        return Err(StatsError::NoData {
            message: "one or both filtered populations are empty".to_string(),
        });
    }

    let counts_a = category_counts(population_a.iter().copied(), feature);
    let counts_b = category_counts(population_b.iter().copied(), feature);
    let total_a = population_a.len() as u64;
    let total_b = population_b.len() as u64;

    let (distribution_a, distribution_b) =
        feature_distribution(&counts_a, &counts_b, total_a, total_b, &BTreeSet::new());
    let jsd = jensen_shannon(&counts_a, &counts_b);

    let merged = if merge_groups.is_empty() {
        None
    } else {
        let merged_a = apply_merge_groups(&counts_a, merge_groups);
        let merged_b = apply_merge_groups(&counts_b, merge_groups);
        let group_names: BTreeSet<String> =
            merge_groups.iter().map(|group| group.name.clone()).collect();
        let (distribution_a, distribution_b) =
            feature_distribution(&merged_a, &merged_b, total_a, total_b, &group_names);
        let merged_jsd = jensen_shannon(&merged_a, &merged_b);
        let reduction = jsd - merged_jsd;
        Some(MergedComparison {
            distribution_a,
            distribution_b,
            jsd: merged_jsd,
            reduction,
            reduction_pct: if jsd > 0.0 {
                reduction / jsd * 100.0
            } else {
                0.0
            },
        })
    };

    Ok(FeatureComparison {
        distribution_a,
        distribution_b,
        jsd,
        merged,
    })
}

/// Computes support-weighted divergence for every adjacent county pair.
///
/// Records are grouped once by (county, stratum, feature value). For
/// each pair, a stratum qualifies when both counties have at least
/// `min_support` observations in it; qualifying strata contribute their
/// divergence with weight `min(support_a, support_b)`. Pairs with no
/// qualifying stratum are omitted from the result.
#[must_use]
pub fn neighbor_divergence<'a, I>(
    records: I,
    pairs: &[CountyPair],
    stratum_col: Column,
    feature: Column,
    min_support: u64,
    merge_groups: &[MergeGroup],
) -> Vec<PairDivergence>
where
    I: IntoIterator<Item = &'a ObservationRecord>,
{
    type StratumCounts = BTreeMap<String, BTreeMap<String, u64>>;

    let mut by_county: BTreeMap<CountyFips, StratumCounts> = BTreeMap::new();
    for record in records {
        *by_county
            .entry(record.fips)
            .or_default()
            .entry(record.value(stratum_col))
            .or_default()
            .entry(record.value(feature))
            .or_insert(0) += 1;
    }

    let support = |counts: &BTreeMap<String, u64>| -> u64 { counts.values().sum() };

    let mut results = Vec::new();
    for pair in pairs {
        let (Some(strata_a), Some(strata_b)) =
            (by_county.get(&pair.fips_a), by_county.get(&pair.fips_b))
        else {
            continue;
        };

        let mut weighted_sum = 0.0;
        let mut jsd_sum = 0.0;
        let mut total_weight: u64 = 0;
        let mut shared_strata: usize = 0;

        for (stratum, counts_a) in strata_a {
            let Some(counts_b) = strata_b.get(stratum) else {
                continue;
            };
            let support_a = support(counts_a);
            let support_b = support(counts_b);
            if support_a < min_support || support_b < min_support {
                continue;
            }

            let jsd = if merge_groups.is_empty() {
                jensen_shannon(counts_a, counts_b)
            } else {
                jensen_shannon(
                    &apply_merge_groups(counts_a, merge_groups),
                    &apply_merge_groups(counts_b, merge_groups),
                )
            };

            let weight = support_a.min(support_b);
            #[allow(clippy::cast_precision_loss)]
            {
                weighted_sum += jsd * weight as f64;
            }
            jsd_sum += jsd;
            total_weight += weight;
            shared_strata += 1;
        }

        if shared_strata == 0 {
            continue;
        }

        #[allow(clippy::cast_precision_loss)]
        results.push(PairDivergence {
            pair: *pair,
            divergence: StratifiedDivergence {
                weighted_jsd: weighted_sum / total_weight as f64,
                mean_jsd: jsd_sum / shared_strata as f64,
                shared_strata,
                total_support: total_weight,
            },
        });
    }

    results
}

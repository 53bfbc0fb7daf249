#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Sufficient-statistic tables and scored/divergence result types.
//!
//! All tables are `BTreeMap`-backed so iteration order is the key order,
//! making every downstream aggregate reproducible bit-for-bit for the
//! same input data.

use std::collections::BTreeMap;

use anomaly_map_dataset_models::Column;
use anomaly_map_geography_models::CountyPair;
use serde::{Deserialize, Serialize};

/// An ordered tuple of context column values defining a conditioning
/// group. Value order matches the request's context column order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ContextKey(pub Vec<String>);

impl ContextKey {
    /// Joins the non-FIPS context values into a display string.
    #[must_use]
    pub fn display(&self, context_cols: &[Column]) -> String {
        let parts: Vec<&str> = context_cols
            .iter()
            .zip(&self.0)
            .filter(|(col, _)| **col != Column::Fips)
            .map(|(_, value)| value.as_str())
            .collect();
        parts.join(", ")
    }
}

/// Key of one count cell: a context plus one target value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CountKey {
    /// The conditioning context.
    pub context: ContextKey,
    /// The target column value being counted.
    pub target_value: String,
}

/// Sufficient statistics for one (context columns, target) request:
/// per-cell counts, per-context totals, and the global target prior.
#[derive(Debug, Clone)]
pub struct SufficientStats {
    /// The context columns, in request order.
    pub context_cols: Vec<Column>,
    /// The target column.
    pub target: Column,
    /// (context, target value) -> observation count.
    pub counts: BTreeMap<CountKey, u64>,
    /// context -> total observations in that context.
    pub context_totals: BTreeMap<ContextKey, u64>,
    /// target value -> proportion over the prior source population.
    pub global_prior: BTreeMap<String, f64>,
}

/// One scored (context, target value) cell.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilityRow {
    /// The conditioning context values, in request column order.
    pub context: ContextKey,
    /// The target value.
    pub target_value: String,
    /// Observations of this value in this context.
    pub count: u64,
    /// Total observations in this context.
    pub context_total: u64,
    /// Global prior proportion of this value.
    pub p_global: f64,
    /// Shrunk probability estimate, strictly inside (0, 1).
    pub prob: f64,
    /// `-ln(prob)`; higher means more unexpected.
    pub surprisal: f64,
    /// Whether the context has enough support to trust the estimate.
    pub reliable: bool,
}

/// A scored table plus the shrinkage strength it was computed with.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreTable {
    /// Empirical-Bayes pseudo-count strength.
    pub alpha: f64,
    /// Minimum context support for the reliability gate (inclusive).
    pub min_support: u64,
    /// Scored rows.
    pub rows: Vec<ProbabilityRow>,
}

/// Per-county summary over the reliable rows of a score table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountySummary {
    /// Highest surprisal among reliable rows.
    pub max_surprisal: f64,
    /// Mean surprisal among reliable rows.
    pub mean_surprisal: f64,
    /// Sum of context totals over reliable rows.
    pub total_rows: u64,
    /// Target value of the most surprising reliable row.
    pub top_anomaly_value: String,
    /// Surprisal of that row.
    pub top_anomaly_surprisal: f64,
}

/// A named group of category labels merged into one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeGroup {
    /// The merged label.
    pub name: String,
    /// The raw labels mapped onto it.
    pub members: Vec<String>,
}

/// One category's share of a population, for side-by-side display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionEntry {
    /// Category label (possibly a merge-group name).
    pub value: String,
    /// Raw observation count.
    pub count: u64,
    /// Proportion of the population total.
    pub proportion: f64,
    /// Whether the category appears only in this population.
    pub unique: bool,
    /// Whether the label is a merge-group name.
    pub is_group: bool,
}

/// A population's distribution over one categorical feature.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDistribution {
    /// Entries sorted by combined (both-population) count, descending.
    pub entries: Vec<DistributionEntry>,
    /// Number of distinct categories observed in this population.
    pub vocab_size: usize,
}

/// Divergence between two populations on one feature, with the optional
/// merged recomputation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureComparison {
    /// Distribution of population A.
    pub distribution_a: FeatureDistribution,
    /// Distribution of population B.
    pub distribution_b: FeatureDistribution,
    /// Jensen-Shannon divergence (natural log, bounded by ln 2).
    pub jsd: f64,
    /// Recomputation after applying merge groups, when requested.
    pub merged: Option<MergedComparison>,
}

/// The merged-category recomputation of a feature comparison.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedComparison {
    /// Merged distribution of population A.
    pub distribution_a: FeatureDistribution,
    /// Merged distribution of population B.
    pub distribution_b: FeatureDistribution,
    /// Divergence after merging.
    pub jsd: f64,
    /// `original - merged`; positive when merging reduced divergence.
    pub reduction: f64,
    /// Reduction as a percentage of the original divergence.
    pub reduction_pct: f64,
}

/// Support-weighted divergence aggregate across qualifying strata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StratifiedDivergence {
    /// Support-weighted mean divergence (weight = min of the two
    /// populations' support per stratum).
    pub weighted_jsd: f64,
    /// Unweighted mean divergence across qualifying strata.
    pub mean_jsd: f64,
    /// Number of strata where both populations met the support floor.
    pub shared_strata: usize,
    /// Sum of per-stratum weights.
    pub total_support: u64,
}

/// Divergence between one pair of adjacent counties.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairDivergence {
    /// The county pair.
    #[serde(flatten)]
    pub pair: CountyPair,
    /// The stratified divergence aggregate.
    #[serde(flatten)]
    pub divergence: StratifiedDivergence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_key_orders_lexicographically() {
        let a = ContextKey(vec!["Forest".to_string(), "RES".to_string()]);
        let b = ContextKey(vec!["Urban".to_string(), "COM".to_string()]);
        assert!(a < b);
    }

    #[test]
    fn context_display_skips_fips() {
        let cols = [Column::Fips, Column::LcType];
        let key = ContextKey(vec!["06001".to_string(), "Forest".to_string()]);
        assert_eq!(key.display(&cols), "Forest");
    }

    #[test]
    fn count_key_orders_by_context_then_value() {
        let ctx = ContextKey(vec!["Forest".to_string()]);
        let blue = CountKey {
            context: ctx.clone(),
            target_value: "Blue".to_string(),
        };
        let red = CountKey {
            context: ctx,
            target_value: "Red".to_string(),
        };
        assert!(blue < red);
    }

    #[test]
    fn pair_divergence_serializes_flat() {
        use anomaly_map_geography_models::{CountyFips, CountyPair};

        let record = PairDivergence {
            pair: CountyPair::new(CountyFips::new(6075), CountyFips::new(6001)),
            divergence: StratifiedDivergence {
                weighted_jsd: 0.25,
                mean_jsd: 0.3,
                shared_strata: 2,
                total_support: 120,
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fipsA"], "06001");
        assert_eq!(json["weightedJsd"], 0.25);
        assert_eq!(json["sharedStrata"], 2);
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the anomaly map server.
//!
//! Thin serde shells around the core result types; no logic beyond
//! defaults lives here.

use std::collections::BTreeMap;

use anomaly_map_dataset_models::ColumnMeta;
use anomaly_map_geography_models::CountyFips;
use anomaly_map_hex::ResolutionLevel;
use anomaly_map_stats_models::{FeatureDistribution, MergeGroup, ProbabilityRow};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};

/// `GET /api/health` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Always `true` when the server responds.
    pub healthy: bool,
    /// Crate version.
    pub version: String,
}

/// One registered column with its role metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiColumn {
    /// Wire name of the column.
    pub name: String,
    /// Role metadata.
    #[serde(flatten)]
    pub meta: ColumnMeta,
}

/// `GET /api/columns` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnsResponse {
    /// The registered columns, in registration order.
    pub columns: Vec<ApiColumn>,
}

/// One county directory entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountyInfo {
    /// Zero-padded FIPS code.
    pub fips: CountyFips,
    /// County name.
    pub name: String,
}

/// `GET /api/counties` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountiesResponse {
    /// Counties sorted by name.
    pub counties: Vec<CountyInfo>,
}

/// `GET /api/neighbors/{fips}` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborsResponse {
    /// The queried county.
    pub fips: CountyFips,
    /// Its adjacent counties, ascending by FIPS.
    pub neighbors: Vec<CountyInfo>,
}

/// Shared request body for the scoring endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Context column names, in conditioning order.
    pub context_cols: Vec<String>,
    /// Target column name.
    pub target: String,
    /// Minimum context support for the reliability gate.
    #[serde(default = "default_min_support")]
    pub min_support: u64,
}

const fn default_min_support() -> u64 {
    30
}

/// `POST /api/analyze/conditional-probability` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    /// Estimated shrinkage strength.
    pub alpha: f64,
    /// Number of scored rows.
    pub total_rows: usize,
    /// Scored rows, most anomalous first.
    pub rows: Vec<ProbabilityRow>,
}

/// `POST /api/map/hexes` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HexMapResponse {
    /// Hex layers keyed by resolution.
    pub by_resolution: BTreeMap<String, FeatureCollection>,
    /// Estimated shrinkage strength.
    pub alpha: f64,
    /// Number of leaf cells.
    pub total_hexes: usize,
    /// Zoom bands for the layered map.
    pub levels: Vec<ResolutionLevel>,
}

/// Summary statistics over all divergence pairs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivergenceStats {
    /// Number of pairs with at least one qualifying stratum.
    pub total_pairs: usize,
    /// Number of counties touched by those pairs.
    pub total_counties: usize,
    /// Mean weighted divergence across pairs.
    pub mean_jsd: f64,
    /// Maximum weighted divergence.
    pub max_jsd: f64,
    /// Minimum weighted divergence.
    pub min_jsd: f64,
}

/// Neighbor divergence map response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivergenceMapResponse {
    /// County choropleth with per-county maximum divergence.
    pub counties: FeatureCollection,
    /// Centroid-to-centroid divergence edges.
    pub edges: FeatureCollection,
    /// Summary statistics.
    pub stats: DivergenceStats,
    /// Number of merge groups applied, for the merged variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_groups_applied: Option<usize>,
}

/// `POST /api/map/neighbor-divergence-merged` request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedDivergenceRequest {
    /// Category-merge groups to apply before smoothing.
    pub merge_groups: Vec<MergeGroup>,
}

/// One filter condition shared by both compared populations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionFilter {
    /// Registered column name.
    pub column: String,
    /// Value both populations are restricted to.
    pub value: String,
}

/// `POST /api/compare/counties` request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    /// First county.
    pub fips_a: CountyFips,
    /// Second county.
    pub fips_b: CountyFips,
    /// Optional shared filter applied to both populations.
    #[serde(default)]
    pub conditions: Vec<ConditionFilter>,
    /// Optional color merge groups.
    #[serde(default)]
    pub merge_groups: Vec<MergeGroup>,
}

/// One county's side of a comparison.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareSide {
    /// County FIPS.
    pub fips: CountyFips,
    /// County name.
    pub name: String,
    /// Population size after filtering.
    pub total_count: usize,
    /// Color distribution.
    pub color: FeatureDistribution,
    /// Building type distribution.
    pub bldg_type: FeatureDistribution,
    /// Occupancy distribution.
    pub occupancy: FeatureDistribution,
    /// Color distribution after merge groups, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_merged: Option<FeatureDistribution>,
}

/// Divergence summary of a comparison.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsdSummary {
    /// Divergence on raw labels.
    pub original: f64,
    /// Divergence after merging, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged: Option<f64>,
    /// `original - merged`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduction: Option<f64>,
    /// Reduction as a percentage of the original.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduction_pct: Option<f64>,
}

/// `POST /api/compare/counties` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResponse {
    /// First county's distributions.
    pub county_a: CompareSide,
    /// Second county's distributions.
    pub county_b: CompareSide,
    /// The conditions that were applied.
    pub applied_conditions: Vec<ConditionFilter>,
    /// Divergence summary for the color feature.
    pub jsd: JsdSummary,
}

/// One scored value row in a county detail group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountyDistributionEntry {
    /// Target value.
    pub value: String,
    /// Surprisal of the value in this context.
    pub surprisal: f64,
    /// Shrunk probability.
    pub prob: f64,
    /// Observation count.
    pub count: u64,
    /// Context total.
    pub context_total: u64,
}

/// One land-cover group of a county detail response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LandcoverDetail {
    /// Land-cover type, or `"all"` when not conditioned on land cover.
    pub lc_type: String,
    /// Observations behind the group.
    pub total_rows: u64,
    /// Maximum surprisal among reliable rows.
    pub max_surprisal: f64,
    /// Mean surprisal among reliable rows.
    pub mean_surprisal: f64,
    /// Scored values, most surprising first.
    pub distributions: Vec<CountyDistributionEntry>,
}

/// `POST /api/county/{fips}` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountyDetailResponse {
    /// The queried county.
    pub fips: CountyFips,
    /// County name.
    pub county_name: String,
    /// Shrinkage strength estimated on the county's counts.
    pub alpha: f64,
    /// Per-land-cover detail groups.
    pub by_landcover: Vec<LandcoverDetail>,
    /// Number of groups.
    pub total_landcover_types: usize,
}

/// `POST /api/reload` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadResponse {
    /// Records in the freshly loaded snapshot.
    pub records: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_request_defaults_min_support() {
        let request: AnalysisRequest =
            serde_json::from_str(r#"{"contextCols":["lc_type"],"target":"color"}"#).unwrap();
        assert_eq!(request.min_support, 30);
        assert_eq!(request.context_cols, vec!["lc_type".to_string()]);
    }

    #[test]
    fn compare_request_accepts_minimal_body() {
        let request: CompareRequest =
            serde_json::from_str(r#"{"fipsA":"06001","fipsB":"06075"}"#).unwrap();
        assert!(request.conditions.is_empty());
        assert!(request.merge_groups.is_empty());
    }

    #[test]
    fn jsd_summary_omits_absent_merge_fields() {
        let summary = JsdSummary {
            original: 0.4,
            merged: None,
            reduction: None,
            reduction_pct: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("merged").is_none());
        assert_eq!(json["original"], 0.4);
    }
}

//! HTTP handler functions for the anomaly map API.

use std::collections::BTreeMap;
use std::str::FromStr as _;

use actix_web::{HttpResponse, web};
use anomaly_map_dataset_models::{Column, ObservationRecord};
use anomaly_map_geography::counties as directory;
use anomaly_map_geography::edges;
use anomaly_map_geography_models::CountyFips;
use anomaly_map_hex::{H3Parent, RESOLUTION_LEVELS};
use anomaly_map_server_models::{
    AnalysisRequest, AnalyzeResponse, ApiColumn, ApiHealth, ColumnsResponse, CompareRequest,
    CompareResponse, CompareSide, CountiesResponse, CountyDetailResponse, CountyDistributionEntry,
    CountyInfo, DivergenceMapResponse, DivergenceStats, HexMapResponse, JsdSummary,
    LandcoverDetail, MergedDivergenceRequest, NeighborsResponse, ReloadResponse,
};
use anomaly_map_stats::{StatsError, alpha, counts, divergence, score};
use anomaly_map_stats_models::{MergeGroup, ProbabilityRow, ScoreTable};
use geojson::JsonObject;

use crate::AppState;

/// Support floor for the neighbor divergence map strata.
const DIVERGENCE_MIN_SUPPORT: u64 = 30;

/// How many expected values to embed in each hex anomaly detail.
const EXPECTED_VALUES: usize = 3;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/columns`
///
/// Returns the registered column enumeration with role metadata.
pub async fn columns() -> HttpResponse {
    let columns = Column::all()
        .iter()
        .map(|column| ApiColumn {
            name: column.to_string(),
            meta: column.meta(),
        })
        .collect();
    HttpResponse::Ok().json(ColumnsResponse { columns })
}

/// `GET /api/counties`
pub async fn counties() -> HttpResponse {
    let counties = directory::CA_COUNTIES
        .iter()
        .map(|county| CountyInfo {
            fips: county.fips,
            name: county.name.to_string(),
        })
        .collect();
    HttpResponse::Ok().json(CountiesResponse { counties })
}

/// `GET /api/neighbors/{fips}`
pub async fn neighbors(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let Ok(fips) = CountyFips::parse(&path) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("invalid county FIPS code '{path}'")
        }));
    };

    let neighbors = state
        .adjacency
        .neighbors_of(fips)
        .into_iter()
        .map(county_info)
        .collect();
    HttpResponse::Ok().json(NeighborsResponse { fips, neighbors })
}

/// `POST /api/analyze/conditional-probability`
///
/// Returns the full scored table, most anomalous rows first.
pub async fn analyze(state: web::Data<AppState>, request: web::Json<AnalysisRequest>) -> HttpResponse {
    let (context, target) = match request_columns(&request) {
        Ok(resolved) => resolved,
        Err(err) => return stats_error(&err),
    };

    let dataset = state.dataset.current();
    let mut table = match scored_table(dataset.records(), &context, target, request.min_support) {
        Ok(table) => table,
        Err(err) => return stats_error(&err),
    };
    score::sort_most_anomalous_first(&mut table.rows);

    HttpResponse::Ok().json(AnalyzeResponse {
        alpha: table.alpha,
        total_rows: table.rows.len(),
        rows: table.rows,
    })
}

/// `POST /api/map/counties`
///
/// County choropleth of per-county surprisal summaries. The FIPS column
/// is forced into the context so every row is county-scoped.
pub async fn county_map(
    state: web::Data<AppState>,
    request: web::Json<AnalysisRequest>,
) -> HttpResponse {
    let (mut context, target) = match request_columns(&request) {
        Ok(resolved) => resolved,
        Err(err) => return stats_error(&err),
    };
    let existing = context.iter().position(|column| *column == Column::Fips);
    let fips_index = if let Some(index) = existing {
        index
    } else {
        context.insert(0, Column::Fips);
        0
    };

    let dataset = state.dataset.current();
    let table = match scored_table(dataset.records(), &context, target, request.min_support) {
        Ok(table) => table,
        Err(err) => return stats_error(&err),
    };
    let summaries = score::county_summaries(&table, fips_index);

    let mut layer = state.boundaries.choropleth(|fips, _| {
        let mut props = JsonObject::new();
        let summary = fips.and_then(|fips| summaries.get(&fips.to_string()));
        if let Some(summary) = summary {
            props.insert("maxSurprisal".to_string(), summary.max_surprisal.into());
            props.insert("meanSurprisal".to_string(), summary.mean_surprisal.into());
            props.insert("totalRows".to_string(), summary.total_rows.into());
            props.insert(
                "topAnomalyValue".to_string(),
                summary.top_anomaly_value.clone().into(),
            );
            props.insert(
                "topAnomalySurprisal".to_string(),
                summary.top_anomaly_surprisal.into(),
            );
        } else {
            props.insert("maxSurprisal".to_string(), serde_json::Value::Null);
            props.insert("meanSurprisal".to_string(), serde_json::Value::Null);
            props.insert("totalRows".to_string(), 0.into());
        }
        props
    });

    let mut foreign = JsonObject::new();
    foreign.insert("alpha".to_string(), table.alpha.into());
    layer.foreign_members = Some(foreign);

    HttpResponse::Ok().json(layer)
}

/// `POST /api/map/hexes`
///
/// Leaf hex layer plus rollups for every configured resolution.
pub async fn hex_map(state: web::Data<AppState>, request: web::Json<AnalysisRequest>) -> HttpResponse {
    let (context, target) = match request_columns(&request) {
        Ok(resolved) => resolved,
        Err(err) => return stats_error(&err),
    };

    let dataset = state.dataset.current();
    let table = match scored_table(dataset.records(), &context, target, request.min_support) {
        Ok(table) => table,
        Err(err) => return stats_error(&err),
    };

    let leaves =
        anomaly_map_hex::leaf_cells(dataset.records(), &table, &context, target, EXPECTED_VALUES);

    let resolver = H3Parent;
    let mut by_resolution = BTreeMap::new();
    for level in RESOLUTION_LEVELS {
        match anomaly_map_hex::rollup(&leaves, level.res, &resolver) {
            Ok(cells) => {
                by_resolution.insert(level.res.to_string(), anomaly_map_hex::hex_layer(&cells));
            }
            Err(err) => {
                log::error!("Failed to roll up hexes to resolution {}: {err}", level.res);
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Failed to aggregate hex layers"
                }));
            }
        }
    }

    HttpResponse::Ok().json(HexMapResponse {
        by_resolution,
        alpha: table.alpha,
        total_hexes: leaves.len(),
        levels: RESOLUTION_LEVELS.to_vec(),
    })
}

/// `GET /api/map/neighbor-divergence`
pub async fn neighbor_divergence(state: web::Data<AppState>) -> HttpResponse {
    divergence_map(&state, &[], None)
}

/// `POST /api/map/neighbor-divergence-merged`
///
/// Recomputes the divergence map with category-merge groups applied.
pub async fn neighbor_divergence_merged(
    state: web::Data<AppState>,
    request: web::Json<MergedDivergenceRequest>,
) -> HttpResponse {
    let applied = request.merge_groups.len();
    divergence_map(&state, &request.merge_groups, Some(applied))
}

/// `POST /api/compare/counties`
///
/// Side-by-side feature distributions for two counties with the color
/// divergence, optionally recomputed under merge groups.
pub async fn compare_counties(
    state: web::Data<AppState>,
    request: web::Json<CompareRequest>,
) -> HttpResponse {
    let mut conditions = Vec::with_capacity(request.conditions.len());
    for condition in &request.conditions {
        let Ok(column) = Column::from_str(&condition.column) else {
            return stats_error(&StatsError::InvalidColumn {
                name: condition.column.clone(),
            });
        };
        conditions.push((column, condition.value.as_str()));
    }

    let dataset = state.dataset.current();
    let select = |fips: CountyFips| {
        dataset
            .records()
            .iter()
            .filter(|record| {
                record.fips == fips
                    && conditions
                        .iter()
                        .all(|(column, value)| record.matches(*column, value))
            })
            .collect::<Vec<_>>()
    };
    let population_a = select(request.fips_a);
    let population_b = select(request.fips_b);

    if population_a.is_empty() || population_b.is_empty() {
        return HttpResponse::NotFound().json(serde_json::json!({
            "error": "no data for one or both counties with the selected filter",
            "countA": population_a.len(),
            "countB": population_b.len(),
        }));
    }

    let color = divergence::compare_feature(
        &population_a,
        &population_b,
        Column::Color,
        &request.merge_groups,
    );
    let bldg = divergence::compare_feature(&population_a, &population_b, Column::BldgType, &[]);
    let occupancy =
        divergence::compare_feature(&population_a, &population_b, Column::Occupancy, &[]);
    let (Ok(color), Ok(bldg), Ok(occupancy)) = (color, bldg, occupancy) else {
        return HttpResponse::NotFound().json(serde_json::json!({
            "error": "no data for one or both counties with the selected filter"
        }));
    };

    let jsd = color.merged.as_ref().map_or(
        JsdSummary {
            original: color.jsd,
            merged: None,
            reduction: None,
            reduction_pct: None,
        },
        |merged| JsdSummary {
            original: color.jsd,
            merged: Some(merged.jsd),
            reduction: Some(merged.reduction),
            reduction_pct: Some(merged.reduction_pct),
        },
    );

    let (merged_a, merged_b) = color.merged.map_or((None, None), |merged| {
        (Some(merged.distribution_a), Some(merged.distribution_b))
    });

    HttpResponse::Ok().json(CompareResponse {
        county_a: CompareSide {
            fips: request.fips_a,
            name: county_info(request.fips_a).name,
            total_count: population_a.len(),
            color: color.distribution_a,
            bldg_type: bldg.distribution_a,
            occupancy: occupancy.distribution_a,
            color_merged: merged_a,
        },
        county_b: CompareSide {
            fips: request.fips_b,
            name: county_info(request.fips_b).name,
            total_count: population_b.len(),
            color: color.distribution_b,
            bldg_type: bldg.distribution_b,
            occupancy: occupancy.distribution_b,
            color_merged: merged_b,
        },
        applied_conditions: request.conditions.clone(),
        jsd,
    })
}

/// `POST /api/county/{fips}`
///
/// Single-county surprisal detail grouped by land-cover type. Counts
/// are county-scoped; the global prior stays dataset-wide.
pub async fn county_detail(
    state: web::Data<AppState>,
    path: web::Path<String>,
    request: web::Json<AnalysisRequest>,
) -> HttpResponse {
    let Ok(fips) = CountyFips::parse(&path) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("invalid county FIPS code '{path}'")
        }));
    };
    let (mut context, target) = match request_columns(&request) {
        Ok(resolved) => resolved,
        Err(err) => return stats_error(&err),
    };
    if !context.contains(&Column::Fips) {
        context.insert(0, Column::Fips);
    }

    let dataset = state.dataset.current();
    let county_records = dataset.county(fips);
    let stats = match counts::aggregate_with_prior(
        county_records,
        dataset.records(),
        &context,
        target,
    ) {
        Ok(stats) => stats,
        Err(err) => return stats_error(&err),
    };
    let alpha = alpha::estimate_alpha(&stats);
    let table = score::score(&stats, alpha, request.min_support);

    let lc_index = context.iter().position(|column| *column == Column::LcType);
    let reliable: Vec<&ProbabilityRow> = table.rows.iter().filter(|row| row.reliable).collect();

    let mut groups: BTreeMap<String, Vec<&ProbabilityRow>> = BTreeMap::new();
    for row in reliable {
        let group = lc_index
            .and_then(|index| row.context.0.get(index).cloned())
            .unwrap_or_else(|| "all".to_string());
        groups.entry(group).or_default().push(row);
    }

    let by_landcover: Vec<LandcoverDetail> = groups
        .into_iter()
        .map(|(lc_type, rows)| landcover_detail(lc_type, &rows, lc_index.is_some()))
        .collect();

    let total_landcover_types = by_landcover.len();
    HttpResponse::Ok().json(CountyDetailResponse {
        fips,
        county_name: county_info(fips).name,
        alpha,
        by_landcover,
        total_landcover_types,
    })
}

/// `POST /api/reload`
///
/// Re-reads the dataset CSV and atomically swaps the snapshot. Requests
/// already running keep their old snapshot.
pub async fn reload(state: web::Data<AppState>) -> HttpResponse {
    match anomaly_map_dataset::load_csv(&state.data_path) {
        Ok(dataset) => {
            let records = dataset.len();
            let previous = state.dataset.swap(dataset);
            log::info!(
                "Swapped dataset snapshot: {} -> {records} records",
                previous.len()
            );
            HttpResponse::Ok().json(ReloadResponse { records })
        }
        Err(err) => {
            log::error!("Failed to reload dataset: {err}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to reload dataset; previous snapshot kept"
            }))
        }
    }
}

/// Resolves request column names into the registered enumeration.
fn request_columns(request: &AnalysisRequest) -> Result<(Vec<Column>, Column), StatsError> {
    let context = counts::resolve_columns(&request.context_cols)?;
    let target = Column::from_str(&request.target).map_err(|_| StatsError::InvalidColumn {
        name: request.target.clone(),
    })?;
    Ok((context, target))
}

/// Runs the full scoring pipeline over a record set.
fn scored_table(
    records: &[ObservationRecord],
    context: &[Column],
    target: Column,
    min_support: u64,
) -> Result<ScoreTable, StatsError> {
    let stats = counts::aggregate(records, context, target)?;
    let alpha = alpha::estimate_alpha(&stats);
    Ok(score::score(&stats, alpha, min_support))
}

/// Maps a [`StatsError`] to its HTTP response. Validation failures
/// reject the whole request; `NoData` is an explicit not-found body.
fn stats_error(err: &StatsError) -> HttpResponse {
    let body = serde_json::json!({ "error": err.to_string() });
    match err {
        StatsError::InvalidColumn { .. } | StatsError::InvalidRequest { .. } => {
            HttpResponse::BadRequest().json(body)
        }
        StatsError::NoData { .. } => HttpResponse::NotFound().json(body),
    }
}

fn county_info(fips: CountyFips) -> CountyInfo {
    CountyInfo {
        fips,
        name: directory::county_name(fips)
            .map_or_else(|| fips.to_string(), ToString::to_string),
    }
}

/// Builds one land-cover group of the county detail response.
#[allow(clippy::cast_precision_loss)]
fn landcover_detail(
    lc_type: String,
    rows: &[&ProbabilityRow],
    grouped_by_landcover: bool,
) -> LandcoverDetail {
    let mut sorted: Vec<&ProbabilityRow> = rows.to_vec();
    sorted.sort_by(|a, b| {
        b.surprisal
            .total_cmp(&a.surprisal)
            .then_with(|| a.target_value.cmp(&b.target_value))
    });

    let max_surprisal = sorted.first().map_or(0.0, |row| row.surprisal);
    let mean_surprisal =
        sorted.iter().map(|row| row.surprisal).sum::<f64>() / sorted.len().max(1) as f64;
    // Grouped rows share one context total; ungrouped detail sums them.
    let total_rows = if grouped_by_landcover {
        sorted.first().map_or(0, |row| row.context_total)
    } else {
        sorted.iter().map(|row| row.context_total).sum()
    };

    LandcoverDetail {
        lc_type,
        total_rows,
        max_surprisal,
        mean_surprisal,
        distributions: sorted
            .into_iter()
            .map(|row| CountyDistributionEntry {
                value: row.target_value.clone(),
                surprisal: row.surprisal,
                prob: row.prob,
                count: row.count,
                context_total: row.context_total,
            })
            .collect(),
    }
}

/// Shared assembly for the divergence map endpoints.
#[allow(clippy::cast_precision_loss)]
fn divergence_map(
    state: &AppState,
    merge_groups: &[MergeGroup],
    merge_groups_applied: Option<usize>,
) -> HttpResponse {
    let dataset = state.dataset.current();
    let pairs = state.adjacency.pairs();
    let results = divergence::neighbor_divergence(
        dataset.records(),
        &pairs,
        Column::LcType,
        Column::Color,
        DIVERGENCE_MIN_SUPPORT,
        merge_groups,
    );

    let by_county = edges::max_divergence_by_county(&results);
    let counties_layer = state.boundaries.choropleth(|fips, _| {
        let mut props = JsonObject::new();
        let value = fips.map(|fips| by_county.get(&fips).copied().unwrap_or(0.0));
        props.insert("maxDivergence".to_string(), value.into());
        props
    });
    let edges_layer = edges::divergence_edges(&results, &state.boundaries.centroids());

    let weighted: Vec<f64> = results
        .iter()
        .map(|result| result.divergence.weighted_jsd)
        .collect();
    let stats = DivergenceStats {
        total_pairs: results.len(),
        total_counties: by_county.len(),
        mean_jsd: if weighted.is_empty() {
            0.0
        } else {
            weighted.iter().sum::<f64>() / weighted.len() as f64
        },
        max_jsd: weighted.iter().copied().fold(0.0, f64::max),
        min_jsd: weighted
            .iter()
            .copied()
            .min_by(f64::total_cmp)
            .unwrap_or(0.0),
    };

    HttpResponse::Ok().json(DivergenceMapResponse {
        counties: counties_layer,
        edges: edges_layer,
        stats,
        merge_groups_applied,
    })
}

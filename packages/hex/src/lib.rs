#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Scored hex cells and the hierarchical spatial rollup.
//!
//! Leaf-resolution H3 cells carry a scored payload; coarser levels are
//! derived aggregates computed directly from the leaves through an
//! injected parent function, never by re-aggregating an intermediate
//! level. Also builds the `GeoJSON` hex layers served to the map.

mod layers;
mod leaf;

pub use layers::hex_layer;
pub use leaf::leaf_cells;

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// Resolution of the leaf cells in the base dataset.
pub const LEAF_RESOLUTION: u8 = 9;

/// Maximum H3 resolution.
const MAX_RESOLUTION: u8 = 15;

/// Errors that can occur during hex aggregation.
#[derive(Debug, Error)]
pub enum HexError {
    /// The requested rollup resolution is not a valid H3 resolution.
    #[error("invalid H3 resolution {resolution}")]
    InvalidResolution {
        /// The rejected resolution.
        resolution: u8,
    },
}

/// One zoom band of the layered hex map.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionLevel {
    /// H3 resolution served in this band.
    pub res: u8,
    /// Lowest map zoom the band covers.
    pub min_zoom: u8,
    /// Highest map zoom the band covers.
    pub max_zoom: u8,
}

/// The resolutions served to the map, finest last.
pub const RESOLUTION_LEVELS: &[ResolutionLevel] = &[
    ResolutionLevel {
        res: 5,
        min_zoom: 0,
        max_zoom: 7,
    },
    ResolutionLevel {
        res: 6,
        min_zoom: 6,
        max_zoom: 9,
    },
    ResolutionLevel {
        res: 7,
        min_zoom: 8,
        max_zoom: 11,
    },
    ResolutionLevel {
        res: 8,
        min_zoom: 10,
        max_zoom: 13,
    },
    ResolutionLevel {
        res: 9,
        min_zoom: 12,
        max_zoom: 20,
    },
];

/// The single most anomalous detail carried by a cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyDetail {
    /// The anomalous target value.
    pub value: String,
    /// Its shrunk probability.
    pub prob: f64,
    /// Display string of the non-geographic context values.
    pub context: String,
    /// Summary of the most expected values in the same context.
    pub expected: Option<String>,
}

/// A spatial cell with its scored payload.
///
/// Leaf cells are built from the score table; coarser cells are derived
/// aggregates and never mutate the leaves they summarize.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HexCell {
    /// H3 cell index.
    pub h3: u64,
    /// Number of scored combinations in the cell.
    pub count: u64,
    /// Dominant land-cover type, when known.
    pub lc_type: Option<String>,
    /// Dominant county, when known.
    pub fips: Option<String>,
    /// Highest surprisal among scored children, if any.
    pub max_surprisal: Option<f64>,
    /// Unweighted mean surprisal among scored children, if any.
    pub mean_surprisal: Option<f64>,
    /// Detail of the single most anomalous child.
    pub anomaly: Option<AnomalyDetail>,
}

/// Deterministic parent lookup in the hierarchical spatial partition.
///
/// Injective per resolution: every fine cell has exactly one ancestor
/// at each coarser resolution. Injected so the rollup stays independent
/// of the geospatial index backing it.
pub trait CellParent {
    /// Returns the ancestor of `cell` at `resolution`, or `None` if the
    /// cell or resolution is invalid.
    fn parent(&self, cell: u64, resolution: u8) -> Option<u64>;
}

/// Production parent function backed by the H3 index hierarchy.
#[derive(Debug, Clone, Copy, Default)]
pub struct H3Parent;

impl CellParent for H3Parent {
    fn parent(&self, cell: u64, resolution: u8) -> Option<u64> {
        let cell = h3o::CellIndex::try_from(cell).ok()?;
        let resolution = h3o::Resolution::try_from(resolution).ok()?;
        cell.parent(resolution).map(u64::from)
    }
}

/// Rolls leaf cells up to a coarser resolution.
///
/// Aggregation always runs directly from the leaf level; chaining
/// rollups of rollups would compound the per-cell mean bias. Per parent
/// group:
///
/// - `count` is the exact sum of child counts;
/// - `max_surprisal` / `mean_surprisal` cover children with a score
///   (`None` when no child has one); the mean weights each cell
///   equally, not each observation;
/// - dominant attributes are the count-weighted mode, ties broken by
///   the lexicographically smallest value;
/// - the anomaly detail is copied verbatim from the child with the
///   highest `max_surprisal`, ties broken by the smallest child index.
///
/// Cells the resolver cannot place are logged and skipped.
///
/// # Errors
///
/// Returns [`HexError::InvalidResolution`] if `target_resolution` is
/// not a valid H3 resolution.
#[allow(clippy::cast_precision_loss)]
pub fn rollup(
    leaves: &[HexCell],
    target_resolution: u8,
    resolver: &dyn CellParent,
) -> Result<Vec<HexCell>, HexError> {
    if target_resolution > MAX_RESOLUTION {
        return Err(HexError::InvalidResolution {
            resolution: target_resolution,
        });
    }
    if target_resolution >= LEAF_RESOLUTION {
        return Ok(leaves.to_vec());
    }

    let mut groups: BTreeMap<u64, Vec<&HexCell>> = BTreeMap::new();
    for leaf in leaves {
        let Some(parent) = resolver.parent(leaf.h3, target_resolution) else {
            log::warn!(
                "No resolution-{target_resolution} ancestor for cell {:x}; skipping",
                leaf.h3
            );
            continue;
        };
        groups.entry(parent).or_default().push(leaf);
    }

    let mut cells = Vec::with_capacity(groups.len());
    for (parent, mut children) in groups {
        children.sort_by_key(|child| child.h3);

        let count = children.iter().map(|child| child.count).sum();

        let scores: Vec<f64> = children
            .iter()
            .filter_map(|child| child.max_surprisal)
            .collect();
        let max_surprisal = scores.iter().copied().max_by(f64::total_cmp);
        let mean_surprisal = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };

        let mut top: Option<(&HexCell, f64)> = None;
        for &child in &children {
            let Some(score) = child.max_surprisal else {
                continue;
            };
            // Strictly-greater keeps the smallest-indexed child on ties.
            if top.is_none_or(|(_, best)| score > best) {
                top = Some((child, score));
            }
        }

        cells.push(HexCell {
            h3: parent,
            count,
            lc_type: dominant(&children, |child| child.lc_type.as_deref()),
            fips: dominant(&children, |child| child.fips.as_deref()),
            max_surprisal,
            mean_surprisal,
            anomaly: top.and_then(|(child, _)| child.anomaly.clone()),
        });
    }

    Ok(cells)
}

/// Count-weighted mode of one attribute across children; ties broken by
/// the lexicographically smallest value.
fn dominant<'a>(
    children: &[&'a HexCell],
    attribute: impl Fn(&'a HexCell) -> Option<&'a str>,
) -> Option<String> {
    let mut weights: BTreeMap<&str, u64> = BTreeMap::new();
    for &child in children {
        if let Some(value) = attribute(child) {
            *weights.entry(value).or_insert(0) += child.count;
        }
    }

    let mut best: Option<(&str, u64)> = None;
    for (value, weight) in weights {
        // Ascending iteration + strictly-greater keeps the smallest
        // value on ties.
        if best.is_none_or(|(_, best_weight)| weight > best_weight) {
            best = Some((value, weight));
        }
    }
    best.map(|(value, _)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Maps cells to `cell / 100` regardless of resolution.
    struct DivideBy100;

    impl CellParent for DivideBy100 {
        fn parent(&self, cell: u64, _resolution: u8) -> Option<u64> {
            Some(cell / 100)
        }
    }

    fn leaf(h3: u64, count: u64, score: Option<f64>, lc: &str) -> HexCell {
        HexCell {
            h3,
            count,
            lc_type: Some(lc.to_string()),
            fips: Some("06001".to_string()),
            max_surprisal: score,
            mean_surprisal: score,
            anomaly: score.map(|s| AnomalyDetail {
                value: format!("value-{h3}"),
                prob: (-s).exp(),
                context: lc.to_string(),
                expected: None,
            }),
        }
    }

    #[test]
    fn count_is_conserved() {
        let leaves = vec![
            leaf(101, 3, Some(1.0), "Forest"),
            leaf(102, 4, Some(2.0), "Forest"),
            leaf(205, 5, None, "Urban"),
        ];
        let cells = rollup(&leaves, 5, &DivideBy100).unwrap();
        let total: u64 = cells.iter().map(|cell| cell.count).sum();
        assert_eq!(total, 12);
        assert_eq!(cells.len(), 2);
    }

    #[test]
    fn unscored_group_yields_null_aggregates() {
        let leaves = vec![leaf(205, 5, None, "Urban")];
        let cells = rollup(&leaves, 5, &DivideBy100).unwrap();
        assert_eq!(cells[0].max_surprisal, None);
        assert_eq!(cells[0].mean_surprisal, None);
        assert!(cells[0].anomaly.is_none());
    }

    #[test]
    fn mean_weights_cells_equally() {
        // Counts differ wildly; the mean must ignore them.
        let leaves = vec![
            leaf(101, 1000, Some(1.0), "Forest"),
            leaf(102, 1, Some(3.0), "Forest"),
        ];
        let cells = rollup(&leaves, 5, &DivideBy100).unwrap();
        assert!((cells[0].mean_surprisal.unwrap() - 2.0).abs() < 1e-12);
        assert!((cells[0].max_surprisal.unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn dominant_attribute_is_count_weighted() {
        let leaves = vec![
            leaf(101, 2, None, "Urban"),
            leaf(102, 3, None, "Forest"),
            leaf(103, 2, None, "Forest"),
        ];
        let cells = rollup(&leaves, 5, &DivideBy100).unwrap();
        assert_eq!(cells[0].lc_type.as_deref(), Some("Forest"));
    }

    #[test]
    fn dominant_tie_prefers_smallest_value() {
        let leaves = vec![leaf(101, 2, None, "Urban"), leaf(102, 2, None, "Forest")];
        let cells = rollup(&leaves, 5, &DivideBy100).unwrap();
        assert_eq!(cells[0].lc_type.as_deref(), Some("Forest"));
    }

    #[test]
    fn top_anomaly_tie_prefers_smallest_cell() {
        let leaves = vec![
            leaf(102, 1, Some(2.0), "Forest"),
            leaf(101, 1, Some(2.0), "Forest"),
        ];
        let cells = rollup(&leaves, 5, &DivideBy100).unwrap();
        assert_eq!(
            cells[0].anomaly.as_ref().unwrap().value,
            "value-101".to_string()
        );
    }

    #[test]
    fn leaf_resolution_passes_through() {
        let leaves = vec![leaf(101, 3, Some(1.0), "Forest")];
        let cells = rollup(&leaves, LEAF_RESOLUTION, &DivideBy100).unwrap();
        assert_eq!(cells, leaves);
    }

    #[test]
    fn rejects_impossible_resolution() {
        let result = rollup(&[], 16, &DivideBy100);
        assert!(matches!(result, Err(HexError::InvalidResolution { .. })));
    }

    #[test]
    fn h3_parent_walks_the_real_hierarchy() {
        let cell = h3o::LatLng::new(37.77, -122.42)
            .unwrap()
            .to_cell(h3o::Resolution::Nine);
        let resolver = H3Parent;
        let parent = resolver.parent(u64::from(cell), 5).unwrap();
        let parent_cell = h3o::CellIndex::try_from(parent).unwrap();
        assert_eq!(u8::from(parent_cell.resolution()), 5);
        assert!(resolver.parent(u64::from(cell), 16).is_none());
    }
}

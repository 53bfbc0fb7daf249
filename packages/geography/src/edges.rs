//! Divergence edge layer between adjacent counties.
//!
//! Renders each adjacent county pair's divergence as a `LineString`
//! between the two county centroids, carrying the divergence aggregate
//! as properties.

use std::collections::BTreeMap;

use anomaly_map_geography_models::CountyFips;
use anomaly_map_stats_models::PairDivergence;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};

use crate::counties;

/// Builds the centroid-to-centroid edge layer for pair divergences.
///
/// Pairs whose counties have no known centroid are logged and skipped.
#[must_use]
pub fn divergence_edges(
    results: &[PairDivergence],
    centroids: &BTreeMap<CountyFips, [f64; 2]>,
) -> FeatureCollection {
    let mut features = Vec::with_capacity(results.len());

    for result in results {
        let (Some(a), Some(b)) = (
            centroids.get(&result.pair.fips_a),
            centroids.get(&result.pair.fips_b),
        ) else {
            log::warn!(
                "No centroid for pair {}-{}; skipping edge",
                result.pair.fips_a,
                result.pair.fips_b
            );
            continue;
        };

        let mut properties = JsonObject::new();
        properties.insert("fipsA".to_string(), result.pair.fips_a.to_string().into());
        properties.insert("fipsB".to_string(), result.pair.fips_b.to_string().into());
        properties.insert(
            "countyA".to_string(),
            counties::county_name(result.pair.fips_a).into(),
        );
        properties.insert(
            "countyB".to_string(),
            counties::county_name(result.pair.fips_b).into(),
        );
        properties.insert(
            "weightedJsd".to_string(),
            result.divergence.weighted_jsd.into(),
        );
        properties.insert("meanJsd".to_string(), result.divergence.mean_jsd.into());
        properties.insert(
            "sharedStrata".to_string(),
            result.divergence.shared_strata.into(),
        );
        properties.insert(
            "totalSupport".to_string(),
            result.divergence.total_support.into(),
        );

        features.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::LineString(vec![
                a.to_vec(),
                b.to_vec(),
            ]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Per-county maximum divergence across all pairs touching it.
#[must_use]
pub fn max_divergence_by_county(results: &[PairDivergence]) -> BTreeMap<CountyFips, f64> {
    let mut by_county: BTreeMap<CountyFips, f64> = BTreeMap::new();
    for result in results {
        for fips in [result.pair.fips_a, result.pair.fips_b] {
            let entry = by_county.entry(fips).or_insert(0.0);
            *entry = entry.max(result.divergence.weighted_jsd);
        }
    }
    by_county
}

//! `GeoJSON` hex layer construction.
//!
//! Converts scored cells into polygon features with their payload as
//! properties. Cells whose index cannot be resolved to a boundary are
//! logged and skipped rather than failing the layer.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};

use crate::HexCell;

/// Builds a polygon feature collection for a set of hex cells.
#[must_use]
pub fn hex_layer(cells: &[HexCell]) -> FeatureCollection {
    let mut features = Vec::with_capacity(cells.len());

    for cell in cells {
        let Ok(index) = h3o::CellIndex::try_from(cell.h3) else {
            log::warn!("Skipping invalid H3 index {:x} in hex layer", cell.h3);
            continue;
        };

        features.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Polygon(vec![boundary_ring(index)]))),
            id: None,
            properties: Some(properties(cell, index)),
            foreign_members: None,
        });
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Returns the cell boundary as a closed `[lng, lat]` ring.
fn boundary_ring(index: h3o::CellIndex) -> Vec<Vec<f64>> {
    let mut ring: Vec<Vec<f64>> = index
        .boundary()
        .iter()
        .map(|vertex| vec![vertex.lng(), vertex.lat()])
        .collect();
    if let Some(first) = ring.first().cloned() {
        ring.push(first);
    }
    ring
}

fn properties(cell: &HexCell, index: h3o::CellIndex) -> JsonObject {
    let mut props = JsonObject::new();
    props.insert("h3".to_string(), index.to_string().into());
    props.insert("count".to_string(), cell.count.into());
    props.insert("lcType".to_string(), cell.lc_type.clone().into());
    props.insert("fips".to_string(), cell.fips.clone().into());
    props.insert("maxSurprisal".to_string(), cell.max_surprisal.into());
    props.insert("meanSurprisal".to_string(), cell.mean_surprisal.into());
    if let Some(anomaly) = &cell.anomaly {
        props.insert("anomalyValue".to_string(), anomaly.value.clone().into());
        props.insert("anomalyProb".to_string(), anomaly.prob.into());
        props.insert("anomalyContext".to_string(), anomaly.context.clone().into());
        props.insert("expected".to_string(), anomaly.expected.clone().into());
    }
    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AnomalyDetail;

    fn cell(h3: u64) -> HexCell {
        HexCell {
            h3,
            count: 4,
            lc_type: Some("Forest".to_string()),
            fips: Some("06001".to_string()),
            max_surprisal: Some(1.5),
            mean_surprisal: Some(0.9),
            anomaly: Some(AnomalyDetail {
                value: "Blue".to_string(),
                prob: 0.02,
                context: "Forest".to_string(),
                expected: Some("Red (72%)".to_string()),
            }),
        }
    }

    fn valid_h3() -> u64 {
        let index = h3o::LatLng::new(37.77, -122.42)
            .unwrap()
            .to_cell(h3o::Resolution::Nine);
        u64::from(index)
    }

    #[test]
    fn builds_closed_polygon_rings() {
        let layer = hex_layer(&[cell(valid_h3())]);
        assert_eq!(layer.features.len(), 1);

        let geometry = layer.features[0].geometry.as_ref().unwrap();
        let Value::Polygon(rings) = &geometry.value else {
            panic!("expected polygon geometry");
        };
        let ring = &rings[0];
        assert!(ring.len() >= 7);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn carries_payload_as_properties() {
        let layer = hex_layer(&[cell(valid_h3())]);
        let props = layer.features[0].properties.as_ref().unwrap();
        assert_eq!(props["count"], 4);
        assert_eq!(props["anomalyValue"], "Blue");
        assert_eq!(props["lcType"], "Forest");
    }

    #[test]
    fn null_scores_serialize_as_null() {
        let mut unscored = cell(valid_h3());
        unscored.max_surprisal = None;
        unscored.mean_surprisal = None;
        unscored.anomaly = None;

        let layer = hex_layer(&[unscored]);
        let props = layer.features[0].properties.as_ref().unwrap();
        assert!(props["maxSurprisal"].is_null());
        assert!(!props.contains_key("anomalyValue"));
    }

    #[test]
    fn invalid_cells_are_skipped() {
        let layer = hex_layer(&[cell(0xdead_beef)]);
        assert!(layer.features.is_empty());
    }
}

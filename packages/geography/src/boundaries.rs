//! County boundary polygons.
//!
//! Fetched once at startup from a public `GeoJSON` document keyed by
//! county name, resolved to FIPS codes through the county directory,
//! and reused by every county-level map response. Centroids are derived
//! from the polygons for the divergence edge layer.

use std::collections::BTreeMap;

use anomaly_map_geography_models::CountyFips;
use geo::Centroid as _;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject};

use crate::GeographyError;
use crate::counties;

/// One county boundary with its resolved identity.
#[derive(Debug, Clone)]
pub struct BoundaryEntry {
    /// Resolved FIPS code; `None` when the name is not in the
    /// directory.
    pub fips: Option<CountyFips>,
    /// County name from the source document.
    pub name: String,
    /// Boundary geometry.
    pub geometry: Geometry,
    /// Polygon centroid as `[lng, lat]`, when computable.
    pub centroid: Option<[f64; 2]>,
}

/// The county boundary set, loaded once and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct CountyBoundaries {
    entries: Vec<BoundaryEntry>,
}

impl CountyBoundaries {
    /// Fetches the boundary document from `url`.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError`] if the request fails or the document
    /// is not a `GeoJSON` feature collection.
    pub async fn fetch(url: &str) -> Result<Self, GeographyError> {
        log::info!("Fetching county boundaries from {url}");
        let geojson: GeoJson = reqwest::get(url).await?.json().await?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(GeographyError::Boundary {
                message: "expected a FeatureCollection document".to_string(),
            });
        };
        Ok(Self::from_collection(collection))
    }

    /// Builds the boundary set from an already-parsed collection.
    ///
    /// Features without geometry are logged and skipped; features whose
    /// name is missing from the directory are kept with an unresolved
    /// FIPS so they still render (without stats) on the map.
    #[must_use]
    pub fn from_collection(collection: FeatureCollection) -> Self {
        let mut entries = Vec::with_capacity(collection.features.len());

        for feature in collection.features {
            let name = feature
                .properties
                .as_ref()
                .and_then(|props| props.get("name"))
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string();

            let Some(geometry) = feature.geometry else {
                log::warn!("Skipping boundary feature '{name}' without geometry");
                continue;
            };

            let fips = counties::county_fips(&name);
            if fips.is_none() {
                log::warn!("No FIPS code for boundary feature '{name}'");
            }

            let centroid = centroid_of(&geometry);

            entries.push(BoundaryEntry {
                fips,
                name,
                geometry,
                centroid,
            });
        }

        log::info!("Loaded {} county boundaries", entries.len());
        Self { entries }
    }

    /// All boundary entries.
    #[must_use]
    pub fn entries(&self) -> &[BoundaryEntry] {
        &self.entries
    }

    /// Centroids of all resolved counties.
    #[must_use]
    pub fn centroids(&self) -> BTreeMap<CountyFips, [f64; 2]> {
        self.entries
            .iter()
            .filter_map(|entry| Some((entry.fips?, entry.centroid?)))
            .collect()
    }

    /// Assembles a choropleth: one feature per boundary, with
    /// `annotate` supplying the per-county properties merged over the
    /// county's name and FIPS.
    #[must_use]
    pub fn choropleth(
        &self,
        mut annotate: impl FnMut(Option<CountyFips>, &str) -> JsonObject,
    ) -> FeatureCollection {
        let features = self
            .entries
            .iter()
            .map(|entry| {
                let mut properties = JsonObject::new();
                properties.insert("name".to_string(), entry.name.clone().into());
                properties.insert(
                    "fips".to_string(),
                    entry.fips.map(|fips| fips.to_string()).into(),
                );
                properties.extend(annotate(entry.fips, &entry.name));

                Feature {
                    bbox: None,
                    geometry: Some(entry.geometry.clone()),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

/// Computes a geometry's centroid as `[lng, lat]`.
fn centroid_of(geometry: &Geometry) -> Option<[f64; 2]> {
    let geo_geometry: geo::Geometry<f64> = geometry.clone().try_into().ok()?;
    geo_geometry.centroid().map(|point| [point.x(), point.y()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::Value;

    fn square(name: &str, origin: f64) -> Feature {
        let ring = vec![
            vec![origin, 0.0],
            vec![origin + 1.0, 0.0],
            vec![origin + 1.0, 1.0],
            vec![origin, 1.0],
            vec![origin, 0.0],
        ];
        let mut properties = JsonObject::new();
        properties.insert("name".to_string(), name.into());
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }

    fn collection() -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: vec![square("Alameda", 0.0), square("Atlantis", 10.0)],
            foreign_members: None,
        }
    }

    #[test]
    fn resolves_names_to_fips() {
        let boundaries = CountyBoundaries::from_collection(collection());
        assert_eq!(boundaries.entries().len(), 2);
        assert_eq!(
            boundaries.entries()[0].fips,
            Some(CountyFips::new(6001))
        );
        assert_eq!(boundaries.entries()[1].fips, None);
    }

    #[test]
    fn centroids_cover_resolved_counties_only() {
        let boundaries = CountyBoundaries::from_collection(collection());
        let centroids = boundaries.centroids();
        assert_eq!(centroids.len(), 1);
        let centroid = centroids[&CountyFips::new(6001)];
        assert!((centroid[0] - 0.5).abs() < 1e-9);
        assert!((centroid[1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn choropleth_merges_annotations() {
        let boundaries = CountyBoundaries::from_collection(collection());
        let layer = boundaries.choropleth(|fips, _| {
            let mut props = JsonObject::new();
            props.insert("hasStats".to_string(), fips.is_some().into());
            props
        });

        assert_eq!(layer.features.len(), 2);
        let props = layer.features[0].properties.as_ref().unwrap();
        assert_eq!(props["fips"], "06001");
        assert_eq!(props["hasStats"], true);
        let unresolved = layer.features[1].properties.as_ref().unwrap();
        assert!(unresolved["fips"].is_null());
    }
}

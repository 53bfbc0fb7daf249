#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Observation record schema and the registered column enumeration.
//!
//! This crate defines the closed set of categorical columns every
//! analysis request can reference, with per-column role metadata, and
//! the immutable record/dataset types shared read-only across request
//! handlers.

use anomaly_map_geography_models::CountyFips;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The closed set of categorical columns available to analysis requests.
///
/// Every request names columns as strings; parsing into this enum is the
/// only way in, so unregistered columns are rejected at the boundary.
/// Role metadata (target/context eligibility) lives in [`ColumnMeta`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Column {
    /// Structure color label.
    Color,
    /// Building type classification.
    BldgType,
    /// Occupancy category (residential, commercial, ...).
    Occupancy,
    /// Land-cover type from authoritative spatial joins.
    LcType,
    /// County FIPS code.
    Fips,
}

impl Column {
    /// Returns all registered columns.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Color,
            Self::BldgType,
            Self::Occupancy,
            Self::LcType,
            Self::Fips,
        ]
    }

    /// Returns the role metadata for this column.
    #[must_use]
    pub const fn meta(self) -> ColumnMeta {
        match self {
            Self::Color => ColumnMeta {
                label: "Color",
                as_target: true,
                as_context: false,
                rationale: "Known dirty tokens and near-duplicate labels, likely data entry errors",
            },
            Self::BldgType => ColumnMeta {
                label: "Building Type",
                as_target: true,
                as_context: true,
                rationale: "Should correlate with occupancy; rare combinations flag coding issues",
            },
            Self::Occupancy => ColumnMeta {
                label: "Occupancy Type",
                as_target: true,
                as_context: true,
                rationale: "Industrial in residential forest could flag upstream coding issues",
            },
            Self::LcType => ColumnMeta {
                label: "Land Cover",
                as_target: false,
                as_context: true,
                rationale: "Comes from spatial joins to authoritative sources, treated as ground truth",
            },
            Self::Fips => ColumnMeta {
                label: "County (FIPS)",
                as_target: false,
                as_context: true,
                rationale: "Geographic fact from an authoritative source",
            },
        }
    }
}

/// Role metadata for a registered column.
///
/// Consumed at the request boundary for validation and surfaced on the
/// columns endpoint; not part of any core algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMeta {
    /// Human-readable label.
    pub label: &'static str,
    /// Whether the column may be scored as a target.
    pub as_target: bool,
    /// Whether the column may condition an estimate.
    pub as_context: bool,
    /// Why the column has these roles.
    pub rationale: &'static str,
}

/// One observation: a structure with its spatial cell, county, and
/// categorical attributes. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationRecord {
    /// Leaf-resolution H3 cell index.
    pub h3: u64,
    /// County the structure falls in.
    pub fips: CountyFips,
    /// Land-cover type.
    pub lc_type: String,
    /// Building type.
    pub bldg_type: String,
    /// Occupancy category.
    pub occupancy: String,
    /// Color label.
    pub color: String,
}

impl ObservationRecord {
    /// Returns this record's value for a registered column.
    ///
    /// FIPS codes are rendered zero-padded so grouping keys are stable
    /// strings regardless of source formatting.
    #[must_use]
    pub fn value(&self, column: Column) -> String {
        match column {
            Column::Color => self.color.clone(),
            Column::BldgType => self.bldg_type.clone(),
            Column::Occupancy => self.occupancy.clone(),
            Column::LcType => self.lc_type.clone(),
            Column::Fips => self.fips.to_string(),
        }
    }

    /// Returns `true` if this record's value for `column` equals `value`.
    #[must_use]
    pub fn matches(&self, column: Column, value: &str) -> bool {
        match column {
            Column::Color => self.color == value,
            Column::BldgType => self.bldg_type == value,
            Column::Occupancy => self.occupancy == value,
            Column::LcType => self.lc_type == value,
            Column::Fips => self.fips.to_string() == value,
        }
    }
}

/// The immutable base dataset: one record per observation.
///
/// Loaded once at startup and shared by reference to all request
/// handlers. Replacing it is a whole-snapshot swap, never in-place
/// mutation.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<ObservationRecord>,
}

impl Dataset {
    /// Wraps a record set as an immutable dataset.
    #[must_use]
    pub const fn new(records: Vec<ObservationRecord>) -> Self {
        Self { records }
    }

    /// All records.
    #[must_use]
    pub fn records(&self) -> &[ObservationRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records belonging to one county.
    #[must_use]
    pub fn county(&self, fips: CountyFips) -> Vec<&ObservationRecord> {
        self.records.iter().filter(|r| r.fips == fips).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr as _;

    #[test]
    fn column_parses_from_wire_name() {
        assert_eq!(Column::from_str("lc_type").unwrap(), Column::LcType);
        assert_eq!(Column::from_str("bldg_type").unwrap(), Column::BldgType);
        assert!(Column::from_str("geometry").is_err());
    }

    #[test]
    fn column_roundtrips_through_display() {
        for column in Column::all() {
            let name = column.to_string();
            assert_eq!(Column::from_str(&name).unwrap(), *column);
        }
    }

    #[test]
    fn meta_marks_ground_truth_columns_context_only() {
        assert!(!Column::LcType.meta().as_target);
        assert!(!Column::Fips.meta().as_target);
        assert!(Column::Color.meta().as_target);
        assert!(!Column::Color.meta().as_context);
    }

    fn record() -> ObservationRecord {
        ObservationRecord {
            h3: 0x0895_3082_813f_ffff,
            fips: CountyFips::new(6001),
            lc_type: "Forest".to_string(),
            bldg_type: "Wood".to_string(),
            occupancy: "RES".to_string(),
            color: "Red".to_string(),
        }
    }

    #[test]
    fn record_value_pads_fips() {
        assert_eq!(record().value(Column::Fips), "06001");
        assert_eq!(record().value(Column::Color), "Red");
    }

    #[test]
    fn record_matches_column_value() {
        let rec = record();
        assert!(rec.matches(Column::LcType, "Forest"));
        assert!(rec.matches(Column::Fips, "06001"));
        assert!(!rec.matches(Column::Color, "Blue"));
    }

    #[test]
    fn dataset_filters_by_county() {
        let mut other = record();
        other.fips = CountyFips::new(6075);
        let dataset = Dataset::new(vec![record(), other]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.county(CountyFips::new(6001)).len(), 1);
    }
}

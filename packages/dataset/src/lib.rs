#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CSV loading and the immutable process-wide dataset snapshot.
//!
//! The observation table is loaded once at startup, validated row by
//! row, and shared read-only with every request handler. Malformed rows
//! are logged and skipped rather than failing the load. Reloads replace
//! the whole snapshot atomically via [`SnapshotStore::swap`].

use std::io;
use std::path::Path;
use std::str::FromStr as _;
use std::sync::{Arc, RwLock};

use anomaly_map_dataset_models::{Dataset, ObservationRecord};
use anomaly_map_geography_models::CountyFips;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading the dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Filesystem access failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The file parsed but produced no usable records.
    #[error("no usable records in '{path}'")]
    Empty {
        /// The file that was loaded.
        path: String,
    },
}

/// One CSV row of the observation table.
#[derive(Debug, Deserialize)]
struct RawRow {
    h3: String,
    fips: String,
    lc_type: String,
    bldg_type: String,
    occupancy: String,
    color: String,
}

/// Loads the observation table from a CSV file.
///
/// Rows with an unparseable H3 index or FIPS code are logged and
/// skipped; the load only fails if nothing usable remains.
///
/// # Errors
///
/// Returns [`DatasetError`] if the file cannot be read, the CSV is
/// structurally invalid, or no row survives validation.
pub fn load_csv(path: &Path) -> Result<Dataset, DatasetError> {
    let file = std::fs::File::open(path)?;
    let dataset = read_records(file)?;

    if dataset.is_empty() {
        return Err(DatasetError::Empty {
            path: path.display().to_string(),
        });
    }

    log::info!(
        "Loaded {} observations from {}",
        dataset.len(),
        path.display()
    );
    Ok(dataset)
}

/// Reads observation records from any CSV source.
///
/// # Errors
///
/// Returns [`DatasetError`] if a row cannot be deserialized.
pub fn read_records<R: io::Read>(reader: R) -> Result<Dataset, DatasetError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    let mut skipped: u64 = 0;

    for row in csv_reader.deserialize() {
        let raw: RawRow = row?;

        let Ok(cell) = h3o::CellIndex::from_str(&raw.h3) else {
            log::warn!("Skipping row with invalid H3 index '{}'", raw.h3);
            skipped += 1;
            continue;
        };
        let Ok(fips) = CountyFips::parse(&raw.fips) else {
            log::warn!("Skipping row with invalid FIPS code '{}'", raw.fips);
            skipped += 1;
            continue;
        };

        records.push(ObservationRecord {
            h3: u64::from(cell),
            fips,
            lc_type: raw.lc_type,
            bldg_type: raw.bldg_type,
            occupancy: raw.occupancy,
            color: raw.color,
        });
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} malformed observation rows");
    }

    Ok(Dataset::new(records))
}

/// Versioned holder for the shared dataset snapshot.
///
/// Readers take a cheap `Arc` clone and keep computing against it even
/// while a reload swaps in a fresh snapshot; the old one is dropped when
/// the last in-flight request releases it. The dataset itself is never
/// mutated in place.
pub struct SnapshotStore {
    inner: RwLock<Arc<Dataset>>,
}

impl SnapshotStore {
    /// Wraps an initial snapshot.
    #[must_use]
    pub fn new(dataset: Dataset) -> Self {
        Self {
            inner: RwLock::new(Arc::new(dataset)),
        }
    }

    /// Returns the current snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    #[must_use]
    pub fn current(&self) -> Arc<Dataset> {
        Arc::clone(&self.inner.read().expect("dataset snapshot lock poisoned"))
    }

    /// Atomically replaces the snapshot, returning the previous one.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    pub fn swap(&self, dataset: Dataset) -> Arc<Dataset> {
        let mut guard = self.inner.write().expect("dataset snapshot lock poisoned");
        std::mem::replace(&mut *guard, Arc::new(dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
h3,fips,lc_type,bldg_type,occupancy,color
8928308280fffff,06001,Forest,Wood,RES,Red
8928308280bffff,6075,Urban,Masonry,COM,Blue
";

    #[test]
    fn reads_well_formed_rows() {
        let dataset = read_records(CSV.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 2);
        let first = &dataset.records()[0];
        assert_eq!(first.fips, CountyFips::new(6001));
        assert_eq!(first.lc_type, "Forest");
    }

    #[test]
    fn skips_invalid_h3_and_fips() {
        let csv = "\
h3,fips,lc_type,bldg_type,occupancy,color
not-a-cell,06001,Forest,Wood,RES,Red
8928308280fffff,nope,Forest,Wood,RES,Red
8928308280fffff,06001,Forest,Wood,RES,Red
";
        let dataset = read_records(csv.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn snapshot_swap_replaces_whole_dataset() {
        let store = SnapshotStore::new(read_records(CSV.as_bytes()).unwrap());
        let before = store.current();
        assert_eq!(before.len(), 2);

        let old = store.swap(Dataset::new(vec![before.records()[0].clone()]));
        assert_eq!(old.len(), 2);
        assert_eq!(store.current().len(), 1);
        // The snapshot handed out before the swap is unaffected.
        assert_eq!(before.len(), 2);
    }
}

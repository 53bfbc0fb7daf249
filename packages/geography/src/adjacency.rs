//! County adjacency list.
//!
//! Loaded once from a CSV of county/neighbor FIPS pairs. Pairs are
//! normalized (low FIPS first) and deduplicated, so each shared border
//! appears exactly once regardless of how the source lists it.

use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use anomaly_map_geography_models::{CountyFips, CountyPair};
use serde::Deserialize;

use crate::GeographyError;

/// One CSV row of the adjacency table.
#[derive(Debug, Deserialize)]
struct RawPair {
    county_fips: String,
    neighbor_fips: String,
}

/// The normalized county adjacency list.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    pairs: BTreeSet<CountyPair>,
}

impl Adjacency {
    /// Builds an adjacency list from pairs in any order.
    #[must_use]
    pub fn from_pairs<I: IntoIterator<Item = CountyPair>>(pairs: I) -> Self {
        Self {
            pairs: pairs.into_iter().collect(),
        }
    }

    /// Loads the adjacency list from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError`] if the file cannot be read or a row
    /// cannot be parsed.
    pub fn load_csv(path: &Path) -> Result<Self, GeographyError> {
        let file = std::fs::File::open(path)?;
        let adjacency = Self::read(file)?;
        log::info!(
            "Loaded {} county adjacency pairs from {}",
            adjacency.len(),
            path.display()
        );
        Ok(adjacency)
    }

    /// Reads the adjacency list from any CSV source.
    ///
    /// Rows with unparseable FIPS codes and self-pairs are logged and
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError`] if a row cannot be deserialized.
    pub fn read<R: io::Read>(reader: R) -> Result<Self, GeographyError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut pairs = BTreeSet::new();

        for row in csv_reader.deserialize() {
            let raw: RawPair = row?;
            let (Ok(a), Ok(b)) = (
                CountyFips::parse(&raw.county_fips),
                CountyFips::parse(&raw.neighbor_fips),
            ) else {
                log::warn!(
                    "Skipping adjacency row with invalid FIPS '{}'/'{}'",
                    raw.county_fips,
                    raw.neighbor_fips
                );
                continue;
            };
            if a == b {
                log::warn!("Skipping self-adjacency for county {a}");
                continue;
            }
            pairs.insert(CountyPair::new(a, b));
        }

        Ok(Self { pairs })
    }

    /// All pairs, low FIPS first, in ascending order.
    #[must_use]
    pub fn pairs(&self) -> Vec<CountyPair> {
        self.pairs.iter().copied().collect()
    }

    /// The neighbors of one county, ascending.
    #[must_use]
    pub fn neighbors_of(&self, fips: CountyFips) -> Vec<CountyFips> {
        self.pairs
            .iter()
            .filter_map(|pair| pair.other(fips))
            .collect()
    }

    /// Number of adjacency pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
county_fips,neighbor_fips
06001,06013
06013,06001
06001,06075
06001,06001
06001,bogus
";

    #[test]
    fn normalizes_and_deduplicates() {
        let adjacency = Adjacency::read(CSV.as_bytes()).unwrap();
        assert_eq!(adjacency.len(), 2);
        let pairs = adjacency.pairs();
        assert!(pairs.iter().all(|pair| pair.fips_a <= pair.fips_b));
    }

    #[test]
    fn neighbors_are_symmetric() {
        let adjacency = Adjacency::read(CSV.as_bytes()).unwrap();
        let alameda = CountyFips::new(6001);
        let contra_costa = CountyFips::new(6013);
        assert_eq!(adjacency.neighbors_of(alameda).len(), 2);
        assert_eq!(adjacency.neighbors_of(contra_costa), vec![alameda]);
    }

    #[test]
    fn empty_source_is_empty() {
        let adjacency = Adjacency::read("county_fips,neighbor_fips\n".as_bytes()).unwrap();
        assert!(adjacency.is_empty());
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! County geography: directory, adjacency, and boundary map assembly.
//!
//! Provides the California county name/FIPS directory, the adjacency
//! list loaded from CSV, the county boundary polygons fetched once at
//! startup, and the `GeoJSON` assembly for county choropleths and
//! divergence edge layers.

pub mod adjacency;
pub mod boundaries;
pub mod counties;
pub mod edges;

use thiserror::Error;

/// Errors that can occur during geography operations.
#[derive(Debug, Error)]
pub enum GeographyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem access failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The fetched boundary document has an unexpected shape.
    #[error("Boundary error: {message}")]
    Boundary {
        /// Description of what went wrong.
        message: String,
    },
}

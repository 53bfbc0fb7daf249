#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Statistical engine for the anomaly map.
//!
//! Pure functions over the immutable dataset: sufficient-statistic
//! aggregation, empirical-Bayes shrinkage strength estimation,
//! surprisal scoring, and Jensen-Shannon divergence between categorical
//! distributions. Every function is deterministic for identical input
//! data — all grouping runs over `BTreeMap`s and all ties are broken
//! explicitly.

pub mod alpha;
pub mod counts;
pub mod divergence;
pub mod score;

use thiserror::Error;

/// Errors that can occur during statistical operations.
#[derive(Debug, Error)]
pub enum StatsError {
    /// A requested column is outside the registered set.
    #[error("column '{name}' is not a registered column")]
    InvalidColumn {
        /// The rejected column name.
        name: String,
    },

    /// The request shape is invalid (empty context, target in context).
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of what is wrong with the request.
        message: String,
    },

    /// A filtered population contains no observations.
    #[error("no data: {message}")]
    NoData {
        /// Which population was empty.
        message: String,
    },
}

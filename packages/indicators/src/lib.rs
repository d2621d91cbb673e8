#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Displacement indicators aggregation engine.
//!
//! Turns the operational tables into the four indicator families shown on
//! the overview dashboard: volume and localisation, causes, vulnerability
//! and needs, dynamics and alerts. Each family has its own builder that
//! composes query primitives from a [`DisplacementStore`]; the
//! [`IndicatorsService`] resolves the request period, fans the builders out
//! under a shared deadline and stamps the combined document.
//!
//! Nothing here writes, caches or holds state between requests.

pub mod assembler;
pub mod causes;
pub mod config;
pub mod dynamics;
pub mod period;
pub mod vulnerability;
pub mod volume;

use std::future::Future;
use std::time::Duration;

use idp_watch_database::{DbError, DisplacementStore, Primitive};
use idp_watch_database_models::AreaFilter;
use thiserror::Error;

pub use assembler::IndicatorsService;
pub use config::IndicatorsConfig;
pub use period::Period;

/// Errors that can occur while building indicators.
#[derive(Debug, Error)]
pub enum IndicatorsError {
    /// A query primitive failed. Transient; the caller may retry.
    #[error("Query '{primitive}' failed: {source}")]
    Query {
        /// Primitive that failed.
        primitive: Primitive,
        /// Underlying database error.
        #[source]
        source: DbError,
    },

    /// The request did not complete before its deadline.
    #[error("Indicators not ready after {timeout:?}")]
    DeadlineExceeded {
        /// Deadline that was exceeded.
        timeout: Duration,
    },

    /// The configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// A computed document broke one of its own invariants.
    #[error("Invariant violated: {message}")]
    Invariant {
        /// Description of what went wrong.
        message: String,
    },
}

/// Everything a builder needs for one request.
#[derive(Clone, Copy)]
pub struct IndicatorRequest<'a> {
    /// Query executor.
    pub store: &'a dyn DisplacementStore,
    /// Resolved analysis period.
    pub period: &'a Period,
    /// Geographic restriction.
    pub area: &'a AreaFilter,
    /// Thresholds, limits and constants.
    pub config: &'a IndicatorsConfig,
}

impl std::fmt::Debug for IndicatorRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorRequest")
            .field("period", self.period)
            .field("area", self.area)
            .finish_non_exhaustive()
    }
}

impl IndicatorRequest<'_> {
    /// Awaits one primitive, logging and wrapping its failure.
    ///
    /// # Errors
    ///
    /// Returns [`IndicatorsError::Query`] if the primitive fails.
    pub async fn run<T>(
        &self,
        primitive: Primitive,
        query: impl Future<Output = Result<T, DbError>> + Send,
    ) -> Result<T, IndicatorsError> {
        query.await.map_err(|source| {
            log::error!(
                "{primitive} failed (since {}, {} months, {}): {source}",
                self.period.window.since.to_rfc3339(),
                self.period.months,
                self.area
            );
            IndicatorsError::Query { primitive, source }
        })
    }
}

/// Rounds to two decimals.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `100 * part / total`, unrounded; zero when `total` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn share(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

/// [`share`] rounded to two decimals.
#[must_use]
pub fn percent(part: u64, total: u64) -> f64 {
    round2(share(part, total))
}

/// Splits 100 across `counts` in hundredths with largest-remainder
/// rounding, so the published values add up to exactly 100.00 however
/// many entries there are. All zero when the counts sum to zero.
#[must_use]
pub fn allocate_percents(counts: &[u64]) -> Vec<f64> {
    const HUNDREDTHS: u128 = 10_000;

    let total: u128 = counts.iter().map(|&c| u128::from(c)).sum();
    if total == 0 {
        return vec![0.0; counts.len()];
    }

    let mut units: Vec<u128> = Vec::with_capacity(counts.len());
    let mut remainders: Vec<(u128, usize)> = Vec::with_capacity(counts.len());
    for (i, &c) in counts.iter().enumerate() {
        let scaled = u128::from(c) * HUNDREDTHS;
        units.push(scaled / total);
        remainders.push((scaled % total, i));
    }

    let assigned: u128 = units.iter().sum();
    let leftover = usize::try_from(HUNDREDTHS.saturating_sub(assigned)).unwrap_or(0);
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for &(_, i) in remainders.iter().take(leftover) {
        units[i] += 1;
    }

    units
        .into_iter()
        .map(|u| f64::from(u32::try_from(u).unwrap_or(u32::MAX)) / 100.0)
        .collect()
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query parameters and envelope types for the idp-watch API server.
//!
//! Numeric parameters are taken as raw strings so that a malformed value
//! falls back to its default instead of rejecting the request.

use idp_watch_database_models::AreaFilter;
use idp_watch_displacement_models::SeverityLevel;
use serde::{Deserialize, Serialize};

/// Query parameters shared by the period-based overview endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverviewQueryParams {
    /// Number of months to analyse.
    pub periode: Option<String>,
    /// Exact current city.
    pub province: Option<String>,
    /// Country, matched by substring.
    pub pays: Option<String>,
}

impl OverviewQueryParams {
    /// Area filter described by `province` / `pays`.
    #[must_use]
    pub fn area(&self) -> AreaFilter {
        AreaFilter::from_params(self.province.as_deref(), self.pays.as_deref())
    }
}

/// Query parameters for the real-time alerts endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertesQueryParams {
    /// Comma-separated severity levels.
    pub niveaux: Option<String>,
    /// Exact current city.
    pub province: Option<String>,
    /// Country, matched by substring.
    pub pays: Option<String>,
    /// Look-back in days.
    pub jours: Option<String>,
}

impl AlertesQueryParams {
    /// Area filter described by `province` / `pays`.
    #[must_use]
    pub fn area(&self) -> AreaFilter {
        AreaFilter::from_params(self.province.as_deref(), self.pays.as_deref())
    }

    /// Requested severity levels; empty when none is recognised.
    #[must_use]
    pub fn levels(&self) -> Vec<SeverityLevel> {
        self.niveaux
            .as_deref()
            .map(SeverityLevel::parse_csv)
            .unwrap_or_default()
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Error body returned with every non-2xx status.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Generic, user-facing message.
    pub error: String,
}

impl ApiError {
    /// Wraps a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn province_wins_over_country() {
        let params = OverviewQueryParams {
            periode: None,
            province: Some("Goma".to_string()),
            pays: Some("RDC".to_string()),
        };
        assert_eq!(params.area(), AreaFilter::City("Goma".to_string()));
        assert_eq!(OverviewQueryParams::default().area(), AreaFilter::None);
    }

    #[test]
    fn alert_levels_parse_case_insensitively() {
        let params = AlertesQueryParams {
            niveaux: Some("Critical,info,nope".to_string()),
            ..AlertesQueryParams::default()
        };
        assert_eq!(
            params.levels(),
            [SeverityLevel::Info, SeverityLevel::Critical]
        );
        assert!(AlertesQueryParams::default().levels().is_empty());
    }
}

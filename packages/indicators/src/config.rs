//! Tunable thresholds, limits and constants for the indicator builders.
//!
//! Defaults reproduce the published dashboard. Operators can override any
//! subset from a TOML file named by `IDP_INDICATORS_CONFIG`:
//!
//! ```toml
//! request_timeout_ms = 5000
//!
//! [risk]
//! high_min = 15
//!
//! [limits]
//! early_alerts = 50
//! ```
//!
//! Missing keys keep their default.

use std::path::Path;
use std::time::Duration;

use idp_watch_indicators_models::AccesServicesBase;
use serde::{Deserialize, Serialize};

use crate::IndicatorsError;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "IDP_INDICATORS_CONFIG";

/// Alert-count thresholds for zone risk levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Minimum alert count for `HIGH`.
    pub high_min: u64,
    /// Minimum alert count for `CRITICAL`.
    pub critical_min: u64,
    /// Estimated persons at risk per alert.
    pub population_multiplier: u64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high_min: 20,
            critical_min: 50,
            population_multiplier: 10,
        }
    }
}

/// Return-count thresholds for route trends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendThresholds {
    /// Maximum return count for `DECLINING`.
    pub declining_max: u64,
    /// Minimum return count for `RISING`.
    pub rising_min: u64,
}

impl Default for TrendThresholds {
    fn default() -> Self {
        Self {
            declining_max: 10,
            rising_min: 100,
        }
    }
}

/// Basic services access rates, in percent.
///
/// No survey feeds these yet; the values are published as configured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicServices {
    /// Drinking water.
    pub water: f64,
    /// Health care.
    pub health: f64,
    /// Schooling.
    pub education: f64,
    /// Housing.
    pub housing: f64,
}

impl Default for BasicServices {
    fn default() -> Self {
        Self {
            water: 75.5,
            health: 68.2,
            education: 82.3,
            housing: 58.7,
        }
    }
}

impl From<BasicServices> for AccesServicesBase {
    fn from(value: BasicServices) -> Self {
        Self {
            eau_potable: value.water,
            soins_sante: value.health,
            education: value.education,
            logement: value.housing,
        }
    }
}

/// Maximum number of rows in each ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultLimits {
    /// High-risk zones.
    pub risk_zones: u32,
    /// Return routes.
    pub return_trends: u32,
    /// Early alerts on the overview.
    pub early_alerts: u32,
    /// Alerts in the real-time feed.
    pub realtime_alerts: u32,
}

impl Default for ResultLimits {
    fn default() -> Self {
        Self {
            risk_zones: 10,
            return_trends: 10,
            early_alerts: 20,
            realtime_alerts: 100,
        }
    }
}

/// Accepted ranges for the request period parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodBounds {
    /// Months analysed when the parameter is missing or invalid.
    pub default_months: u32,
    /// Smallest accepted month count.
    pub min_months: u32,
    /// Largest accepted month count.
    pub max_months: u32,
    /// Look-back of the recent mass movement count, in days.
    pub recent_movement_days: u32,
    /// Alert feed look-back when the parameter is missing or invalid.
    pub default_alert_days: u32,
    /// Largest accepted alert feed look-back.
    pub max_alert_days: u32,
}

impl Default for PeriodBounds {
    fn default() -> Self {
        Self {
            default_months: 12,
            min_months: 1,
            max_months: 120,
            recent_movement_days: 30,
            default_alert_days: 7,
            max_alert_days: 365,
        }
    }
}

/// All tunables of the indicator engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorsConfig {
    /// Zone risk levels.
    pub risk: RiskThresholds,
    /// Return route trends.
    pub trend: TrendThresholds,
    /// Basic services access placeholder.
    pub basic_services: BasicServices,
    /// Ranked list sizes.
    pub limits: ResultLimits,
    /// Period parameter bounds.
    pub period: PeriodBounds,
    /// End-to-end deadline of one request, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for IndicatorsConfig {
    fn default() -> Self {
        Self {
            risk: RiskThresholds::default(),
            trend: TrendThresholds::default(),
            basic_services: BasicServices::default(),
            limits: ResultLimits::default(),
            period: PeriodBounds::default(),
            request_timeout_ms: 10_000,
        }
    }
}

impl IndicatorsConfig {
    /// Request deadline.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`IndicatorsError::Config`] if the document is malformed or
    /// the values are inconsistent.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, IndicatorsError> {
        let config: Self = toml::de::from_str(toml_str).map_err(|e| IndicatorsError::Config {
            message: format!("Invalid indicators config: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IndicatorsError::Config`] if the file cannot be read or
    /// does not hold a valid configuration.
    pub fn from_file(path: &Path) -> Result<Self, IndicatorsError> {
        let contents = std::fs::read_to_string(path).map_err(|e| IndicatorsError::Config {
            message: format!("Cannot read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads the file named by [`CONFIG_ENV_VAR`], or the defaults when the
    /// variable is unset or empty.
    ///
    /// # Errors
    ///
    /// Returns [`IndicatorsError::Config`] if the named file cannot be
    /// loaded.
    pub fn load_from_env() -> Result<Self, IndicatorsError> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => {
                log::info!("Loading indicators config from {path}");
                Self::from_file(Path::new(path.trim()))
            }
            _ => {
                log::debug!("{CONFIG_ENV_VAR} not set, using default indicators config");
                Ok(Self::default())
            }
        }
    }

    /// Checks that thresholds and bounds are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`IndicatorsError::Config`] describing the first problem.
    pub fn validate(&self) -> Result<(), IndicatorsError> {
        let fail = |message: String| Err(IndicatorsError::Config { message });

        if self.risk.high_min >= self.risk.critical_min {
            return fail(format!(
                "risk.high_min ({}) must be below risk.critical_min ({})",
                self.risk.high_min, self.risk.critical_min
            ));
        }
        if self.trend.declining_max >= self.trend.rising_min {
            return fail(format!(
                "trend.declining_max ({}) must be below trend.rising_min ({})",
                self.trend.declining_max, self.trend.rising_min
            ));
        }

        let p = &self.period;
        if p.min_months == 0 || p.min_months > p.max_months {
            return fail(format!(
                "period months bounds {}..={} are empty or start at zero",
                p.min_months, p.max_months
            ));
        }
        if !(p.min_months..=p.max_months).contains(&p.default_months) {
            return fail(format!(
                "period.default_months ({}) is outside {}..={}",
                p.default_months, p.min_months, p.max_months
            ));
        }
        if p.max_alert_days == 0 || !(1..=p.max_alert_days).contains(&p.default_alert_days) {
            return fail(format!(
                "period.default_alert_days ({}) is outside 1..={}",
                p.default_alert_days, p.max_alert_days
            ));
        }

        let services = &self.basic_services;
        for (name, value) in [
            ("water", services.water),
            ("health", services.health),
            ("education", services.education),
            ("housing", services.housing),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return fail(format!("basic_services.{name} ({value}) is not a percentage"));
            }
        }

        if self.request_timeout_ms == 0 {
            return fail("request_timeout_ms must be positive".to_string());
        }

        Ok(())
    }
}

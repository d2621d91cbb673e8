#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Displacement taxonomy types shared across the idp-watch workspace.
//!
//! Defines the motive families used by the cause indicators, the motive type
//! tags recorded by field agents, alert severity levels, and the risk and
//! trend classifications published on the dashboard. Tags stored in the
//! operational tables are parsed into these enums; anything unrecognized
//! falls back to a catch-all rather than failing.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Severity level of an alert, from `info` (lowest) to `critical`.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SeverityLevel {
    /// Informational signal, no action expected.
    Info = 1,
    /// Situation to monitor.
    Warning = 2,
    /// Confirmed threat to the population.
    Danger = 3,
    /// Immediate threat requiring intervention.
    Critical = 4,
}

impl SeverityLevel {
    /// Returns the numeric rank of this level.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Levels counted when ranking high-risk zones.
    #[must_use]
    pub const fn high_risk() -> &'static [Self] {
        &[Self::Danger, Self::Critical]
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Info, Self::Warning, Self::Danger, Self::Critical]
    }

    /// Parses a comma-separated list such as `"danger,critical"`.
    ///
    /// Unknown tokens are dropped and duplicates collapsed. Returns an empty
    /// list when nothing is recognized; callers decide the fallback.
    #[must_use]
    pub fn parse_csv(s: &str) -> Vec<Self> {
        let mut levels: Vec<Self> = s
            .split(',')
            .filter_map(|token| token.trim().parse().ok())
            .collect();
        levels.sort_unstable();
        levels.dedup();
        levels
    }
}

/// Lifecycle status of an alert.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AlertStatus {
    /// Open alert.
    Active,
    /// Alert handled in the field.
    Resolved,
    /// Alert closed without action.
    Archived,
}

/// Movement type recorded on a geolocation row.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum MovementType {
    /// Settled at the location; counted as a return.
    #[strum(serialize = "residence_permanente")]
    #[serde(rename = "residence_permanente")]
    PermanentResidence,
    /// Passing through.
    #[strum(serialize = "transit")]
    Transit,
    /// Short stay.
    #[strum(serialize = "temporaire")]
    #[serde(rename = "temporaire")]
    Temporary,
}

/// Accommodation type recorded on a geolocation row.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum ShelterType {
    /// Managed displacement site.
    #[strum(serialize = "site_officiel")]
    #[serde(rename = "site_officiel")]
    OfficialSite,
    /// Hosted by a local family.
    #[strum(serialize = "famille_accueil")]
    #[serde(rename = "famille_accueil")]
    HostFamily,
    /// Spontaneous or informal settlement.
    #[strum(serialize = "informel")]
    #[serde(rename = "informel")]
    Informal,
    /// Collective centre (school, church, ...).
    #[strum(serialize = "centre_collectif")]
    #[serde(rename = "centre_collectif")]
    CollectiveCentre,
}

/// Top-level displacement cause families published by the causes indicator.
///
/// Each recognized [`MotiveType`] belongs to exactly one family, so family
/// percentages never overlap.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MotiveFamily {
    /// War, armed clashes and political violence.
    ArmedConflicts,
    /// Floods, droughts, earthquakes and other natural hazards.
    Disasters,
    /// Religious, ethnic or political persecution.
    Persecution,
    /// Insecurity, criminality and diffuse violence.
    GeneralisedViolence,
    /// Anything not covered above (economic, family, unknown tags).
    Other,
}

impl MotiveFamily {
    /// Returns all variants in dashboard display order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::ArmedConflicts,
            Self::Disasters,
            Self::Persecution,
            Self::GeneralisedViolence,
            Self::Other,
        ]
    }

    /// Classifies a raw motive type tag.
    ///
    /// Tags are trimmed and compared case-insensitively. Unknown tags map to
    /// [`Self::Other`].
    #[must_use]
    pub fn classify(tag: &str) -> Self {
        tag.trim()
            .parse::<MotiveType>()
            .map_or(Self::Other, MotiveType::family)
    }

    /// French label shown on the pie chart.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ArmedConflicts => "Conflits armés",
            Self::Disasters => "Catastrophes naturelles",
            Self::Persecution => "Persécutions",
            Self::GeneralisedViolence => "Violence généralisée",
            Self::Other => "Autres",
        }
    }

    /// Fixed slice colour used by the dashboard.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::ArmedConflicts => "#dc2626",
            Self::Disasters => "#2563eb",
            Self::Persecution => "#9333ea",
            Self::GeneralisedViolence => "#ea580c",
            Self::Other => "#6b7280",
        }
    }
}

/// Motive type tags with a known family.
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
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MotiveType {
    // ── Armed conflicts ─────────────────────────────────
    /// Armed clashes between organized groups
    ArmedConflict,
    /// Open war
    War,
    /// Politically motivated violence
    PoliticalViolence,

    // ── Disasters ───────────────────────────────────────
    /// Unspecified natural hazard
    NaturalDisaster,
    /// Flooding
    Flood,
    /// Drought
    Drought,
    /// Earthquake
    Earthquake,

    // ── Persecution ─────────────────────────────────────
    /// Persecution on religious grounds
    ReligiousPersecution,
    /// Persecution on ethnic grounds
    EthnicPersecution,
    /// Persecution on political grounds
    PoliticalPersecution,

    // ── Generalised violence ────────────────────────────
    /// Diffuse violence without an identified actor
    GeneralisedViolence,
    /// General insecurity
    Insecurity,
    /// Criminal activity
    Criminality,
}

impl MotiveType {
    /// Returns the parent [`MotiveFamily`] for this tag.
    #[must_use]
    pub const fn family(self) -> MotiveFamily {
        match self {
            Self::ArmedConflict | Self::War | Self::PoliticalViolence => {
                MotiveFamily::ArmedConflicts
            }

            Self::NaturalDisaster | Self::Flood | Self::Drought | Self::Earthquake => {
                MotiveFamily::Disasters
            }

            Self::ReligiousPersecution | Self::EthnicPersecution | Self::PoliticalPersecution => {
                MotiveFamily::Persecution
            }

            Self::GeneralisedViolence | Self::Insecurity | Self::Criminality => {
                MotiveFamily::GeneralisedViolence
            }
        }
    }

    /// Returns all tags belonging to the given family.
    #[must_use]
    pub fn for_family(family: MotiveFamily) -> Vec<Self> {
        Self::all()
            .iter()
            .copied()
            .filter(|t| t.family() == family)
            .collect()
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::ArmedConflict,
            Self::War,
            Self::PoliticalViolence,
            Self::NaturalDisaster,
            Self::Flood,
            Self::Drought,
            Self::Earthquake,
            Self::ReligiousPersecution,
            Self::EthnicPersecution,
            Self::PoliticalPersecution,
            Self::GeneralisedViolence,
            Self::Insecurity,
            Self::Criminality,
        ]
    }
}

/// Risk level of a zone, derived from its count of open high-severity alerts.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Below the high threshold
    Medium,
    /// At or above the high threshold
    High,
    /// At or above the critical threshold
    Critical,
}

impl RiskLevel {
    /// Classifies a zone by alert count. Both thresholds are inclusive.
    #[must_use]
    pub const fn from_alert_count(count: u64, high_min: u64, critical_min: u64) -> Self {
        if count >= critical_min {
            Self::Critical
        } else if count >= high_min {
            Self::High
        } else {
            Self::Medium
        }
    }
}

/// Direction of returns on an origin → return route.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    /// At most the declining threshold
    Declining,
    /// Between the two thresholds
    Stable,
    /// At least the rising threshold
    Rising,
}

impl TrendDirection {
    /// Classifies a route by return count. Both thresholds are inclusive.
    #[must_use]
    pub const fn from_return_count(count: u64, declining_max: u64, rising_min: u64) -> Self {
        if count >= rising_min {
            Self::Rising
        } else if count <= declining_max {
            Self::Declining
        } else {
            Self::Stable
        }
    }
}

/// Threat tag attached to risk zones. Alerts are not disaggregated by threat
/// type yet, so every zone reports [`Self::Multiple`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatType {
    /// Several or unspecified threats
    Multiple,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motive_type_family_consistency() {
        for tag in MotiveType::all() {
            let family = tag.family();
            let tags = MotiveType::for_family(family);
            assert!(
                tags.contains(tag),
                "{tag:?} claims family {family:?} but isn't in for_family result"
            );
        }
        assert!(MotiveType::for_family(MotiveFamily::Other).is_empty());
    }

    #[test]
    fn classify_known_and_unknown_tags() {
        assert_eq!(
            MotiveFamily::classify("armed_conflict"),
            MotiveFamily::ArmedConflicts
        );
        assert_eq!(MotiveFamily::classify("war"), MotiveFamily::ArmedConflicts);
        assert_eq!(MotiveFamily::classify(" Flood "), MotiveFamily::Disasters);
        assert_eq!(
            MotiveFamily::classify("ETHNIC_PERSECUTION"),
            MotiveFamily::Persecution
        );
        assert_eq!(
            MotiveFamily::classify("criminality"),
            MotiveFamily::GeneralisedViolence
        );
        assert_eq!(MotiveFamily::classify("economic"), MotiveFamily::Other);
        assert_eq!(MotiveFamily::classify(""), MotiveFamily::Other);
    }

    #[test]
    fn risk_level_thresholds() {
        assert_eq!(RiskLevel::from_alert_count(49, 20, 50), RiskLevel::High);
        assert_eq!(RiskLevel::from_alert_count(50, 20, 50), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_alert_count(19, 20, 50), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_alert_count(20, 20, 50), RiskLevel::High);
        assert_eq!(RiskLevel::from_alert_count(0, 20, 50), RiskLevel::Medium);
    }

    #[test]
    fn trend_thresholds() {
        assert_eq!(
            TrendDirection::from_return_count(10, 10, 100),
            TrendDirection::Declining
        );
        assert_eq!(
            TrendDirection::from_return_count(11, 10, 100),
            TrendDirection::Stable
        );
        assert_eq!(
            TrendDirection::from_return_count(99, 10, 100),
            TrendDirection::Stable
        );
        assert_eq!(
            TrendDirection::from_return_count(100, 10, 100),
            TrendDirection::Rising
        );
    }

    #[test]
    fn severity_csv_parsing() {
        assert_eq!(
            SeverityLevel::parse_csv("critical, DANGER,bogus,danger"),
            vec![SeverityLevel::Danger, SeverityLevel::Critical]
        );
        assert!(SeverityLevel::parse_csv("").is_empty());
        assert!(SeverityLevel::parse_csv("nope,,").is_empty());
    }

    #[test]
    fn stored_tags_round_trip_through_strum() {
        assert_eq!(
            MovementType::PermanentResidence.as_ref(),
            "residence_permanente"
        );
        assert_eq!(ShelterType::OfficialSite.as_ref(), "site_officiel");
        assert_eq!(AlertStatus::Active.as_ref(), "active");
        assert_eq!(SeverityLevel::Critical.to_string(), "critical");
        assert_eq!(RiskLevel::Critical.to_string(), "CRITICAL");
        assert_eq!(ThreatType::Multiple.to_string(), "MULTIPLE");
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Filter values, row types and record shapes for the indicator queries.
//!
//! The operational tables (migrants, motives, geolocations, alerts) are owned
//! by the CRUD side of the backend; these types describe what the indicator
//! primitives read from them and what they hand back. They are distinct from
//! the French-named response documents in `idp_watch_indicators_models`.

use chrono::{DateTime, Datelike as _, Months, NaiveDate, TimeZone as _, Utc};
use idp_watch_displacement_models::SeverityLevel;
use serde::{Deserialize, Serialize};

/// Optional geographic constraint applied to every primitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AreaFilter {
    /// No restriction.
    #[default]
    None,
    /// Exact match on the current city (migrants) or city (geolocations).
    City(String),
    /// Case-insensitive substring match on the country.
    Country(String),
}

impl AreaFilter {
    /// Builds a filter from the raw `province` / `pays` request values.
    ///
    /// Blank values are ignored and the city wins when both are present.
    #[must_use]
    pub fn from_params(province: Option<&str>, country: Option<&str>) -> Self {
        let clean = |s: Option<&str>| {
            s.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        };

        if let Some(city) = clean(province) {
            Self::City(city)
        } else if let Some(country) = clean(country) {
            Self::Country(country)
        } else {
            Self::None
        }
    }

    /// Returns `true` when no restriction applies.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Tests a `(city, country)` pair against this filter.
    #[must_use]
    pub fn matches(&self, city: Option<&str>, country: Option<&str>) -> bool {
        match self {
            Self::None => true,
            Self::City(wanted) => city == Some(wanted.as_str()),
            Self::Country(wanted) => country.is_some_and(|c| {
                c.to_lowercase().contains(&wanted.to_lowercase())
            }),
        }
    }
}

impl std::fmt::Display for AreaFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "all areas"),
            Self::City(city) => write!(f, "city {city}"),
            Self::Country(country) => write!(f, "country ~{country}"),
        }
    }
}

/// Half-open time interval `[since, until)` a primitive counts records in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive lower bound.
    pub since: DateTime<Utc>,
    /// Exclusive upper bound; also the reference instant for ages.
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    /// Window covering the `months` calendar months before `now`.
    ///
    /// Uses calendar arithmetic, so `2025-03-31` minus one month is
    /// `2025-02-28`.
    #[must_use]
    pub fn trailing_months(now: DateTime<Utc>, months: u32) -> Self {
        let since = now
            .checked_sub_months(Months::new(months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { since, until: now }
    }

    /// Window covering the `days` days before `now`.
    #[must_use]
    pub fn trailing_days(now: DateTime<Utc>, days: u32) -> Self {
        let since = now
            .checked_sub_signed(chrono::Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { since, until: now }
    }

    /// Returns `true` if `at` falls inside `[since, until)`.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.since <= at && at < self.until
    }

    /// Date of birth of someone turning `years` at the end of the window.
    ///
    /// Children are born after the 18-year cutoff, elderly people before the
    /// 65-year cutoff.
    #[must_use]
    pub fn birth_cutoff(&self, years: u32) -> NaiveDate {
        self.until
            .date_naive()
            .checked_sub_months(Months::new(years * 12))
            .unwrap_or(NaiveDate::MIN)
    }
}

/// Age under which a person is counted as a child.
pub const CHILD_MAX_AGE_YEARS: u32 = 18;

/// Age from which a person is counted as elderly.
pub const ELDERLY_MIN_AGE_YEARS: u32 = 65;

/// Placeholder for records without a city or birth place.
pub const UNKNOWN_ZONE: &str = "Inconnue";

/// One calendar month of the monthly series, as a half-open interval
/// `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthWindow {
    /// `YYYY-MM` label of the month.
    pub label: String,
    /// First instant of the month (inclusive).
    pub start: DateTime<Utc>,
    /// First instant of the following month (exclusive).
    pub end: DateTime<Utc>,
}

impl MonthWindow {
    /// Returns the `months` calendar months ending with the month of `now`,
    /// oldest first. Consecutive windows share their boundary so no instant
    /// belongs to two windows.
    #[must_use]
    pub fn trailing(now: DateTime<Utc>, months: u32) -> Vec<Self> {
        let Some(current) = NaiveDate::from_ymd_opt(now.year(), now.month(), 1) else {
            return Vec::new();
        };

        (0..months)
            .rev()
            .filter_map(|back| {
                let start = current.checked_sub_months(Months::new(back))?;
                let end = start.checked_add_months(Months::new(1))?;
                Some(Self {
                    label: start.format("%Y-%m").to_string(),
                    start: Utc.from_utc_datetime(&start.and_hms_opt(0, 0, 0)?),
                    end: Utc.from_utc_datetime(&end.and_hms_opt(0, 0, 0)?),
                })
            })
            .collect()
    }

    /// Returns `true` if `at` falls inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Active-migrant count for one current city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvinceCount {
    /// City name; [`UNKNOWN_ZONE`] when the record has none.
    pub province: String,
    /// Number of active migrants.
    pub count: u64,
}

/// One bucket of the monthly series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyBucket {
    /// `YYYY-MM` label.
    pub label: String,
    /// Active migrants created inside the month.
    pub new_displaced: u64,
    /// Permanent-residence geolocations created inside the month.
    pub returns: u64,
    /// Active migrants created before the end of the month.
    pub cumulative_total: u64,
}

/// Motive count for one motive type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotiveCount {
    /// Raw motive type tag as stored.
    pub motive_type: String,
    /// Number of motives with this tag.
    pub count: u64,
}

/// Geolocation totals used for shelter occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelterCounts {
    /// Geolocation rows in the window.
    pub total: u64,
    /// Rows whose shelter type is set and is not an official site.
    pub off_site: u64,
}

/// Raw demographic counts before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographicRaw {
    /// Active migrants in the window.
    pub total: u64,
    /// Of which female.
    pub female: u64,
    /// Of which born less than 18 years ago.
    pub children: u64,
    /// Of which born more than 65 years ago.
    pub elderly: u64,
    /// Known dates of birth, for the mean age.
    pub birth_dates: Vec<NaiveDate>,
}

/// Open high-severity alert count for one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneAlertCount {
    /// Zone (latest geolocation city, else migrant current city).
    pub zone: String,
    /// Number of alerts.
    pub alert_count: u64,
}

/// Return count on one origin → return route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRouteCount {
    /// Birth place of the migrant.
    pub origin_zone: String,
    /// City of the permanent-residence geolocation.
    pub return_zone: String,
    /// Number of returns.
    pub count: u64,
}

/// An alert joined with its migrant's current city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRow {
    /// Alert primary key.
    pub id: i64,
    /// Migrant the alert was raised for.
    pub migrant_id: i64,
    /// Current city of the migrant.
    pub zone: String,
    /// Free-form alert type tag.
    pub alert_type: String,
    /// Severity level.
    pub severity: SeverityLevel,
    /// When the alert was raised.
    pub created_at: DateTime<Utc>,
    /// Free-form description.
    pub description: Option<String>,
}

/// A row of the `migrants` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrantRecord {
    /// Primary key.
    pub id: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Whether the record is active.
    pub active: bool,
    /// `"M"` or `"F"`.
    pub sex: String,
    /// Date of birth, when known.
    pub birth_date: Option<NaiveDate>,
    /// Country of origin.
    pub origin_country: String,
    /// Current country.
    pub current_country: String,
    /// Current city.
    pub current_city: Option<String>,
    /// Place of birth.
    pub birth_place: Option<String>,
    /// Migratory status tag.
    pub migratory_status: String,
}

/// A row of the `motifs_deplacement` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotiveRecord {
    /// Primary key.
    pub id: i64,
    /// Owning migrant.
    pub migrant_id: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Motive type tag.
    pub motive_type: String,
    /// Armed conflict factor flag.
    pub armed_conflict: bool,
    /// Natural disaster factor flag.
    pub natural_disaster: bool,
    /// Persecution factor flag.
    pub persecution: bool,
    /// Generalised violence factor flag.
    pub generalised_violence: bool,
    /// Whether the departure was voluntary.
    pub voluntary: bool,
    /// Urgency tag.
    pub urgency: String,
}

/// A row of the `geolocalisations` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeolocationRecord {
    /// Primary key.
    pub id: i64,
    /// Owning migrant.
    pub migrant_id: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
    /// City.
    pub city: Option<String>,
    /// Country.
    pub country: Option<String>,
    /// Movement type tag.
    pub movement_type: Option<String>,
    /// Shelter type tag.
    pub shelter_type: Option<String>,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
}

/// A row of the `alertes` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Primary key.
    pub id: i64,
    /// Migrant the alert was raised for.
    pub migrant_id: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Alert type tag.
    pub alert_type: String,
    /// Severity level tag.
    pub severity: String,
    /// Status tag.
    pub status: String,
    /// Free-form description.
    pub description: Option<String>,
}

impl MigrantRecord {
    /// An active male migrant with no city or birth place, still in the
    /// country of origin.
    #[must_use]
    pub fn new(id: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            deleted_at: None,
            active: true,
            sex: "M".to_string(),
            birth_date: None,
            origin_country: "République Démocratique du Congo".to_string(),
            current_country: "République Démocratique du Congo".to_string(),
            current_city: None,
            birth_place: None,
            migratory_status: "deplace_interne".to_string(),
        }
    }

    /// Sets the current city.
    #[must_use]
    pub fn in_city(mut self, city: &str) -> Self {
        self.current_city = Some(city.to_string());
        self
    }
}

impl MotiveRecord {
    /// A motive with the given type tag and no factor flags.
    #[must_use]
    pub fn new(id: i64, migrant_id: i64, created_at: DateTime<Utc>, motive_type: &str) -> Self {
        Self {
            id,
            migrant_id,
            created_at,
            deleted_at: None,
            motive_type: motive_type.to_string(),
            armed_conflict: false,
            natural_disaster: false,
            persecution: false,
            generalised_violence: false,
            voluntary: false,
            urgency: "moyenne".to_string(),
        }
    }
}

impl GeolocationRecord {
    /// A geolocation with no city, movement or shelter tag.
    #[must_use]
    pub const fn new(id: i64, migrant_id: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            migrant_id,
            created_at,
            deleted_at: None,
            city: None,
            country: None,
            movement_type: None,
            shelter_type: None,
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

impl AlertRecord {
    /// An open alert of the given severity.
    #[must_use]
    pub fn new(
        id: i64,
        migrant_id: i64,
        created_at: DateTime<Utc>,
        severity: SeverityLevel,
    ) -> Self {
        Self {
            id,
            migrant_id,
            created_at,
            deleted_at: None,
            alert_type: "securite".to_string(),
            severity: severity.as_ref().to_string(),
            status: "active".to_string(),
            description: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn trailing_windows_cover_calendar_months() {
        let windows = MonthWindow::trailing(at(2025, 3, 15), 4);
        let labels: Vec<&str> = windows.iter().map(|w| w.label.as_str()).collect();
        assert_eq!(labels, ["2024-12", "2025-01", "2025-02", "2025-03"]);

        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(
            windows[0].start,
            Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            windows[3].end,
            Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn window_boundaries_are_half_open() {
        let windows = MonthWindow::trailing(at(2025, 2, 10), 2);
        let boundary = windows[1].start;
        assert!(!windows[0].contains(boundary));
        assert!(windows[1].contains(boundary));
    }

    #[test]
    fn trailing_months_uses_calendar_arithmetic() {
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 8, 0, 0).unwrap();
        let window = TimeWindow::trailing_months(now, 1);
        assert_eq!(
            window.since,
            Utc.with_ymd_and_hms(2025, 2, 28, 8, 0, 0).unwrap()
        );
        assert!(window.contains(window.since));
        assert!(!window.contains(now));
    }

    #[test]
    fn age_cutoffs() {
        let window = TimeWindow::trailing_months(at(2025, 6, 1), 12);
        assert_eq!(
            window.birth_cutoff(CHILD_MAX_AGE_YEARS),
            NaiveDate::from_ymd_opt(2007, 6, 1).unwrap()
        );
        assert_eq!(
            window.birth_cutoff(ELDERLY_MIN_AGE_YEARS),
            NaiveDate::from_ymd_opt(1960, 6, 1).unwrap()
        );
    }

    #[test]
    fn area_filter_from_params() {
        assert_eq!(AreaFilter::from_params(None, None), AreaFilter::None);
        assert_eq!(AreaFilter::from_params(Some("  "), None), AreaFilter::None);
        assert_eq!(
            AreaFilter::from_params(Some("Goma"), Some("RDC")),
            AreaFilter::City("Goma".to_string())
        );
        assert_eq!(
            AreaFilter::from_params(None, Some(" Congo ")),
            AreaFilter::Country("Congo".to_string())
        );
    }

    #[test]
    fn area_filter_matching() {
        let city = AreaFilter::City("Goma".to_string());
        assert!(city.matches(Some("Goma"), None));
        assert!(!city.matches(Some("goma"), None));
        assert!(!city.matches(None, Some("Goma")));

        let country = AreaFilter::Country("congo".to_string());
        assert!(country.matches(None, Some("République Démocratique du Congo")));
        assert!(!country.matches(Some("Congo"), Some("Rwanda")));

        assert!(AreaFilter::None.matches(None, None));
    }
}

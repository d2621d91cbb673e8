//! In-process [`DisplacementStore`] over plain record vectors.
//!
//! Mirrors the SQL primitives row for row: same activity and soft-delete
//! rules, same area matching, same ordering and tie-breaks. Used to run the
//! indicator builders and the HTTP layer without a database, and to inject
//! failures and latency into individual primitives.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use idp_watch_database_models::{
    AlertRecord, AlertRow, AreaFilter, CHILD_MAX_AGE_YEARS, DemographicRaw, ELDERLY_MIN_AGE_YEARS,
    GeolocationRecord, MigrantRecord, MonthWindow, MonthlyBucket, MotiveCount, MotiveRecord,
    ProvinceCount, ReturnRouteCount, ShelterCounts, TimeWindow, UNKNOWN_ZONE, ZoneAlertCount,
};
use idp_watch_displacement_models::{AlertStatus, MovementType, SeverityLevel, ShelterType};

use crate::{DbError, DisplacementStore, Primitive};

/// Record-backed store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    migrants: Vec<MigrantRecord>,
    motives: Vec<MotiveRecord>,
    geolocations: Vec<GeolocationRecord>,
    alerts: Vec<AlertRecord>,
    failing: HashSet<Primitive>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a migrant row.
    pub fn add_migrant(&mut self, migrant: MigrantRecord) {
        self.migrants.push(migrant);
    }

    /// Adds a displacement motive row.
    pub fn add_motive(&mut self, motive: MotiveRecord) {
        self.motives.push(motive);
    }

    /// Adds a geolocation row.
    pub fn add_geolocation(&mut self, geolocation: GeolocationRecord) {
        self.geolocations.push(geolocation);
    }

    /// Adds an alert row.
    pub fn add_alert(&mut self, alert: AlertRecord) {
        self.alerts.push(alert);
    }

    /// Makes `primitive` fail with a connection error on every call.
    pub fn fail_on(&mut self, primitive: Primitive) {
        self.failing.insert(primitive);
    }

    /// Delays every primitive by `latency` before it answers.
    pub const fn set_latency(&mut self, latency: Duration) {
        self.latency = Some(latency);
    }

    /// Number of primitive calls served so far, failed ones included.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    async fn enter(&self, primitive: Primitive) -> Result<(), DbError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.contains(&primitive) {
            return Err(DbError::Connection {
                message: format!("{primitive} unavailable"),
            });
        }

        Ok(())
    }

    fn migrant(&self, id: i64) -> Option<&MigrantRecord> {
        self.migrants.iter().find(|m| m.id == id && is_active(m))
    }

    fn active_migrants<'a>(
        &'a self,
        area: &'a AreaFilter,
    ) -> impl Iterator<Item = &'a MigrantRecord> + 'a {
        self.migrants
            .iter()
            .filter(|m| is_active(m))
            .filter(move |m| migrant_in_area(m, area))
    }

    /// Live geolocations of active migrants, filtered on the geolocation's
    /// own city and country.
    fn located<'a>(
        &'a self,
        area: &'a AreaFilter,
    ) -> impl Iterator<Item = (&'a GeolocationRecord, &'a MigrantRecord)> + 'a {
        self.geolocations
            .iter()
            .filter(|g| g.deleted_at.is_none())
            .filter(move |g| area.matches(g.city.as_deref(), g.country.as_deref()))
            .filter_map(move |g| self.migrant(g.migrant_id).map(|m| (g, m)))
    }

    fn returns_in<'a>(
        &'a self,
        span: &'a TimeWindow,
        area: &'a AreaFilter,
    ) -> impl Iterator<Item = (&'a GeolocationRecord, &'a MigrantRecord)> + 'a {
        self.located(area)
            .filter(|(g, _)| is_return(g))
            .filter(move |(g, _)| span.contains(g.created_at))
    }

    /// City of the migrant's most recent live geolocation, if it has one.
    fn latest_city(&self, migrant_id: i64) -> Option<&str> {
        self.geolocations
            .iter()
            .filter(|g| g.migrant_id == migrant_id && g.deleted_at.is_none())
            .max_by_key(|g| (g.created_at, g.id))
            .and_then(|g| non_empty(g.city.as_deref()))
    }

    fn open_alerts<'a>(
        &'a self,
        window: &'a TimeWindow,
        severities: &'a [SeverityLevel],
    ) -> impl Iterator<Item = (&'a AlertRecord, &'a MigrantRecord)> + 'a {
        self.alerts
            .iter()
            .filter(|a| a.deleted_at.is_none())
            .filter(|a| a.status.eq_ignore_ascii_case(AlertStatus::Active.as_ref()))
            .filter(move |a| {
                a.severity
                    .parse::<SeverityLevel>()
                    .is_ok_and(|level| severities.contains(&level))
            })
            .filter(move |a| window.contains(a.created_at))
            .filter_map(move |a| self.migrant(a.migrant_id).map(|m| (a, m)))
    }
}

fn is_active(m: &MigrantRecord) -> bool {
    m.active && m.deleted_at.is_none()
}

fn migrant_in_area(m: &MigrantRecord, area: &AreaFilter) -> bool {
    area.matches(m.current_city.as_deref(), Some(m.current_country.as_str()))
}

fn is_return(g: &GeolocationRecord) -> bool {
    g.movement_type.as_deref() == Some(MovementType::PermanentResidence.as_ref())
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

fn zone_or_unknown(s: Option<&str>) -> String {
    non_empty(s).unwrap_or(UNKNOWN_ZONE).to_string()
}

fn count_of(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

fn limit_of(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

#[async_trait]
impl DisplacementStore for MemoryStore {
    async fn count_active_migrants(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<u64, DbError> {
        self.enter(Primitive::CountActiveMigrants).await?;

        Ok(count_of(
            self.active_migrants(area)
                .filter(|m| window.contains(m.created_at))
                .count(),
        ))
    }

    async fn count_internal_displaced(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<u64, DbError> {
        self.enter(Primitive::CountInternalDisplaced).await?;

        Ok(count_of(
            self.active_migrants(area)
                .filter(|m| window.contains(m.created_at))
                .filter(|m| m.origin_country == m.current_country)
                .filter(|m| {
                    m.birth_place.as_deref().unwrap_or("")
                        != m.current_city.as_deref().unwrap_or("")
                })
                .count(),
        ))
    }

    async fn count_returns(&self, window: &TimeWindow, area: &AreaFilter) -> Result<u64, DbError> {
        self.enter(Primitive::CountReturns).await?;

        Ok(count_of(self.returns_in(window, area).count()))
    }

    async fn province_breakdown(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<Vec<ProvinceCount>, DbError> {
        self.enter(Primitive::ProvinceBreakdown).await?;

        let mut by_city: BTreeMap<String, u64> = BTreeMap::new();
        for m in self
            .active_migrants(area)
            .filter(|m| window.contains(m.created_at))
        {
            *by_city
                .entry(zone_or_unknown(m.current_city.as_deref()))
                .or_default() += 1;
        }

        let mut rows: Vec<ProvinceCount> = by_city
            .into_iter()
            .map(|(province, count)| ProvinceCount { province, count })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.province.cmp(&b.province)));
        Ok(rows)
    }

    async fn monthly_buckets(
        &self,
        windows: &[MonthWindow],
        area: &AreaFilter,
    ) -> Result<Vec<MonthlyBucket>, DbError> {
        self.enter(Primitive::MonthlyBuckets).await?;

        Ok(windows
            .iter()
            .map(|w| {
                let month = TimeWindow {
                    since: w.start,
                    until: w.end,
                };
                MonthlyBucket {
                    label: w.label.clone(),
                    new_displaced: count_of(
                        self.active_migrants(area)
                            .filter(|m| w.contains(m.created_at))
                            .count(),
                    ),
                    returns: count_of(self.returns_in(&month, area).count()),
                    cumulative_total: count_of(
                        self.active_migrants(area)
                            .filter(|m| m.created_at < w.end)
                            .count(),
                    ),
                }
            })
            .collect())
    }

    async fn motive_counts(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<Vec<MotiveCount>, DbError> {
        self.enter(Primitive::MotiveCounts).await?;

        let mut by_type: BTreeMap<String, u64> = BTreeMap::new();
        for d in self
            .motives
            .iter()
            .filter(|d| d.deleted_at.is_none())
            .filter(|d| window.contains(d.created_at))
            .filter(|d| {
                self.migrant(d.migrant_id)
                    .is_some_and(|m| migrant_in_area(m, area))
            })
        {
            *by_type.entry(d.motive_type.trim().to_string()).or_default() += 1;
        }

        let mut rows: Vec<MotiveCount> = by_type
            .into_iter()
            .map(|(motive_type, count)| MotiveCount { motive_type, count })
            .collect();
        rows.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.motive_type.cmp(&b.motive_type))
        });
        Ok(rows)
    }

    async fn shelter_occupancy(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<ShelterCounts, DbError> {
        self.enter(Primitive::ShelterOccupancy).await?;

        let mut counts = ShelterCounts::default();
        for (g, _) in self
            .located(area)
            .filter(|(g, _)| window.contains(g.created_at))
        {
            counts.total += 1;
            if non_empty(g.shelter_type.as_deref())
                .is_some_and(|s| s != ShelterType::OfficialSite.as_ref())
            {
                counts.off_site += 1;
            }
        }
        Ok(counts)
    }

    async fn demographic_raw(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<DemographicRaw, DbError> {
        self.enter(Primitive::DemographicRaw).await?;

        let child_cutoff = window.birth_cutoff(CHILD_MAX_AGE_YEARS);
        let elderly_cutoff = window.birth_cutoff(ELDERLY_MIN_AGE_YEARS);

        let mut raw = DemographicRaw::default();
        for m in self
            .active_migrants(area)
            .filter(|m| window.contains(m.created_at))
        {
            raw.total += 1;
            if m.sex.eq_ignore_ascii_case("F") {
                raw.female += 1;
            }
            if let Some(born) = m.birth_date {
                if born > child_cutoff {
                    raw.children += 1;
                }
                if born < elderly_cutoff {
                    raw.elderly += 1;
                }
                raw.birth_dates.push(born);
            }
        }
        Ok(raw)
    }

    async fn risk_zone_counts(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
        severities: &[SeverityLevel],
        limit: u32,
    ) -> Result<Vec<ZoneAlertCount>, DbError> {
        self.enter(Primitive::RiskZoneCounts).await?;

        let mut by_zone: BTreeMap<String, u64> = BTreeMap::new();
        for (_, m) in self.open_alerts(window, severities) {
            let latest = self.latest_city(m.id);
            let filter_city = latest.or(m.current_city.as_deref());
            if !area.matches(filter_city, Some(m.current_country.as_str())) {
                continue;
            }
            let zone = latest
                .or_else(|| non_empty(m.current_city.as_deref()))
                .unwrap_or(UNKNOWN_ZONE);
            *by_zone.entry(zone.to_string()).or_default() += 1;
        }

        let mut rows: Vec<ZoneAlertCount> = by_zone
            .into_iter()
            .map(|(zone, alert_count)| ZoneAlertCount { zone, alert_count })
            .collect();
        rows.sort_by(|a, b| {
            b.alert_count
                .cmp(&a.alert_count)
                .then_with(|| a.zone.cmp(&b.zone))
        });
        rows.truncate(limit_of(limit));
        Ok(rows)
    }

    async fn return_trend_counts(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
        limit: u32,
    ) -> Result<Vec<ReturnRouteCount>, DbError> {
        self.enter(Primitive::ReturnTrendCounts).await?;

        let mut by_route: BTreeMap<(String, String), u64> = BTreeMap::new();
        for (g, m) in self.returns_in(window, area) {
            let route = (
                zone_or_unknown(m.birth_place.as_deref()),
                zone_or_unknown(g.city.as_deref()),
            );
            *by_route.entry(route).or_default() += 1;
        }

        let mut rows: Vec<ReturnRouteCount> = by_route
            .into_iter()
            .map(|((origin_zone, return_zone), count)| ReturnRouteCount {
                origin_zone,
                return_zone,
                count,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.origin_zone.cmp(&b.origin_zone))
                .then_with(|| a.return_zone.cmp(&b.return_zone))
        });
        rows.truncate(limit_of(limit));
        Ok(rows)
    }

    async fn recent_alerts(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
        severities: &[SeverityLevel],
        limit: u32,
    ) -> Result<Vec<AlertRow>, DbError> {
        self.enter(Primitive::RecentAlerts).await?;

        let mut rows = Vec::new();
        for (a, m) in self
            .open_alerts(window, severities)
            .filter(|(_, m)| migrant_in_area(m, area))
        {
            let severity = a.severity.parse().map_err(|_| DbError::Conversion {
                message: format!("Unknown alert severity '{}'", a.severity),
            })?;
            rows.push(AlertRow {
                id: a.id,
                migrant_id: a.migrant_id,
                zone: zone_or_unknown(m.current_city.as_deref()),
                alert_type: a.alert_type.clone(),
                severity,
                created_at: a.created_at,
                description: a.description.clone(),
            });
        }

        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        rows.truncate(limit_of(limit));
        Ok(rows)
    }
}

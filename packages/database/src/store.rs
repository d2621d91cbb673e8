//! The query-executor capability injected into the indicator builders.

use std::sync::Arc;

use async_trait::async_trait;
use idp_watch_database_models::{
    AlertRow, AreaFilter, DemographicRaw, MonthWindow, MonthlyBucket, MotiveCount, ProvinceCount,
    ReturnRouteCount, ShelterCounts, TimeWindow, ZoneAlertCount,
};
use idp_watch_displacement_models::SeverityLevel;
use strum_macros::{AsRefStr, Display};
use switchy_database::Database;

use crate::{DbError, queries};

/// Names the read primitives, for logs and error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Primitive {
    /// [`DisplacementStore::count_active_migrants`]
    CountActiveMigrants,
    /// [`DisplacementStore::count_internal_displaced`]
    CountInternalDisplaced,
    /// [`DisplacementStore::count_returns`]
    CountReturns,
    /// [`DisplacementStore::province_breakdown`]
    ProvinceBreakdown,
    /// [`DisplacementStore::monthly_buckets`]
    MonthlyBuckets,
    /// [`DisplacementStore::motive_counts`]
    MotiveCounts,
    /// [`DisplacementStore::shelter_occupancy`]
    ShelterOccupancy,
    /// [`DisplacementStore::demographic_raw`]
    DemographicRaw,
    /// [`DisplacementStore::risk_zone_counts`]
    RiskZoneCounts,
    /// [`DisplacementStore::return_trend_counts`]
    ReturnTrendCounts,
    /// [`DisplacementStore::recent_alerts`]
    RecentAlerts,
}

/// Read primitives over the operational tables.
///
/// Implementations must be read-only and must not rely on any ordering
/// beyond what each method documents. Dropping a returned future abandons
/// the underlying query.
#[async_trait]
pub trait DisplacementStore: Send + Sync {
    /// Counts active migrants created in the window.
    async fn count_active_migrants(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<u64, DbError>;

    /// Counts active migrants whose origin country is their current country
    /// and whose birth place differs from their current city.
    async fn count_internal_displaced(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<u64, DbError>;

    /// Counts permanent-residence geolocations of active migrants.
    async fn count_returns(&self, window: &TimeWindow, area: &AreaFilter) -> Result<u64, DbError>;

    /// Groups active migrants by current city, largest first.
    async fn province_breakdown(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<Vec<ProvinceCount>, DbError>;

    /// Returns one bucket per window, in the order given.
    async fn monthly_buckets(
        &self,
        windows: &[MonthWindow],
        area: &AreaFilter,
    ) -> Result<Vec<MonthlyBucket>, DbError>;

    /// Groups motives of active migrants by motive type tag.
    async fn motive_counts(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<Vec<MotiveCount>, DbError>;

    /// Counts geolocations and those outside official sites.
    async fn shelter_occupancy(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<ShelterCounts, DbError>;

    /// Collects raw demographic counts, with ages measured at the window end.
    async fn demographic_raw(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<DemographicRaw, DbError>;

    /// Ranks zones by open alerts of the given severities, at most `limit`.
    async fn risk_zone_counts(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
        severities: &[SeverityLevel],
        limit: u32,
    ) -> Result<Vec<ZoneAlertCount>, DbError>;

    /// Groups returns by origin and return zone, at most `limit`.
    async fn return_trend_counts(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
        limit: u32,
    ) -> Result<Vec<ReturnRouteCount>, DbError>;

    /// Lists open alerts of the given severities, newest first, at most
    /// `limit`.
    async fn recent_alerts(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
        severities: &[SeverityLevel],
        limit: u32,
    ) -> Result<Vec<AlertRow>, DbError>;
}

/// [`DisplacementStore`] backed by a `PostgreSQL` connection.
#[derive(Clone)]
pub struct SqlStore {
    db: Arc<dyn Database>,
}

impl SqlStore {
    /// Wraps an open connection.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

impl std::fmt::Debug for SqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl DisplacementStore for SqlStore {
    async fn count_active_migrants(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<u64, DbError> {
        queries::count_active_migrants(self.db.as_ref(), window, area).await
    }

    async fn count_internal_displaced(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<u64, DbError> {
        queries::count_internal_displaced(self.db.as_ref(), window, area).await
    }

    async fn count_returns(&self, window: &TimeWindow, area: &AreaFilter) -> Result<u64, DbError> {
        queries::count_returns(self.db.as_ref(), window, area).await
    }

    async fn province_breakdown(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<Vec<ProvinceCount>, DbError> {
        queries::province_breakdown(self.db.as_ref(), window, area).await
    }

    async fn monthly_buckets(
        &self,
        windows: &[MonthWindow],
        area: &AreaFilter,
    ) -> Result<Vec<MonthlyBucket>, DbError> {
        queries::monthly_buckets(self.db.as_ref(), windows, area).await
    }

    async fn motive_counts(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<Vec<MotiveCount>, DbError> {
        queries::motive_counts(self.db.as_ref(), window, area).await
    }

    async fn shelter_occupancy(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<ShelterCounts, DbError> {
        queries::shelter_occupancy(self.db.as_ref(), window, area).await
    }

    async fn demographic_raw(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
    ) -> Result<DemographicRaw, DbError> {
        queries::demographic_raw(self.db.as_ref(), window, area).await
    }

    async fn risk_zone_counts(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
        severities: &[SeverityLevel],
        limit: u32,
    ) -> Result<Vec<ZoneAlertCount>, DbError> {
        queries::risk_zone_counts(self.db.as_ref(), window, area, severities, limit).await
    }

    async fn return_trend_counts(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
        limit: u32,
    ) -> Result<Vec<ReturnRouteCount>, DbError> {
        queries::return_trend_counts(self.db.as_ref(), window, area, limit).await
    }

    async fn recent_alerts(
        &self,
        window: &TimeWindow,
        area: &AreaFilter,
        severities: &[SeverityLevel],
        limit: u32,
    ) -> Result<Vec<AlertRow>, DbError> {
        queries::recent_alerts(self.db.as_ref(), window, area, severities, limit).await
    }
}

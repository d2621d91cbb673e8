//! Request-level assembly of the indicator documents.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use idp_watch_database::{DisplacementStore, Primitive};
use idp_watch_database_models::{AreaFilter, TimeWindow};
use idp_watch_displacement_models::SeverityLevel;
use idp_watch_indicators_models::{
    AlerteTempsReel, AlertesTempsReelResponse, IndicateursDeplacementResponse,
    MotifPieChartResponse, RepartitionResponse,
};

use crate::period::{bounded_days, bounded_months};
use crate::{
    IndicatorRequest, IndicatorsConfig, IndicatorsError, Period, causes, dynamics, volume,
    vulnerability,
};

/// Stateless façade over the four builders.
///
/// Holds only the store and the configuration; every call recomputes its
/// document from scratch under the configured deadline. Dropping a returned
/// future cancels every primitive still in flight.
#[derive(Clone)]
pub struct IndicatorsService {
    store: Arc<dyn DisplacementStore>,
    config: Arc<IndicatorsConfig>,
}

impl std::fmt::Debug for IndicatorsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorsService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IndicatorsService {
    /// Creates a service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DisplacementStore>, config: IndicatorsConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &IndicatorsConfig {
        &self.config
    }

    /// Builds the full indicators document, running the four builders
    /// concurrently. The first failure aborts the others.
    ///
    /// # Errors
    ///
    /// Returns [`IndicatorsError::Query`] or [`IndicatorsError::Invariant`]
    /// from the builders, or [`IndicatorsError::DeadlineExceeded`].
    pub async fn indicators(
        &self,
        months: u32,
        area: &AreaFilter,
        now: DateTime<Utc>,
    ) -> Result<IndicateursDeplacementResponse, IndicatorsError> {
        let period = self.period(months, now);
        log::debug!("Building indicators for {} over {area}", period.label());
        let req = self.request(&period, area);

        let (volume, causes, vulnerability, dynamics) = self
            .with_deadline(async {
                tokio::try_join!(
                    volume::build(&req),
                    causes::build(&req),
                    vulnerability::build(&req),
                    dynamics::build(&req),
                )
            })
            .await?;

        Ok(IndicateursDeplacementResponse {
            volume_localisation: volume,
            causes_deplacements: causes,
            vulnerabilite_besoins: vulnerability,
            dynamiques_alerte: dynamics,
            date_generation: now,
            periode_analyse: period.label(),
        })
    }

    /// Builds the province breakdown alone.
    ///
    /// # Errors
    ///
    /// Returns [`IndicatorsError::Query`] or
    /// [`IndicatorsError::DeadlineExceeded`].
    pub async fn repartition(
        &self,
        months: u32,
        area: &AreaFilter,
        now: DateTime<Utc>,
    ) -> Result<RepartitionResponse, IndicatorsError> {
        let period = self.period(months, now);
        log::debug!("Building repartition for {} over {area}", period.label());
        let req = self.request(&period, area);

        let repartition_provinces = self
            .with_deadline(volume::build_repartition(&req))
            .await?;

        Ok(RepartitionResponse {
            repartition_provinces,
            date_mise_a_jour: now,
            periode_analyse: period.label(),
        })
    }

    /// Builds the motive pie chart.
    ///
    /// # Errors
    ///
    /// Returns [`IndicatorsError::Query`] or
    /// [`IndicatorsError::DeadlineExceeded`].
    pub async fn motive_pie(
        &self,
        months: u32,
        area: &AreaFilter,
        now: DateTime<Utc>,
    ) -> Result<MotifPieChartResponse, IndicatorsError> {
        let period = self.period(months, now);
        log::debug!("Building motive pie for {} over {area}", period.label());
        let req = self.request(&period, area);

        let (donnees, total_motifs) = self.with_deadline(causes::build_pie(&req)).await?;

        Ok(MotifPieChartResponse {
            donnees,
            total_motifs,
            periode_analyse: period.label(),
            date_generation: now,
        })
    }

    /// Lists open alerts of the given severities raised in the last `days`
    /// days, newest first. An empty severity list means danger and
    /// critical.
    ///
    /// # Errors
    ///
    /// Returns [`IndicatorsError::Query`] or
    /// [`IndicatorsError::DeadlineExceeded`].
    pub async fn realtime_alerts(
        &self,
        levels: &[SeverityLevel],
        days: u32,
        area: &AreaFilter,
        now: DateTime<Utc>,
    ) -> Result<AlertesTempsReelResponse, IndicatorsError> {
        let levels = if levels.is_empty() {
            SeverityLevel::high_risk()
        } else {
            levels
        };
        let days = bounded_days(days, &self.config.period);
        let window = TimeWindow::trailing_days(now, days);
        log::debug!("Listing {levels:?} alerts of the last {days} days over {area}");

        let rows = self
            .with_deadline(async {
                self.store
                    .recent_alerts(&window, area, levels, self.config.limits.realtime_alerts)
                    .await
                    .map_err(|source| {
                        log::error!(
                            "{} failed (since {}, {days} days, {area}): {source}",
                            Primitive::RecentAlerts,
                            window.since.to_rfc3339()
                        );
                        IndicatorsError::Query {
                            primitive: Primitive::RecentAlerts,
                            source,
                        }
                    })
            })
            .await?;

        let alertes: Vec<AlerteTempsReel> = rows
            .into_iter()
            .map(|a| AlerteTempsReel {
                id: a.id,
                migrant_id: a.migrant_id,
                zone: a.zone,
                type_alerte: a.alert_type,
                niveau_gravite: a.severity,
                date_detection: a.created_at,
                description: a.description,
            })
            .collect();

        Ok(AlertesTempsReelResponse {
            nombre_total: u64::try_from(alertes.len()).unwrap_or(u64::MAX),
            alertes,
            niveaux: levels.to_vec(),
            periode_jours: days,
            date_mise_a_jour: now,
        })
    }

    fn period(&self, months: u32, now: DateTime<Utc>) -> Period {
        Period::new(bounded_months(months, &self.config.period), now)
    }

    fn request<'a>(&'a self, period: &'a Period, area: &'a AreaFilter) -> IndicatorRequest<'a> {
        IndicatorRequest {
            store: self.store.as_ref(),
            period,
            area,
            config: &self.config,
        }
    }

    async fn with_deadline<T>(
        &self,
        work: impl Future<Output = Result<T, IndicatorsError>>,
    ) -> Result<T, IndicatorsError> {
        let timeout = self.config.request_timeout();
        tokio::time::timeout(timeout, work).await.map_err(|_| {
            log::error!("Indicators request exceeded its {timeout:?} deadline");
            IndicatorsError::DeadlineExceeded { timeout }
        })?
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{NaiveDate, TimeZone as _};
    use idp_watch_database::MemoryStore;
    use idp_watch_database_models::{
        AlertRecord, GeolocationRecord, MigrantRecord, MotiveRecord,
    };
    use idp_watch_displacement_models::MotiveFamily;
    use idp_watch_indicators_models::RepartitionProvince;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now() - chrono::Duration::days(days)
    }

    fn service(store: MemoryStore) -> IndicatorsService {
        IndicatorsService::new(Arc::new(store), IndicatorsConfig::default())
    }

    fn populated() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.add_migrant(MigrantRecord {
            sex: "F".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1995, 3, 2),
            birth_place: Some("Rutshuru".to_string()),
            ..MigrantRecord::new(1, days_ago(40)).in_city("Goma")
        });
        store.add_migrant(MigrantRecord::new(2, days_ago(90)).in_city("Bunia"));
        store.add_motive(MotiveRecord::new(1, 1, days_ago(40), "war"));
        store.add_motive(MotiveRecord::new(2, 2, days_ago(90), "drought"));
        store.add_geolocation(GeolocationRecord {
            city: Some("Rutshuru".to_string()),
            movement_type: Some("residence_permanente".to_string()),
            shelter_type: Some("famille_accueil".to_string()),
            ..GeolocationRecord::new(1, 1, days_ago(4))
        });
        store.add_alert(AlertRecord::new(1, 1, days_ago(2), SeverityLevel::Danger));
        store
    }

    #[tokio::test]
    async fn empty_database_yields_zeroed_document() {
        let doc = service(MemoryStore::new())
            .indicators(12, &AreaFilter::None, now())
            .await
            .unwrap();

        let v = &doc.volume_localisation;
        assert_eq!(v.nombre_total_migrants, 0);
        assert_eq!(v.evolution_mensuelle.len(), 12);
        assert!(v.evolution_mensuelle.iter().all(|m| m.total_cumule == 0));
        for family in MotiveFamily::all() {
            assert!(doc.causes_deplacements.family_percent(*family).abs() < f64::EPSILON);
        }
        let s = doc.vulnerabilite_besoins.acces_services_base;
        assert!((s.eau_potable - 75.5).abs() < f64::EPSILON);
        assert!((s.soins_sante - 68.2).abs() < f64::EPSILON);
        assert!((s.education - 82.3).abs() < f64::EPSILON);
        assert!((s.logement - 58.7).abs() < f64::EPSILON);
        assert!(doc.dynamiques_alerte.zones_haut_risque.is_empty());
        assert_eq!(doc.periode_analyse, "12 derniers mois");
        assert_eq!(doc.date_generation, now());
    }

    #[tokio::test]
    async fn one_girl_in_kinshasa_over_one_month() {
        let mut store = MemoryStore::new();
        store.add_migrant(MigrantRecord {
            sex: "F".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2010, 1, 1),
            ..MigrantRecord::new(1, now() - chrono::Duration::hours(1)).in_city("Kinshasa")
        });

        let doc = service(store)
            .indicators(1, &AreaFilter::None, now())
            .await
            .unwrap();

        let v = &doc.volume_localisation;
        assert_eq!(v.nombre_total_migrants, 1);
        assert_eq!(
            v.repartition_provinces,
            vec![RepartitionProvince {
                province: "Kinshasa".to_string(),
                nombre: 1,
                pourcentage: 100.0,
            }]
        );
        let p = &doc.vulnerabilite_besoins.profil_demographique;
        assert!((p.pourcentage_femmes - 100.0).abs() < f64::EPSILON);
        assert!((p.pourcentage_enfants - 100.0).abs() < f64::EPSILON);
        assert_eq!(v.evolution_mensuelle.len(), 1);
        assert_eq!(doc.periode_analyse, "1 derniers mois");
    }

    #[tokio::test]
    async fn out_of_range_counts_fall_back_to_defaults() {
        let svc = service(populated());

        let doc = svc
            .indicators(u32::MAX, &AreaFilter::None, now())
            .await
            .unwrap();
        assert_eq!(doc.periode_analyse, "12 derniers mois");
        assert_eq!(doc.volume_localisation.evolution_mensuelle.len(), 12);

        let rep = svc.repartition(0, &AreaFilter::None, now()).await.unwrap();
        assert_eq!(rep.periode_analyse, "12 derniers mois");

        let pie = svc
            .motive_pie(121, &AreaFilter::None, now())
            .await
            .unwrap();
        assert_eq!(pie.periode_analyse, "12 derniers mois");

        let feed = svc
            .realtime_alerts(&[], u32::MAX, &AreaFilter::None, now())
            .await
            .unwrap();
        assert_eq!(feed.periode_jours, 7);
        assert_eq!(feed.nombre_total, 1);
    }

    #[tokio::test]
    async fn fans_out_every_primitive_once() {
        let store = Arc::new(populated());
        let svc = IndicatorsService::new(store.clone(), IndicatorsConfig::default());

        let doc = svc.indicators(6, &AreaFilter::None, now()).await.unwrap();

        assert_eq!(store.calls(), 12);
        assert_eq!(doc.volume_localisation.nombre_total_migrants, 2);
        assert_eq!(doc.volume_localisation.retournes, 1);
        assert_eq!(doc.vulnerabilite_besoins.deplaces_hors_sites, 1);
        assert_eq!(doc.dynamiques_alerte.alertes_precoces.len(), 1);
        assert_eq!(doc.periode_analyse, "6 derniers mois");
    }

    #[tokio::test]
    async fn identical_requests_serialize_identically() {
        let svc = service(populated());
        let a = svc.indicators(12, &AreaFilter::None, now()).await.unwrap();
        let b = svc.indicators(12, &AreaFilter::None, now()).await.unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[tokio::test]
    async fn one_failing_primitive_fails_the_whole_document() {
        let mut store = populated();
        store.fail_on(Primitive::ShelterOccupancy);

        let err = service(store)
            .indicators(12, &AreaFilter::None, now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndicatorsError::Query {
                primitive: Primitive::ShelterOccupancy,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_hits_the_deadline() {
        let mut store = populated();
        store.set_latency(Duration::from_secs(30));

        let err = service(store)
            .indicators(12, &AreaFilter::None, now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndicatorsError::DeadlineExceeded { timeout } if timeout == Duration::from_secs(10)
        ));
    }

    #[tokio::test]
    async fn repartition_and_pie_variants() {
        let svc = service(populated());

        let rep = svc
            .repartition(12, &AreaFilter::None, now())
            .await
            .unwrap();
        assert_eq!(rep.repartition_provinces.len(), 2);
        assert_eq!(rep.periode_analyse, "12 derniers mois");

        let pie = svc
            .motive_pie(12, &AreaFilter::City("Goma".to_string()), now())
            .await
            .unwrap();
        assert_eq!(pie.total_motifs, 1);
        assert_eq!(pie.donnees.len(), 5);
        assert_eq!(pie.donnees[0].nombre, 1);
        assert!((pie.donnees[0].pourcentage - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn realtime_alerts_keep_the_last_days_newest_first() {
        let mut store = MemoryStore::new();
        store.add_migrant(MigrantRecord::new(1, days_ago(100)).in_city("Goma"));
        store.add_alert(AlertRecord::new(1, 1, days_ago(2), SeverityLevel::Danger));
        store.add_alert(AlertRecord::new(
            2,
            1,
            days_ago(2) + chrono::Duration::hours(3),
            SeverityLevel::Critical,
        ));
        store.add_alert(AlertRecord::new(3, 1, days_ago(10), SeverityLevel::Critical));
        store.add_alert(AlertRecord::new(4, 1, days_ago(1), SeverityLevel::Warning));

        let feed = service(store)
            .realtime_alerts(&[], 7, &AreaFilter::None, now())
            .await
            .unwrap();

        let ids: Vec<i64> = feed.alertes.iter().map(|a| a.id).collect();
        assert_eq!(ids, [2, 1]);
        assert_eq!(feed.nombre_total, 2);
        assert_eq!(
            feed.niveaux,
            [SeverityLevel::Danger, SeverityLevel::Critical]
        );
        assert_eq!(feed.periode_jours, 7);
    }
}

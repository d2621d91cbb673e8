//! Volume and localisation indicators.

use idp_watch_database::Primitive;
use idp_watch_database_models::{MonthlyBucket, ProvinceCount};
use idp_watch_indicators_models::{EvolutionMensuelle, RepartitionProvince, VolumeLocalisation};

use crate::{IndicatorRequest, IndicatorsError, allocate_percents};

/// Builds the volume and localisation indicators.
///
/// # Errors
///
/// Returns [`IndicatorsError::Query`] if any primitive fails and
/// [`IndicatorsError::Invariant`] if the monthly series is incomplete.
pub async fn build(req: &IndicatorRequest<'_>) -> Result<VolumeLocalisation, IndicatorsError> {
    let window = &req.period.window;
    let month_windows = req.period.month_windows();

    let (total, internal, returned, provinces, buckets) = tokio::try_join!(
        req.run(
            Primitive::CountActiveMigrants,
            req.store.count_active_migrants(window, req.area),
        ),
        req.run(
            Primitive::CountInternalDisplaced,
            req.store.count_internal_displaced(window, req.area),
        ),
        req.run(
            Primitive::CountReturns,
            req.store.count_returns(window, req.area),
        ),
        req.run(
            Primitive::ProvinceBreakdown,
            req.store.province_breakdown(window, req.area),
        ),
        req.run(
            Primitive::MonthlyBuckets,
            req.store.monthly_buckets(&month_windows, req.area),
        ),
    )?;

    let expected = usize::try_from(req.period.months).unwrap_or(usize::MAX);
    if buckets.len() != expected {
        return Err(IndicatorsError::Invariant {
            message: format!(
                "monthly series has {} buckets for {} months",
                buckets.len(),
                req.period.months
            ),
        });
    }

    Ok(VolumeLocalisation {
        nombre_total_pdi: total,
        nombre_total_migrants: total,
        deplaces_internes: internal,
        retournes: returned,
        repartition_provinces: repartition(provinces),
        evolution_mensuelle: buckets.into_iter().map(evolution).collect(),
    })
}

/// Builds the province breakdown alone.
///
/// # Errors
///
/// Returns [`IndicatorsError::Query`] if the primitive fails.
pub async fn build_repartition(
    req: &IndicatorRequest<'_>,
) -> Result<Vec<RepartitionProvince>, IndicatorsError> {
    let provinces = req
        .run(
            Primitive::ProvinceBreakdown,
            req.store.province_breakdown(&req.period.window, req.area),
        )
        .await?;
    Ok(repartition(provinces))
}

/// Attaches percentages computed against the sum of the returned counts.
#[must_use]
pub fn repartition(provinces: Vec<ProvinceCount>) -> Vec<RepartitionProvince> {
    let counts: Vec<u64> = provinces.iter().map(|p| p.count).collect();
    provinces
        .into_iter()
        .zip(allocate_percents(&counts))
        .map(|(p, pourcentage)| RepartitionProvince {
            pourcentage,
            province: p.province,
            nombre: p.count,
        })
        .collect()
}

fn evolution(bucket: MonthlyBucket) -> EvolutionMensuelle {
    EvolutionMensuelle {
        periode: bucket.label,
        nouveaux_deplaces: bucket.new_displaced,
        retours: bucket.returns,
        total_cumule: bucket.cumulative_total,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone as _, Utc};
    use idp_watch_database::MemoryStore;
    use idp_watch_database_models::{AreaFilter, GeolocationRecord, MigrantRecord};

    use super::*;
    use crate::{IndicatorsConfig, Period};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now() - chrono::Duration::days(days)
    }

    async fn volume(store: &MemoryStore, months: u32, area: &AreaFilter) -> VolumeLocalisation {
        let config = IndicatorsConfig::default();
        let period = Period::new(months, now());
        build(&IndicatorRequest {
            store,
            period: &period,
            area,
            config: &config,
        })
        .await
        .unwrap()
    }

    fn populated() -> MemoryStore {
        let mut store = MemoryStore::new();
        let cities = ["Goma", "Goma", "Goma", "Bunia", "Bunia", "Kinshasa", "Beni"];
        for (i, city) in (1..).zip(cities) {
            store.add_migrant(MigrantRecord::new(i, days_ago(i * 20)).in_city(city));
        }
        store.add_migrant(MigrantRecord::new(100, days_ago(5)));
        store.add_migrant(MigrantRecord::new(101, days_ago(900)).in_city("Goma"));
        store.add_geolocation(GeolocationRecord {
            city: Some("Rutshuru".to_string()),
            movement_type: Some("residence_permanente".to_string()),
            ..GeolocationRecord::new(1, 1, days_ago(10))
        });
        store
    }

    #[test]
    fn repartition_of_nothing_is_empty() {
        assert!(repartition(Vec::new()).is_empty());
    }

    #[test]
    fn repartition_percentages_sum_to_hundred() {
        let rows = repartition(vec![
            ProvinceCount {
                province: "A".to_string(),
                count: 1,
            },
            ProvinceCount {
                province: "B".to_string(),
                count: 1,
            },
            ProvinceCount {
                province: "C".to_string(),
                count: 1,
            },
        ]);
        let sum: f64 = rows.iter().map(|r| r.pourcentage).sum();
        assert!((sum - 100.0).abs() <= 0.5);
        assert!((rows[0].pourcentage - 33.34).abs() < 1e-9);
        assert!((rows[2].pourcentage - 33.33).abs() < 1e-9);
    }

    #[tokio::test]
    async fn many_small_provinces_still_sum_to_hundred() {
        let mut store = MemoryStore::new();
        for id in 1..=300 {
            let city = format!("Ville {id:03}");
            store.add_migrant(MigrantRecord::new(id, days_ago(3)).in_city(&city));
        }

        let v = volume(&store, 12, &AreaFilter::None).await;
        assert_eq!(v.repartition_provinces.len(), 300);
        let sum: f64 = v.repartition_provinces.iter().map(|p| p.pourcentage).sum();
        assert!((sum - 100.0).abs() <= 0.5, "sum was {sum}");
        assert!((sum - 100.0).abs() < 1e-6, "sum was {sum}");
    }

    #[tokio::test]
    async fn empty_store_yields_zeroed_series() {
        let v = volume(&MemoryStore::new(), 12, &AreaFilter::None).await;
        assert_eq!(v.nombre_total_migrants, 0);
        assert_eq!(v.nombre_total_pdi, 0);
        assert_eq!(v.deplaces_internes, 0);
        assert_eq!(v.retournes, 0);
        assert!(v.repartition_provinces.is_empty());
        assert_eq!(v.evolution_mensuelle.len(), 12);
        assert!(v.evolution_mensuelle.iter().all(|m| m.nouveaux_deplaces == 0
            && m.retours == 0
            && m.total_cumule == 0));
    }

    #[tokio::test]
    async fn province_percentages_sum_to_hundred() {
        let v = volume(&populated(), 12, &AreaFilter::None).await;
        assert!(v.nombre_total_migrants > 0);
        let sum: f64 = v.repartition_provinces.iter().map(|p| p.pourcentage).sum();
        assert!((sum - 100.0).abs() <= 0.5, "sum was {sum}");
    }

    #[tokio::test]
    async fn displaced_equals_migrants() {
        let v = volume(&populated(), 12, &AreaFilter::None).await;
        assert_eq!(v.nombre_total_pdi, v.nombre_total_migrants);
        assert_eq!(v.nombre_total_migrants, 8);
        assert_eq!(v.retournes, 1);
    }

    #[tokio::test]
    async fn cumulative_total_never_decreases() {
        for area in [
            AreaFilter::None,
            AreaFilter::City("Goma".to_string()),
            AreaFilter::Country("congo".to_string()),
        ] {
            let v = volume(&populated(), 24, &area).await;
            for pair in v.evolution_mensuelle.windows(2) {
                assert!(pair[1].total_cumule >= pair[0].total_cumule);
            }
        }
    }

    #[tokio::test]
    async fn cumulative_total_includes_older_records() {
        let v = volume(&populated(), 12, &AreaFilter::None).await;
        let first = &v.evolution_mensuelle[0];
        let last = v.evolution_mensuelle.last().unwrap();
        assert!(first.total_cumule >= 1);
        assert_eq!(last.total_cumule, 9);
    }

    #[tokio::test]
    async fn one_more_migrant_moves_only_its_city() {
        let before = volume(&populated(), 12, &AreaFilter::None).await;

        let mut store = populated();
        store.add_migrant(MigrantRecord::new(200, days_ago(1)).in_city("Bunia"));
        let after = volume(&store, 12, &AreaFilter::None).await;

        assert_eq!(after.nombre_total_migrants, before.nombre_total_migrants + 1);
        let count = |v: &VolumeLocalisation, city: &str| {
            v.repartition_provinces
                .iter()
                .find(|p| p.province == city)
                .map_or(0, |p| p.nombre)
        };
        assert_eq!(count(&after, "Bunia"), count(&before, "Bunia") + 1);
        for city in ["Goma", "Kinshasa", "Beni"] {
            assert_eq!(count(&after, city), count(&before, city));
        }
        assert_eq!(after.retournes, before.retournes);
    }

    #[tokio::test]
    async fn city_filters_partition_the_total() {
        let store = populated();
        let all = volume(&store, 12, &AreaFilter::None).await;

        let mut sum = 0;
        for p in &all.repartition_provinces {
            let filtered = volume(&store, 12, &AreaFilter::City(p.province.clone())).await;
            sum += filtered
                .repartition_provinces
                .iter()
                .map(|r| r.nombre)
                .sum::<u64>();
        }
        let unknown = all
            .repartition_provinces
            .iter()
            .find(|p| p.province == idp_watch_database_models::UNKNOWN_ZONE)
            .map_or(0, |p| p.nombre);
        assert_eq!(sum + unknown, all.nombre_total_migrants);
    }
}

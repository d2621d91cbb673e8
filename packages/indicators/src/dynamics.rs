//! Dynamics and alert indicators.

use idp_watch_database::Primitive;
use idp_watch_database_models::{AlertRow, ReturnRouteCount, ZoneAlertCount};
use idp_watch_displacement_models::{RiskLevel, SeverityLevel, ThreatType, TrendDirection};
use idp_watch_indicators_models::{AlertePrecoce, DynamiquesAlerte, TendanceRetour, ZoneRisque};

use crate::config::{RiskThresholds, TrendThresholds};
use crate::{IndicatorRequest, IndicatorsError};

/// Builds the dynamics and alert indicators.
///
/// # Errors
///
/// Returns [`IndicatorsError::Query`] if any primitive fails.
pub async fn build(req: &IndicatorRequest<'_>) -> Result<DynamiquesAlerte, IndicatorsError> {
    let window = &req.period.window;
    let recent = req
        .period
        .trailing_days(req.config.period.recent_movement_days);
    let limits = &req.config.limits;

    let (zones, routes, alerts, recent_movements) = tokio::try_join!(
        req.run(
            Primitive::RiskZoneCounts,
            req.store.risk_zone_counts(
                window,
                req.area,
                SeverityLevel::high_risk(),
                limits.risk_zones,
            ),
        ),
        req.run(
            Primitive::ReturnTrendCounts,
            req.store
                .return_trend_counts(window, req.area, limits.return_trends),
        ),
        req.run(
            Primitive::RecentAlerts,
            req.store.recent_alerts(
                window,
                req.area,
                SeverityLevel::all(),
                limits.early_alerts,
            ),
        ),
        req.run(
            Primitive::CountActiveMigrants,
            req.store.count_active_migrants(&recent, req.area),
        ),
    )?;

    Ok(DynamiquesAlerte {
        zones_haut_risque: zones
            .into_iter()
            .map(|z| risk_zone(z, &req.config.risk))
            .collect(),
        tendances_retour: routes
            .into_iter()
            .map(|r| return_trend(r, &req.config.trend))
            .collect(),
        alertes_precoces: alerts.into_iter().map(early_alert).collect(),
        mouvements_massifs_recents: recent_movements,
    })
}

/// Classifies a zone and estimates the population at risk.
#[must_use]
pub fn risk_zone(zone: ZoneAlertCount, thresholds: &RiskThresholds) -> ZoneRisque {
    ZoneRisque {
        niveau_risque: RiskLevel::from_alert_count(
            zone.alert_count,
            thresholds.high_min,
            thresholds.critical_min,
        ),
        type_menace: ThreatType::Multiple,
        population_a_risque: zone
            .alert_count
            .saturating_mul(thresholds.population_multiplier),
        zone: zone.zone,
    }
}

/// Classifies a return route.
#[must_use]
pub fn return_trend(route: ReturnRouteCount, thresholds: &TrendThresholds) -> TendanceRetour {
    TendanceRetour {
        tendance: TrendDirection::from_return_count(
            route.count,
            thresholds.declining_max,
            thresholds.rising_min,
        ),
        nombre_retours: route.count,
        zone_origine: route.origin_zone,
        zone_retour: route.return_zone,
    }
}

fn early_alert(alert: AlertRow) -> AlertePrecoce {
    AlertePrecoce {
        zone: alert.zone,
        type_alerte: alert.alert_type,
        niveau_gravite: alert.severity,
        date_detection: alert.created_at,
        description: alert.description,
    }
}

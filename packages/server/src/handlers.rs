//! HTTP handler functions for the overview API.

use actix_web::{HttpResponse, web};
use chrono::Utc;
use idp_watch_indicators::IndicatorsError;
use idp_watch_indicators::period::{resolve_days, resolve_months};
use idp_watch_server_models::{AlertesQueryParams, ApiError, ApiHealth, OverviewQueryParams};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/overview/indicateurs`
///
/// Returns the four indicator families for the requested period and area.
pub async fn indicateurs(
    state: web::Data<AppState>,
    params: web::Query<OverviewQueryParams>,
) -> HttpResponse {
    let service = &state.indicators;
    let months = resolve_months(params.periode.as_deref(), &service.config().period);

    match service
        .indicators(months, &params.area(), Utc::now())
        .await
    {
        Ok(doc) => HttpResponse::Ok().json(doc),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/overview/alertes`
///
/// Lists recent open alerts filtered by severity.
pub async fn alertes(
    state: web::Data<AppState>,
    params: web::Query<AlertesQueryParams>,
) -> HttpResponse {
    let service = &state.indicators;
    let days = resolve_days(params.jours.as_deref(), &service.config().period);

    match service
        .realtime_alerts(&params.levels(), days, &params.area(), Utc::now())
        .await
    {
        Ok(doc) => HttpResponse::Ok().json(doc),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/overview/repartition`
pub async fn repartition(
    state: web::Data<AppState>,
    params: web::Query<OverviewQueryParams>,
) -> HttpResponse {
    let service = &state.indicators;
    let months = resolve_months(params.periode.as_deref(), &service.config().period);

    match service
        .repartition(months, &params.area(), Utc::now())
        .await
    {
        Ok(doc) => HttpResponse::Ok().json(doc),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/overview/motifs-pie`
pub async fn motifs_pie(
    state: web::Data<AppState>,
    params: web::Query<OverviewQueryParams>,
) -> HttpResponse {
    let service = &state.indicators;
    let months = resolve_months(params.periode.as_deref(), &service.config().period);

    match service
        .motive_pie(months, &params.area(), Utc::now())
        .await
    {
        Ok(doc) => HttpResponse::Ok().json(doc),
        Err(e) => error_response(&e),
    }
}

/// Maps an indicators failure to a status code and an opaque body.
fn error_response(e: &IndicatorsError) -> HttpResponse {
    match e {
        IndicatorsError::DeadlineExceeded { .. } => {
            log::warn!("Request abandoned: {e}");
            HttpResponse::GatewayTimeout().json(ApiError::new("Indicators took too long"))
        }
        IndicatorsError::Query { .. }
        | IndicatorsError::Config { .. }
        | IndicatorsError::Invariant { .. } => {
            log::error!("Request failed: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to compute indicators"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::http::StatusCode;
    use actix_web::{App, test, web};
    use chrono::Utc;
    use idp_watch_database::{MemoryStore, Primitive};
    use idp_watch_database_models::{AlertRecord, MigrantRecord, MotiveRecord};
    use idp_watch_displacement_models::SeverityLevel;
    use idp_watch_indicators::{IndicatorsConfig, IndicatorsService};
    use serde_json::Value;

    use crate::{AppState, configure};

    fn state(store: MemoryStore, config: IndicatorsConfig) -> web::Data<AppState> {
        web::Data::new(AppState {
            indicators: IndicatorsService::new(Arc::new(store), config),
        })
    }

    fn seeded() -> MemoryStore {
        let now = Utc::now();
        let mut store = MemoryStore::new();
        store.add_migrant(MigrantRecord::new(1, now - chrono::Duration::days(5)).in_city("Goma"));
        store.add_migrant(MigrantRecord::new(2, now - chrono::Duration::days(6)).in_city("Beni"));
        store.add_motive(MotiveRecord::new(
            1,
            1,
            now - chrono::Duration::days(5),
            "armed_conflict",
        ));
        store.add_alert(AlertRecord::new(
            1,
            1,
            now - chrono::Duration::days(1),
            SeverityLevel::Critical,
        ));
        store.add_alert(AlertRecord::new(
            2,
            2,
            now - chrono::Duration::days(2),
            SeverityLevel::Info,
        ));
        store
    }

    async fn get(data: web::Data<AppState>, uri: &str) -> (StatusCode, Value) {
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let (status, body) = get(
            state(MemoryStore::new(), IndicatorsConfig::default()),
            "/api/health",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], true);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn invalid_periode_falls_back_to_twelve_months() {
        for uri in [
            "/api/overview/indicateurs?periode=0",
            "/api/overview/indicateurs?periode=abc",
        ] {
            let (status, body) = get(state(seeded(), IndicatorsConfig::default()), uri).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["periode_analyse"], "12 derniers mois");
            assert_eq!(
                body["volume_localisation"]["evolution_mensuelle"]
                    .as_array()
                    .map(Vec::len),
                Some(12)
            );
        }
    }

    #[actix_web::test]
    async fn indicateurs_honours_province() {
        let (status, body) = get(
            state(seeded(), IndicatorsConfig::default()),
            "/api/overview/indicateurs?periode=3&province=Goma",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["periode_analyse"], "3 derniers mois");
        assert_eq!(body["volume_localisation"]["nombre_total_migrants"], 1);
        assert_eq!(
            body["causes_deplacements"]["pourcentage_conflits_armes"],
            100.0
        );
    }

    #[actix_web::test]
    async fn query_failure_is_opaque_500() {
        let mut store = seeded();
        store.fail_on(Primitive::MotiveCounts);

        let (status, body) = get(
            state(store, IndicatorsConfig::default()),
            "/api/overview/indicateurs",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to compute indicators");
        assert!(body.get("volume_localisation").is_none());
    }

    #[actix_web::test]
    async fn slow_store_yields_504() {
        let mut store = seeded();
        store.set_latency(Duration::from_millis(200));
        let config = IndicatorsConfig {
            request_timeout_ms: 20,
            ..IndicatorsConfig::default()
        };

        let (status, body) = get(state(store, config), "/api/overview/repartition").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"], "Indicators took too long");
    }

    #[actix_web::test]
    async fn alertes_default_to_high_risk_levels() {
        let (status, body) = get(
            state(seeded(), IndicatorsConfig::default()),
            "/api/overview/alertes?jours=abc",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["periode_jours"], 7);
        assert_eq!(body["nombre_total"], 1);
        assert_eq!(body["alertes"][0]["niveau_gravite"], "critical");
        assert_eq!(body["alertes"][0]["zone"], "Goma");
    }

    #[actix_web::test]
    async fn alertes_accept_explicit_levels() {
        let (status, body) = get(
            state(seeded(), IndicatorsConfig::default()),
            "/api/overview/alertes?niveaux=INFO,bogus&jours=30",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["niveaux"], serde_json::json!(["info"]));
        assert_eq!(body["nombre_total"], 1);
        assert_eq!(body["alertes"][0]["zone"], "Beni");
    }

    #[actix_web::test]
    async fn motifs_pie_has_five_slices() {
        let (status, body) = get(
            state(seeded(), IndicatorsConfig::default()),
            "/api/overview/motifs-pie?periode=6",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["donnees"].as_array().map(Vec::len), Some(5));
        assert_eq!(body["total_motifs"], 1);
        assert_eq!(body["periode_analyse"], "6 derniers mois");
    }

    #[actix_web::test]
    async fn repartition_counts_each_city() {
        let (status, body) = get(
            state(seeded(), IndicatorsConfig::default()),
            "/api/overview/repartition",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let provinces = body["repartition_provinces"].as_array().cloned().unwrap();
        assert_eq!(provinces.len(), 2);
        assert_eq!(provinces[0]["pourcentage"], 50.0);
    }
}

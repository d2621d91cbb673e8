#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the displacement overview dashboard.
//!
//! Exposes the indicator documents under `/api/overview` as JSON. Every
//! endpoint is read-only and recomputes its answer on each request.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use idp_watch_database::{SqlStore, db};
use idp_watch_indicators::{IndicatorsConfig, IndicatorsService};

/// Shared application state.
pub struct AppState {
    /// Indicator service over the operational database.
    pub indicators: IndicatorsService,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .service(
                web::scope("/overview")
                    .route("/indicateurs", web::get().to(handlers::indicateurs))
                    .route("/alertes", web::get().to(handlers::alertes))
                    .route("/repartition", web::get().to(handlers::repartition))
                    .route("/motifs-pie", web::get().to(handlers::motifs_pie)),
            ),
    );
}

/// Starts the HTTP server.
///
/// Reads `DATABASE_URL`, `BIND_ADDR`, `PORT` and, when set, the indicator
/// configuration file named by `IDP_INDICATORS_CONFIG`.
///
/// # Errors
///
/// Returns an error if the database is unreachable, the configuration is
/// invalid, or the server fails to bind.
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = IndicatorsConfig::load_from_env().map_err(std::io::Error::other)?;

    log::info!("Connecting to database...");
    let db_conn = db::connect_from_env()
        .await
        .map_err(std::io::Error::other)?;

    let store = SqlStore::new(Arc::from(db_conn));
    let state = web::Data::new(AppState {
        indicators: IndicatorsService::new(Arc::new(store), config),
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}

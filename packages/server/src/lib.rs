#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the anomaly map dashboard.
//!
//! Loads the observation dataset, the county adjacency list, and the
//! county boundary polygons once at startup, then serves the scoring,
//! rollup, and divergence endpoints over the shared immutable snapshot.
//! Each request is a pure function of that snapshot; nothing is
//! persisted between requests.

mod handlers;

use std::path::PathBuf;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use anomaly_map_dataset::SnapshotStore;
use anomaly_map_geography::adjacency::Adjacency;
use anomaly_map_geography::boundaries::CountyBoundaries;

/// Default source for the California county boundary polygons.
pub const DEFAULT_COUNTY_GEOJSON_URL: &str = "https://raw.githubusercontent.com/codeforamerica/click_that_hood/master/public/data/california-counties.geojson";

/// Shared application state.
pub struct AppState {
    /// The observation dataset snapshot store.
    pub dataset: SnapshotStore,
    /// County boundary polygons, loaded once.
    pub boundaries: CountyBoundaries,
    /// County adjacency list, loaded once.
    pub adjacency: Adjacency,
    /// Where the dataset CSV lives, for reloads.
    pub data_path: PathBuf,
}

/// Starts the anomaly map API server.
///
/// Loads the dataset and adjacency CSVs, fetches the county boundary
/// document, and starts the Actix-Web HTTP server. This is a regular
/// async function — the caller provides the runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind
/// or encounters a runtime error.
///
/// # Panics
///
/// Panics if the dataset or adjacency CSVs cannot be loaded, or the
/// county boundary document cannot be fetched.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let data_path = PathBuf::from(
        std::env::var("DATA_PATH").unwrap_or_else(|_| "data/observations.csv".to_string()),
    );
    log::info!("Loading observation dataset...");
    let dataset =
        anomaly_map_dataset::load_csv(&data_path).expect("Failed to load observation dataset");

    let neighbors_path = PathBuf::from(
        std::env::var("NEIGHBORS_PATH").unwrap_or_else(|_| "data/county_neighbors.csv".to_string()),
    );
    log::info!("Loading county adjacency...");
    let adjacency =
        Adjacency::load_csv(&neighbors_path).expect("Failed to load county adjacency list");

    let boundaries_url = std::env::var("COUNTY_GEOJSON_URL")
        .unwrap_or_else(|_| DEFAULT_COUNTY_GEOJSON_URL.to_string());
    let boundaries = CountyBoundaries::fetch(&boundaries_url)
        .await
        .expect("Failed to fetch county boundaries");

    let state = web::Data::new(AppState {
        dataset: SnapshotStore::new(dataset),
        boundaries,
        adjacency,
        data_path,
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health))
                    .route("/columns", web::get().to(handlers::columns))
                    .route("/counties", web::get().to(handlers::counties))
                    .route("/neighbors/{fips}", web::get().to(handlers::neighbors))
                    .route(
                        "/analyze/conditional-probability",
                        web::post().to(handlers::analyze),
                    )
                    .route("/map/counties", web::post().to(handlers::county_map))
                    .route("/map/hexes", web::post().to(handlers::hex_map))
                    .route(
                        "/map/neighbor-divergence",
                        web::get().to(handlers::neighbor_divergence),
                    )
                    .route(
                        "/map/neighbor-divergence-merged",
                        web::post().to(handlers::neighbor_divergence_merged),
                    )
                    .route("/compare/counties", web::post().to(handlers::compare_counties))
                    .route("/county/{fips}", web::post().to(handlers::county_detail))
                    .route("/reload", web::post().to(handlers::reload)),
            )
    })
    .bind((bind_addr, port))?
    .run()
    .await
}

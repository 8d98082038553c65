//! Classroom photo tracker with cached upload analytics.
//!
//! Students photograph whatever ends up on the board and upload it tagged by
//! course, instructor and term. Besides plain record storage, the backend
//! answers analytical questions over the upload stream: which courses get
//! the most uploads, who the top contributors are, and how many distinct
//! contributors a course has seen.
//!
//!
//!
//! # Architecture
//!
//! - Records live in the event store ([`store`]), which also implements the
//!   grouped-statistics aggregation (match, group, sort, paginate, join).
//! - Derived query results are cached ([`cache`]) under deterministic keys
//!   with a TTL; any photo mutation invalidates the derived-query key
//!   prefixes rather than chasing exact keys.
//! - Distinct-contributor counts come from per-scope HyperLogLog sketches
//!   ([`counter`]), never from scanning the store.
//! - The query façade ([`analytics`]) ties the three together and is the
//!   only path between the HTTP handlers and the derived queries.
//!
//! Analytics are eventually consistent: a read racing a write may see a
//! stale cached result or a not-yet-counted contributor, bounded by the gap
//! between the store write and the invalidation/counter calls (and in the
//! worst case by the TTL).
//!
//!
//!
//! # Running
//!
//! ```sh
//! REDIS_URL=redis://localhost:6379 SEED_DEMO=true cargo run
//! ```
//!
//! Without `REDIS_URL` the server falls back to an in-process cache, which
//! is enough for development and tests.
//!
//! | Variable                | Default | Purpose                           |
//! |-------------------------|---------|-----------------------------------|
//! | `RUST_PORT`             | 1111    | Listen port                       |
//! | `REDIS_URL`             | unset   | Cache backend                     |
//! | `SEARCH_TTL_SECONDS`    | 300     | TTL for cached search pages       |
//! | `ANALYTICS_TTL_SECONDS` | 60      | TTL for cached aggregate queries  |
//! | `HLL_PRECISION`         | 14      | Sketch registers = 2^precision    |
//! | `SEED_DEMO`             | false   | Load the demo dataset on startup  |

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post, put},
    Router,
};
use tokio::{
    net::TcpListener,
    signal::{
        ctrl_c,
        unix::{signal, SignalKind},
    },
};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod analytics;
pub mod cache;
pub mod config;
pub mod counter;
pub mod error;
pub mod models;
pub mod routes;
pub mod seed;
pub mod state;
pub mod store;

use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/usuarios",
            post(routes::create_contributor).get(routes::list_contributors),
        )
        .route("/usuarios/:id", put(routes::update_contributor))
        .route(
            "/professores",
            post(routes::create_instructor).get(routes::list_instructors),
        )
        .route("/professores/:id", put(routes::update_instructor))
        .route(
            "/disciplinas",
            post(routes::create_course).get(routes::list_courses),
        )
        .route("/disciplinas/:id", put(routes::update_course))
        .route("/fotos", post(routes::create_photo))
        .route("/fotos/search", get(routes::search_photos))
        .route(
            "/fotos/:id",
            get(routes::get_photo)
                .put(routes::update_photo)
                .delete(routes::delete_photo),
        )
        .route("/analytics/by-course", get(routes::course_stats))
        .route("/analytics/top-contributors", get(routes::top_contributors))
        .route(
            "/analytics/unique-contributors",
            get(routes::unique_contributors),
        )
        .with_state(state)
}

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    if state.config.seed_demo {
        seed::load_demo_data(&state.store);
    }

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = router(state.clone()).layer(cors);

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

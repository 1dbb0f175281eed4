pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod routes;
pub mod services;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use models::chat::ChatState;
use services::llm::LlmClient;

/// Shared application state passed to all Axum handlers and the worker.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: redis::Client,
    pub config: config::AppConfig,
    pub llm: LlmClient,
    pub chat: ChatState,
}

/// Build the full API router. Shared between `main` and the integration tests.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::health::root))
        .route("/health/live", get(routes::health::live))
        .route("/health/ready", get(routes::health::ready))
        .route("/upload", post(routes::documents::upload))
        .route("/delete", post(routes::documents::delete))
        .route("/create_namespace", post(routes::documents::create_namespace))
        .route("/delete_namespace", post(routes::documents::delete_namespace))
        .route(
            "/namespace_info/{namespace}",
            get(routes::documents::namespace_info),
        )
        .route("/start_bot", post(routes::chat::start_bot))
        .route("/send_message", post(routes::chat::send_message))
        .route(
            "/get_example_questions/{namespace}",
            get(routes::chat::get_example_questions),
        )
        .route("/set_project_info", post(routes::projects::set_project_info))
        .route("/get_project_info", get(routes::projects::get_project_info))
        .route("/trigger_assessment", post(routes::tasks::trigger_assessment))
        .route("/test_worker", get(routes::tasks::test_worker))
        .route("/task_status/{task_id}", get(routes::tasks::task_status))
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

//! enlist is a small user registration API.

#![forbid(unsafe_code)]
pub mod config;
pub mod database;
pub mod error;
mod router;
pub mod telemetry;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::get;
use axum::{Router, middleware as AxumMiddleware};
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};

pub use error::ServerError;

use config::Configuration;
use database::{ConnectionError, Database};
use user::{PgUserRepository, RegistrationService, UserRepository};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Configuration>,
    pub users: Arc<dyn UserRepository>,
    pub registration: RegistrationService,
}

impl AppState {
    /// Build the state around an already reachable store.
    pub fn new(config: Arc<Configuration>, users: Arc<dyn UserRepository>) -> Self {
        Self {
            registration: RegistrationService::new(Arc::clone(&users)),
            config,
            users,
        }
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.http.timeout_secs);
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any),
        );

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        // `GET /health/ready` goes to `ready`.
        .route("/health/ready", get(router::status::ready))
        .merge(router::users::router(&state.config.prefix))
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Connect to the store and build the application state.
///
/// Returns once the store is reachable and migrated, so the caller must
/// not bind its listener before this succeeds.
pub async fn initialize_state(
    config: Arc<Configuration>,
    database_url: &str,
) -> Result<AppState, ConnectionError> {
    let db = Database::connect(database_url, &config.database).await?;
    db.migrate().await?;

    let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(db.postgres));
    Ok(AppState::new(config, users))
}

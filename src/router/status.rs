//! Service identification and readiness.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::config::Configuration;

/// Structured configuration.
#[derive(Debug, Serialize, Deserialize)]
pub struct Status {
    name: String,
    version: String,
}

/// Public server status.
pub async fn status(State(config): State<Arc<Configuration>>) -> Json<Status> {
    Json(Status {
        name: config.name.clone(),
        version: config.version().to_owned(),
    })
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Ready,
    Unavailable,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub status: Readiness,
}

/// Whether the store answers; `503` otherwise.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    match state.users.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: Readiness::Ready,
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "store is not reachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: Readiness::Unavailable,
                }),
            )
        },
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;

    use super::*;
    use crate::*;

    #[tokio::test]
    async fn test_status() {
        let (state, _) = router::state();
        let response =
            make_request(app(state), Method::GET, "/status.json", String::default()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Status = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.name, env!("CARGO_PKG_NAME"));
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_ready() {
        let (state, _) = router::state();
        let response =
            make_request(app(state), Method::GET, "/health/ready", String::default()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: ReadinessResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.status, Readiness::Ready);
    }

    #[tokio::test]
    async fn test_not_ready() {
        let state = router::unreachable_state(config::Configuration::default());
        let response =
            make_request(app(state), Method::GET, "/health/ready", String::default()).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: ReadinessResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.status, Readiness::Unavailable);
    }
}

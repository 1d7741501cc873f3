//! List every registered user.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::user::User;

pub async fn handler(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    let users = state
        .users
        .find_all()
        .await
        .map_err(|err| ServerError::from(err).disclose(&state.config.errors))?;

    Ok(Json(users))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;

    use crate::config::{Configuration, ErrorPolicy};
    use crate::error::INTERNAL_MESSAGE;
    use crate::user::{NewUser, User, UserRepository};
    use crate::*;

    const PATH: &str = "/api/users";

    #[tokio::test]
    async fn test_list_empty_store() {
        let (state, _) = router::state();
        let response = make_request(app(state), Method::GET, PATH, String::default()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Vec<User> = serde_json::from_slice(&body).unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_list_users() {
        let (state, repo) = router::state();
        let ann = repo.create(&NewUser::new("Ann", "a@x.com", "p")).await.unwrap();
        let bob = repo.create(&NewUser::new("Bob", "b@x.com", "q")).await.unwrap();

        let response = make_request(app(state), Method::GET, PATH, String::default()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Vec<User> = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, vec![ann, bob]);
    }

    #[tokio::test]
    async fn test_list_store_failure() {
        let state = router::unreachable_state(Configuration::default());
        let response = make_request(app(state), Method::GET, PATH, String::default()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["message"], INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn test_list_store_failure_exposed() {
        let mut config = Configuration::default();
        config.errors = ErrorPolicy {
            expose_store_details: true,
            ..Default::default()
        };
        let state = router::unreachable_state(config);
        let response = make_request(app(state), Method::GET, PATH, String::default()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_ne!(body["message"], INTERNAL_MESSAGE);
        assert!(body["message"].as_str().unwrap().contains("SQL request failed"));
    }
}

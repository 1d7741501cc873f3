//! Users-related HTTP API.
mod list;

use axum::Router;
use axum::routing::get;

use crate::AppState;
use crate::router::create;

/// Users routes under `prefix`, with or without a trailing slash.
pub fn router(prefix: &str) -> Router<AppState> {
    // `GET {prefix}` goes to `list`.
    // `POST {prefix}` goes to `create`.
    let users = get(list::handler).post(create::handler);

    Router::new()
        .route(prefix, users.clone())
        .route(&format!("{prefix}/"), users)
}

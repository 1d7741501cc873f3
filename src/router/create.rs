use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::{Json, http::StatusCode};

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::user::{NewUser, User};

/// Handler to register a user.
pub async fn handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<User>)> {
    let disclose = |err: ServerError| err.disclose(&state.config.errors);

    let Json(body) = body.map_err(|err| disclose(err.into()))?;
    let user = state.registration.register(body).await.map_err(disclose)?;

    Ok((StatusCode::CREATED, Json(user)))
}

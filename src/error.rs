//! Error handler for enlist.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::config::ErrorPolicy;
use crate::user::StoreError;

pub type Result<T> = std::result::Result<T, ServerError>;

pub const DUPLICATE_EMAIL_MESSAGE: &str = "User already exists";
pub const INTERNAL_MESSAGE: &str = "Internal server error.";
const INVALID_BODY_MESSAGE: &str = "Invalid request body.";

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Json(#[from] JsonRejection),

    #[error("{}", DUPLICATE_EMAIL_MESSAGE)]
    DuplicateEmail,

    #[error("{source}")]
    Store {
        source: StoreError,
        /// Whether `source` may be shown to the client.
        expose: bool,
    },
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => ServerError::DuplicateEmail,
            source => ServerError::Store {
                source,
                expose: false,
            },
        }
    }
}

impl ServerError {
    /// Apply the configured disclosure policy to this error.
    ///
    /// Validation details are hidden from clients when
    /// `expose_validation_details` is off; raw store errors are only
    /// returned when `expose_store_details` is on.
    pub fn disclose(self, policy: &ErrorPolicy) -> Self {
        match self {
            ServerError::Store { source, .. } => ServerError::Store {
                source,
                expose: policy.expose_store_details,
            },
            ServerError::Validation(_) | ServerError::Json(_)
                if !policy.expose_validation_details =>
            {
                ServerError::Validation(ValidationErrors::new())
            },
            err => err,
        }
    }

    /// HTTP status code returned for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_)
            | ServerError::Json(_)
            | ServerError::DuplicateEmail => StatusCode::BAD_REQUEST,
            ServerError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    #[serde(skip)]
    status: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `message` field.
    pub fn message(mut self, message: &str) -> Self {
        self.message = message.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        let errors = parse_validation_errors(errors);
        self.errors = (!errors.is_empty()).then_some(errors);
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(self) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            message: INTERNAL_MESSAGE.to_owned(),
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default().status(self.status());

        let response = match &self {
            ServerError::Validation(errors) if errors.is_empty() => {
                response.message(INVALID_BODY_MESSAGE)
            },
            ServerError::Validation(errors) => {
                response.message(INVALID_BODY_MESSAGE).errors(errors)
            },
            ServerError::Json(rejection) => response.message(&rejection.body_text()),
            ServerError::DuplicateEmail => response.message(DUPLICATE_EMAIL_MESSAGE),
            ServerError::Store { source, expose } => {
                tracing::error!(error = %source, "store request failed");

                if *expose {
                    response.message(&source.to_string())
                } else {
                    response
                }
            },
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({ "message": INTERNAL_MESSAGE })
                .to_string()
                .into(),
        )
        .unwrap_or_else(|_| Response::new(INTERNAL_MESSAGE.into()))
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use validator::ValidationError;

    use super::*;

    async fn body_of(err: ServerError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn store_error() -> StoreError {
        StoreError::Sql(sqlx::Error::PoolTimedOut)
    }

    #[tokio::test]
    async fn test_duplicate_email_is_bad_request() {
        let (status, body) = body_of(StoreError::DuplicateEmail.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], DUPLICATE_EMAIL_MESSAGE);
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_store_error_is_hidden_by_default() {
        let err = ServerError::from(store_error()).disclose(&ErrorPolicy::default());
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn test_store_error_exposed_by_policy() {
        let policy = ErrorPolicy {
            expose_store_details: true,
            ..Default::default()
        };
        let err = ServerError::from(store_error()).disclose(&policy);
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], store_error().to_string());
    }

    #[tokio::test]
    async fn test_validation_errors_listed() {
        let mut errors = ValidationErrors::new();
        errors.add(
            "name",
            ValidationError::new("length").with_message("Name is required.".into()),
        );

        let (status, body) = body_of(ServerError::Validation(errors.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "name");
        assert_eq!(body["errors"][0]["message"], "Name is required.");

        let policy = ErrorPolicy {
            expose_validation_details: false,
            ..Default::default()
        };
        let (status, body) =
            body_of(ServerError::Validation(errors).disclose(&policy)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], INVALID_BODY_MESSAGE);
        assert!(body.get("errors").is_none());
    }
}

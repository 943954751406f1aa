use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::{models::ApiResponse, AppState};

/// Text of a server-side failure, carried in the response extensions so
/// [`expose_error_detail`] can put it back in the body.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Missing/invalid/expired token, or bad credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but acting on someone else's resource
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("URL limit reached ({limit}/{limit}). Please upgrade your account.")]
    QuotaExceeded { limit: i64 },

    #[error("could not allocate a unique short code after {0} attempts")]
    CodeSpaceExhausted(usize),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CodeSpaceExhausted(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The response envelope for this error. Server-side failures get a
    /// generic message; the detail goes into `error` only when `expose` is set.
    pub fn envelope(&self, expose: bool) -> ApiResponse<()> {
        let status = self.status_code();
        if status.is_server_error() {
            let detail = expose.then(|| self.to_string());
            ApiResponse::failure("Internal server error", detail)
        } else {
            ApiResponse::failure(self.to_string(), None)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self.envelope(false))).into_response();
        if status.is_server_error() {
            tracing::error!("Request failed: {:?}", self);
            response.extensions_mut().insert(ErrorDetail(self.to_string()));
        }
        response
    }
}

/// Response middleware. Outside production, 5xx envelopes get the error
/// detail in their `error` field.
pub async fn expose_error_detail(State(state): State<Arc<AppState>>, response: Response) -> Response {
    if state.config.environment.is_production() {
        return response;
    }
    match response.extensions().get::<ErrorDetail>().cloned() {
        Some(ErrorDetail(detail)) => (
            response.status(),
            Json(ApiResponse::failure("Internal server error", Some(detail))),
        )
            .into_response(),
        None => response,
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<(String, String)> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid"));
                    (field.clone(), message)
                })
            })
            .collect();
        messages.sort();

        let joined = messages
            .into_iter()
            .map(|(_, message)| message)
            .collect::<Vec<_>>()
            .join(", ");
        AppError::Validation(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Environment,
        test_utils::{send, test_app, test_config, test_state_with},
    };
    use axum::http::Method;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::QuotaExceeded { limit: 100 }.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::CodeSpaceExhausted(10).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn quota_message_names_the_limit() {
        let err = AppError::QuotaExceeded { limit: 100 };
        assert_eq!(
            err.to_string(),
            "URL limit reached (100/100). Please upgrade your account."
        );
    }

    #[test]
    fn client_errors_carry_their_message() {
        let body = AppError::NotFound("URL not found".into()).envelope(false);
        assert!(!body.success);
        assert_eq!(body.message.as_deref(), Some("URL not found"));
        assert!(body.error.is_none());
    }

    #[test]
    fn server_errors_hide_detail_unless_exposed() {
        let err = AppError::Internal("disk on fire".into());

        let hidden = err.envelope(false);
        assert_eq!(hidden.message.as_deref(), Some("Internal server error"));
        assert!(hidden.error.is_none());

        let shown = err.envelope(true);
        assert_eq!(shown.message.as_deref(), Some("Internal server error"));
        assert_eq!(shown.error.as_deref(), Some("disk on fire"));
    }

    async fn failing_health(environment: Environment) -> (StatusCode, serde_json::Value) {
        let mut config = test_config();
        config.environment = environment;
        let state = test_state_with(config).await;
        state.db.close().await;
        send(&test_app(state), Method::GET, "/health", None, None).await
    }

    #[tokio::test]
    async fn development_responses_carry_error_detail() {
        let (status, body) = failing_health(Environment::Development).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal server error");
        assert!(body["error"].as_str().unwrap().starts_with("database error"));
    }

    #[tokio::test]
    async fn production_responses_hide_error_detail() {
        let (status, body) = failing_health(Environment::Production).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("error").is_none());
    }
}

//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::services::ledger::LedgerError;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (connection error, query error, constraint violation).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No valid session, or wrong credentials on login.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Authentication required")]
    Unauthorized,

    /// The session is valid but lacks the role or admin flag the operation needs.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("You do not have access to this resource")]
    Forbidden,

    /// The account has not finished onboarding yet.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Onboarding must be completed first")]
    OnboardingRequired,

    /// Requested record does not exist or is not visible to the caller.
    ///
    /// Returns HTTP 404 Not Found. The string names the resource.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The record is in a state that does not allow the requested transition.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("{0}")]
    InvalidState(String),

    /// A uniqueness rule was violated (duplicate email, duplicate application).
    ///
    /// Returns HTTP 409 Conflict.
    #[error("{0}")]
    Conflict(String),

    /// Wallet has insufficient balance or escrow for the requested operation.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Insufficient balance")]
    InsufficientBalance,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Webhook signature missing or not matching the payload.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// The payment gateway rejected a call or could not be reached.
    ///
    /// Returns HTTP 502 Bad Gateway.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Unexpected failure (hashing, token encoding). Details are logged, not returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance | LedgerError::InsufficientEscrow => {
                AppError::InsufficientBalance
            }
            LedgerError::NonPositiveAmount => {
                AppError::InvalidRequest("Amount must be positive".to_string())
            }
        }
    }
}

impl AppError {
    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::OnboardingRequired => (StatusCode::FORBIDDEN, "onboarding_required"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::InsufficientBalance => {
                (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_balance")
            }
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::InvalidSignature => (StatusCode::UNAUTHORIZED, "invalid_signature"),
            AppError::Gateway(_) => (StatusCode::BAD_GATEWAY, "gateway_error"),
            AppError::Database(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Database and internal errors are logged and replaced by a generic message.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match self {
            AppError::InvalidRequest(ref msg) => msg.clone(),
            AppError::Database(ref e) => {
                tracing::error!(error = %e, "database error");
                "An internal error occurred".to_string()
            }
            AppError::Internal(ref e) => {
                tracing::error!(error = %e, "internal error");
                "An internal error occurred".to_string()
            }
            ref other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn invalid_request_keeps_its_message() {
        let resp = AppError::InvalidRequest("Amount must be positive".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "invalid_request");
        assert_eq!(body["error"]["message"], "Amount must be positive");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let resp = AppError::Internal("argon2 blew up".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(resp).await;
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }

    #[test]
    fn state_conflicts_map_to_409() {
        let (status, code) = AppError::InvalidState("already approved".into()).status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "invalid_state");
    }

    #[test]
    fn ledger_errors_convert() {
        assert!(matches!(
            AppError::from(LedgerError::InsufficientEscrow),
            AppError::InsufficientBalance
        ));
        assert!(matches!(
            AppError::from(LedgerError::NonPositiveAmount),
            AppError::InvalidRequest(_)
        ));
    }
}

//! HTTP error envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::AuthError;
use crate::chain::ChainError;
use crate::fraud::FraudIndicators;
use crate::gate::Rejection;
use crate::models::FormField;

pub type AppResult<T> = Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{field} flagged as attack")]
    Blocked { field: FormField, confidence: f64 },
    #[error("fraud heuristics flagged the transaction")]
    FraudSuspected(FraudIndicators),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Blocked { .. } | AppError::FraudSuspected(_) => StatusCode::FORBIDDEN,
            AppError::Auth(AuthError::Hashing(_) | AuthError::Signing(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Chain(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Blocked { field, confidence } => AppError::Blocked { field, confidence },
            Rejection::FraudSuspected(indicators) => AppError::FraudSuspected(indicators),
            Rejection::InvalidSender(raw) => {
                AppError::Validation(format!("Invalid sender address: {raw}"))
            }
            Rejection::ClassifierUnavailable => {
                AppError::Unavailable("ML model not loaded".to_string())
            }
            Rejection::Chain(err) => AppError::Chain(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Blocked { field, confidence } => json!({
                "error": "Security threat detected - Transaction blocked",
                "status": "blocked",
                "field": field,
                "confidence": confidence,
            }),
            AppError::FraudSuspected(indicators) => json!({
                "error": "Transaction flagged by fraud heuristics",
                "status": "blocked",
                "indicators": indicators,
            }),
            AppError::Auth(AuthError::InvalidCredentials) => json!({
                "error": "Invalid credentials",
                "status": status.as_u16(),
            }),
            AppError::Auth(AuthError::Hashing(msg) | AuthError::Signing(msg)) => {
                tracing::error!("auth internal error: {}", msg);
                json!({ "error": "Error generating token", "status": status.as_u16() })
            }
            AppError::Auth(_) => json!({
                "error": "Invalid or expired token",
                "status": status.as_u16(),
            }),
            AppError::Chain(err) => {
                tracing::error!("chain error: {}", err);
                json!({ "error": format!("Blockchain error: {err}"), "status": status.as_u16() })
            }
            AppError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                json!({ "error": "Internal server error", "status": status.as_u16() })
            }
            AppError::Validation(msg) | AppError::Unavailable(msg) => {
                json!({ "error": msg, "status": status.as_u16() })
            }
        };

        (status, Json(body)).into_response()
    }
}

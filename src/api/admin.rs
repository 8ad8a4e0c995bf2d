use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{parse_json_object, AppState};
use crate::auth::{AdminSession, AuthError};
use crate::error::{AppError, AppResult};
use crate::logs::{self, DashboardStats, LogEntry, LogStats};
use crate::stats::GateSnapshot;

const CREDENTIALS_REQUIRED: &str = "Username and password are required";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    token: String,
    username: String,
    expires_in: i64,
    message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    logs: Vec<LogEntry>,
    stats: LogStats,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    #[serde(flatten)]
    totals: DashboardStats,
    live: GateSnapshot,
}

pub async fn login(State(state): State<AppState>, body: Bytes) -> AppResult<Json<LoginResponse>> {
    let request: LoginRequest = parse_json_object(&body, CREDENTIALS_REQUIRED)?;
    let non_empty = |v: &String| !v.is_empty();
    let (Some(username), Some(password)) = (
        request.username.filter(non_empty),
        request.password.filter(non_empty),
    ) else {
        return Err(AppError::Validation(CREDENTIALS_REQUIRED.to_string()));
    };

    // argon2 verification is CPU-bound
    let auth = state.auth.clone();
    let attempted = username.clone();
    let outcome = tokio::task::spawn_blocking(move || auth.login(&attempted, &password))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    match outcome {
        Ok(issued) => {
            tracing::info!(username = %issued.username, "admin logged in");
            Ok(Json(LoginResponse {
                token: issued.token,
                username: issued.username,
                expires_in: issued.expires_at - issued.issued_at,
                message: "Login successful",
            }))
        }
        Err(err) => {
            if matches!(err, AuthError::InvalidCredentials) {
                state
                    .audit
                    .security(&format!("Failed admin login for user '{}'", username))
                    .await;
            }
            Err(err.into())
        }
    }
}

pub async fn logs(
    State(state): State<AppState>,
    session: AdminSession,
) -> AppResult<Json<LogsResponse>> {
    let entries = read_entries(&state).await?;
    tracing::debug!(admin = %session.username, entries = entries.len(), "serving logs");
    let stats = logs::summarize(&entries);
    Ok(Json(LogsResponse {
        logs: entries,
        stats,
    }))
}

pub async fn dashboard(
    State(state): State<AppState>,
    _session: AdminSession,
) -> AppResult<Json<DashboardResponse>> {
    let entries = read_entries(&state).await?;
    Ok(Json(DashboardResponse {
        totals: logs::dashboard(&entries),
        live: state.gate.stats().snapshot(),
    }))
}

async fn read_entries(state: &AppState) -> AppResult<Vec<LogEntry>> {
    let contents = state
        .audit
        .read_app_log()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(logs::parse_predict_entries(&contents))
}

/// Middleware: require a valid admin bearer token.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default().to_string());

    match state.auth.authorize_header(header.as_deref()) {
        Ok(session) => {
            req.extensions_mut().insert(session);
            Ok(next.run(req).await)
        }
        Err(err) => {
            let path = req.uri().path().to_string();
            tracing::warn!(reason = %err, %path, "admin request rejected");
            state
                .audit
                .security(&format!("Rejected admin request to {}: {}", path, err))
                .await;
            Err(err.into())
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminSession>()
            .cloned()
            .ok_or(AppError::Auth(AuthError::MissingToken))
    }
}

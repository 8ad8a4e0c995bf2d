mod admin;
mod health;
mod predict;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Result;
use axum::{
    http::HeaderMap,
    middleware,
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;

use crate::audit::AuditLog;
use crate::auth::AdminAuth;
use crate::error::AppError;
use crate::gate::RequestGate;

/// Shared handles; every request goes through the same gate and audit log.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<RequestGate>,
    pub auth: Arc<AdminAuth>,
    pub audit: Arc<AuditLog>,
}

pub fn app_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/admin/logs", get(admin::logs))
        .route("/admin/dashboard", get(admin::dashboard))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin::require_admin,
        ));

    Router::new()
        .route("/health", get(health::check))
        .route("/predict", post(predict::predict))
        .route("/admin/login", post(admin::login))
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_http_server(addr: &str, state: AppState) -> Result<()> {
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Parses a non-empty JSON object body. Missing, empty, or `{}` bodies yield
/// `missing_message`.
fn parse_json_object<T: DeserializeOwned>(
    body: &[u8],
    missing_message: &str,
) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::Validation(missing_message.to_string()));
    }
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON body: {e}")))?;
    match value.as_object() {
        Some(obj) if !obj.is_empty() => {}
        _ => return Err(AppError::Validation(missing_message.to_string())),
    }
    serde_json::from_value(value)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))
}

/// First `X-Forwarded-For` hop if it is an IP address, else the peer address.
/// The result is written verbatim into `app.log`.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|hop| hop.trim().parse::<IpAddr>().ok())
        .or_else(|| peer.map(|addr| addr.ip()))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionRequest;
    use axum::http::HeaderValue;

    #[test]
    fn empty_and_blank_bodies_are_missing() {
        let bodies: [&[u8]; 5] = [b"", b"  ", b"{}", b"[]", b"null"];
        for body in bodies {
            let err = parse_json_object::<TransactionRequest>(body, "No data provided").unwrap_err();
            assert!(matches!(err, AppError::Validation(ref m) if m == "No data provided"));
        }
    }

    #[test]
    fn wrong_field_types_are_invalid() {
        let err = parse_json_object::<TransactionRequest>(br#"{"name": 5}"#, "missing").unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.starts_with("Invalid request body")));
    }

    #[test]
    fn forwarded_header_wins_over_peer() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(client_ip(&headers, None), "-");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn forwarded_header_must_be_an_address() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(
                "6.6.6.6 - - [01/Jan/2000 00:00:00] \"POST /predict HTTP/1.1\" 200 - x",
            ),
        );
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(client_ip(&headers, None), "-");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" 2001:db8::1 "));
        assert_eq!(client_ip(&headers, Some(peer)), "2001:db8::1");
    }
}

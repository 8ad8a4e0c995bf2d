use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::{client_ip, parse_json_object, AppState};
use crate::error::AppResult;
use crate::gate::Rejection;
use crate::models::{TransactionData, TransactionRequest};

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    status: &'static str,
    message: &'static str,
    transaction_data: TransactionData,
}

/// Screens the form and, if clean, returns an unsigned `saveUserData` call.
pub async fn predict(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let client_ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));

    let response = match screen_and_draft(&state, &body, &client_ip).await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(err) => err.into_response(),
    };

    state
        .audit
        .access(&client_ip, "POST", "/predict", response.status().as_u16())
        .await;
    response
}

async fn screen_and_draft(
    state: &AppState,
    body: &[u8],
    client_ip: &str,
) -> AppResult<PredictResponse> {
    let request: TransactionRequest = parse_json_object(body, "No data provided")?;

    match state.gate.handle(&request).await {
        Ok(accepted) => {
            if accepted.fraud.indicators.any() {
                state
                    .audit
                    .security(&format!(
                        "Fraud indicators raised for {} ({:?}), policy {:?}",
                        client_ip,
                        accepted.fraud.indicators,
                        state.gate.fraud_policy()
                    ))
                    .await;
            }
            Ok(PredictResponse {
                status: "pending",
                message: "Please confirm the transaction in your wallet",
                transaction_data: (&accepted.transaction).into(),
            })
        }
        Err(rejection) => {
            match &rejection {
                Rejection::Blocked { field, confidence } => {
                    state
                        .audit
                        .security(&format!(
                            "Blocked request from {}: attack in field '{}' (confidence {:.2})",
                            client_ip, field, confidence
                        ))
                        .await;
                }
                Rejection::FraudSuspected(indicators) => {
                    state
                        .audit
                        .security(&format!(
                            "Blocked request from {}: fraud indicators {:?}",
                            client_ip, indicators
                        ))
                        .await;
                }
                _ => {}
            }
            Err(rejection.into())
        }
    }
}

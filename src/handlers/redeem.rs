//! POST /api/v1/code/redeem — the redemption hot path.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use uuid::Uuid;

use crate::dtos::{CodeResponse, RedeemRequest};
use crate::services::error::ServiceError;
use crate::services::metrics::record_redemption;
use crate::AppState;

pub async fn redeem_code(
    State(state): State<AppState>,
    payload: Result<Json<RedeemRequest>, JsonRejection>,
) -> Result<Json<CodeResponse>, ServiceError> {
    let Json(request) = payload.map_err(|_| ServiceError::MalformedBody)?;

    // All three identifiers are validated before the engine is invoked.
    let batch_id = parse_identifier(&request.batchid, "batch_id")?;
    let client_id = parse_identifier(&request.clientid, "client_id")?;
    let customer_id = parse_identifier(&request.customerid, "customer_id")?;

    match state.redemption.redeem(batch_id, client_id, customer_id).await {
        Ok(code) => {
            record_redemption("success");
            Ok(Json(CodeResponse { code }))
        }
        Err(err) => {
            record_redemption(outcome_label(&err));
            Err(err)
        }
    }
}

fn parse_identifier(raw: &str, field: &'static str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw).map_err(|_| ServiceError::InvalidIdentifier(field))
}

fn outcome_label(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::NoCodeAvailable => "no_code",
        ServiceError::RuleNotMet => "rule_not_met",
        ServiceError::BatchExpired => "batch_expired",
        ServiceError::BatchNotFound => "batch_not_found",
        _ => "error",
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later

//! Swap endpoints.
//!
//! Swaps act on the caller's public wallet, not the shielded ledger, so
//! `notify` appends a history record without any balance mutation.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::providers::jupiter::{to_smallest_unit, token_info};
use crate::state::AppState;
use crate::storage::{NewRecord, TxKind};

use super::deposit::CreateTxResponse;

const PROTOCOL_TAG: &str = "JUPITER";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSwapRequest {
    /// Amount of the input token, in UI units.
    pub amount: f64,
    pub from_token: String,
    pub to_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SwapNotifyRequest {
    pub amount: f64,
    pub from_token: String,
    pub to_token: String,
    /// Signature of the broadcast swap transaction.
    pub tx_hash: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SwapNotifyResponse {
    pub message: String,
}

/// Build an unsigned swap transaction via the aggregator.
#[utoipa::path(
    post,
    path = "/api/swap/create-tx",
    tag = "Swap",
    security(("bearer" = [])),
    request_body = CreateSwapRequest,
    responses(
        (status = 200, description = "Unsigned transaction built", body = CreateTxResponse),
        (status = 400, description = "Invalid amount or unknown token"),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Swap provider failure")
    )
)]
pub async fn create_tx(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateSwapRequest>,
) -> Result<Json<CreateTxResponse>, ApiError> {
    let input = token_info(&request.from_token)
        .ok_or_else(|| ApiError::unknown_token(&request.from_token))?;
    let output =
        token_info(&request.to_token).ok_or_else(|| ApiError::unknown_token(&request.to_token))?;
    let amount =
        to_smallest_unit(request.amount, input.decimals).ok_or_else(ApiError::invalid_amount)?;

    let unsigned_tx = state
        .swap
        .create_swap_tx(&user.wallet_address, input, output, amount)
        .await
        .map_err(|e| {
            warn!(
                from = input.symbol,
                to = output.symbol,
                error = %e,
                "swap tx build failed"
            );
            ApiError::upstream("Swap provider")
        })?;

    Ok(Json(CreateTxResponse {
        unsigned_tx,
        message: "Please sign the swap transaction".to_string(),
    }))
}

/// Record a completed swap.
#[utoipa::path(
    post,
    path = "/api/swap/notify",
    tag = "Swap",
    security(("bearer" = [])),
    request_body = SwapNotifyRequest,
    responses(
        (status = 200, description = "Swap recorded", body = SwapNotifyResponse),
        (status = 400, description = "Invalid amount or unknown token"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Transaction already recorded")
    )
)]
pub async fn notify(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<SwapNotifyRequest>,
) -> Result<Json<SwapNotifyResponse>, ApiError> {
    let input = token_info(&request.from_token)
        .ok_or_else(|| ApiError::unknown_token(&request.from_token))?;
    let output =
        token_info(&request.to_token).ok_or_else(|| ApiError::unknown_token(&request.to_token))?;
    let amount =
        to_smallest_unit(request.amount, input.decimals).ok_or_else(ApiError::invalid_amount)?;
    if request.tx_hash.is_empty() {
        return Err(ApiError::missing_field("tx_hash"));
    }

    let mut details = BTreeMap::new();
    details.insert("protocol".to_string(), PROTOCOL_TAG.to_string());

    state
        .store
        .ledger()
        .record_only(
            &user.user_id,
            amount,
            NewRecord {
                kind: TxKind::Swap,
                token: format!("{}-{}", input.symbol, output.symbol),
                tx_hash: Some(request.tx_hash.clone()),
                details,
            },
        )
        .map_err(super::ledger_error)?;

    info!(
        user_id = %user.user_id,
        from = input.symbol,
        to = output.symbol,
        tx_hash = %request.tx_hash,
        "swap recorded"
    );

    Ok(Json(SwapNotifyResponse {
        message: "Swap recorded successfully".to_string(),
    }))
}

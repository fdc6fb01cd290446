// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shield (deposit) endpoints.
//!
//! `create-tx` asks the privacy pool for an unsigned shield transaction; the
//! user's wallet signs and broadcasts it. `notify` credits the ledger only
//! after the referenced transaction is finalized on-chain and its balance
//! delta covers the claimed amount.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::Auth;
use crate::chain::{lamports_to_sol, sol_to_lamports};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{NewRecord, TxKind};

const PROTOCOL_TAG: &str = "SHADOWWIRE_ZK";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDepositRequest {
    /// Amount to shield, in SOL.
    pub amount: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateTxResponse {
    /// Base64-encoded unsigned transaction for the wallet to sign.
    pub unsigned_tx: String,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DepositNotifyRequest {
    /// Amount that was shielded, in SOL.
    pub amount: f64,
    /// Signature of the broadcast shield transaction.
    pub tx_hash: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotifyResponse {
    pub message: String,
    /// Shielded SOL balance after the mutation.
    pub new_balance: f64,
}

/// Build an unsigned shield transaction.
#[utoipa::path(
    post,
    path = "/api/deposit/create-tx",
    tag = "Deposit",
    security(("bearer" = [])),
    request_body = CreateDepositRequest,
    responses(
        (status = 200, description = "Unsigned transaction built", body = CreateTxResponse),
        (status = 400, description = "Invalid amount"),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Privacy pool failure")
    )
)]
pub async fn create_tx(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateDepositRequest>,
) -> Result<Json<CreateTxResponse>, ApiError> {
    let lamports = sol_to_lamports(request.amount).ok_or_else(ApiError::invalid_amount)?;

    let unsigned_tx = state
        .pool
        .create_deposit_tx(&user.wallet_address, lamports)
        .await
        .map_err(|e| {
            warn!(wallet = %user.wallet_address, error = %e, "deposit tx build failed");
            ApiError::upstream("Privacy pool")
        })?;

    Ok(Json(CreateTxResponse {
        unsigned_tx,
        message: "Please sign this transaction to shield funds".to_string(),
    }))
}

/// Credit the ledger after a signed shield transaction was broadcast.
///
/// The referenced transaction must be finalized on-chain and must have moved
/// at least the claimed amount out of the caller's wallet. Each signature is
/// accepted at most once.
#[utoipa::path(
    post,
    path = "/api/deposit/notify",
    tag = "Deposit",
    security(("bearer" = [])),
    request_body = DepositNotifyRequest,
    responses(
        (status = 200, description = "Ledger credited", body = NotifyResponse),
        (status = 400, description = "Invalid amount or unverified transaction"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Transaction already recorded")
    )
)]
pub async fn notify(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<DepositNotifyRequest>,
) -> Result<Json<NotifyResponse>, ApiError> {
    let lamports = sol_to_lamports(request.amount).ok_or_else(ApiError::invalid_amount)?;
    if request.tx_hash.is_empty() {
        return Err(ApiError::missing_field("tx_hash"));
    }

    let verified = state
        .chain
        .verify_transfer(&request.tx_hash, &user.wallet_address)
        .await
        .map_err(|e| {
            warn!(tx_hash = %request.tx_hash, error = %e, "deposit verification failed");
            ApiError::tx_not_verified("Transaction not found or not finalized")
        })?;

    // A shield moves funds out of the caller's wallet: the observed delta
    // must be at least as negative as the claimed amount. Claims beyond
    // i64::MAX cannot match any real delta and must not wrap.
    let claimed = i64::try_from(lamports).unwrap_or(i64::MAX);
    if verified.lamport_delta > -claimed {
        warn!(
            tx_hash = %request.tx_hash,
            claimed = lamports,
            observed = verified.lamport_delta,
            "deposit amount mismatch"
        );
        return Err(ApiError::tx_not_verified(
            "On-chain amount does not match the claimed deposit",
        ));
    }

    let mut details = BTreeMap::new();
    details.insert("protocol".to_string(), PROTOCOL_TAG.to_string());

    let updated = state
        .store
        .ledger()
        .credit(
            &user.user_id,
            lamports,
            NewRecord {
                kind: TxKind::Deposit,
                token: "SOL".to_string(),
                tx_hash: Some(request.tx_hash.clone()),
                details,
            },
        )
        .map_err(super::ledger_error)?;

    info!(user_id = %user.user_id, lamports, tx_hash = %request.tx_hash, "deposit credited");

    Ok(Json(NotifyResponse {
        message: "Deposit recorded successfully".to_string(),
        new_balance: lamports_to_sol(updated.private_balance_lamports),
    }))
}

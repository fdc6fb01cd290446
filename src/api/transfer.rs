// SPDX-License-Identifier: AGPL-3.0-or-later

//! Relayer-mediated private transfer.
//!
//! Moves funds from the caller's custodial deposit keypair to the recipient
//! through the shared relayer, then debits the caller's ledger by the full
//! requested amount. Per-user locking serializes concurrent transfers so the
//! balance pre-check holds until the debit lands.

use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;

use crate::auth::Auth;
use crate::chain::{
    decode_keypair, lamports_to_sol, sol_to_lamports, validate_address, RelayEngine, RelayError,
};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{LedgerError, NewRecord, TxKind};

const PROTOCOL_TAG: &str = "SPECTRA_RELAY";

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferRequest {
    /// Base58 recipient address; must differ from the caller's wallet.
    pub recipient_address: String,
    /// Amount to transfer, in SOL.
    pub amount: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransferResponse {
    pub success: bool,
    pub message: String,
    /// Custodial → relayer signature (confirmed).
    pub hop1_signature: String,
    /// Relayer → recipient signature; absent when the second hop could not
    /// be broadcast and the funds await operator reconciliation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hop2_signature: Option<String>,
    /// Shielded SOL balance after the debit.
    pub new_balance: f64,
}

/// Execute a relayer-mediated transfer.
#[utoipa::path(
    post,
    path = "/api/transfer",
    tag = "Transfer",
    security(("bearer" = [])),
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transfer executed", body = TransferResponse),
        (status = 400, description = "Invalid amount, recipient, or insufficient balance"),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "On-chain failure before any funds moved"),
        (status = 503, description = "Relayer not configured")
    )
)]
pub async fn execute(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let Some(relayer) = state.relayer.clone() else {
        return Err(ApiError::service_unavailable(
            "Transfer service is not configured",
        ));
    };

    let lamports = sol_to_lamports(request.amount).ok_or_else(ApiError::invalid_amount)?;
    if request.recipient_address.is_empty() {
        return Err(ApiError::missing_field("recipient_address"));
    }
    if request.recipient_address == user.wallet_address {
        return Err(ApiError::self_transfer());
    }
    validate_address(&request.recipient_address)
        .map_err(|e| ApiError::invalid_address(e.to_string()))?;

    // Serialize transfers per user so concurrent requests cannot both pass
    // the balance pre-check.
    let _guard = state.transfer_locks.acquire(&user.user_id).await;

    let stored = state
        .store
        .users()
        .get(&user.user_id)
        .map_err(|e| {
            error!(error = %e, "user storage failure");
            ApiError::internal("Storage failure")
        })?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if stored.private_balance_lamports < lamports {
        return Err(ApiError::insufficient_funds());
    }

    let (deposit_address, deposit_secret) =
        match (&stored.deposit_address, &stored.deposit_secret) {
            (Some(address), Some(secret)) => (address.clone(), secret.clone()),
            _ => {
                return Err(ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "no_deposit_keypair",
                    "Account has no custodial deposit keypair",
                ))
            }
        };
    let custodial = decode_keypair(&deposit_secret).map_err(|e| {
        error!(user_id = %user.user_id, error = %e, "stored custodial keypair is corrupt");
        ApiError::internal("Custodial keypair could not be loaded")
    })?;

    let engine = RelayEngine::new(state.chain.clone(), relayer);
    let outcome = engine
        .execute(
            &custodial,
            &deposit_address,
            &request.recipient_address,
            lamports,
        )
        .await
        .map_err(|e| match e {
            RelayError::AmountTooSmall { .. } => ApiError::invalid_amount(),
            RelayError::InsufficientFunds { .. } => ApiError::insufficient_funds(),
            RelayError::Chain(chain_err) => {
                error!(user_id = %user.user_id, error = %chain_err, "relay transfer failed");
                ApiError::upstream("Solana RPC")
            }
        })?;

    let mut details = BTreeMap::new();
    details.insert("protocol".to_string(), PROTOCOL_TAG.to_string());
    details.insert(
        "recipient".to_string(),
        request.recipient_address.clone(),
    );
    details.insert("hop1_signature".to_string(), outcome.hop1_signature.clone());
    if outcome.needs_reconciliation() {
        details.insert("reconcile".to_string(), "hop2_failed".to_string());
    }

    let record = NewRecord {
        kind: TxKind::Transfer,
        token: "SOL".to_string(),
        tx_hash: outcome.hop2_signature.clone(),
        details,
    };

    // Debit the full requested amount; the relayer fee comes out of the
    // relayed amount, not the ledger.
    let new_balance = match state.store.ledger().debit(&user.user_id, lamports, record.clone()) {
        Ok(updated) => updated.private_balance_lamports,
        Err(LedgerError::InsufficientFunds { available, .. }) => {
            // The funds already moved on-chain; keep the history record so
            // an operator can reconcile the ledger.
            error!(
                user_id = %user.user_id,
                hop1 = %outcome.hop1_signature,
                available,
                lamports,
                "ledger debit failed after on-chain transfer"
            );
            state
                .store
                .ledger()
                .record_only(&user.user_id, lamports, record)
                .map_err(super::ledger_error)?;
            available
        }
        Err(e) => return Err(super::ledger_error(e)),
    };

    info!(
        user_id = %user.user_id,
        lamports,
        hop1 = %outcome.hop1_signature,
        hop2 = outcome.hop2_signature.as_deref().unwrap_or("-"),
        "transfer completed"
    );

    let message = if outcome.needs_reconciliation() {
        "Transfer partially completed; funds are being reconciled".to_string()
    } else {
        "Transfer completed".to_string()
    };

    Ok(Json(TransferResponse {
        success: true,
        message,
        hop1_signature: outcome.hop1_signature,
        hop2_signature: outcome.hop2_signature,
        new_balance: lamports_to_sol(new_balance),
    }))
}

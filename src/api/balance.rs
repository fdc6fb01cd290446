// SPDX-License-Identifier: AGPL-3.0-or-later

//! Balance query endpoint.
//!
//! The ledger is authoritative for shielded balances. The custodial deposit
//! address's on-chain balance is reported alongside as an informational
//! figure and never written back into the ledger.

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::auth::Auth;
use crate::chain::lamports_to_sol;
use crate::error::ApiError;
use crate::state::AppState;

const USDC_PER_UNIT: f64 = 1_000_000.0;

#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    /// Shielded SOL balance (ledger-authoritative).
    pub private_balance: f64,
    /// Shielded USDC balance (ledger-authoritative).
    pub usdc_balance: f64,
    /// Custodial deposit address, if provisioned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_address: Option<String>,
    /// Live on-chain SOL balance of the deposit address. Informational;
    /// zero when the address is unset or the RPC lookup fails.
    pub deposit_balance: f64,
}

/// Fetch the caller's balances.
#[utoipa::path(
    get,
    path = "/api/balance",
    tag = "Balance",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Balances retrieved", body = BalanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_balance(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let stored = state
        .store
        .users()
        .get(&user.user_id)
        .map_err(|e| {
            tracing::error!(error = %e, "user storage failure");
            ApiError::internal("Storage failure")
        })?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    // Best effort: a flaky RPC must not fail the whole balance view.
    let deposit_balance = match &stored.deposit_address {
        Some(address) => match state.chain.balance(address).await {
            Ok(lamports) => lamports_to_sol(lamports),
            Err(e) => {
                warn!(address = %address, error = %e, "deposit balance lookup failed");
                0.0
            }
        },
        None => 0.0,
    };

    Ok(Json(BalanceResponse {
        private_balance: lamports_to_sol(stored.private_balance_lamports),
        usdc_balance: stored.usdc_balance as f64 / USDC_PER_UNIT,
        deposit_address: stored.deposit_address,
        deposit_balance,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticatedUser;
    use crate::state::test_support::harness;
    use crate::storage::{NewRecord, TxKind};
    use std::collections::BTreeMap;

    fn auth_for(user_id: &str, wallet: &str) -> Auth {
        Auth(AuthenticatedUser {
            user_id: user_id.to_string(),
            wallet_address: wallet.to_string(),
        })
    }

    #[tokio::test]
    async fn ledger_balance_is_authoritative() {
        let h = harness();
        let user = h.state.store.users().find_or_create("WalletA").unwrap();
        h.state
            .store
            .users()
            .set_deposit_keypair(&user.user_id, "DepositAddr", "Secret")
            .unwrap();
        h.state
            .store
            .ledger()
            .credit(
                &user.user_id,
                1_500_000_000,
                NewRecord {
                    kind: TxKind::Deposit,
                    token: "SOL".to_string(),
                    tx_hash: Some("sig-1".to_string()),
                    details: BTreeMap::new(),
                },
            )
            .unwrap();
        // On-chain figure differs from the ledger; the ledger wins.
        h.chain.set_balance("DepositAddr", 42_000_000);

        let response = get_balance(auth_for(&user.user_id, "WalletA"), State(h.state.clone()))
            .await
            .unwrap()
            .0;

        assert_eq!(response.private_balance, 1.5);
        assert_eq!(response.deposit_balance, 0.042);
        assert_eq!(response.deposit_address.as_deref(), Some("DepositAddr"));

        // The informational figure is not reconciled into the store.
        let reloaded = h.state.store.users().get_required(&user.user_id).unwrap();
        assert_eq!(reloaded.private_balance_lamports, 1_500_000_000);
    }

    #[tokio::test]
    async fn rpc_failure_degrades_to_zero_deposit_balance() {
        let h = harness();
        let user = h.state.store.users().find_or_create("WalletA").unwrap();
        h.state
            .store
            .users()
            .set_deposit_keypair(&user.user_id, "DepositAddr", "Secret")
            .unwrap();
        h.chain
            .fail_balance
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let response = get_balance(auth_for(&user.user_id, "WalletA"), State(h.state.clone()))
            .await
            .unwrap()
            .0;
        assert_eq!(response.deposit_balance, 0.0);
    }

    #[tokio::test]
    async fn unknown_user_is_404() {
        let h = harness();
        let err = get_balance(auth_for("ghost", "WalletX"), State(h.state.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
    }
}

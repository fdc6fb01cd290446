// SPDX-License-Identifier: AGPL-3.0-or-later

//! Unshield (withdraw) endpoints.
//!
//! `create-tx` is gated by a ledger pre-check; `notify` verifies the
//! transaction on-chain before debiting, and the debit itself fails closed
//! if the balance no longer covers the amount.

use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::Auth;
use crate::chain::{lamports_to_sol, sol_to_lamports, VERIFY_TOLERANCE_LAMPORTS};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{NewRecord, TxKind};

use super::deposit::{CreateTxResponse, NotifyResponse};

const PROTOCOL_TAG: &str = "SHADOWWIRE_ZK";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateWithdrawRequest {
    /// Amount to unshield, in SOL.
    pub amount: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WithdrawNotifyRequest {
    /// Amount that was unshielded, in SOL.
    pub amount: f64,
    /// Signature of the broadcast unshield transaction.
    pub tx_hash: String,
}

/// Build an unsigned unshield transaction back to the caller's wallet.
#[utoipa::path(
    post,
    path = "/api/withdraw/create-tx",
    tag = "Withdraw",
    security(("bearer" = [])),
    request_body = CreateWithdrawRequest,
    responses(
        (status = 200, description = "Unsigned transaction built", body = CreateTxResponse),
        (status = 400, description = "Invalid amount or insufficient balance"),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Privacy pool failure")
    )
)]
pub async fn create_tx(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateWithdrawRequest>,
) -> Result<Json<CreateTxResponse>, ApiError> {
    let lamports = sol_to_lamports(request.amount).ok_or_else(ApiError::invalid_amount)?;

    let stored = state
        .store
        .users()
        .get(&user.user_id)
        .map_err(|e| {
            tracing::error!(error = %e, "user storage failure");
            ApiError::internal("Storage failure")
        })?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if stored.private_balance_lamports < lamports {
        return Err(ApiError::insufficient_funds());
    }

    let api_key = stored.pool_api_key.as_deref().ok_or_else(|| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "pool_not_registered",
            "Account is not registered with the privacy pool",
        )
    })?;

    let unsigned_tx = state
        .pool
        .create_withdraw_tx(&user.wallet_address, lamports, None, api_key)
        .await
        .map_err(|e| {
            warn!(wallet = %user.wallet_address, error = %e, "withdraw tx build failed");
            ApiError::upstream("Privacy pool")
        })?;

    Ok(Json(CreateTxResponse {
        unsigned_tx,
        message: "Please sign this transaction in your wallet".to_string(),
    }))
}

/// Debit the ledger after a signed unshield transaction was broadcast.
///
/// The transaction must be finalized and must have credited the caller's
/// wallet with roughly the claimed amount (a small tolerance covers the
/// network fee).
#[utoipa::path(
    post,
    path = "/api/withdraw/notify",
    tag = "Withdraw",
    security(("bearer" = [])),
    request_body = WithdrawNotifyRequest,
    responses(
        (status = 200, description = "Ledger debited", body = NotifyResponse),
        (status = 400, description = "Invalid amount, unverified transaction, or insufficient balance"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Transaction already recorded")
    )
)]
pub async fn notify(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<WithdrawNotifyRequest>,
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
            warn!(tx_hash = %request.tx_hash, error = %e, "withdraw verification failed");
            ApiError::tx_not_verified("Transaction not found or not finalized")
        })?;

    // An unshield credits the caller's wallet; the delta may fall short of
    // the claim by at most the fee tolerance. Claims beyond i64::MAX cannot
    // match any real delta and must not wrap into a passable value.
    let claimed = i64::try_from(lamports).unwrap_or(i64::MAX);
    if verified.lamport_delta < claimed.saturating_sub(VERIFY_TOLERANCE_LAMPORTS as i64) {
        warn!(
            tx_hash = %request.tx_hash,
            claimed = lamports,
            observed = verified.lamport_delta,
            "withdraw amount mismatch"
        );
        return Err(ApiError::tx_not_verified(
            "On-chain amount does not match the claimed withdrawal",
        ));
    }

    let mut details = BTreeMap::new();
    details.insert("protocol".to_string(), PROTOCOL_TAG.to_string());

    let updated = state
        .store
        .ledger()
        .debit(
            &user.user_id,
            lamports,
            NewRecord {
                kind: TxKind::Withdraw,
                token: "SOL".to_string(),
                tx_hash: Some(request.tx_hash.clone()),
                details,
            },
        )
        .map_err(super::ledger_error)?;

    info!(user_id = %user.user_id, lamports, tx_hash = %request.tx_hash, "withdrawal debited");

    Ok(Json(NotifyResponse {
        message: "Withdrawal successful".to_string(),
        new_balance: lamports_to_sol(updated.private_balance_lamports),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticatedUser;
    use crate::state::test_support::{harness, TestHarness};

    fn funded_login(h: &TestHarness, wallet: &str, lamports: u64) -> Auth {
        let user = h.state.store.users().find_or_create(wallet).unwrap();
        h.state
            .store
            .users()
            .set_pool_api_key(&user.user_id, "sw_key")
            .unwrap();
        if lamports > 0 {
            h.state
                .store
                .ledger()
                .credit(
                    &user.user_id,
                    lamports,
                    NewRecord {
                        kind: TxKind::Deposit,
                        token: "SOL".to_string(),
                        tx_hash: Some(format!("funding-{wallet}")),
                        details: BTreeMap::new(),
                    },
                )
                .unwrap();
        }
        Auth(AuthenticatedUser {
            user_id: user.user_id,
            wallet_address: wallet.to_string(),
        })
    }

    #[tokio::test]
    async fn create_tx_allows_exact_balance() {
        let h = harness();
        let auth = funded_login(&h, "WalletA", 1_000_000_000);

        let response = create_tx(
            auth,
            State(h.state.clone()),
            Json(CreateWithdrawRequest { amount: 1.0 }),
        )
        .await
        .unwrap()
        .0;
        assert!(!response.unsigned_tx.is_empty());
    }

    #[tokio::test]
    async fn create_tx_rejects_one_lamport_over() {
        let h = harness();
        let auth = funded_login(&h, "WalletA", 1_000_000_000);

        let err = create_tx(
            auth,
            State(h.state.clone()),
            Json(CreateWithdrawRequest {
                amount: 1.000000001,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, "insufficient_funds");
    }

    #[tokio::test]
    async fn notify_debits_to_zero_on_exact_amount() {
        let h = harness();
        let auth = funded_login(&h, "WalletA", 1_000_000_000);
        let user_id = auth.0.user_id.clone();
        // Wallet received the amount minus the network fee.
        h.chain.set_verified("sig-w", "WalletA", 999_995_000);

        let response = notify(
            auth,
            State(h.state.clone()),
            Json(WithdrawNotifyRequest {
                amount: 1.0,
                tx_hash: "sig-w".to_string(),
            }),
        )
        .await
        .unwrap()
        .0;

        assert_eq!(response.new_balance, 0.0);
        let stored = h.state.store.users().get_required(&user_id).unwrap();
        assert_eq!(stored.private_balance_lamports, 0);
    }

    #[tokio::test]
    async fn notify_fails_closed_when_balance_is_short() {
        let h = harness();
        let auth = funded_login(&h, "WalletA", 100_000_000);
        let user_id = auth.0.user_id.clone();
        h.chain.set_verified("sig-w", "WalletA", 999_995_000);

        let err = notify(
            auth,
            State(h.state.clone()),
            Json(WithdrawNotifyRequest {
                amount: 1.0,
                tx_hash: "sig-w".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code, "insufficient_funds");
        // Balance never goes negative or gets clamped; the debit is rejected.
        let stored = h.state.store.users().get_required(&user_id).unwrap();
        assert_eq!(stored.private_balance_lamports, 100_000_000);
    }

    #[tokio::test]
    async fn notify_rejects_short_onchain_credit() {
        let h = harness();
        let auth = funded_login(&h, "WalletA", 2_000_000_000);
        // Wallet only received half the claimed amount.
        h.chain.set_verified("sig-w", "WalletA", 500_000_000);

        let err = notify(
            auth,
            State(h.state.clone()),
            Json(WithdrawNotifyRequest {
                amount: 1.0,
                tx_hash: "sig-w".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, "tx_not_verified");
    }

    #[tokio::test]
    async fn notify_rejects_claims_beyond_i64() {
        let h = harness();
        // 10 billion SOL fits in u64 lamports but not in i64.
        let auth = funded_login(&h, "WalletA", 2_000_000_000);
        let user_id = auth.0.user_id.clone();
        h.chain.set_verified("sig-w", "WalletA", 5_000);

        let err = notify(
            auth,
            State(h.state.clone()),
            Json(WithdrawNotifyRequest {
                amount: 10_000_000_000.0,
                tx_hash: "sig-w".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code, "tx_not_verified");
        let stored = h.state.store.users().get_required(&user_id).unwrap();
        assert_eq!(stored.private_balance_lamports, 2_000_000_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_notifies_cannot_jointly_overdraw() {
        let h = harness();
        // Balance covers either withdrawal alone, never both.
        let auth = funded_login(&h, "WalletA", 1_500_000_000);
        h.chain.set_verified("sig-a", "WalletA", 999_995_000);
        h.chain.set_verified("sig-b", "WalletA", 999_995_000);

        let mut handles = Vec::new();
        for hash in ["sig-a", "sig-b"] {
            let state = h.state.clone();
            let auth = Auth(auth.0.clone());
            handles.push(tokio::spawn(async move {
                notify(
                    auth,
                    State(state),
                    Json(WithdrawNotifyRequest {
                        amount: 1.0,
                        tx_hash: hash.to_string(),
                    }),
                )
                .await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1, "exactly one debit may land");

        let stored = h.state.store.users().get_required(&auth.0.user_id).unwrap();
        assert_eq!(stored.private_balance_lamports, 500_000_000);
    }

    #[tokio::test]
    async fn replayed_withdraw_hash_is_rejected() {
        let h = harness();
        let auth = funded_login(&h, "WalletA", 2_000_000_000);
        h.chain.set_verified("sig-w", "WalletA", 999_995_000);

        let request = || WithdrawNotifyRequest {
            amount: 1.0,
            tx_hash: "sig-w".to_string(),
        };
        notify(
            Auth(auth.0.clone()),
            State(h.state.clone()),
            Json(request()),
        )
        .await
        .unwrap();
        let err = notify(auth, State(h.state.clone()), Json(request()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }
}

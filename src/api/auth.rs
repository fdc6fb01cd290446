// SPDX-License-Identifier: AGPL-3.0-or-later

//! Wallet-signature login.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::{issue_token, verify_wallet_signature};
use crate::chain::generate_deposit_keypair;
use crate::error::ApiError;
use crate::models::UserProfile;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AuthRequest {
    /// Base58 wallet public key the user signs in with.
    pub wallet_address: String,
    /// The exact message the wallet extension signed.
    pub message: String,
    /// Base58 ed25519 signature over the message.
    pub signature: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    /// Bearer token for subsequent requests (24h lifetime).
    pub token: String,
    pub user: UserProfile,
}

/// Verify a wallet signature and open a session.
///
/// First login creates the user, registers them with the privacy pool, and
/// generates their custodial deposit keypair. Later logins backfill whichever
/// of those is still missing.
#[utoipa::path(
    post,
    path = "/api/auth",
    tag = "Auth",
    request_body = AuthRequest,
    responses(
        (status = 200, description = "Session opened", body = AuthResponse),
        (status = 400, description = "Missing fields or malformed signature"),
        (status = 401, description = "Signature did not verify"),
        (status = 502, description = "Privacy-pool registration failed")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if request.wallet_address.is_empty() {
        return Err(ApiError::missing_field("wallet_address"));
    }
    if request.message.is_empty() {
        return Err(ApiError::missing_field("message"));
    }
    if request.signature.is_empty() {
        return Err(ApiError::missing_field("signature"));
    }

    // Nothing is created or mutated before the signature verifies.
    verify_wallet_signature(&request.wallet_address, &request.message, &request.signature)
        .map_err(|e| ApiError::new(e.status_code(), e.error_code(), e.to_string()))?;

    let users = state.store.users();
    let mut user = users
        .find_or_create(&request.wallet_address)
        .map_err(storage_error)?;

    // Fetch a real pool key when missing or when a legacy placeholder is
    // still stored.
    let needs_pool_key = match &user.pool_api_key {
        None => true,
        Some(key) => key.starts_with("mock_key"),
    };
    if needs_pool_key {
        let api_key = state
            .pool
            .register_user(&request.wallet_address)
            .await
            .map_err(|e| {
                warn!(wallet = %request.wallet_address, error = %e, "pool registration failed");
                ApiError::upstream("Privacy pool")
            })?;
        user = users
            .set_pool_api_key(&user.user_id, &api_key)
            .map_err(storage_error)?;
    }

    if user.deposit_address.is_none() {
        let (address, secret) = generate_deposit_keypair();
        user = users
            .set_deposit_keypair(&user.user_id, &address, &secret)
            .map_err(storage_error)?;
        info!(user_id = %user.user_id, deposit_address = %address, "deposit keypair generated");
    }

    let token = issue_token(&user.user_id, &user.wallet_address, &state.config.jwt_secret)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(AuthResponse {
        token,
        user: UserProfile {
            wallet_address: user.wallet_address,
            pool_api_key: user.pool_api_key,
            deposit_address: user.deposit_address,
        },
    }))
}

fn storage_error(e: crate::storage::StoreError) -> ApiError {
    tracing::error!(error = %e, "user storage failure");
    ApiError::internal("Storage failure")
}

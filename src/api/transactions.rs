// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-user transaction history.

use axum::{extract::State, Json};

use crate::auth::Auth;
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::StoredTransaction;

/// Most recent records returned per request.
const HISTORY_LIMIT: usize = 20;

/// Fetch the caller's most recent transactions, newest first.
#[utoipa::path(
    get,
    path = "/api/transactions",
    tag = "Transactions",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "History retrieved", body = [StoredTransaction]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredTransaction>>, ApiError> {
    let records = state
        .store
        .transactions()
        .list_recent(&user.user_id, HISTORY_LIMIT)
        .map_err(|e| {
            tracing::error!(error = %e, "transaction history read failed");
            ApiError::internal("Failed to fetch transaction history")
        })?;
    Ok(Json(records))
}

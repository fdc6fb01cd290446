// SPDX-License-Identifier: AGPL-3.0-or-later

//! Public status checks and liveness probe.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::StatusCheck;

/// Upper bound on listed status checks.
const STATUS_LIST_LIMIT: usize = 1000;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateStatusRequest {
    pub client_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Status",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// List recent status checks, newest first.
#[utoipa::path(
    get,
    path = "/api/status",
    tag = "Status",
    responses((status = 200, description = "Status checks retrieved", body = [StatusCheck]))
)]
pub async fn list_checks(
    State(state): State<AppState>,
) -> Result<Json<Vec<StatusCheck>>, ApiError> {
    let checks = state
        .store
        .status_checks()
        .list(STATUS_LIST_LIMIT)
        .map_err(|e| {
            tracing::error!(error = %e, "status check read failed");
            ApiError::internal("Failed to fetch status checks")
        })?;
    Ok(Json(checks))
}

/// Record a status check.
#[utoipa::path(
    post,
    path = "/api/status",
    tag = "Status",
    request_body = CreateStatusRequest,
    responses(
        (status = 200, description = "Status check recorded", body = StatusCheck),
        (status = 400, description = "Missing client name")
    )
)]
pub async fn create_check(
    State(state): State<AppState>,
    Json(request): Json<CreateStatusRequest>,
) -> Result<Json<StatusCheck>, ApiError> {
    if request.client_name.trim().is_empty() {
        return Err(ApiError::missing_field("client_name"));
    }
    let check = state
        .store
        .status_checks()
        .create(request.client_name.trim())
        .map_err(|e| {
            tracing::error!(error = %e, "status check write failed");
            ApiError::internal("Failed to record status check")
        })?;
    Ok(Json(check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::harness;

    #[tokio::test]
    async fn health_reports_ok() {
        let response = health().await.0;
        assert_eq!(response.status, "ok");
    }

    #[tokio::test]
    async fn created_checks_appear_in_the_list() {
        let h = harness();

        create_check(
            State(h.state.clone()),
            Json(CreateStatusRequest {
                client_name: "uptime-bot".to_string(),
            }),
        )
        .await
        .unwrap();

        let checks = list_checks(State(h.state.clone())).await.unwrap().0;
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].client_name, "uptime-bot");
    }

    #[tokio::test]
    async fn blank_client_name_is_rejected() {
        let h = harness();
        let err = create_check(
            State(h.state.clone()),
            Json(CreateStatusRequest {
                client_name: "   ".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, "missing_field");
    }
}

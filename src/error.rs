// SPDX-License-Identifier: AGPL-3.0-or-later

//! API error type with machine-readable error codes.
//!
//! Upstream provider and RPC failures are logged with their full detail but
//! reach clients only as a generic `upstream_error` message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "missing_field",
            format!("{field} is required"),
        )
    }

    pub fn invalid_amount() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "invalid_amount",
            "Amount must be a positive number",
        )
    }

    pub fn unknown_token(symbol: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "unknown_token",
            format!("Unknown token symbol: {symbol}"),
        )
    }

    pub fn invalid_address(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_address", message)
    }

    pub fn self_transfer() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "self_transfer",
            "Recipient must differ from the sender wallet",
        )
    }

    pub fn insufficient_funds() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "insufficient_funds",
            "Insufficient balance",
        )
    }

    pub fn duplicate_tx(tx_hash: &str) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "duplicate_tx",
            format!("Transaction {tx_hash} was already recorded"),
        )
    }

    pub fn tx_not_verified(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "tx_not_verified", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// Upstream provider/RPC failure. `context` names the collaborator for the
    /// client; the caller is expected to have logged the underlying error.
    pub fn upstream(context: &str) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            "upstream_error",
            format!("{context} request failed"),
        )
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "service_unavailable",
            message,
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}

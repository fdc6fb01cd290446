// SPDX-License-Identifier: AGPL-3.0-or-later

//! ShadowWire privacy-pool integration.
//!
//! ShadowWire builds unsigned shield (deposit) and unshield (withdraw)
//! transactions server-side; the user's wallet signs and broadcasts them.
//! Every user is registered with the pool once and receives a per-user
//! API key that authorizes later withdrawals.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::ProviderError;

const REGISTER_PATH: &str = "/api/v1/users/register";
const DEPOSIT_PATH: &str = "/api/v1/transactions/deposit";
const WITHDRAW_PATH: &str = "/api/v1/transactions/withdraw";

/// Seam over the privacy-pool API.
#[async_trait]
pub trait PrivacyPool: Send + Sync {
    /// Register a wallet with the pool and return its per-user API key.
    async fn register_user(&self, wallet_address: &str) -> Result<String, ProviderError>;

    /// Build an unsigned shield transaction moving `lamports` from the
    /// user's public wallet into the pool. Returns the base64 transaction.
    async fn create_deposit_tx(
        &self,
        wallet_address: &str,
        lamports: u64,
    ) -> Result<String, ProviderError>;

    /// Build an unsigned unshield transaction moving `lamports` out of the
    /// pool. When `destination` is `None` the funds return to the user's own
    /// wallet. Returns the base64 transaction.
    async fn create_withdraw_tx(
        &self,
        wallet_address: &str,
        lamports: u64,
        destination: Option<&str>,
        user_api_key: &str,
    ) -> Result<String, ProviderError>;
}

/// HTTP client for the ShadowWire API.
#[derive(Debug, Clone)]
pub struct ShadowWireClient {
    base_url: String,
    service_api_key: Option<String>,
    http: Client,
}

impl ShadowWireClient {
    pub fn new(base_url: String, service_api_key: Option<String>) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            base_url,
            service_api_key,
            http,
        })
    }

    async fn post_json(
        &self,
        path: &str,
        payload: &Value,
        user_api_key: Option<&str>,
    ) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);

        let mut request = self.http.post(&url).json(payload);
        // A per-user key takes precedence over the service-wide key.
        if let Some(key) = user_api_key.or(self.service_api_key.as_deref()) {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Denied { status, detail });
        }

        let body: Value = response.json().await?;
        debug!(path, "shadowwire response received");
        Ok(body)
    }
}

#[async_trait]
impl PrivacyPool for ShadowWireClient {
    async fn register_user(&self, wallet_address: &str) -> Result<String, ProviderError> {
        let payload = json!({ "wallet_address": wallet_address });
        let response = self.post_json(REGISTER_PATH, &payload, None).await?;

        extract_api_key(&response)
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::InvalidResponse("missing api key in register response".to_string())
            })
    }

    async fn create_deposit_tx(
        &self,
        wallet_address: &str,
        lamports: u64,
    ) -> Result<String, ProviderError> {
        let payload = json!({
            "wallet_address": wallet_address,
            "amount_lamports": lamports,
        });
        let response = self.post_json(DEPOSIT_PATH, &payload, None).await?;

        extract_unsigned_tx(&response)
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::InvalidResponse(
                    "missing transaction in deposit response".to_string(),
                )
            })
    }

    async fn create_withdraw_tx(
        &self,
        wallet_address: &str,
        lamports: u64,
        destination: Option<&str>,
        user_api_key: &str,
    ) -> Result<String, ProviderError> {
        let mut payload = json!({
            "wallet_address": wallet_address,
            "amount_lamports": lamports,
        });
        if let Some(dest) = destination {
            payload["destination"] = Value::String(dest.to_string());
        }

        let response = self
            .post_json(WITHDRAW_PATH, &payload, Some(user_api_key))
            .await?;

        extract_unsigned_tx(&response)
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::InvalidResponse(
                    "missing transaction in withdraw response".to_string(),
                )
            })
    }
}

/// Pull the base64 transaction out of a pool response.
///
/// The pool has shipped the field under a few different names; accept all
/// of them.
fn extract_unsigned_tx(response: &Value) -> Option<&str> {
    response
        .get("unsigned_tx_base64")
        .and_then(Value::as_str)
        .or_else(|| response.get("transaction").and_then(Value::as_str))
        .or_else(|| {
            response
                .pointer("/data/transaction")
                .and_then(Value::as_str)
        })
}

fn extract_api_key(response: &Value) -> Option<&str> {
    response
        .get("api_key")
        .and_then(Value::as_str)
        .or_else(|| response.pointer("/data/api_key").and_then(Value::as_str))
}

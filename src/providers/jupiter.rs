// SPDX-License-Identifier: AGPL-3.0-or-later

//! Jupiter swap aggregator integration.
//!
//! Quote-then-swap flow: fetch a quote for the pair, post it back with the
//! user's public key, and hand the returned unsigned transaction to the
//! frontend for signing.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::ProviderError;

const SLIPPAGE_BPS: u16 = 50;

/// A token Spectra allows swapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: &'static str,
    pub mint: &'static str,
    pub decimals: u32,
}

/// Swap allow-list. Symbols outside this table are rejected before any
/// upstream call.
pub const SUPPORTED_TOKENS: &[TokenInfo] = &[
    TokenInfo {
        symbol: "SOL",
        mint: "So11111111111111111111111111111111111111112",
        decimals: 9,
    },
    TokenInfo {
        symbol: "USDC",
        mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
        decimals: 6,
    },
    TokenInfo {
        symbol: "USDT",
        mint: "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
        decimals: 6,
    },
    TokenInfo {
        symbol: "BONK",
        mint: "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263",
        decimals: 5,
    },
    TokenInfo {
        symbol: "WIF",
        mint: "EKpQGSJtjMFqKZ9KQanSqYXRcF8fBopzLHYxdM65zcjm",
        decimals: 6,
    },
    TokenInfo {
        symbol: "RAY",
        mint: "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R",
        decimals: 6,
    },
    TokenInfo {
        symbol: "JUP",
        mint: "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN",
        decimals: 6,
    },
    TokenInfo {
        symbol: "RENDER",
        mint: "rndrizKT3MK1iimdxRdWabcF7Zg7AR5T4nud4EkHBof",
        decimals: 8,
    },
];

/// Look up a supported token by symbol (case-sensitive, as the frontend
/// sends canonical upper-case symbols).
pub fn token_info(symbol: &str) -> Option<&'static TokenInfo> {
    SUPPORTED_TOKENS.iter().find(|t| t.symbol == symbol)
}

/// Convert a UI amount into the token's smallest unit, flooring like the
/// aggregator expects. `None` for non-finite, non-positive, or overflowing
/// inputs.
pub fn to_smallest_unit(amount: f64, decimals: u32) -> Option<u64> {
    if !amount.is_finite() || amount <= 0.0 {
        return None;
    }
    let scaled = (amount * 10f64.powi(decimals as i32)).floor();
    if scaled < 1.0 || scaled > u64::MAX as f64 {
        return None;
    }
    Some(scaled as u64)
}

/// Seam over the swap aggregator.
#[async_trait]
pub trait SwapProvider: Send + Sync {
    /// Quote `amount` (smallest units of the input token) and build an
    /// unsigned swap transaction for `user_pubkey`. Returns the base64
    /// transaction.
    async fn create_swap_tx(
        &self,
        user_pubkey: &str,
        input: &TokenInfo,
        output: &TokenInfo,
        amount: u64,
    ) -> Result<String, ProviderError>;
}

/// HTTP client for the Jupiter quote and swap endpoints.
#[derive(Debug, Clone)]
pub struct JupiterClient {
    quote_url: String,
    swap_url: String,
    http: Client,
}

impl JupiterClient {
    pub fn new(quote_url: String, swap_url: String) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            quote_url,
            swap_url,
            http,
        })
    }

    async fn fetch_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
    ) -> Result<Value, ProviderError> {
        let response = self
            .http
            .get(&self.quote_url)
            .query(&[
                ("inputMint", input_mint),
                ("outputMint", output_mint),
                ("amount", &amount.to_string()),
                ("slippageBps", &SLIPPAGE_BPS.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Denied { status, detail });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl SwapProvider for JupiterClient {
    async fn create_swap_tx(
        &self,
        user_pubkey: &str,
        input: &TokenInfo,
        output: &TokenInfo,
        amount: u64,
    ) -> Result<String, ProviderError> {
        let quote = self.fetch_quote(input.mint, output.mint, amount).await?;
        debug!(input = input.symbol, output = output.symbol, "jupiter quote received");

        let payload = json!({
            "quoteResponse": quote,
            "userPublicKey": user_pubkey,
            "wrapAndUnwrapSol": true,
        });

        let response = self.http.post(&self.swap_url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Denied { status, detail });
        }

        let body: Value = response.json().await?;
        body.get("swapTransaction")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::InvalidResponse(
                    "missing swapTransaction in swap response".to_string(),
                )
            })
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later

//! # External Providers
//!
//! HTTP clients for the services Spectra composes:
//!
//! - [`shadowwire`] — the privacy-pool API that builds unsigned shield and
//!   unshield transactions and manages per-user pool credentials
//! - [`jupiter`] — swap aggregator quoting and transaction building
//!
//! Both clients sit behind traits so handlers can be tested against fakes.

pub mod jupiter;
pub mod shadowwire;

pub use jupiter::{token_info, JupiterClient, SwapProvider, TokenInfo, SUPPORTED_TOKENS};
pub use shadowwire::{PrivacyPool, ShadowWireClient};

use thiserror::Error;

/// Errors from external provider calls.
///
/// Raw provider messages never reach API clients. Handlers log the detail
/// and map everything to a generic upstream error.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network or HTTP-level failure.
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("provider returned {status}: {detail}")]
    Denied { status: u16, detail: String },

    /// Provider answered 2xx but the body was not in the expected shape.
    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),
}

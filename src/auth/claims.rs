// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session token claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Session token lifetime in seconds (24 hours).
pub const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Claims carried by a Spectra session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Internal user id.
    pub sub: String,

    /// Wallet address the session was opened with.
    pub wallet: String,

    /// Issued at timestamp.
    pub iat: i64,

    /// Expiration timestamp.
    pub exp: i64,
}

/// Authenticated user information extracted from a session token.
///
/// This is the primary type handlers use to identify the caller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Internal user id (`sub` claim).
    pub user_id: String,

    /// Wallet address bound to the session.
    pub wallet_address: String,
}

impl From<SessionClaims> for AuthenticatedUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            wallet_address: claims.wallet,
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Shared API Models
//!
//! Request/response types that more than one handler module needs. Types
//! specific to a single endpoint live next to their handler.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Public view of a user account (never includes the custodial secret).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    /// The user's external wallet address.
    pub wallet_address: String,
    /// Privacy-pool API key issued by the provider, if registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_api_key: Option<String>,
    /// Custodial deposit address generated for this user, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_profile_omits_absent_fields() {
        let profile = UserProfile {
            wallet_address: "wallet".to_string(),
            pool_api_key: None,
            deposit_address: None,
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("pool_api_key").is_none());
        assert!(json.get("deposit_address").is_none());
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Authentication Module
//!
//! Wallet-signature login with HS256 session tokens.
//!
//! ## Auth Flow
//!
//! 1. Frontend asks the wallet extension to sign a login message
//! 2. `POST /api/auth` verifies the ed25519 signature against the claimed
//!    wallet address and issues a 24h bearer token binding the user's
//!    internal id and wallet address
//! 3. Every protected route extracts and validates the token with the
//!    `Auth` extractor
//!
//! ## Security
//!
//! - Signature verification happens before any user record is touched
//! - Tokens are signed with a process-wide secret from configuration
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod signature;

pub use claims::{AuthenticatedUser, SessionClaims};
pub use error::AuthError;
pub use extractor::Auth;
pub use signature::{issue_token, verify_wallet_signature};

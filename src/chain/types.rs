// SPDX-License-Identifier: AGPL-3.0-or-later

//! Chain constants and amount conversions.
//!
//! All internal bookkeeping is done in lamports (`u64`); SOL-denominated
//! floats exist only at the API boundary.

use solana_sdk::native_token::LAMPORTS_PER_SOL;

/// Flat network fee budgeted per transfer hop, in lamports.
pub const FLAT_FEE_LAMPORTS: u64 = 5_000;

/// Slack allowed when matching a notified amount against the on-chain balance
/// delta. Covers the network fee the signer paid on top of the transfer.
pub const VERIFY_TOLERANCE_LAMPORTS: u64 = 10_000;

/// Convert a SOL-denominated API amount into lamports.
///
/// Rejects non-finite, non-positive, and out-of-range values. Truncates
/// sub-lamport precision.
pub fn sol_to_lamports(amount_sol: f64) -> Option<u64> {
    if !amount_sol.is_finite() || amount_sol <= 0.0 {
        return None;
    }
    let lamports = amount_sol * LAMPORTS_PER_SOL as f64;
    if lamports >= u64::MAX as f64 {
        return None;
    }
    let lamports = lamports.floor() as u64;
    if lamports == 0 {
        return None;
    }
    Some(lamports)
}

/// Convert lamports to a SOL float for API responses.
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

// SPDX-License-Identifier: AGPL-3.0-or-later

//! Typed repositories over the embedded datastore.

pub mod status;
pub mod transactions;
pub mod users;

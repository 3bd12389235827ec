#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Surge node primitive types, shared state and utilities.

use std::time::{SystemTime, UNIX_EPOCH};

use alloy::eips::eip4895::GWEI_TO_WEI;
use alloy_primitives::U256;

/// Batch, proof and transaction candidate types.
pub mod batch;

/// Blob encoding utilities.
pub mod blob;

/// Compression utilities for proposal payloads.
pub mod compression;

/// The process-wide cursor state shared between prover components.
pub mod cursor;

/// L2 transaction pool types.
pub mod pool;

/// Retry and backoff utilities.
pub mod retries;

/// Utility for summarizing objects into a string for logging purposes.
pub mod summary;

/// Utilities for triggering and propagating shutdown signals.
pub mod shutdown;

/// Utilities for handling long-running and background tasks.
pub mod task;

/// Proof tiers.
pub mod tier;

/// A constant for the number of bytes in a kilobyte.
pub const BYTES_PER_KB: usize = 1024;

/// Get the current UNIX timestamp in seconds. Returns zero if the clock is set before the epoch.
pub fn current_timestamp_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}

/// From a balance expressed in wei, return the balance in ETH as a f64 with gwei precision.
///
/// NOTE:
/// * returns zero if the balance is less than 1 gwei;
/// * returns at most a balance of ~9M ETH to avoid floating point inaccuracies above certain
///   numbers.
pub fn wei_to_eth(balance: U256) -> f64 {
    const GWEI_IN_ETH: f64 = 1e-9;
    const F64_REPRESENTATION_THRESHOLD: u64 = 1 << 53; // 2^53

    let balance_in_gwei = balance / U256::from(GWEI_TO_WEI);

    if balance_in_gwei.is_zero() {
        return 0.0;
    }

    if balance_in_gwei > U256::from(F64_REPRESENTATION_THRESHOLD) {
        // Directly return 2^53 * [`GWEI_IN_ETH`]
        return 9_007_199.254740992;
    }

    // Now, we know that the first limb of the balance fits in a f64 with correct precision.
    balance_in_gwei.as_limbs()[0] as f64 * GWEI_IN_ETH
}

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Surge batch proposer
//!
//! On every proposing tick the proposer pulls pre-built transaction lists out of the L2
//! mempool, builds a proposal transaction for the configured DA backend, and only sends it
//! if the L2 fees it collects cover the L1 cost of posting and proving the batch.

/// The main proposer module with the proposing loop.
mod proposer;
pub use proposer::Proposer;

/// Proposal transaction builders, one per DA backend.
pub mod builder;

/// The proposer runtime configuration.
mod config;
pub use config::RuntimeConfig;

/// L1 cost estimation of a proposal.
pub mod cost;

/// Proposer errors.
mod error;
pub use error::{BuilderError, ProposerError};

/// The metrics for the proposer.
mod metrics;

/// Decides whether proposing a batch pays off.
pub mod profitability;

/// Read access to the L1 and L2 state needed to propose.
pub mod reader;

/// L1 activity forcing a proposal.
pub mod triggers;

#[cfg(test)]
mod test_utils;

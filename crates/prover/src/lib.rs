#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Surge proof pipeline
//!
//! The prover watches the inbox for protocol events, and:
//! - requests proofs for new batches from the proof service
//! - submits generated proofs to L1, at the cheapest tier that satisfies the batch
//! - contests transitions that don't match the local L2 chain, and escalates contested ones

/// The main prover module with the core event loop.
mod prover;
pub use prover::Prover;

/// The prover runtime configuration.
mod config;
pub use config::RuntimeConfig;

/// Pipeline errors.
mod error;
pub use error::PipelineError;

/// Protocol events as observed on L1.
pub mod event;

/// Event handlers of the prover loop.
mod handlers;

/// Replays confirmed L1 ranges and feeds protocol events to a handler.
pub mod iterator;

/// Tracks the proof status of every batch and tier.
pub mod ledger;

/// The metrics for the prover.
mod metrics;

/// Proof producers.
pub mod producer;

/// Read access to the protocol state on L1 and L2.
pub mod reader;

/// Per-tier proof submitters.
pub mod submitter;

#[cfg(test)]
mod test_utils;

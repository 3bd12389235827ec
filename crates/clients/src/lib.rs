#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Client connections to the services the node talks to: execution layers, the L2 engine,
//! the proof service and the Celestia DA node.

/// Celestia DA node JSON-RPC client
pub mod celestia;

/// `AuthRPC` (engine API) connection
pub mod engine;

/// Execution layer client connection
pub mod execution;

/// Raiko proof service client
pub mod raiko;

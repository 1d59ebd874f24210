//! Common types module for the block generator.
//!
//! This module defines the data model shared by every blockgen crate: contract
//! and transaction descriptions read from the block configuration, the receipt
//! cascade returned by the ledger, and the location a resolved execution landed in.

/// Contract and transaction descriptions sourced from configuration.
pub mod contract;
/// Ledger identifiers: addresses, hashes, shard ids.
pub mod ledger;
/// Receipt cascade and resolved execution location.
pub mod receipt;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Utility functions for hex string handling.
pub mod utils;
/// Schema validation for JSON and TOML configuration values.
pub mod validation;

pub use contract::*;
pub use ledger::*;
pub use receipt::*;
pub use registry::ImplementationRegistry;
pub use utils::{truncate_id, with_0x_prefix, without_0x_prefix};
pub use validation::*;

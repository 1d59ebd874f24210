//! Per-run contract state.

pub mod registry;

pub use registry::{ContractEntry, ContractRegistry, DeploymentState, RegistryError};

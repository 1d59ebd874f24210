//! Core pipeline of the block generator.
//!
//! Wires the contract registry, the deployment and submission handlers, the
//! receipt resolver and the node supervisor into the [`BlockGenerator`]
//! engine. Everything runs sequentially: each external command is awaited
//! before the next one is issued.

pub mod builder;
pub mod engine;
pub mod handlers;
pub mod node;
pub mod resolver;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::{BlockGeneratorBuilder, BuilderError, GatewayFactories};
pub use engine::{BlockGenerator, GenerateReport, GenerateRequest};
pub use handlers::{DeploymentError, LastCall, SubmissionError};
pub use node::NodeError;
pub use resolver::{find_execution_receipt, ResolveError};
pub use state::RegistryError;

use blockgen_artifacts::ArtifactError;
use blockgen_config::ConfigError;
use blockgen_gateway::GatewayError;
use blockgen_output::{FormatError, OutputError};
use thiserror::Error;

/// Broad class of a failure, as reported at the process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
	/// Invalid input, detected before any external process is launched.
	Configuration,
	/// An external process or endpoint failed or answered unexpectedly.
	ExternalProcess,
	/// A contract was used in a state that does not allow it.
	State,
	/// The executed message could not be located.
	Resolution,
}

/// Errors that can occur while running the block generator.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	Gateway(#[from] GatewayError),
	#[error(transparent)]
	Node(#[from] NodeError),
	#[error(transparent)]
	Artifact(#[from] ArtifactError),
	#[error(transparent)]
	Registry(#[from] RegistryError),
	#[error(transparent)]
	Deployment(#[from] DeploymentError),
	#[error(transparent)]
	Submission(#[from] SubmissionError),
	#[error(transparent)]
	Resolve(#[from] ResolveError),
	#[error(transparent)]
	Format(#[from] FormatError),
	#[error(transparent)]
	Output(#[from] OutputError),
}

impl EngineError {
	pub fn category(&self) -> ErrorCategory {
		match self {
			EngineError::Config(_) => ErrorCategory::Configuration,
			EngineError::Registry(e) => registry_category(e),
			EngineError::Deployment(e) => deployment_category(e),
			EngineError::Submission(e) => match e {
				SubmissionError::Registry(e) => registry_category(e),
				SubmissionError::Deployment(e) => deployment_category(e),
				SubmissionError::Gateway { .. } => ErrorCategory::ExternalProcess,
			},
			EngineError::Resolve(ResolveError::Gateway(_)) => ErrorCategory::ExternalProcess,
			EngineError::Resolve(_) => ErrorCategory::Resolution,
			EngineError::Io(_)
			| EngineError::Gateway(_)
			| EngineError::Node(_)
			| EngineError::Artifact(_)
			| EngineError::Format(_)
			| EngineError::Output(_) => ErrorCategory::ExternalProcess,
		}
	}
}

fn registry_category(error: &RegistryError) -> ErrorCategory {
	match error {
		RegistryError::DuplicateContractId(_) => ErrorCategory::Configuration,
		_ => ErrorCategory::State,
	}
}

fn deployment_category(error: &DeploymentError) -> ErrorCategory {
	match error {
		DeploymentError::Registry(e) => registry_category(e),
		DeploymentError::Artifact(_) | DeploymentError::Gateway { .. } => {
			ErrorCategory::ExternalProcess
		},
	}
}

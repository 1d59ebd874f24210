//! Transaction submission.
//!
//! Replays the configured transactions in order. Each one must name a
//! registered contract; in eager mode it must be deployed already, in lazy
//! mode it is deployed on first reference. A failed call aborts the whole
//! submission.

use super::deployment::{DeploymentError, DeploymentHandler};
use crate::state::{ContractRegistry, RegistryError};
use blockgen_config::DeploymentMode;
use blockgen_gateway::{CallRequest, GatewayError, GatewayService};
use blockgen_types::{truncate_id, Address, ContractId, MessageHash, TransactionIntent};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur while submitting transactions.
#[derive(Debug, Error)]
pub enum SubmissionError {
	#[error(transparent)]
	Registry(#[from] RegistryError),
	#[error(transparent)]
	Deployment(#[from] DeploymentError),
	#[error("Transaction #{index} ({method}) failed: {source}")]
	Gateway {
		index: usize,
		method: String,
		#[source]
		source: GatewayError,
	},
}

/// Message handle and target of the last dispatched transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastCall {
	pub message: MessageHash,
	pub contract_id: ContractId,
	pub address: Address,
}

/// Dispatches transaction intents through the gateway.
pub struct SubmissionHandler {
	gateway: Arc<GatewayService>,
	deployment: Arc<DeploymentHandler>,
	mode: DeploymentMode,
}

impl SubmissionHandler {
	pub fn new(
		gateway: Arc<GatewayService>,
		deployment: Arc<DeploymentHandler>,
		mode: DeploymentMode,
	) -> Self {
		Self {
			gateway,
			deployment,
			mode,
		}
	}

	/// Submits `intents` in order and returns the last call, if any.
	#[instrument(skip_all, fields(count = intents.len(), mode = %self.mode))]
	pub async fn submit(
		&self,
		registry: &mut ContractRegistry,
		intents: &[TransactionIntent],
	) -> Result<Option<LastCall>, SubmissionError> {
		let mut last = None;

		for (index, intent) in intents.iter().enumerate() {
			let id = intent.contract_id;
			let deployed = registry.get(id)?.is_deployed();

			if !deployed {
				match self.mode {
					DeploymentMode::Eager => {
						return Err(RegistryError::ContractNotDeployed(id).into());
					},
					DeploymentMode::Lazy => {
						self.deployment.deploy(registry, id).await?;
					},
				}
			}

			let (address, artifact) = registry.deployed(id)?;
			let request = CallRequest {
				address: address.clone(),
				method: intent.method_name.clone(),
				arguments: intent.arguments.clone(),
				abi: artifact.abi.clone(),
			};

			let message = self
				.gateway
				.call(&request)
				.await
				.map_err(|source| SubmissionError::Gateway {
					index,
					method: intent.method_name.clone(),
					source,
				})?;
			tracing::debug!(
				index,
				contract_id = %id,
				message = %truncate_id(&message.0),
				"Transaction dispatched"
			);

			last = Some(LastCall {
				message,
				contract_id: id,
				address: request.address,
			});
		}

		Ok(last)
	}
}

//! Contract deployment.
//!
//! Compiles a contract through the run's artifact cache and deploys it with a
//! freshly drawn 64-bit salt, so identical bytecode deployed twice lands at two
//! addresses.

use crate::state::{ContractRegistry, RegistryError};
use blockgen_artifacts::{ArtifactError, ArtifactStore};
use blockgen_gateway::{DeployRequest, GatewayError, GatewayService};
use blockgen_types::{Address, ContractId};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur while deploying a contract.
#[derive(Debug, Error)]
pub enum DeploymentError {
	#[error(transparent)]
	Registry(#[from] RegistryError),
	#[error(transparent)]
	Artifact(#[from] ArtifactError),
	#[error("Deployment of contract {id} failed: {source}")]
	Gateway {
		id: ContractId,
		#[source]
		source: GatewayError,
	},
}

/// Deploys registry entries through the gateway.
pub struct DeploymentHandler {
	gateway: Arc<GatewayService>,
	artifacts: Arc<ArtifactStore>,
}

impl DeploymentHandler {
	pub fn new(gateway: Arc<GatewayService>, artifacts: Arc<ArtifactStore>) -> Self {
		Self { gateway, artifacts }
	}

	/// Compiles (if needed) and deploys one contract.
	///
	/// Fails with [`RegistryError::AlreadyDeployed`] before any external call
	/// if the contract is deployed already.
	#[instrument(skip_all, fields(contract_id = %id))]
	pub async fn deploy(
		&self,
		registry: &mut ContractRegistry,
		id: ContractId,
	) -> Result<Address, DeploymentError> {
		let (cached, path) = {
			let entry = registry.get(id)?;
			if entry.is_deployed() {
				return Err(RegistryError::AlreadyDeployed(id).into());
			}
			(entry.artifact.clone(), entry.spec.path.clone())
		};

		let artifact = match cached {
			Some(artifact) => artifact,
			None => {
				let artifact = self.artifacts.compile(&path).await?;
				registry.mark_compiled(id, artifact.clone())?;
				artifact
			},
		};

		let request = DeployRequest {
			bytecode: artifact.bytecode,
			abi: artifact.abi,
			salt: rand::random::<u64>(),
		};
		let address = self
			.gateway
			.deploy(&request)
			.await
			.map_err(|source| DeploymentError::Gateway { id, source })?;

		registry.mark_deployed(id, address.clone())?;
		Ok(address)
	}

	/// Deploys every not yet deployed contract in registry order.
	pub async fn deploy_all(&self, registry: &mut ContractRegistry) -> Result<(), DeploymentError> {
		let pending = registry.pending();
		tracing::info!(count = pending.len(), "Deploying contracts");

		for id in pending {
			self.deploy(registry, id).await?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{fake_gateway, recording_store, write_source, Recorder};
	use blockgen_types::ContractSpec;

	#[tokio::test]
	async fn test_shared_source_compiles_once_and_deploys_twice() {
		let dir = tempfile::tempdir().unwrap();
		let source = write_source(dir.path(), "A.sol");
		let recorder = Recorder::default();
		let (store, compiles) = recording_store(dir.path());
		let handler = DeploymentHandler::new(fake_gateway(&recorder), Arc::new(store));

		let mut registry = ContractRegistry::from_specs([
			ContractSpec {
				id: ContractId(1),
				path: source.clone(),
			},
			ContractSpec {
				id: ContractId(2),
				path: source,
			},
		])
		.unwrap();

		handler.deploy_all(&mut registry).await.unwrap();

		assert_eq!(compiles.load(std::sync::atomic::Ordering::SeqCst), 1);
		let first = registry.deployed(ContractId(1)).unwrap();
		let second = registry.deployed(ContractId(2)).unwrap();
		assert_eq!(first.1, second.1);
		assert_ne!(first.0, second.0);

		let salts = recorder.salts();
		assert_eq!(salts.len(), 2);
		assert_ne!(salts[0], salts[1]);
	}

	#[tokio::test]
	async fn test_deploy_twice_fails_without_external_call() {
		let dir = tempfile::tempdir().unwrap();
		let source = write_source(dir.path(), "A.sol");
		let recorder = Recorder::default();
		let (store, _) = recording_store(dir.path());
		let handler = DeploymentHandler::new(fake_gateway(&recorder), Arc::new(store));

		let mut registry = ContractRegistry::from_specs([ContractSpec {
			id: ContractId(1),
			path: source,
		}])
		.unwrap();

		handler.deploy(&mut registry, ContractId(1)).await.unwrap();
		let err = handler
			.deploy(&mut registry, ContractId(1))
			.await
			.unwrap_err();

		assert!(matches!(
			err,
			DeploymentError::Registry(RegistryError::AlreadyDeployed(ContractId(1)))
		));
		assert_eq!(recorder.calls().len(), 1);
	}

	#[tokio::test]
	async fn test_gateway_failure_leaves_contract_undeployed() {
		let dir = tempfile::tempdir().unwrap();
		let source = write_source(dir.path(), "A.sol");
		let recorder = Recorder::failing_deploys();
		let (store, compiles) = recording_store(dir.path());
		let handler = DeploymentHandler::new(fake_gateway(&recorder), Arc::new(store));

		let mut registry = ContractRegistry::from_specs([ContractSpec {
			id: ContractId(7),
			path: source,
		}])
		.unwrap();

		let err = handler
			.deploy(&mut registry, ContractId(7))
			.await
			.unwrap_err();
		assert!(matches!(err, DeploymentError::Gateway { id: ContractId(7), .. }));
		assert_eq!(registry.pending(), vec![ContractId(7)]);

		// A retry reuses the compiled artifact
		let _ = handler.deploy(&mut registry, ContractId(7)).await;
		assert_eq!(compiles.load(std::sync::atomic::Ordering::SeqCst), 1);
	}
}

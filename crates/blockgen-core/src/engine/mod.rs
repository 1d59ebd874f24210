//! Block generator engine.
//!
//! Runs the three modes of the tool against a node owned for the duration of
//! the call: generating a block from a block configuration, writing an
//! existing block to a file, and preparing a fresh wallet CLI configuration.
//! The node is stopped on every path out of a mode, and the artifact scope
//! of a generation run is removed with it.

use crate::handlers::{DeploymentHandler, LastCall, SubmissionHandler};
use crate::node::NodeProcess;
use crate::resolver::{ReceiptResolver, ResolveError};
use crate::state::ContractRegistry;
use crate::EngineError;
use blockgen_artifacts::{ArtifactScope, ArtifactStore, CompilerInterface};
use blockgen_config::{BlockConfig, Config, DeploymentMode};
use blockgen_gateway::GatewayService;
use blockgen_output::{legacy_block, legacy_paths, legacy_state, write_json};
use blockgen_types::{Address, BlockHash, ResolvedLocation, ShardId};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

/// Inputs of one block generation.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
	pub block: BlockConfig,
	pub mode: DeploymentMode,
	/// Prefix of the legacy `.state` and `.block` documents.
	pub legacy_prefix: Option<PathBuf>,
	/// Where to write the fetched block document.
	pub block_output: Option<PathBuf>,
	/// Where to write the called contract's state at the resolved block.
	pub state_output: Option<PathBuf>,
}

impl GenerateRequest {
	pub fn new(block: BlockConfig, mode: DeploymentMode) -> Self {
		Self {
			block,
			mode,
			legacy_prefix: None,
			block_output: None,
			state_output: None,
		}
	}
}

/// Result of a block generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateReport {
	pub location: ResolvedLocation,
	/// Contract called by the last transaction.
	pub contract: Address,
	/// Output files written, in order.
	pub files: Vec<PathBuf>,
}

/// Main engine of the block generator.
pub struct BlockGenerator {
	config: Config,
	gateway: Arc<GatewayService>,
	compiler: Arc<dyn CompilerInterface>,
}

impl BlockGenerator {
	pub fn new(
		config: Config,
		gateway: Arc<GatewayService>,
		compiler: Arc<dyn CompilerInterface>,
	) -> Self {
		Self {
			config,
			gateway,
			compiler,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Runs `work` with a ready node and stops the node afterwards, whatever
	/// the outcome.
	async fn with_node<T, F>(&self, work: F) -> Result<T, EngineError>
	where
		F: Future<Output = Result<T, EngineError>>,
	{
		let mut node = NodeProcess::start(&self.config.node)?;

		let result = match node
			.wait_ready(&self.config.node.readiness, &self.gateway)
			.await
		{
			Ok(()) => work.await,
			Err(e) => Err(e.into()),
		};
		let stopped = node.shutdown().await;

		match (result, stopped) {
			(Ok(value), Ok(())) => Ok(value),
			(Ok(_), Err(e)) => Err(e.into()),
			(Err(e), Ok(())) => Err(e),
			(Err(e), Err(stop)) => {
				tracing::warn!(error = %stop, "Failed to stop node");
				Err(e)
			},
		}
	}

	/// Deploys the configured contracts, replays the transactions and
	/// resolves the block holding the last call's execution.
	pub async fn generate_block(
		&self,
		request: &GenerateRequest,
	) -> Result<GenerateReport, EngineError> {
		self.with_node(self.run_generation(request)).await
	}

	#[instrument(skip_all, fields(
		contracts = request.block.contracts.len(),
		transactions = request.block.transactions.len(),
		mode = %request.mode
	))]
	async fn run_generation(&self, request: &GenerateRequest) -> Result<GenerateReport, EngineError> {
		// Dropped at the end of this call, which removes the artifacts
		let scope = ArtifactScope::new(self.config.artifacts.base_dir.as_deref())?;
		let artifacts = Arc::new(ArtifactStore::new(self.compiler.clone(), scope));

		let mut registry = ContractRegistry::from_specs(request.block.contracts.iter().cloned())?;
		let deployment = Arc::new(DeploymentHandler::new(self.gateway.clone(), artifacts));

		if request.mode == DeploymentMode::Eager {
			deployment.deploy_all(&mut registry).await?;
		}

		let submission = SubmissionHandler::new(self.gateway.clone(), deployment, request.mode);
		let last = submission
			.submit(&mut registry, &request.block.transactions)
			.await?;

		let location = ReceiptResolver::new(self.gateway.clone())
			.resolve(last.as_ref())
			.await?;
		let last = last.ok_or(ResolveError::EmptyHandle)?;

		let files = self
			.write_outputs(request, &registry, &last, &location)
			.await?;

		Ok(GenerateReport {
			location,
			contract: last.address,
			files,
		})
	}

	async fn write_outputs(
		&self,
		request: &GenerateRequest,
		registry: &ContractRegistry,
		last: &LastCall,
		location: &ResolvedLocation,
	) -> Result<Vec<PathBuf>, EngineError> {
		let mut files = Vec::new();

		let block = if request.block_output.is_some() || request.legacy_prefix.is_some() {
			Some(
				self.gateway
					.block(location.shard_id, &location.block_hash)
					.await?,
			)
		} else {
			None
		};

		if let (Some(path), Some(block)) = (&request.block_output, &block) {
			write_json(path, block).await?;
			files.push(path.clone());
		}

		if let Some(path) = &request.state_output {
			let state = self
				.gateway
				.contract_state(&last.address, &location.block_hash)
				.await?;
			write_json(path, &state).await?;
			files.push(path.clone());
		}

		if let (Some(prefix), Some(block)) = (&request.legacy_prefix, &block) {
			let (_, artifact) = registry.deployed(last.contract_id)?;
			let bytecode = artifact.read_bytecode().await?;
			let wallet = self.gateway.wallet_address().await?;
			let (state_path, block_path) = legacy_paths(prefix);

			let state = legacy_state(&last.address, &wallet, &bytecode, &self.config.legacy);
			write_json(&state_path, &state).await?;
			files.push(state_path);

			let legacy = legacy_block(block, &self.config.legacy)?;
			write_json(&block_path, &legacy).await?;
			files.push(block_path);
		}

		Ok(files)
	}

	/// Fetches a block and writes it as JSON.
	#[instrument(skip_all, fields(shard_id = %shard_id, block_hash = %block_hash))]
	pub async fn write_block(
		&self,
		shard_id: ShardId,
		block_hash: &BlockHash,
		output: &Path,
	) -> Result<(), EngineError> {
		self.with_node(async {
			let block = self.gateway.block(shard_id, block_hash).await?;
			write_json(output, &block).await?;
			Ok::<(), EngineError>(())
		})
		.await
	}

	/// Creates a wallet CLI configuration with a fresh key and wallet.
	///
	/// Any existing file at `cli_config` is replaced. The wallet gateway must
	/// have been built for the same path.
	#[instrument(skip_all, fields(path = %cli_config.display()))]
	pub async fn make_config(&self, cli_config: &Path) -> Result<Address, EngineError> {
		let is_file = tokio::fs::metadata(cli_config)
			.await
			.map(|m| m.is_file())
			.unwrap_or(false);
		if is_file {
			tracing::info!("Removing existing config");
			tokio::fs::remove_file(cli_config).await?;
		}

		self.gateway
			.init_config(&self.config.gateway.rpc_endpoint)
			.await?;
		let keygen = self.gateway.generate_key().await?;
		tracing::debug!(output = %keygen, "Generated key");

		self.with_node(async { Ok::<_, EngineError>(self.gateway.create_wallet().await?) })
			.await
	}
}

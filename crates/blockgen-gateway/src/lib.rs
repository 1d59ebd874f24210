//! Command gateway for the block generator.
//!
//! Everything the generator asks of the ledger goes through this crate. Two
//! interfaces split the surface by kind of command:
//!
//! - [`WalletInterface`]: state-changing wallet commands (config and key
//!   management, wallet creation, contract deployment, message sending).
//! - [`LookupInterface`]: read-only queries (health probe, receipt cascade,
//!   block and contract state).
//!
//! Implementations return typed results per command kind. The `nil_cli`
//! implementation extracts them from the CLI's text output; the JSON-RPC
//! implementation talks to the node directly and is preferred for lookups.

use async_trait::async_trait;
use blockgen_types::{
	truncate_id, Address, BlockHash, ConfigSchema, ImplementationRegistry, MessageHash,
	ReceiptNode, ShardId,
};
use std::path::PathBuf;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod nil {
		pub mod cli;
		pub mod rpc;
	}
}

mod json;

/// Errors that can occur while talking to the wallet CLI or the node.
#[derive(Debug, Error)]
pub enum GatewayError {
	/// The external command could not be started.
	#[error("Failed to launch '{command}': {message}")]
	Launch { command: String, message: String },
	/// The external command exited with a non-zero status.
	#[error("Command '{command}' failed: {stderr}")]
	CommandFailed { command: String, stderr: String },
	/// The command succeeded but its output could not be interpreted.
	#[error("Unexpected output from '{command}': {message}")]
	UnexpectedOutput { command: String, message: String },
	/// Error that occurs during HTTP communication.
	#[error("HTTP error: {0}")]
	Http(String),
	/// The JSON-RPC endpoint answered with an error object.
	#[error("RPC error {code} from {method}: {message}")]
	Rpc {
		method: String,
		code: i64,
		message: String,
	},
	/// The implementation cannot perform this kind of command.
	#[error("{operation} is not supported by the '{implementation}' gateway")]
	Unsupported {
		operation: &'static str,
		implementation: &'static str,
	},
	/// Error that occurs when an implementation is misconfigured.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Contract deployment command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
	/// Compiled bytecode file.
	pub bytecode: PathBuf,
	/// Interface description file.
	pub abi: PathBuf,
	/// Salt mixed into the address derivation.
	pub salt: u64,
}

/// Contract call command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
	pub address: Address,
	pub method: String,
	pub arguments: Vec<String>,
	/// Interface description used to encode the call.
	pub abi: PathBuf,
}

/// Runtime values implementations may need besides their TOML table.
#[derive(Debug, Clone, Default)]
pub struct GatewayContext {
	/// Wallet CLI configuration file selected on the command line.
	pub cli_config: Option<PathBuf>,
}

/// Trait defining the interface for state-changing wallet commands.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait WalletInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Creates a fresh wallet configuration pointing at the given endpoint.
	async fn init_config(&self, rpc_endpoint: &str) -> Result<(), GatewayError>;

	/// Generates a new private key and stores it in the wallet configuration.
	///
	/// Returns the raw command output for logging.
	async fn generate_key(&self) -> Result<String, GatewayError>;

	/// Creates a new wallet contract on the ledger.
	async fn create_wallet(&self) -> Result<Address, GatewayError>;

	/// Returns the address of the configured wallet.
	async fn wallet_address(&self) -> Result<Address, GatewayError>;

	/// Deploys compiled bytecode and returns the contract address.
	async fn deploy_contract(&self, request: &DeployRequest) -> Result<Address, GatewayError>;

	/// Sends a message calling a contract method and returns its hash.
	async fn send_message(&self, request: &CallRequest) -> Result<MessageHash, GatewayError>;
}

/// Trait defining the interface for read-only ledger queries.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait LookupInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Succeeds once the node answers queries.
	async fn probe(&self) -> Result<(), GatewayError>;

	/// Fetches the receipt cascade rooted at the given message.
	async fn receipt(&self, hash: &MessageHash) -> Result<ReceiptNode, GatewayError>;

	/// Fetches a block document, including its messages.
	async fn block(
		&self,
		shard_id: ShardId,
		hash: &BlockHash,
	) -> Result<serde_json::Value, GatewayError>;

	/// Fetches a contract's account and storage as of the given block.
	async fn contract_state(
		&self,
		address: &Address,
		block_hash: &BlockHash,
	) -> Result<serde_json::Value, GatewayError>;
}

/// Type alias for wallet factory functions.
pub type WalletFactory =
	fn(&toml::Value, &GatewayContext) -> Result<Box<dyn WalletInterface>, GatewayError>;

/// Type alias for lookup factory functions.
pub type LookupFactory =
	fn(&toml::Value, &GatewayContext) -> Result<Box<dyn LookupInterface>, GatewayError>;

/// Registry trait for wallet implementations.
pub trait WalletRegistry: ImplementationRegistry<Factory = WalletFactory> {}

/// Registry trait for lookup implementations.
pub trait LookupRegistry: ImplementationRegistry<Factory = LookupFactory> {}

/// Get all registered wallet implementations.
pub fn get_all_wallet_implementations() -> Vec<(&'static str, WalletFactory)> {
	use implementations::nil::cli;

	vec![(cli::CliWalletRegistry::NAME, cli::CliWalletRegistry::factory())]
}

/// Get all registered lookup implementations.
pub fn get_all_lookup_implementations() -> Vec<(&'static str, LookupFactory)> {
	use implementations::nil::{cli, rpc};

	vec![
		(cli::CliLookupRegistry::NAME, cli::CliLookupRegistry::factory()),
		(rpc::Registry::NAME, rpc::Registry::factory()),
	]
}

/// Service routing commands to the configured wallet and lookup implementations.
///
/// Every call is awaited to completion before the caller continues; the service
/// never retries a failed command.
pub struct GatewayService {
	wallet: Box<dyn WalletInterface>,
	lookup: Box<dyn LookupInterface>,
}

impl GatewayService {
	pub fn new(wallet: Box<dyn WalletInterface>, lookup: Box<dyn LookupInterface>) -> Self {
		Self { wallet, lookup }
	}

	pub async fn init_config(&self, rpc_endpoint: &str) -> Result<(), GatewayError> {
		self.wallet.init_config(rpc_endpoint).await
	}

	pub async fn generate_key(&self) -> Result<String, GatewayError> {
		self.wallet.generate_key().await
	}

	pub async fn create_wallet(&self) -> Result<Address, GatewayError> {
		let address = self.wallet.create_wallet().await?;
		tracing::info!(wallet = %address, "Created wallet");
		Ok(address)
	}

	pub async fn wallet_address(&self) -> Result<Address, GatewayError> {
		self.wallet.wallet_address().await
	}

	/// Deploys a contract and returns its address.
	pub async fn deploy(&self, request: &DeployRequest) -> Result<Address, GatewayError> {
		let address = self.wallet.deploy_contract(request).await?;
		tracing::info!(address = %address, salt = request.salt, "Deployed contract");
		Ok(address)
	}

	/// Sends a contract call and returns the message hash.
	pub async fn call(&self, request: &CallRequest) -> Result<MessageHash, GatewayError> {
		let hash = self.wallet.send_message(request).await?;
		tracing::info!(
			address = %request.address,
			method = %request.method,
			message = %truncate_id(&hash.0),
			"Sent message"
		);
		Ok(hash)
	}

	pub async fn probe(&self) -> Result<(), GatewayError> {
		self.lookup.probe().await
	}

	pub async fn receipt(&self, hash: &MessageHash) -> Result<ReceiptNode, GatewayError> {
		self.lookup.receipt(hash).await
	}

	pub async fn block(
		&self,
		shard_id: ShardId,
		hash: &BlockHash,
	) -> Result<serde_json::Value, GatewayError> {
		self.lookup.block(shard_id, hash).await
	}

	pub async fn contract_state(
		&self,
		address: &Address,
		block_hash: &BlockHash,
	) -> Result<serde_json::Value, GatewayError> {
		self.lookup.contract_state(address, block_hash).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_registered_implementations() {
		let wallets: Vec<_> = get_all_wallet_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		let lookups: Vec<_> = get_all_lookup_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();

		assert_eq!(wallets, vec!["cli"]);
		assert_eq!(lookups, vec!["cli", "rpc"]);
	}

	#[test]
	fn test_error_messages() {
		let err = GatewayError::CommandFailed {
			command: "nil_cli wallet info".into(),
			stderr: "no wallet".into(),
		};
		assert_eq!(err.to_string(), "Command 'nil_cli wallet info' failed: no wallet");

		let err = GatewayError::Unsupported {
			operation: "contract_state",
			implementation: "cli",
		};
		assert_eq!(
			err.to_string(),
			"contract_state is not supported by the 'cli' gateway"
		);
	}
}

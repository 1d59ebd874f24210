//! `nil_cli` gateway implementation.
//!
//! Runs the wallet CLI as a child process for every command and extracts the
//! typed result from its text output with fixed patterns. This is the only
//! implementation able to sign and send; for lookups it is the fallback when
//! no JSON-RPC endpoint is configured.

use crate::{
	CallRequest, DeployRequest, GatewayContext, GatewayError, LookupInterface, WalletInterface,
};
use async_trait::async_trait;
use blockgen_types::{
	toml_to_json, Address, BlockHash, ConfigSchema, Field, FieldType, MessageHash, ReceiptNode,
	Schema, ShardId, ValidationError,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tokio::process::Command;

static CONTRACT_ADDRESS: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"Contract address: (0x[0-9a-f]+)").expect("valid pattern"));
static MESSAGE_HASH: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"Message hash: (0x[0-9a-f]+)").expect("valid pattern"));
static WALLET_ADDRESS: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"Wallet address: (0x[0-9a-fA-F]+)").expect("valid pattern"));
static NEW_WALLET_ADDRESS: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"New wallet address: (0x[0-9a-fA-F]+)").expect("valid pattern"));

const RECEIPT_MARKER: &str = "Receipt data: ";
const BLOCK_MARKER: &str = "Block data: ";

/// Wallet CLI gateway.
pub struct CliGateway {
	/// Executable to run.
	binary: String,
	/// Arguments placed before every subcommand (e.g. a wrapper script).
	binary_args: Vec<String>,
	/// Wallet configuration passed with `-c`.
	config_path: Option<PathBuf>,
	/// Subcommand used as the readiness probe.
	probe_args: Vec<String>,
}

impl CliGateway {
	pub fn new(
		binary: impl Into<String>,
		binary_args: Vec<String>,
		config_path: Option<PathBuf>,
		probe_args: Vec<String>,
	) -> Self {
		Self {
			binary: binary.into(),
			binary_args,
			config_path,
			probe_args,
		}
	}

	/// Runs one CLI command and returns its output.
	///
	/// Some commands (`config show` among them) print their result to stderr,
	/// so stderr is returned when stdout is empty.
	async fn run(&self, args: &[String]) -> Result<String, GatewayError> {
		let mut full_args = self.binary_args.clone();
		if let Some(path) = &self.config_path {
			full_args.push("-c".to_string());
			full_args.push(path.display().to_string());
		}
		full_args.extend_from_slice(args);

		let command_line = format!("{} {}", self.binary, full_args.join(" "));
		tracing::info!("Launching {}", command_line);

		let output = Command::new(&self.binary)
			.args(&full_args)
			.output()
			.await
			.map_err(|e| GatewayError::Launch {
				command: command_line.clone(),
				message: e.to_string(),
			})?;

		let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
		if !output.status.success() {
			return Err(GatewayError::CommandFailed {
				command: command_line,
				stderr: stderr.trim().to_string(),
			});
		}

		let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
		let text = if stdout.trim().is_empty() { stderr } else { stdout };
		tracing::debug!(command = %command_line, output = %text.trim(), "Command finished");
		Ok(text)
	}

	async fn run_capture(&self, args: &[String], pattern: &Regex) -> Result<String, GatewayError> {
		let output = self.run(args).await?;
		capture(&output, pattern).ok_or_else(|| GatewayError::UnexpectedOutput {
			command: args.join(" "),
			message: format!("no match for '{}' in: {}", pattern.as_str(), output.trim()),
		})
	}

	async fn run_json<T: DeserializeOwned>(
		&self,
		args: &[String],
		marker: &str,
	) -> Result<T, GatewayError> {
		let output = self.run(args).await?;
		json_after(&output, marker).map_err(|message| GatewayError::UnexpectedOutput {
			command: args.join(" "),
			message,
		})
	}
}

/// Returns the first capture group of `pattern` in `output`.
fn capture(output: &str, pattern: &Regex) -> Option<String> {
	pattern
		.captures(output)
		.and_then(|caps| caps.get(1))
		.map(|m| m.as_str().to_string())
}

/// Parses the JSON document printed after `marker`.
///
/// Trailing text after the document is ignored.
fn json_after<T: DeserializeOwned>(output: &str, marker: &str) -> Result<T, String> {
	let (_, rest) = output
		.split_once(marker)
		.ok_or_else(|| format!("missing '{}' in: {}", marker.trim(), output.trim()))?;

	crate::json::leading_from_str(rest)
		.map_err(|e| format!("invalid JSON after '{}': {}", marker.trim(), e))
}

fn parse_address(command: &str, value: &str) -> Result<Address, GatewayError> {
	Address::parse(value).map_err(|e| GatewayError::UnexpectedOutput {
		command: command.to_string(),
		message: e.to_string(),
	})
}

fn args(items: &[&str]) -> Vec<String> {
	items.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl WalletInterface for CliGateway {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(CliGatewaySchema)
	}

	async fn init_config(&self, rpc_endpoint: &str) -> Result<(), GatewayError> {
		if self.config_path.is_none() {
			return Err(GatewayError::Configuration(
				"a wallet config path is required to initialise a config".into(),
			));
		}
		self.run(&args(&["config", "init"])).await?;
		self.run(&args(&["config", "set", "rpc_endpoint", rpc_endpoint]))
			.await?;
		Ok(())
	}

	async fn generate_key(&self) -> Result<String, GatewayError> {
		let output = self.run(&args(&["keygen", "new"])).await?;
		Ok(output.trim().to_string())
	}

	async fn create_wallet(&self) -> Result<Address, GatewayError> {
		let value = self
			.run_capture(&args(&["wallet", "new"]), &NEW_WALLET_ADDRESS)
			.await?;
		parse_address("wallet new", &value)
	}

	async fn wallet_address(&self) -> Result<Address, GatewayError> {
		let value = self
			.run_capture(&args(&["wallet", "info"]), &WALLET_ADDRESS)
			.await?;
		parse_address("wallet info", &value)
	}

	async fn deploy_contract(&self, request: &DeployRequest) -> Result<Address, GatewayError> {
		let command = vec![
			"wallet".to_string(),
			"deploy".to_string(),
			request.bytecode.display().to_string(),
			"--abi".to_string(),
			request.abi.display().to_string(),
			"--salt".to_string(),
			request.salt.to_string(),
		];
		let value = self.run_capture(&command, &CONTRACT_ADDRESS).await?;
		parse_address("wallet deploy", &value)
	}

	async fn send_message(&self, request: &CallRequest) -> Result<MessageHash, GatewayError> {
		let mut command = vec![
			"wallet".to_string(),
			"send-message".to_string(),
			request.address.to_string(),
			request.method.clone(),
		];
		command.extend(request.arguments.iter().cloned());
		command.push("--abi".to_string());
		command.push(request.abi.display().to_string());

		let value = self.run_capture(&command, &MESSAGE_HASH).await?;
		Ok(MessageHash(value))
	}
}

#[async_trait]
impl LookupInterface for CliGateway {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(CliGatewaySchema)
	}

	async fn probe(&self) -> Result<(), GatewayError> {
		self.run(&self.probe_args).await.map(|_| ())
	}

	async fn receipt(&self, hash: &MessageHash) -> Result<ReceiptNode, GatewayError> {
		let command = vec!["receipt".to_string(), hash.0.clone()];
		self.run_json(&command, RECEIPT_MARKER).await
	}

	async fn block(
		&self,
		shard_id: ShardId,
		hash: &BlockHash,
	) -> Result<serde_json::Value, GatewayError> {
		let command = vec![
			"block".to_string(),
			hash.0.clone(),
			"--shard-id".to_string(),
			shard_id.to_string(),
		];
		self.run_json(&command, BLOCK_MARKER).await
	}

	async fn contract_state(
		&self,
		_address: &Address,
		_block_hash: &BlockHash,
	) -> Result<serde_json::Value, GatewayError> {
		Err(GatewayError::Unsupported {
			operation: "contract_state",
			implementation: "cli",
		})
	}
}

/// Configuration schema for the CLI gateway.
pub struct CliGatewaySchema;

impl ConfigSchema for CliGatewaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let non_empty = |value: &serde_json::Value| match value.as_str() {
			Some(s) if !s.is_empty() => Ok(()),
			_ => Err("cannot be empty".to_string()),
		};

		let schema = Schema::strict(
			vec![],
			vec![
				Field::new("binary", FieldType::String).with_validator(non_empty),
				Field::new("binary_args", FieldType::Array(Box::new(FieldType::String))),
				Field::new("config_path", FieldType::String).with_validator(non_empty),
				Field::new("probe_args", FieldType::Array(Box::new(FieldType::String)))
					.with_validator(|value| match value.as_array() {
						Some(items) if !items.is_empty() => Ok(()),
						_ => Err("probe_args cannot be empty".to_string()),
					}),
			],
		);

		schema.validate(&toml_to_json(config)?)
	}
}

fn string_list(config: &toml::Value, key: &str) -> Option<Vec<String>> {
	config.get(key).and_then(|v| v.as_array()).map(|items| {
		items
			.iter()
			.filter_map(|item| item.as_str().map(str::to_string))
			.collect()
	})
}

fn build(config: &toml::Value, context: &GatewayContext) -> Result<CliGateway, GatewayError> {
	let binary = config
		.get("binary")
		.and_then(|v| v.as_str())
		.unwrap_or("nil_cli")
		.to_string();
	let binary_args = string_list(config, "binary_args").unwrap_or_default();
	// The config selected on the command line wins over the configured one
	let config_path = context.cli_config.clone().or_else(|| {
		config
			.get("config_path")
			.and_then(|v| v.as_str())
			.map(PathBuf::from)
	});
	let probe_args = string_list(config, "probe_args")
		.unwrap_or_else(|| vec!["block".to_string(), "latest".to_string()]);

	Ok(CliGateway::new(binary, binary_args, config_path, probe_args))
}

/// Factory function to create the CLI wallet from configuration.
///
/// Configuration parameters (all optional):
/// - `binary`: wallet CLI executable, defaults to `nil_cli`
/// - `binary_args`: arguments placed before every subcommand
/// - `config_path`: wallet config file, overridden by the command line
/// - `probe_args`: readiness probe subcommand, defaults to `block latest`
pub fn create_wallet(
	config: &toml::Value,
	context: &GatewayContext,
) -> Result<Box<dyn WalletInterface>, GatewayError> {
	Ok(Box::new(build(config, context)?))
}

/// Factory function to create the CLI lookup from configuration.
pub fn create_lookup(
	config: &toml::Value,
	context: &GatewayContext,
) -> Result<Box<dyn LookupInterface>, GatewayError> {
	Ok(Box::new(build(config, context)?))
}

/// Registry for the CLI wallet implementation.
pub struct CliWalletRegistry;

impl blockgen_types::ImplementationRegistry for CliWalletRegistry {
	const NAME: &'static str = "cli";
	type Factory = crate::WalletFactory;

	fn factory() -> Self::Factory {
		create_wallet
	}
}

impl crate::WalletRegistry for CliWalletRegistry {}

/// Registry for the CLI lookup implementation.
pub struct CliLookupRegistry;

impl blockgen_types::ImplementationRegistry for CliLookupRegistry {
	const NAME: &'static str = "cli";
	type Factory = crate::LookupFactory;

	fn factory() -> Self::Factory {
		create_lookup
	}
}

impl crate::LookupRegistry for CliLookupRegistry {}

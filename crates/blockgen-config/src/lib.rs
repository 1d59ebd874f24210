//! Configuration module for the block generator.
//!
//! Two configuration inputs are handled here:
//!
//! - the tool configuration (TOML), describing how to reach the ledger node,
//!   the wallet CLI and the compiler, which deployment policy to use and the
//!   literal defaults of the legacy output format. It is optional; the built-in
//!   defaults reproduce a local `nil run` setup.
//! - the block configuration (JSON), listing the contracts to deploy and the
//!   transactions to replay. See [`block`].
//!
//! ## Environment variables
//!
//! String values in the tool configuration may reference environment variables
//! with `${VAR_NAME}` or `${VAR_NAME:-default}`.

pub mod block;

pub use block::BlockConfig;

use blockgen_types::ContractId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML or JSON configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
	/// Error that occurs when two contracts share the same id.
	#[error("Duplicated contract id: {0}")]
	DuplicateContractId(ContractId),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Built-in tool configuration used when no file is given.
pub const DEFAULT_CONFIG: &str = r#"
[gateway]
rpc_endpoint = "${NIL_RPC_ENDPOINT:-http://127.0.0.1:8529}"
wallet = "cli"
lookup = "rpc"

[gateway.implementations.cli]
binary = "nil_cli"

[gateway.implementations.rpc]
endpoint = "${NIL_RPC_ENDPOINT:-http://127.0.0.1:8529}"
"#;

/// Main tool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Ledger node process settings.
	#[serde(default)]
	pub node: NodeConfig,
	/// Wallet and lookup gateway settings.
	pub gateway: GatewayConfig,
	/// Solidity compiler settings.
	#[serde(default)]
	pub compiler: CompilerConfig,
	/// Location of the per-run artifact scope.
	#[serde(default)]
	pub artifacts: ArtifactsConfig,
	/// Deployment policy.
	#[serde(default)]
	pub deployment: DeploymentConfig,
	/// Literal defaults of the legacy output format.
	#[serde(default)]
	pub legacy: LegacyConfig,
}

/// Ledger node process settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
	/// Whether to launch the node; false means one is already running.
	#[serde(default = "default_true")]
	pub launch: bool,
	/// Executable that runs the node.
	#[serde(default = "default_node_command")]
	pub command: String,
	/// Arguments passed to the node executable.
	#[serde(default = "default_node_args")]
	pub args: Vec<String>,
	/// Readiness polling after launch.
	#[serde(default)]
	pub readiness: ReadinessConfig,
	/// Time the node gets to exit after SIGTERM before it is killed.
	#[serde(default = "default_shutdown_grace_ms")]
	pub shutdown_grace_ms: u64,
}

impl Default for NodeConfig {
	fn default() -> Self {
		Self {
			launch: true,
			command: default_node_command(),
			args: default_node_args(),
			readiness: ReadinessConfig::default(),
			shutdown_grace_ms: default_shutdown_grace_ms(),
		}
	}
}

/// Bounded poll against the lookup gateway's health probe.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadinessConfig {
	/// Delay between two probes in milliseconds.
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	/// Number of probes before giving up.
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
}

impl Default for ReadinessConfig {
	fn default() -> Self {
		Self {
			poll_interval_ms: default_poll_interval_ms(),
			max_attempts: default_max_attempts(),
		}
	}
}

/// Gateway configuration.
///
/// `wallet` and `lookup` name the implementations used for state-changing
/// wallet commands and for receipt/block queries respectively. Each entry of
/// `implementations` is validated by the schema of the implementation it names.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
	/// Endpoint written into fresh wallet CLI configs.
	#[serde(default = "default_rpc_endpoint")]
	pub rpc_endpoint: String,
	/// Implementation handling wallet commands.
	pub wallet: String,
	/// Implementation handling receipt and block lookups.
	pub lookup: String,
	/// Map of implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Solidity compiler settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompilerConfig {
	#[serde(default = "default_compiler_binary")]
	pub binary: String,
	/// Extra arguments appended after the output selection flags.
	#[serde(default)]
	pub extra_args: Vec<String>,
}

impl Default for CompilerConfig {
	fn default() -> Self {
		Self {
			binary: default_compiler_binary(),
			extra_args: Vec::new(),
		}
	}
}

/// Artifact scope settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArtifactsConfig {
	/// Parent directory of the per-run scope; the system temp dir if unset.
	pub base_dir: Option<PathBuf>,
}

/// When contracts get deployed relative to the transactions that use them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
	/// Deploy every contract before submitting the first transaction.
	#[default]
	Eager,
	/// Deploy a contract when a transaction first references it.
	Lazy,
}

impl FromStr for DeploymentMode {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"eager" => Ok(Self::Eager),
			"lazy" => Ok(Self::Lazy),
			other => Err(ConfigError::Validation(format!(
				"Unknown deployment mode '{}', expected 'eager' or 'lazy'",
				other
			))),
		}
	}
}

impl fmt::Display for DeploymentMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Eager => f.write_str("eager"),
			Self::Lazy => f.write_str("lazy"),
		}
	}
}

/// Deployment policy.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeploymentConfig {
	#[serde(default)]
	pub mode: DeploymentMode,
}

/// Literal values of the legacy block and state documents.
///
/// None of these are meaningful for the generated fixtures; the legacy schema
/// just requires them to be present.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LegacyConfig {
	#[serde(default = "default_legacy_coinbase")]
	pub coinbase: String,
	#[serde(default)]
	pub header: LegacyHeaderConfig,
	#[serde(default = "default_transaction_type")]
	pub transaction_type: String,
	#[serde(default)]
	pub transaction_nonce: u64,
	#[serde(default)]
	pub contract_balance: u64,
	/// Balance given to the calling wallet in the state document.
	#[serde(default = "default_wallet_balance")]
	pub wallet_balance: u64,
}

impl Default for LegacyConfig {
	fn default() -> Self {
		Self {
			coinbase: default_legacy_coinbase(),
			header: LegacyHeaderConfig::default(),
			transaction_type: default_transaction_type(),
			transaction_nonce: 0,
			contract_balance: 0,
			wallet_balance: default_wallet_balance(),
		}
	}
}

/// Header fields of the legacy block document.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LegacyHeaderConfig {
	pub parent_hash: u64,
	pub number: u64,
	pub gas_limit: u64,
	pub gas_used: u64,
	pub prevrandao: u64,
	pub chain_id: u64,
	pub basefee: u64,
	pub blob_basefee: u64,
	pub timestamp: u64,
}

impl Default for LegacyHeaderConfig {
	fn default() -> Self {
		Self {
			parent_hash: 0,
			number: 1,
			gas_limit: 2,
			gas_used: 3,
			prevrandao: 4,
			chain_id: 1,
			basefee: 55,
			blob_basefee: 55,
			timestamp: 5,
		}
	}
}

fn default_true() -> bool {
	true
}

fn default_node_command() -> String {
	"nil".to_string()
}

fn default_node_args() -> Vec<String> {
	vec!["run".to_string()]
}

fn default_poll_interval_ms() -> u64 {
	500
}

fn default_max_attempts() -> u32 {
	20
}

fn default_shutdown_grace_ms() -> u64 {
	5000
}

fn default_rpc_endpoint() -> String {
	"http://127.0.0.1:8529".to_string()
}

fn default_compiler_binary() -> String {
	"solc".to_string()
}

fn default_legacy_coinbase() -> String {
	"0x0000000000000000000000000000000000000005".to_string()
}

fn default_transaction_type() -> String {
	"MessageCall".to_string()
}

fn default_wallet_balance() -> u64 {
	1_000_000
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Returns the built-in configuration.
	pub fn builtin() -> Result<Self, ConfigError> {
		DEFAULT_CONFIG.parse()
	}

	/// Loads configuration from a TOML file, resolving environment variables.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Cannot read {}: {}", path.display(), e),
			))
		})?;
		content.parse()
	}

	/// Validates cross-field constraints that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.node.launch && self.node.command.is_empty() {
			return Err(ConfigError::Validation(
				"node.command cannot be empty when node.launch is enabled".into(),
			));
		}
		if self.node.readiness.poll_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"node.readiness.poll_interval_ms must be greater than 0".into(),
			));
		}
		if self.node.readiness.max_attempts == 0 || self.node.readiness.max_attempts > 600 {
			return Err(ConfigError::Validation(
				"node.readiness.max_attempts must be between 1 and 600".into(),
			));
		}

		if self.gateway.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one gateway implementation must be configured".into(),
			));
		}
		for (role, name) in [
			("wallet", &self.gateway.wallet),
			("lookup", &self.gateway.lookup),
		] {
			if name.is_empty() {
				return Err(ConfigError::Validation(format!(
					"gateway.{} cannot be empty",
					role
				)));
			}
			if !self.gateway.implementations.contains_key(name) {
				return Err(ConfigError::Validation(format!(
					"Gateway {} implementation '{}' not found in gateway.implementations",
					role, name
				)));
			}
		}

		if self.compiler.binary.is_empty() {
			return Err(ConfigError::Validation(
				"compiler.binary cannot be empty".into(),
			));
		}

		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builtin_config() {
		let config = Config::builtin().unwrap();
		assert!(config.node.launch);
		assert_eq!(config.node.command, "nil");
		assert_eq!(config.node.args, vec!["run".to_string()]);
		assert_eq!(config.node.shutdown_grace_ms, 5000);
		assert_eq!(config.gateway.wallet, "cli");
		assert_eq!(config.gateway.lookup, "rpc");
		assert_eq!(config.compiler.binary, "solc");
		assert_eq!(config.deployment.mode, DeploymentMode::Eager);
		assert_eq!(config.legacy.wallet_balance, 1_000_000);
		assert_eq!(config.legacy.header.basefee, 55);
	}

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("BLOCKGEN_TEST_CLI", "/opt/nil/nil_cli");

		let input = "binary = \"${BLOCKGEN_TEST_CLI}\"\nendpoint = \"${BLOCKGEN_TEST_UNSET:-http://localhost:8529}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(
			result,
			"binary = \"/opt/nil/nil_cli\"\nendpoint = \"http://localhost:8529\""
		);

		std::env::remove_var("BLOCKGEN_TEST_CLI");
	}

	#[test]
	fn test_missing_env_var_without_default() {
		let err = resolve_env_vars("x = \"${BLOCKGEN_TEST_DEFINITELY_UNSET}\"").unwrap_err();
		assert!(err
			.to_string()
			.contains("Environment variable 'BLOCKGEN_TEST_DEFINITELY_UNSET' not found"));
	}

	#[test]
	fn test_full_config() {
		let config: Config = r#"
[node]
launch = false
shutdown_grace_ms = 250
[node.readiness]
poll_interval_ms = 100
max_attempts = 3

[gateway]
rpc_endpoint = "http://10.0.0.1:8529"
wallet = "cli"
lookup = "cli"
[gateway.implementations.cli]
binary = "/usr/local/bin/nil_cli"

[compiler]
binary = "solc-0.8.26"
extra_args = ["--optimize"]

[artifacts]
base_dir = "/tmp/blockgen"

[deployment]
mode = "lazy"

[legacy]
wallet_balance = 42
[legacy.header]
chain_id = 7
"#
		.parse()
		.unwrap();

		assert!(!config.node.launch);
		assert_eq!(config.node.readiness.max_attempts, 3);
		assert_eq!(config.node.shutdown_grace_ms, 250);
		assert_eq!(config.gateway.rpc_endpoint, "http://10.0.0.1:8529");
		assert_eq!(config.compiler.extra_args, vec!["--optimize".to_string()]);
		assert_eq!(
			config.artifacts.base_dir,
			Some(PathBuf::from("/tmp/blockgen"))
		);
		assert_eq!(config.deployment.mode, DeploymentMode::Lazy);
		assert_eq!(config.legacy.wallet_balance, 42);
		assert_eq!(config.legacy.header.chain_id, 7);
		// Unset header fields keep their defaults
		assert_eq!(config.legacy.header.number, 1);
	}

	#[test]
	fn test_unknown_lookup_implementation_rejected() {
		let result: Result<Config, _> = r#"
[gateway]
wallet = "cli"
lookup = "graphql"
[gateway.implementations.cli]
binary = "nil_cli"
"#
		.parse();

		let err = result.unwrap_err();
		assert!(err
			.to_string()
			.contains("Gateway lookup implementation 'graphql' not found"));
	}

	#[test]
	fn test_zero_readiness_attempts_rejected() {
		let result: Result<Config, _> = r#"
[node.readiness]
max_attempts = 0

[gateway]
wallet = "cli"
lookup = "cli"
[gateway.implementations.cli]
"#
		.parse();

		assert!(matches!(result, Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_unknown_deployment_mode_rejected() {
		let result: Result<Config, _> = r#"
[gateway]
wallet = "cli"
lookup = "cli"
[gateway.implementations.cli]

[deployment]
mode = "sometimes"
"#
		.parse();

		assert!(matches!(result, Err(ConfigError::Parse(_))));
	}

	#[test]
	fn test_deployment_mode_from_str() {
		assert_eq!("eager".parse::<DeploymentMode>().unwrap(), DeploymentMode::Eager);
		assert_eq!("lazy".parse::<DeploymentMode>().unwrap(), DeploymentMode::Lazy);
		assert!("later".parse::<DeploymentMode>().is_err());
		assert_eq!(DeploymentMode::Lazy.to_string(), "lazy");
	}

	#[tokio::test]
	async fn test_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("blockgen.toml");
		std::fs::write(
			&path,
			"[gateway]\nwallet = \"cli\"\nlookup = \"cli\"\n[gateway.implementations.cli]\n",
		)
		.unwrap();

		let config = Config::from_file(&path).await.unwrap();
		assert_eq!(config.gateway.lookup, "cli");
		assert_eq!(config.gateway.rpc_endpoint, "http://127.0.0.1:8529");
	}

	#[tokio::test]
	async fn test_from_missing_file() {
		let dir = tempfile::tempdir().unwrap();
		let result = Config::from_file(dir.path().join("missing.toml")).await;
		assert!(matches!(result, Err(ConfigError::Io(_))));
	}
}

//! Main entry point of the block generator.
//!
//! Three modes share one binary: `make-config` prepares a wallet CLI
//! configuration, `generate-block` deploys contracts and replays transactions
//! to produce a block, and `write-file` dumps an existing block as JSON.

use blockgen_config::{BlockConfig, Config, DeploymentMode};
use blockgen_core::{BlockGenerator, BlockGeneratorBuilder, GatewayFactories, GenerateRequest};
use blockgen_gateway::{
	get_all_lookup_implementations, get_all_wallet_implementations, LookupFactory, WalletFactory,
};
use blockgen_types::{BlockHash, ShardId};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Command-line arguments of the block generator.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to the tool configuration file (built-in defaults when omitted)
	#[arg(long, global = true, env = "BLOCKGEN_CONFIG")]
	config: Option<PathBuf>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(long, global = true, default_value = "info")]
	log_level: String,

	/// Shortcut for --log-level debug
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Create a wallet CLI configuration with a fresh key and wallet
	MakeConfig {
		/// Path of the wallet CLI configuration to create
		#[arg(long)]
		cli_config_name: PathBuf,
	},
	/// Deploy contracts, replay transactions and resolve the resulting block
	GenerateBlock {
		/// JSON block configuration
		#[arg(short = 'b', long)]
		block_config: PathBuf,

		/// Wallet CLI configuration to use
		#[arg(long)]
		cli_config_name: Option<PathBuf>,

		/// Prefix of the legacy `.state` and `.block` outputs
		#[arg(short = 'l', long)]
		legacy_prefix: Option<PathBuf>,

		/// Where to write the resolved block as JSON
		#[arg(long)]
		block_output: Option<PathBuf>,

		/// Where to write the called contract's state as JSON
		#[arg(long)]
		state_output: Option<PathBuf>,

		/// Deployment policy, overriding the configuration (eager or lazy)
		#[arg(long)]
		deploy_mode: Option<DeploymentMode>,
	},
	/// Fetch a block by shard and hash and write it as JSON
	WriteFile {
		#[arg(long)]
		shard_id: u32,

		#[arg(long)]
		block_hash: String,

		/// Output file
		#[arg(short = 'o', long)]
		output: PathBuf,

		/// Wallet CLI configuration to use
		#[arg(long)]
		cli_config_name: Option<PathBuf>,
	},
}

impl Command {
	fn cli_config(&self) -> Option<&Path> {
		match self {
			Command::MakeConfig { cli_config_name } => Some(cli_config_name),
			Command::GenerateBlock {
				cli_config_name, ..
			}
			| Command::WriteFile {
				cli_config_name, ..
			} => cli_config_name.as_deref(),
		}
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = if args.verbose {
		"debug".to_string()
	} else {
		args.log_level.clone()
	};
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt().with_env_filter(env_filter).with_target(true).init();

	let config = load_config(args.config.as_deref()).await?;
	let generator = BlockGeneratorBuilder::new(config)
		.with_cli_config(args.command.cli_config().map(Path::to_path_buf))
		.build(factories())?;

	if let Err(e) = run(&generator, args.command).await {
		tracing::error!(category = ?e.category(), "{}", e);
		return Err(e.into());
	}
	Ok(())
}

async fn run(generator: &BlockGenerator, command: Command) -> Result<(), blockgen_core::EngineError> {
	match command {
		Command::MakeConfig { cli_config_name } => {
			let wallet = generator.make_config(&cli_config_name).await?;
			tracing::info!(wallet = %wallet, path = %cli_config_name.display(), "Wallet config ready");
		},
		Command::GenerateBlock {
			block_config,
			legacy_prefix,
			block_output,
			state_output,
			deploy_mode,
			..
		} => {
			let block = BlockConfig::from_file(&block_config).await?;
			let mode = deploy_mode.unwrap_or(generator.config().deployment.mode);

			let mut request = GenerateRequest::new(block, mode);
			request.legacy_prefix = legacy_prefix;
			request.block_output = block_output;
			request.state_output = state_output;

			let report = generator.generate_block(&request).await?;
			println!("ShardId = {}", report.location.shard_id);
			println!("BlockHash = {}", report.location.block_hash);
		},
		Command::WriteFile {
			shard_id,
			block_hash,
			output,
			..
		} => {
			generator
				.write_block(ShardId(shard_id), &BlockHash(block_hash), &output)
				.await?;
		},
	}
	Ok(())
}

/// Loads the tool configuration, falling back to the built-in one.
async fn load_config(path: Option<&Path>) -> Result<Config, blockgen_config::ConfigError> {
	match path {
		Some(path) => {
			let config = Config::from_file(path).await?;
			tracing::info!(path = %path.display(), "Loaded configuration");
			Ok(config)
		},
		None => Config::builtin(),
	}
}

/// Collects every registered gateway implementation by name.
fn factories() -> GatewayFactories<WalletFactory, LookupFactory> {
	let mut wallet_factories = HashMap::new();
	for (name, factory) in get_all_wallet_implementations() {
		tracing::debug!("Registering wallet implementation: {}", name);
		wallet_factories.insert(name.to_string(), factory);
	}

	let mut lookup_factories = HashMap::new();
	for (name, factory) in get_all_lookup_implementations() {
		tracing::debug!("Registering lookup implementation: {}", name);
		lookup_factories.insert(name.to_string(), factory);
	}

	GatewayFactories {
		wallet_factories,
		lookup_factories,
	}
}

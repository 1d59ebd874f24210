//! Builder for the block generator engine.
//!
//! Resolves the wallet and lookup implementations named in the gateway
//! configuration through factory maps, and pairs the resulting gateway with
//! a compiler.

use crate::engine::BlockGenerator;
use blockgen_artifacts::implementations::solc::SolcCompiler;
use blockgen_artifacts::CompilerInterface;
use blockgen_config::Config;
use blockgen_gateway::{
	GatewayContext, GatewayError, GatewayService, LookupInterface, WalletInterface,
};
use blockgen_types::ConfigSchema;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Factory functions for the gateway implementations.
pub struct GatewayFactories<WF, LF> {
	pub wallet_factories: HashMap<String, WF>,
	pub lookup_factories: HashMap<String, LF>,
}

/// Builder for constructing a [`BlockGenerator`].
pub struct BlockGeneratorBuilder {
	config: Config,
	context: GatewayContext,
	compiler: Option<Arc<dyn CompilerInterface>>,
}

impl BlockGeneratorBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			context: GatewayContext::default(),
			compiler: None,
		}
	}

	/// Wallet CLI configuration file passed to the gateway implementations.
	pub fn with_cli_config(mut self, path: Option<PathBuf>) -> Self {
		self.context.cli_config = path;
		self
	}

	/// Replaces the compiler built from the `[compiler]` section.
	pub fn with_compiler(mut self, compiler: Arc<dyn CompilerInterface>) -> Self {
		self.compiler = Some(compiler);
		self
	}

	/// Builds the engine using the given gateway factories.
	pub fn build<WF, LF>(self, factories: GatewayFactories<WF, LF>) -> Result<BlockGenerator, BuilderError>
	where
		WF: Fn(&toml::Value, &GatewayContext) -> Result<Box<dyn WalletInterface>, GatewayError>,
		LF: Fn(&toml::Value, &GatewayContext) -> Result<Box<dyn LookupInterface>, GatewayError>,
	{
		let gateway_config = &self.config.gateway;

		let wallet = create_implementation(
			"wallet",
			&gateway_config.wallet,
			&factories.wallet_factories,
			&gateway_config.implementations,
			&self.context,
		)?;
		let lookup = create_implementation(
			"lookup",
			&gateway_config.lookup,
			&factories.lookup_factories,
			&gateway_config.implementations,
			&self.context,
		)?;
		let gateway = Arc::new(GatewayService::new(wallet, lookup));

		let compiler = match self.compiler {
			Some(compiler) => compiler,
			None => {
				let solc = SolcCompiler::from_config(&self.config.compiler);
				tracing::info!(component = "compiler", implementation = %self.config.compiler.binary, "Loaded");
				Arc::new(solc)
			},
		};

		Ok(BlockGenerator::new(self.config, gateway, compiler))
	}
}

/// Gives the builder access to an implementation's configuration schema.
trait Configurable {
	fn schema(&self) -> Box<dyn ConfigSchema>;
}

impl Configurable for dyn WalletInterface {
	fn schema(&self) -> Box<dyn ConfigSchema> {
		self.config_schema()
	}
}

impl Configurable for dyn LookupInterface {
	fn schema(&self) -> Box<dyn ConfigSchema> {
		self.config_schema()
	}
}

/// Creates the named implementation and validates its configuration table
/// against the schema the implementation declares.
fn create_implementation<T: ?Sized + Configurable, F>(
	component: &'static str,
	name: &str,
	factories: &HashMap<String, F>,
	implementations: &HashMap<String, toml::Value>,
	context: &GatewayContext,
) -> Result<Box<T>, BuilderError>
where
	F: Fn(&toml::Value, &GatewayContext) -> Result<Box<T>, GatewayError>,
{
	let factory = factories.get(name).ok_or_else(|| {
		BuilderError::Config(format!(
			"Unknown {} implementation '{}'",
			component, name
		))
	})?;
	let config = implementations.get(name).ok_or_else(|| {
		BuilderError::Config(format!(
			"No configuration for {} implementation '{}'",
			component, name
		))
	})?;

	match factory(config, context) {
		Ok(implementation) => match implementation.schema().validate(config) {
			Ok(()) => {
				tracing::info!(component, implementation = %name, "Loaded");
				Ok(implementation)
			},
			Err(e) => {
				tracing::error!(
					component,
					implementation = %name,
					error = %e,
					"Invalid configuration for implementation"
				);
				Err(BuilderError::Config(format!(
					"Invalid configuration for {} implementation '{}': {}",
					component, name, e
				)))
			},
		},
		Err(e) => {
			tracing::error!(
				component,
				implementation = %name,
				error = %e,
				"Failed to create implementation"
			);
			Err(BuilderError::Config(format!(
				"Failed to create {} implementation '{}': {}",
				component, name, e
			)))
		},
	}
}

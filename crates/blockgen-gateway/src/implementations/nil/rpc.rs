//! JSON-RPC lookup implementation.
//!
//! Queries the node's HTTP endpoint directly. Results arrive as structured
//! JSON, so nothing has to be scraped from CLI text output. Read-only: signing
//! and sending stay with the wallet CLI.

use crate::{GatewayContext, GatewayError, LookupInterface};
use async_trait::async_trait;
use blockgen_types::{
	toml_to_json, Address, BlockHash, ConfigSchema, Field, FieldType, MessageHash, ReceiptNode,
	Schema, ShardId, ValidationError,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const DEFAULT_PROBE_METHOD: &str = "eth_chainId";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// JSON-RPC lookup gateway.
pub struct RpcGateway {
	client: reqwest::Client,
	endpoint: String,
	/// Method called by the readiness probe.
	probe_method: String,
	next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct RpcResponse<T> {
	#[serde(default)]
	result: Option<T>,
	#[serde(default)]
	error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
	code: i64,
	message: String,
}

impl RpcGateway {
	pub fn new(
		endpoint: impl Into<String>,
		probe_method: impl Into<String>,
		timeout: Duration,
	) -> Result<Self, GatewayError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| GatewayError::Http(format!("Failed to build HTTP client: {}", e)))?;

		Ok(Self {
			client,
			endpoint: endpoint.into(),
			probe_method: probe_method.into(),
			next_id: AtomicU64::new(1),
		})
	}

	/// Performs one JSON-RPC call and returns its non-null result.
	async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, GatewayError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let request = json!({
			"jsonrpc": "2.0",
			"id": id,
			"method": method,
			"params": params,
		});

		tracing::debug!(endpoint = %self.endpoint, method, id, "Sending RPC request");

		let response = self
			.client
			.post(&self.endpoint)
			.json(&request)
			.send()
			.await
			.map_err(|e| GatewayError::Http(format!("{} to {}: {}", method, self.endpoint, e)))?;

		let status = response.status();
		if !status.is_success() {
			return Err(GatewayError::Http(format!(
				"{} to {} returned status {}",
				method, self.endpoint, status
			)));
		}

		let body = response
			.text()
			.await
			.map_err(|e| GatewayError::Http(format!("Invalid response to {}: {}", method, e)))?;

		parse_rpc_response(method, &body)
	}
}

/// Extracts the result of a JSON-RPC response body.
///
/// An error object wins over a result. A null or missing result means the
/// queried object does not exist (yet).
fn parse_rpc_response<T: DeserializeOwned>(method: &str, body: &str) -> Result<T, GatewayError> {
	let response: RpcResponse<T> =
		crate::json::from_str(body).map_err(|e| GatewayError::UnexpectedOutput {
			command: method.to_string(),
			message: format!("malformed JSON-RPC response: {}", e),
		})?;

	if let Some(error) = response.error {
		return Err(GatewayError::Rpc {
			method: method.to_string(),
			code: error.code,
			message: error.message,
		});
	}

	response.result.ok_or_else(|| GatewayError::UnexpectedOutput {
		command: method.to_string(),
		message: "empty result".to_string(),
	})
}

#[async_trait]
impl LookupInterface for RpcGateway {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(RpcGatewaySchema)
	}

	async fn probe(&self) -> Result<(), GatewayError> {
		self.call::<Value>(&self.probe_method, json!([]))
			.await
			.map(|_| ())
	}

	async fn receipt(&self, hash: &MessageHash) -> Result<ReceiptNode, GatewayError> {
		self.call("eth_getInMessageReceipt", json!([hash.0])).await
	}

	async fn block(&self, shard_id: ShardId, hash: &BlockHash) -> Result<Value, GatewayError> {
		self.call("debug_getBlockByHash", json!([shard_id.0, hash.0, true]))
			.await
	}

	async fn contract_state(
		&self,
		address: &Address,
		block_hash: &BlockHash,
	) -> Result<Value, GatewayError> {
		self.call("debug_getContract", json!([address.as_str(), block_hash.0]))
			.await
	}
}

/// Configuration schema for the JSON-RPC gateway.
pub struct RpcGatewaySchema;

impl ConfigSchema for RpcGatewaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::strict(
			vec![
				Field::new("endpoint", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
							Ok(())
						},
						_ => Err("endpoint must be an http(s) URL".to_string()),
					}
				}),
			],
			vec![
				Field::new("probe_method", FieldType::String),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(600),
					},
				),
			],
		);

		schema.validate(&toml_to_json(config)?)
	}
}

/// Factory function to create the JSON-RPC lookup from configuration.
///
/// Required configuration parameters:
/// - `endpoint`: node HTTP endpoint
///
/// Optional configuration parameters:
/// - `probe_method`: readiness probe method, defaults to `eth_chainId`
/// - `timeout_seconds`: per-request timeout, defaults to 30
pub fn create_lookup(
	config: &toml::Value,
	_context: &GatewayContext,
) -> Result<Box<dyn LookupInterface>, GatewayError> {
	let endpoint = config
		.get("endpoint")
		.and_then(|v| v.as_str())
		.ok_or_else(|| GatewayError::Configuration("endpoint is required".into()))?;
	let probe_method = config
		.get("probe_method")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_PROBE_METHOD);
	let timeout_seconds = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	Ok(Box::new(RpcGateway::new(
		endpoint,
		probe_method,
		Duration::from_secs(timeout_seconds),
	)?))
}

/// Registry for the JSON-RPC lookup implementation.
pub struct Registry;

impl blockgen_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "rpc";
	type Factory = crate::LookupFactory;

	fn factory() -> Self::Factory {
		create_lookup
	}
}

impl crate::LookupRegistry for Registry {}

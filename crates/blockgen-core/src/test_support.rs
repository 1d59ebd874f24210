//! In-memory gateway and compiler fakes shared by the core tests.

use async_trait::async_trait;
use blockgen_artifacts::{ArtifactError, ArtifactScope, ArtifactStore, CompilerInterface};
use blockgen_config::{Config, ReadinessConfig};
use blockgen_gateway::{
	CallRequest, DeployRequest, GatewayError, GatewayService, LookupInterface, WalletInterface,
};
use blockgen_types::{
	Address, BlockHash, ConfigSchema, MessageHash, ReceiptNode, ShardId, ValidationError,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const WALLET: &str = "0x0001000000000000000000000000000000000abc";

#[derive(Default)]
struct Ledger {
	calls: Vec<String>,
	salts: Vec<u64>,
	messages: u32,
	last_called: Option<Address>,
	wallet: Option<Address>,
	receipt: Option<ReceiptNode>,
	fail_deploys: bool,
	fail_calls: bool,
	unreachable: bool,
	ready_marker: Option<PathBuf>,
}

/// Shared log of the commands a fake gateway received.
#[derive(Clone, Default)]
pub struct Recorder {
	ledger: Arc<Mutex<Ledger>>,
}

impl Recorder {
	pub fn failing_deploys() -> Self {
		let recorder = Self::default();
		recorder.ledger.lock().unwrap().fail_deploys = true;
		recorder
	}

	pub fn failing_calls() -> Self {
		let recorder = Self::default();
		recorder.ledger.lock().unwrap().fail_calls = true;
		recorder
	}

	/// A gateway whose health probe never succeeds.
	pub fn unreachable() -> Self {
		let recorder = Self::default();
		recorder.ledger.lock().unwrap().unreachable = true;
		recorder
	}

	/// A gateway whose health check fails until `marker` exists.
	pub fn with_ready_marker(self, marker: &Path) -> Self {
		self.ledger.lock().unwrap().ready_marker = Some(marker.to_path_buf());
		self
	}

	/// Replaces the default receipt cascade.
	pub fn with_receipt(self, receipt: ReceiptNode) -> Self {
		self.ledger.lock().unwrap().receipt = Some(receipt);
		self
	}

	pub fn calls(&self) -> Vec<String> {
		self.ledger.lock().unwrap().calls.clone()
	}

	pub fn salts(&self) -> Vec<u64> {
		self.ledger.lock().unwrap().salts.clone()
	}

	pub fn last_called(&self) -> Option<Address> {
		self.ledger.lock().unwrap().last_called.clone()
	}

	/// Wallet created through the gateway, if any.
	pub fn wallet(&self) -> Option<Address> {
		self.ledger.lock().unwrap().wallet.clone()
	}
}

struct NoSchema;

impl ConfigSchema for NoSchema {
	fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
		Ok(())
	}
}

struct FakeWallet(Recorder);

#[async_trait]
impl WalletInterface for FakeWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(NoSchema)
	}

	async fn init_config(&self, rpc_endpoint: &str) -> Result<(), GatewayError> {
		let mut ledger = self.0.ledger.lock().unwrap();
		ledger.calls.push(format!("config init {rpc_endpoint}"));
		Ok(())
	}

	async fn generate_key(&self) -> Result<String, GatewayError> {
		self.0.ledger.lock().unwrap().calls.push("keygen".into());
		Ok("Private key: 0x01".into())
	}

	async fn create_wallet(&self) -> Result<Address, GatewayError> {
		let mut ledger = self.0.ledger.lock().unwrap();
		ledger.calls.push("wallet new".into());
		let wallet = Address::parse(WALLET).unwrap();
		ledger.wallet = Some(wallet.clone());
		Ok(wallet)
	}

	async fn wallet_address(&self) -> Result<Address, GatewayError> {
		Ok(Address::parse(WALLET).unwrap())
	}

	async fn deploy_contract(&self, request: &DeployRequest) -> Result<Address, GatewayError> {
		let mut ledger = self.0.ledger.lock().unwrap();
		if ledger.fail_deploys {
			return Err(GatewayError::CommandFailed {
				command: "nil_cli wallet deploy".into(),
				stderr: "insufficient funds".into(),
			});
		}
		ledger
			.calls
			.push(format!("deploy {} {}", request.bytecode.display(), request.salt));
		ledger.salts.push(request.salt);
		Ok(Address::parse(&format!("0x{:016x}", request.salt)).unwrap())
	}

	async fn send_message(&self, request: &CallRequest) -> Result<MessageHash, GatewayError> {
		let mut ledger = self.0.ledger.lock().unwrap();
		let mut line = format!("call {} {}", request.address, request.method);
		for argument in &request.arguments {
			line.push(' ');
			line.push_str(argument);
		}
		ledger.calls.push(line);

		if ledger.fail_calls {
			return Err(GatewayError::CommandFailed {
				command: "nil_cli wallet send-message".into(),
				stderr: "execution reverted".into(),
			});
		}
		ledger.messages += 1;
		ledger.last_called = Some(request.address.clone());
		Ok(MessageHash(format!("0x{:04x}", ledger.messages)))
	}
}

struct FakeLookup(Recorder);

#[async_trait]
impl LookupInterface for FakeLookup {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(NoSchema)
	}

	async fn probe(&self) -> Result<(), GatewayError> {
		let ledger = self.0.ledger.lock().unwrap();
		let waiting = ledger.ready_marker.as_ref().is_some_and(|marker| !marker.exists());
		if ledger.unreachable || waiting {
			return Err(GatewayError::Http("connection refused".into()));
		}
		Ok(())
	}

	async fn receipt(&self, _hash: &MessageHash) -> Result<ReceiptNode, GatewayError> {
		let ledger = self.0.ledger.lock().unwrap();
		if let Some(receipt) = &ledger.receipt {
			return Ok(receipt.clone());
		}
		let callee = ledger
			.last_called
			.clone()
			.unwrap_or_else(|| Address::parse("0x00").unwrap());
		Ok(ReceiptNode {
			contract_address: Address::parse("0x0001ff").unwrap(),
			shard_id: ShardId(1),
			block_hash: BlockHash("0x01aa".into()),
			output_receipts: vec![ReceiptNode {
				contract_address: callee,
				shard_id: ShardId(2),
				block_hash: BlockHash("0x02bb".into()),
				output_receipts: vec![],
			}],
		})
	}

	async fn block(
		&self,
		shard_id: ShardId,
		hash: &BlockHash,
	) -> Result<serde_json::Value, GatewayError> {
		let callee = self
			.0
			.last_called()
			.map(|a| a.to_string())
			.unwrap_or_default();
		Ok(json!({
			"hash": hash.0,
			"shardId": shard_id.0,
			"messages": [{
				"from": WALLET,
				"to": callee,
				"value": "0",
				"gasPrice": "10",
				"gasUsed": "500",
				"data": "0x",
			}],
		}))
	}

	async fn contract_state(
		&self,
		address: &Address,
		block_hash: &BlockHash,
	) -> Result<serde_json::Value, GatewayError> {
		Ok(json!({
			"address": address.as_str(),
			"blockHash": block_hash.0,
			"storage": {},
		}))
	}
}

/// Gateway backed by in-memory fakes that log to `recorder`.
pub fn fake_gateway(recorder: &Recorder) -> Arc<GatewayService> {
	Arc::new(GatewayService::new(
		Box::new(FakeWallet(recorder.clone())),
		Box::new(FakeLookup(recorder.clone())),
	))
}

/// Compiler writing one fixed bytecode and interface file per source.
#[derive(Clone, Default)]
pub struct CountingCompiler {
	pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl CompilerInterface for CountingCompiler {
	async fn compile(&self, source: &Path, output_dir: &Path) -> Result<(), ArtifactError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		tokio::fs::create_dir(output_dir).await?;
		let stem = source
			.file_stem()
			.map(|s| s.to_string_lossy().to_string())
			.unwrap_or_else(|| "Contract".into());
		tokio::fs::write(output_dir.join(format!("{stem}.bin")), "6080604052\n").await?;
		tokio::fs::write(output_dir.join(format!("{stem}.abi")), "[]").await?;
		Ok(())
	}
}

/// Artifact store under `dir` and its compile counter.
pub fn recording_store(dir: &Path) -> (ArtifactStore, Arc<AtomicUsize>) {
	let compiler = CountingCompiler::default();
	let calls = compiler.calls.clone();
	let scope = ArtifactScope::new(Some(&dir.join("artifacts"))).unwrap();
	(ArtifactStore::new(Arc::new(compiler), scope), calls)
}

/// Writes a trivial contract source named `name` into `dir`.
pub fn write_source(dir: &Path, name: &str) -> PathBuf {
	let path = dir.join(name);
	std::fs::write(&path, "contract C { function increment() public {} }").unwrap();
	path
}

/// Built-in configuration attached to an already running node.
pub fn offline_config(dir: &Path) -> Config {
	let mut config = Config::builtin().unwrap();
	config.node.launch = false;
	config.node.readiness = ReadinessConfig {
		poll_interval_ms: 1,
		max_attempts: 3,
	};
	config.artifacts.base_dir = Some(dir.join("artifacts"));
	config.gateway.rpc_endpoint = "http://127.0.0.1:8529".into();
	config
}

/// Waits for a line-terminated file written by a child process and returns
/// its trimmed content.
pub async fn wait_for_file(path: &Path) -> String {
	for _ in 0..250 {
		if let Ok(text) = tokio::fs::read_to_string(path).await {
			if text.ends_with('\n') {
				return text.trim().to_string();
			}
		}
		tokio::time::sleep(std::time::Duration::from_millis(20)).await;
	}
	panic!("{} was never written", path.display());
}

/// Whether a process with this pid still exists.
#[cfg(unix)]
pub fn process_alive(pid: &str) -> bool {
	std::process::Command::new("kill")
		.args(["-0", pid])
		.stderr(std::process::Stdio::null())
		.status()
		.map(|status| status.success())
		.unwrap_or(false)
}

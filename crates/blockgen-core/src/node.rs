//! Ledger node supervision.
//!
//! The node runs as a child process owned by the run. Readiness is a bounded
//! poll of the lookup gateway's health probe. On shutdown the node gets
//! SIGTERM and a grace period to exit before it is killed. Dropping the
//! handle on an early return kills it outright.

use blockgen_config::{NodeConfig, ReadinessConfig};
use blockgen_gateway::GatewayService;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};

/// Errors that can occur while managing the node process.
#[derive(Debug, Error)]
pub enum NodeError {
	#[error("Failed to launch node '{command}': {message}")]
	Launch { command: String, message: String },
	#[error("Node exited before becoming ready: {0}")]
	Exited(String),
	#[error("Node not ready after {attempts} probes: {last_error}")]
	NotReady { attempts: u32, last_error: String },
	#[error("Failed to stop node: {0}")]
	Shutdown(String),
}

/// Handle on the node used by one run.
#[derive(Debug)]
pub struct NodeProcess {
	child: Option<Child>,
	command_line: String,
	grace: Duration,
}

impl NodeProcess {
	/// Starts the node, or attaches to an external one when launching is
	/// disabled.
	pub fn start(config: &NodeConfig) -> Result<Self, NodeError> {
		if !config.launch {
			tracing::info!("Using already running node");
			return Ok(Self::external());
		}

		let command_line = format!("{} {}", config.command, config.args.join(" "));
		tracing::info!("Launching {}", command_line.trim_end());

		let child = Command::new(&config.command)
			.args(&config.args)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| NodeError::Launch {
				command: command_line.clone(),
				message: e.to_string(),
			})?;

		Ok(Self {
			child: Some(child),
			command_line,
			grace: Duration::from_millis(config.shutdown_grace_ms),
		})
	}

	/// Handle on a node this run does not own.
	pub fn external() -> Self {
		Self {
			child: None,
			command_line: String::new(),
			grace: Duration::ZERO,
		}
	}

	pub fn is_owned(&self) -> bool {
		self.child.is_some()
	}

	/// Polls the gateway probe until it succeeds or the attempts run out.
	pub async fn wait_ready(
		&mut self,
		readiness: &ReadinessConfig,
		gateway: &GatewayService,
	) -> Result<(), NodeError> {
		let interval = Duration::from_millis(readiness.poll_interval_ms);
		let mut last_error = String::from("no probe attempted");

		for attempt in 1..=readiness.max_attempts {
			if let Some(child) = self.child.as_mut() {
				match child.try_wait() {
					Ok(Some(status)) => return Err(NodeError::Exited(status.to_string())),
					Ok(None) => {},
					Err(e) => return Err(NodeError::Exited(e.to_string())),
				}
			}

			match gateway.probe().await {
				Ok(()) => {
					tracing::info!(attempt, "Node is ready");
					return Ok(());
				},
				Err(e) => {
					tracing::debug!(attempt, error = %e, "Node not ready yet");
					last_error = e.to_string();
				},
			}

			if attempt < readiness.max_attempts {
				tokio::time::sleep(interval).await;
			}
		}

		Err(NodeError::NotReady {
			attempts: readiness.max_attempts,
			last_error,
		})
	}

	/// Stops the node if this run launched it.
	pub async fn shutdown(&mut self) -> Result<(), NodeError> {
		let Some(mut child) = self.child.take() else {
			return Ok(());
		};

		tracing::info!("Terminating {}", self.command_line.trim_end());
		if child
			.try_wait()
			.map_err(|e| NodeError::Shutdown(e.to_string()))?
			.is_some()
		{
			return Ok(());
		}

		if request_termination(&child).await {
			match tokio::time::timeout(self.grace, child.wait()).await {
				Ok(Ok(status)) => {
					tracing::debug!(%status, "Node exited");
					return Ok(());
				},
				Ok(Err(e)) => return Err(NodeError::Shutdown(e.to_string())),
				Err(_) => {
					tracing::warn!(
						grace_ms = self.grace.as_millis() as u64,
						"Node still running after SIGTERM, killing it"
					);
				},
			}
		}

		child
			.kill()
			.await
			.map_err(|e| NodeError::Shutdown(e.to_string()))
	}
}

/// Sends SIGTERM to the child. Returns false when the signal was not
/// delivered.
#[cfg(unix)]
async fn request_termination(child: &Child) -> bool {
	let Some(pid) = child.id() else {
		return false;
	};

	let target = pid.to_string();
	let delivered = Command::new("kill")
		.args(["-TERM", target.as_str()])
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.status()
		.await;
	match delivered {
		Ok(status) if status.success() => true,
		Ok(status) => {
			tracing::debug!(pid, %status, "kill -TERM failed");
			false
		},
		Err(e) => {
			tracing::debug!(pid, error = %e, "Cannot run kill");
			false
		},
	}
}

#[cfg(not(unix))]
async fn request_termination(_child: &Child) -> bool {
	false
}

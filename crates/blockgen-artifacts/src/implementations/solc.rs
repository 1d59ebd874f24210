//! `solc` compiler implementation.

use crate::{ArtifactError, CompilerInterface};
use async_trait::async_trait;
use blockgen_config::CompilerConfig;
use std::path::Path;
use tokio::process::Command;

/// Runs `solc -o <out> --bin --abi <source>`.
pub struct SolcCompiler {
	binary: String,
	extra_args: Vec<String>,
}

impl SolcCompiler {
	pub fn new(binary: impl Into<String>, extra_args: Vec<String>) -> Self {
		Self {
			binary: binary.into(),
			extra_args,
		}
	}

	pub fn from_config(config: &CompilerConfig) -> Self {
		Self::new(config.binary.clone(), config.extra_args.clone())
	}

	fn arguments(&self, source: &Path, output_dir: &Path) -> Vec<String> {
		let mut args = vec![
			"-o".to_string(),
			output_dir.display().to_string(),
			"--bin".to_string(),
			"--abi".to_string(),
		];
		args.extend(self.extra_args.iter().cloned());
		args.push(source.display().to_string());
		args
	}
}

#[async_trait]
impl CompilerInterface for SolcCompiler {
	async fn compile(&self, source: &Path, output_dir: &Path) -> Result<(), ArtifactError> {
		let args = self.arguments(source, output_dir);
		tracing::info!("Launching {} {}", self.binary, args.join(" "));

		let output = Command::new(&self.binary)
			.args(&args)
			.output()
			.await
			.map_err(|e| ArtifactError::Compilation {
				source_path: source.to_path_buf(),
				stderr: format!("cannot run {}: {}", self.binary, e),
			})?;

		if !output.status.success() {
			return Err(ArtifactError::Compilation {
				source_path: source.to_path_buf(),
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			});
		}

		tracing::debug!(
			stdout = %String::from_utf8_lossy(&output.stdout).trim(),
			"Compiler finished"
		);
		Ok(())
	}
}

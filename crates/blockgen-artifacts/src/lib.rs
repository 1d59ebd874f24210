//! Compiled contract artifacts for the block generator.
//!
//! Contract sources are compiled at most once per run. Artifacts land in a
//! per-run scope directory that is removed when the scope is dropped, on the
//! success and the error path alike. The cache key is derived from the
//! resolved source path, not its content: two contracts pointing at the same
//! file share one artifact.

use async_trait::async_trait;
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use thiserror::Error;
use tokio::sync::RwLock;

/// Re-export implementations
pub mod implementations {
	pub mod solc;
}

/// Errors that can occur while producing artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
	/// The contract source does not exist or cannot be resolved.
	#[error("Contract source not found: {path}: {message}")]
	SourceNotFound { path: PathBuf, message: String },
	/// The compiler could not be started or exited with a non-zero status.
	#[error("Compilation of {source_path} failed: {stderr}")]
	Compilation { source_path: PathBuf, stderr: String },
	/// The compiler produced something else than one bytecode and one interface file.
	#[error("Expected one .bin and one .abi file for {source_path}, found {bin} .bin and {abi} .abi")]
	ArtifactMismatch {
		source_path: PathBuf,
		bin: usize,
		abi: usize,
	},
	/// The compiler wrote a file that is neither bytecode nor interface.
	#[error("Unexpected compiler artifact: {0}")]
	UnexpectedArtifact(PathBuf),
	/// The compilation target directory already exists.
	#[error("Artifact directory already exists: {0}")]
	DirectoryExists(PathBuf),
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

/// Bytecode and interface files produced for one contract source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
	/// Resolved source path the artifact was compiled from.
	pub source: PathBuf,
	pub bytecode: PathBuf,
	pub abi: PathBuf,
}

impl CompiledArtifact {
	/// Reads the bytecode as hex text (the first line of the `.bin` file).
	pub async fn read_bytecode(&self) -> Result<String, ArtifactError> {
		let content = tokio::fs::read_to_string(&self.bytecode).await?;
		Ok(content.lines().next().unwrap_or_default().trim().to_string())
	}
}

/// Trait defining the interface for contract compilers.
#[async_trait]
pub trait CompilerInterface: Send + Sync {
	/// Compiles `source` into `output_dir`, which the compiler creates.
	async fn compile(&self, source: &Path, output_dir: &Path) -> Result<(), ArtifactError>;
}

/// Temporary directory holding the artifacts of one run.
///
/// The directory and everything in it are deleted when the scope is dropped.
#[derive(Debug)]
pub struct ArtifactScope {
	dir: TempDir,
}

impl ArtifactScope {
	/// Creates a fresh scope below `base_dir`, or the system temp dir.
	pub fn new(base_dir: Option<&Path>) -> Result<Self, ArtifactError> {
		let builder = {
			let mut builder = tempfile::Builder::new();
			builder.prefix("blockgen-artifacts-");
			builder
		};
		let dir = match base_dir {
			Some(base) => {
				std::fs::create_dir_all(base)?;
				builder.tempdir_in(base)?
			},
			None => builder.tempdir()?,
		};
		tracing::debug!(path = %dir.path().display(), "Created artifact scope");
		Ok(Self { dir })
	}

	pub fn path(&self) -> &Path {
		self.dir.path()
	}
}

/// Computes the cache key of a resolved source path.
pub fn artifact_key(resolved_source: &Path) -> String {
	let mut hasher = Keccak256::new();
	hasher.update(resolved_source.to_string_lossy().as_bytes());
	hex::encode(hasher.finalize())
}

/// Compiler cache scoped to one run.
pub struct ArtifactStore {
	compiler: Arc<dyn CompilerInterface>,
	scope: ArtifactScope,
	cache: RwLock<HashMap<String, CompiledArtifact>>,
}

impl ArtifactStore {
	pub fn new(compiler: Arc<dyn CompilerInterface>, scope: ArtifactScope) -> Self {
		Self {
			compiler,
			scope,
			cache: RwLock::new(HashMap::new()),
		}
	}

	/// Root directory of the run's artifacts.
	pub fn scope_path(&self) -> &Path {
		self.scope.path()
	}

	/// Returns the artifact for `source`, compiling it on first request.
	pub async fn compile(&self, source: &Path) -> Result<CompiledArtifact, ArtifactError> {
		let resolved = tokio::fs::canonicalize(source)
			.await
			.map_err(|e| ArtifactError::SourceNotFound {
				path: source.to_path_buf(),
				message: e.to_string(),
			})?;
		let key = artifact_key(&resolved);

		if let Some(artifact) = self.cache.read().await.get(&key) {
			tracing::debug!(source = %resolved.display(), "Using cached artifact");
			return Ok(artifact.clone());
		}

		let output_dir = self.scope.path().join(&key);
		if tokio::fs::try_exists(&output_dir).await? {
			return Err(ArtifactError::DirectoryExists(output_dir));
		}

		tracing::info!(source = %resolved.display(), "Compiling contract");
		self.compiler.compile(&resolved, &output_dir).await?;

		let artifact = collect_outputs(&resolved, &output_dir).await?;
		self.cache.write().await.insert(key, artifact.clone());
		Ok(artifact)
	}
}

/// Finds the single `.bin` and `.abi` file the compiler wrote.
async fn collect_outputs(source: &Path, output_dir: &Path) -> Result<CompiledArtifact, ArtifactError> {
	let mut bins = Vec::new();
	let mut abis = Vec::new();

	let mut entries = tokio::fs::read_dir(output_dir).await?;
	while let Some(entry) = entries.next_entry().await? {
		let path = entry.path();
		match path.extension().and_then(|e| e.to_str()) {
			Some("bin") => bins.push(path),
			Some("abi") => abis.push(path),
			_ => return Err(ArtifactError::UnexpectedArtifact(path)),
		}
	}

	if bins.len() != 1 || abis.len() != 1 {
		return Err(ArtifactError::ArtifactMismatch {
			source_path: source.to_path_buf(),
			bin: bins.len(),
			abi: abis.len(),
		});
	}

	Ok(CompiledArtifact {
		source: source.to_path_buf(),
		bytecode: bins.remove(0),
		abi: abis.remove(0),
	})
}

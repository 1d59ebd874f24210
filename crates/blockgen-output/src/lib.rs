//! Output documents of the block generator.
//!
//! Fetched block and state documents are written as JSON files. The [`legacy`]
//! module derives the older fixture format from them.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod legacy;

pub use legacy::{legacy_block, legacy_state, LegacyBlock, LegacyState};

/// Errors that can occur while translating fetched documents.
#[derive(Debug, Error)]
pub enum FormatError {
	/// The block document has no `messages` array.
	#[error("Block document has no messages array")]
	MissingMessages,
	/// A message of the block document cannot be translated.
	#[error("Malformed message #{index}: {message}")]
	MalformedMessage { index: usize, message: String },
}

/// Errors that can occur while writing output files.
#[derive(Debug, Error)]
pub enum OutputError {
	#[error("Cannot write {path}: {message}")]
	Io { path: PathBuf, message: String },
	#[error("Serialization error: {0}")]
	Serialization(String),
}

/// Paths of the legacy state and block documents for a prefix.
///
/// The suffixes are appended to the prefix as given, so `out/run.v1` yields
/// `out/run.v1.state`.
pub fn legacy_paths(prefix: &Path) -> (PathBuf, PathBuf) {
	let with_suffix = |suffix: &str| {
		let mut path = prefix.as_os_str().to_owned();
		path.push(suffix);
		PathBuf::from(path)
	};
	(with_suffix(".state"), with_suffix(".block"))
}

/// Serializes `value` as pretty-printed JSON into `path`.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), OutputError> {
	let mut content =
		serde_json::to_vec_pretty(value).map_err(|e| OutputError::Serialization(e.to_string()))?;
	content.push(b'\n');

	tokio::fs::write(path, content)
		.await
		.map_err(|e| OutputError::Io {
			path: path.to_path_buf(),
			message: e.to_string(),
		})?;

	tracing::info!(path = %path.display(), "Wrote output file");
	Ok(())
}

//! Block configuration loading.
//!
//! The block configuration is a JSON document listing the contracts to deploy
//! and the ordered transactions to replay against them:
//!
//! ```json
//! {
//!   "contracts": [{ "id": 1, "path": "contracts/Counter.sol" }],
//!   "transactions": [
//!     { "contractId": 1, "methodName": "increment" },
//!     { "contractId": 1, "methodName": "add", "callArguments": ["5"] }
//!   ]
//! }
//! ```
//!
//! The document is checked against a strict schema before deserialization and
//! duplicate contract ids are rejected, so configuration mistakes surface before
//! any external process is launched.

use crate::ConfigError;
use blockgen_types::{ContractSpec, Field, FieldType, Schema, TransactionIntent};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Contracts and transactions of one generator run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BlockConfig {
	pub contracts: Vec<ContractSpec>,
	pub transactions: Vec<TransactionIntent>,
}

impl BlockConfig {
	/// Schema every block configuration must satisfy.
	pub fn schema() -> Schema {
		let contract = Schema::strict(
			vec![
				Field::new(
					"id",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
				Field::new("path", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(path) if !path.trim().is_empty() => Ok(()),
						_ => Err("contract path cannot be empty".to_string()),
					}
				}),
			],
			vec![],
		);

		let transaction = Schema::strict(
			vec![
				Field::new(
					"contractId",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
				Field::new("methodName", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(name) if !name.is_empty() => Ok(()),
						_ => Err("method name cannot be empty".to_string()),
					}
				}),
			],
			vec![Field::new(
				"callArguments",
				FieldType::Array(Box::new(FieldType::String)),
			)],
		);

		Schema::strict(
			vec![
				Field::new(
					"contracts",
					FieldType::Array(Box::new(FieldType::Object(contract))),
				),
				Field::new(
					"transactions",
					FieldType::Array(Box::new(FieldType::Object(transaction))),
				),
			],
			vec![],
		)
	}

	/// Loads and validates a block configuration file.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Cannot read {}: {}", path.display(), e),
			))
		})?;
		Self::from_json_str(&content)
	}

	/// Parses and validates a block configuration from JSON text.
	pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
		let document: serde_json::Value = serde_json::from_str(content)
			.map_err(|e| ConfigError::Parse(format!("Invalid block config JSON: {}", e)))?;

		Self::schema()
			.validate(&document)
			.map_err(|e| ConfigError::Validation(e.to_string()))?;

		let config: BlockConfig = serde_json::from_value(document)
			.map_err(|e| ConfigError::Parse(format!("Invalid block config: {}", e)))?;

		let mut seen = HashSet::new();
		for contract in &config.contracts {
			if !seen.insert(contract.id) {
				return Err(ConfigError::DuplicateContractId(contract.id));
			}
		}

		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use blockgen_types::ContractId;
	use std::path::PathBuf;

	#[test]
	fn test_valid_block_config() {
		let config = BlockConfig::from_json_str(
			r#"{
				"contracts": [
					{"id": 1, "path": "A.sol"},
					{"id": 2, "path": "A.sol"}
				],
				"transactions": [
					{"contractId": 1, "methodName": "increment"},
					{"contractId": 2, "methodName": "add", "callArguments": ["5", "0x10"]}
				]
			}"#,
		)
		.unwrap();

		assert_eq!(config.contracts.len(), 2);
		assert_eq!(config.contracts[1].path, PathBuf::from("A.sol"));
		assert_eq!(config.transactions[0].contract_id, ContractId(1));
		assert!(config.transactions[0].arguments.is_empty());
		assert_eq!(config.transactions[1].arguments, vec!["5", "0x10"]);
	}

	#[test]
	fn test_duplicate_contract_id_rejected() {
		let err = BlockConfig::from_json_str(
			r#"{
				"contracts": [{"id": 4, "path": "A.sol"}, {"id": 4, "path": "B.sol"}],
				"transactions": []
			}"#,
		)
		.unwrap_err();

		assert!(matches!(err, ConfigError::DuplicateContractId(ContractId(4))));
		assert_eq!(err.to_string(), "Duplicated contract id: 4");
	}

	#[test]
	fn test_non_string_argument_rejected() {
		let err = BlockConfig::from_json_str(
			r#"{
				"contracts": [{"id": 1, "path": "A.sol"}],
				"transactions": [{"contractId": 1, "methodName": "add", "callArguments": [5]}]
			}"#,
		)
		.unwrap_err();

		assert!(matches!(err, ConfigError::Validation(_)));
		assert!(err.to_string().contains("transactions[0].callArguments[0]"));
	}

	#[test]
	fn test_missing_transactions_rejected() {
		let err = BlockConfig::from_json_str(r#"{"contracts": []}"#).unwrap_err();
		assert!(err.to_string().contains("Missing required field: transactions"));
	}

	#[test]
	fn test_unknown_transaction_field_rejected() {
		let err = BlockConfig::from_json_str(
			r#"{
				"contracts": [{"id": 1, "path": "A.sol"}],
				"transactions": [{"contractId": 1, "methodName": "f", "value": 10}]
			}"#,
		)
		.unwrap_err();
		assert!(err.to_string().contains("Unexpected field: transactions[0].value"));
	}

	#[test]
	fn test_negative_contract_id_rejected() {
		let err = BlockConfig::from_json_str(
			r#"{"contracts": [{"id": -1, "path": "A.sol"}], "transactions": []}"#,
		)
		.unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn test_malformed_json_rejected() {
		let err = BlockConfig::from_json_str("{\"contracts\": [").unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)));
	}

	#[tokio::test]
	async fn test_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("block.json");
		std::fs::write(
			&path,
			r#"{"contracts": [{"id": 1, "path": "A.sol"}], "transactions": []}"#,
		)
		.unwrap();

		let config = BlockConfig::from_file(&path).await.unwrap();
		assert_eq!(config.contracts.len(), 1);
		assert!(config.transactions.is_empty());
	}
}

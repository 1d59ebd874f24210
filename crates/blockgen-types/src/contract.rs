//! Contract and transaction descriptions.
//!
//! These types mirror the entries of the block configuration file. They are
//! created once while loading configuration and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Externally assigned contract identifier, unique within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(pub u64);

impl fmt::Display for ContractId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A contract declared in the block configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSpec {
	/// Identifier referenced by transactions.
	pub id: ContractId,
	/// Path to the Solidity source, as written in configuration.
	pub path: PathBuf,
}

/// A contract call to replay against the ledger.
///
/// The order of intents in configuration defines execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionIntent {
	/// Contract the call is addressed to.
	pub contract_id: ContractId,
	/// Name of the contract method to invoke.
	pub method_name: String,
	/// Positional call arguments passed verbatim to the wallet.
	#[serde(default, rename = "callArguments")]
	pub arguments: Vec<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_intent_without_arguments() {
		let intent: TransactionIntent =
			serde_json::from_str(r#"{"contractId": 1, "methodName": "increment"}"#).unwrap();
		assert_eq!(intent.contract_id, ContractId(1));
		assert_eq!(intent.method_name, "increment");
		assert!(intent.arguments.is_empty());
	}

	#[test]
	fn test_intent_with_arguments() {
		let intent: TransactionIntent = serde_json::from_str(
			r#"{"contractId": 7, "methodName": "transfer", "callArguments": ["0x01", "10"]}"#,
		)
		.unwrap();
		assert_eq!(intent.arguments, vec!["0x01".to_string(), "10".to_string()]);
	}
}

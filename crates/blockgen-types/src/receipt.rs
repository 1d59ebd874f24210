//! Receipt cascade types.
//!
//! Executing one message on the ledger may spawn child messages on other
//! shards, each of which gets its own receipt. The ledger reports the whole
//! cascade as a tree rooted at the receipt of the submitted message.

use crate::{Address, BlockHash, ShardId};
use serde::{Deserialize, Deserializer, Serialize};

/// One message's execution result plus every child message it spawned.
///
/// Depth and fan-out are decided by contract logic. Children are kept in the
/// order the ledger reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptNode {
	/// Contract whose code executed the message.
	pub contract_address: Address,
	/// Shard the message executed on.
	pub shard_id: ShardId,
	/// Block that includes the execution.
	pub block_hash: BlockHash,
	/// Receipts of the messages spawned by this execution.
	#[serde(default, deserialize_with = "null_as_empty")]
	pub output_receipts: Vec<ReceiptNode>,
}

impl ReceiptNode {
	/// Location of this execution.
	pub fn location(&self) -> ResolvedLocation {
		ResolvedLocation {
			shard_id: self.shard_id,
			block_hash: self.block_hash.clone(),
		}
	}
}

impl Drop for ReceiptNode {
	// Unlinks children onto a heap stack so a deep cascade drops in a loop.
	fn drop(&mut self) {
		let mut pending = std::mem::take(&mut self.output_receipts);
		while let Some(mut node) = pending.pop() {
			pending.append(&mut node.output_receipts);
		}
	}
}

/// Shard and block a resolved execution landed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLocation {
	pub shard_id: ShardId,
	pub block_hash: BlockHash,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ReceiptNode>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<Vec<ReceiptNode>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_nested_receipt() {
		let json = r#"{
			"success": true,
			"contractAddress": "0x00010000000000000000000000000000000000AA",
			"shardId": 1,
			"blockHash": "0x11",
			"outputReceipts": [
				{
					"contractAddress": "0x0002000000000000000000000000000000000bbb",
					"shardId": 2,
					"blockHash": "0xBB",
					"outputReceipts": null
				}
			]
		}"#;

		let root: ReceiptNode = serde_json::from_str(json).unwrap();
		assert_eq!(root.shard_id, ShardId(1));
		assert_eq!(
			root.contract_address.as_str(),
			"0x00010000000000000000000000000000000000aa"
		);
		assert_eq!(root.output_receipts.len(), 1);

		let child = &root.output_receipts[0];
		assert!(child.output_receipts.is_empty());
		assert_eq!(
			child.location(),
			ResolvedLocation {
				shard_id: ShardId(2),
				block_hash: BlockHash("0xBB".into()),
			}
		);
	}

	#[test]
	fn test_drop_deep_chain() {
		let leaf = || ReceiptNode {
			contract_address: Address::parse("0x01").unwrap(),
			shard_id: ShardId(1),
			block_hash: BlockHash("0xb".into()),
			output_receipts: vec![],
		};
		let mut root = leaf();
		for _ in 0..200_000 {
			let mut parent = leaf();
			parent.output_receipts.push(root);
			root = parent;
		}
		drop(root);
	}

	#[test]
	fn test_missing_output_receipts() {
		let root: ReceiptNode = serde_json::from_str(
			r#"{"contractAddress": "0x01", "shardId": "3", "blockHash": "0x22"}"#,
		)
		.unwrap();
		assert!(root.output_receipts.is_empty());
		assert_eq!(root.shard_id, ShardId(3));
	}
}

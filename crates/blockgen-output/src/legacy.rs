//! Legacy block and account-state documents.
//!
//! The legacy block keeps only the messages of the fetched block, each
//! rendered both as an input message and as a transaction. Header values and
//! balances are fixed literals taken from [`LegacyConfig`].

use crate::FormatError;
use blockgen_config::LegacyConfig;
use blockgen_types::{with_0x_prefix, Address};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyHeader {
	pub parent_hash: u64,
	pub number: u64,
	pub gas_limit: u64,
	pub gas_used: u64,
	pub coinbase: String,
	pub prevrandao: u64,
	pub chain_id: u64,
	pub basefee: u64,
	pub blob_basefee: u64,
	pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyMessage {
	pub src: String,
	pub dst: String,
	pub value: u128,
	/// Index of the matching entry in `transactions`.
	pub transaction: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyTransaction {
	#[serde(rename = "type")]
	pub kind: String,
	pub nonce: u64,
	pub id: usize,
	pub value: u128,
	pub receive_address: String,
	pub sender: String,
	pub gas_price: u64,
	pub gas: u64,
	pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyBlock {
	pub previous_header: LegacyHeader,
	pub current_header: LegacyHeader,
	pub account_blocks: Vec<Value>,
	pub transactions: Vec<LegacyTransaction>,
	pub input_messages: Vec<LegacyMessage>,
	pub output_messages: Vec<LegacyMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyAccount {
	pub address: String,
	pub balance: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyState {
	pub accounts: Vec<LegacyAccount>,
}

/// Message entry of a fetched block document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockMessage {
	from: String,
	to: String,
	#[serde(deserialize_with = "decimal")]
	value: u128,
	#[serde(deserialize_with = "decimal")]
	gas_price: u64,
	#[serde(deserialize_with = "decimal")]
	gas_used: u64,
	data: String,
}

/// Accepts a JSON number or a decimal string.
fn decimal<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: TryFrom<u64> + std::str::FromStr,
	<T as std::str::FromStr>::Err: std::fmt::Display,
{
	use serde::de::Error;

	match Value::deserialize(deserializer)? {
		Value::Number(n) => n
			.as_u64()
			.and_then(|v| T::try_from(v).ok())
			.ok_or_else(|| D::Error::custom(format!("{} is not a non-negative integer", n))),
		Value::String(s) => s.trim().parse().map_err(|e| {
			D::Error::custom(format!("'{}' is not a decimal integer: {}", s, e))
		}),
		other => Err(D::Error::custom(format!("expected integer, got {}", other))),
	}
}

fn header(config: &LegacyConfig) -> LegacyHeader {
	let h = &config.header;
	LegacyHeader {
		parent_hash: h.parent_hash,
		number: h.number,
		gas_limit: h.gas_limit,
		gas_used: h.gas_used,
		coinbase: config.coinbase.clone(),
		prevrandao: h.prevrandao,
		chain_id: h.chain_id,
		basefee: h.basefee,
		blob_basefee: h.blob_basefee,
		timestamp: h.timestamp,
	}
}

/// Translates a fetched block document into the legacy block shape.
///
/// Message `i` becomes transaction `i` and input message `i`, in block order.
pub fn legacy_block(block: &Value, config: &LegacyConfig) -> Result<LegacyBlock, FormatError> {
	let messages = block
		.get("messages")
		.and_then(Value::as_array)
		.ok_or(FormatError::MissingMessages)?;

	let mut transactions = Vec::with_capacity(messages.len());
	let mut input_messages = Vec::with_capacity(messages.len());

	for (index, raw) in messages.iter().enumerate() {
		let message = BlockMessage::deserialize(raw).map_err(|e| FormatError::MalformedMessage {
			index,
			message: e.to_string(),
		})?;

		input_messages.push(LegacyMessage {
			src: message.from.clone(),
			dst: message.to.clone(),
			value: message.value,
			transaction: index,
		});
		transactions.push(LegacyTransaction {
			kind: config.transaction_type.clone(),
			nonce: config.transaction_nonce,
			id: index,
			value: message.value,
			receive_address: message.to,
			sender: message.from,
			gas_price: message.gas_price,
			gas: message.gas_used,
			data: message.data,
		});
	}

	let header = header(config);
	Ok(LegacyBlock {
		previous_header: header.clone(),
		current_header: header,
		account_blocks: Vec::new(),
		transactions,
		input_messages,
		output_messages: Vec::new(),
	})
}

/// Builds the legacy account state: the called contract with its code, then
/// the calling wallet with a large balance.
pub fn legacy_state(
	contract: &Address,
	wallet: &Address,
	bytecode: &str,
	config: &LegacyConfig,
) -> LegacyState {
	LegacyState {
		accounts: vec![
			LegacyAccount {
				address: contract.as_str().to_lowercase(),
				balance: config.contract_balance,
				code: Some(with_0x_prefix(bytecode.trim())),
			},
			LegacyAccount {
				address: wallet.as_str().to_lowercase(),
				balance: config.wallet_balance,
				code: None,
			},
		],
	}
}

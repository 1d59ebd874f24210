//! Ledger identifier types.
//!
//! Addresses, message hashes, block hashes and shard ids as reported by the
//! wallet CLI and the JSON-RPC endpoint. Addresses are normalised on
//! construction so that values coming from different sources compare equal.

use crate::utils::without_0x_prefix;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing ledger identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerParseError {
	/// The value is not a hex string.
	#[error("Invalid hex value '{0}'")]
	InvalidHex(String),
	/// The value is not a shard number.
	#[error("Invalid shard id '{0}'")]
	InvalidShard(String),
}

/// Account or contract address.
///
/// Always stored lower-cased with a `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
	/// Parses and normalises an address string.
	pub fn parse(value: &str) -> Result<Self, LedgerParseError> {
		let digits = without_0x_prefix(value.trim());
		if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
			return Err(LedgerParseError::InvalidHex(value.to_string()));
		}
		Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl FromStr for Address {
	type Err = LedgerParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl TryFrom<String> for Address {
	type Error = LedgerParseError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(&value)
	}
}

impl From<Address> for String {
	fn from(address: Address) -> Self {
		address.0
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Hash identifying a submitted message.
///
/// This is the handle returned by `send-message` and the key used to fetch the
/// receipt cascade.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHash(pub String);

impl fmt::Display for MessageHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Hash of a block on some shard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHash(pub String);

impl fmt::Display for BlockHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Shard identifier.
///
/// The ledger reports shard ids as JSON numbers, while the command line and
/// older outputs carry them as strings; both forms are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(pub u32);

impl FromStr for ShardId {
	type Err = LedgerParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.trim()
			.parse::<u32>()
			.map(ShardId)
			.map_err(|_| LedgerParseError::InvalidShard(s.to_string()))
	}
}

impl fmt::Display for ShardId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Serialize for ShardId {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u32(self.0)
	}
}

impl<'de> Deserialize<'de> for ShardId {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		struct ShardIdVisitor;

		impl Visitor<'_> for ShardIdVisitor {
			type Value = ShardId;

			fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str("a shard number or a decimal string")
			}

			fn visit_u64<E: de::Error>(self, v: u64) -> Result<ShardId, E> {
				u32::try_from(v)
					.map(ShardId)
					.map_err(|_| E::custom(format!("shard id {} out of range", v)))
			}

			fn visit_i64<E: de::Error>(self, v: i64) -> Result<ShardId, E> {
				u32::try_from(v)
					.map(ShardId)
					.map_err(|_| E::custom(format!("shard id {} out of range", v)))
			}

			fn visit_str<E: de::Error>(self, v: &str) -> Result<ShardId, E> {
				v.parse().map_err(E::custom)
			}
		}

		deserializer.deserialize_any(ShardIdVisitor)
	}
}

//! JSON decoding without a nesting limit.
//!
//! Receipt cascades nest two levels per hop and their depth is set by
//! contract logic, so the default recursion limit does not apply here. The
//! parser stack spills onto the heap as it grows.

use serde::de::DeserializeOwned;

/// Decodes a complete JSON document, rejecting trailing text.
pub(crate) fn from_str<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
	let mut deserializer = serde_json::Deserializer::from_str(text);
	let value = decode(&mut deserializer)?;
	deserializer.end()?;
	Ok(value)
}

/// Decodes the JSON document at the start of `text`, ignoring what follows.
pub(crate) fn leading_from_str<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
	let mut deserializer = serde_json::Deserializer::from_str(text);
	decode(&mut deserializer)
}

fn decode<'de, R, T>(deserializer: &mut serde_json::Deserializer<R>) -> Result<T, serde_json::Error>
where
	R: serde_json::de::Read<'de>,
	T: DeserializeOwned,
{
	deserializer.disable_recursion_limit();
	T::deserialize(serde_stacker::Deserializer::new(deserializer))
}

//! Configuration validation utilities for the block generator.
//!
//! A small schema language for checking JSON documents before they are
//! deserialized: required and optional fields, primitive types with bounds,
//! arrays, nested objects and custom validators. TOML implementation tables are
//! converted to JSON and checked with the same machinery.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// Error that occurs when a required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// Error that occurs when a strict schema meets an undeclared field.
	#[error("Unexpected field: {0}")]
	UnknownField(String),
	/// Error that occurs when a field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// Error that occurs when field type is incorrect.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	/// Error that occurs when deserialization fails.
	#[error("Failed to deserialize config: {0}")]
	DeserializationError(String),
}

/// Represents the type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	/// A string value.
	String,
	/// An integer value with optional minimum and maximum bounds.
	Integer {
		/// Minimum allowed value (inclusive).
		min: Option<i64>,
		/// Maximum allowed value (inclusive).
		max: Option<i64>,
	},
	/// A boolean value (true/false).
	Boolean,
	/// An array of values, all of the same type.
	Array(Box<FieldType>),
	/// A nested object with its own schema.
	Object(Schema),
}

/// Custom validator run after the type check succeeded.
pub type FieldValidator = Box<dyn Fn(&serde_json::Value) -> Result<(), String> + Send + Sync>;

/// A named field in a schema.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	/// Creates a new field with the given name and type.
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a custom validator to this field.
	///
	/// The validator receives the field's value and returns an error message
	/// if validation fails.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&serde_json::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}
}

/// Validation schema for a JSON object.
///
/// A strict schema additionally rejects fields that are neither required nor
/// optional.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
	pub strict: bool,
}

impl Schema {
	/// Creates a new schema that tolerates undeclared fields.
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self {
			required,
			optional,
			strict: false,
		}
	}

	/// Creates a new schema that rejects undeclared fields.
	pub fn strict(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self {
			required,
			optional,
			strict: true,
		}
	}

	/// Validates a JSON value against this schema.
	///
	/// # Errors
	///
	/// Returns an error if:
	/// - The value is not an object
	/// - A required field is missing
	/// - A field has the wrong type or fails its custom validator
	/// - A strict schema finds an undeclared field
	pub fn validate(&self, config: &serde_json::Value) -> Result<(), ValidationError> {
		let object = config
			.as_object()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "object".to_string(),
				actual: json_type_name(config).to_string(),
			})?;

		for field in &self.required {
			let value = object
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			validate_field(field, value)?;
		}

		for field in &self.optional {
			if let Some(value) = object.get(&field.name) {
				validate_field(field, value)?;
			}
		}

		if self.strict {
			for key in object.keys() {
				let declared = self
					.required
					.iter()
					.chain(self.optional.iter())
					.any(|field| &field.name == key);
				if !declared {
					return Err(ValidationError::UnknownField(key.clone()));
				}
			}
		}

		Ok(())
	}
}

fn validate_field(field: &Field, value: &serde_json::Value) -> Result<(), ValidationError> {
	validate_field_type(&field.name, value, &field.field_type)?;

	if let Some(validator) = &field.validator {
		validator(value).map_err(|message| ValidationError::InvalidValue {
			field: field.name.clone(),
			message,
		})?;
	}

	Ok(())
}

/// Validates that a value matches the expected field type.
///
/// Nested arrays and objects are checked recursively; field names in errors are
/// qualified with their path (`contracts[1].id`).
fn validate_field_type(
	field_name: &str,
	value: &serde_json::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	let mismatch = |expected: &str| ValidationError::TypeMismatch {
		field: field_name.to_string(),
		expected: expected.to_string(),
		actual: json_type_name(value).to_string(),
	};

	match expected_type {
		FieldType::String => {
			if !value.is_string() {
				return Err(mismatch("string"));
			}
		},
		FieldType::Integer { min, max } => {
			let int_val = value.as_i64().ok_or_else(|| mismatch("integer"))?;

			if let Some(min_val) = min {
				if int_val < *min_val {
					return Err(ValidationError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is less than minimum {}", int_val, min_val),
					});
				}
			}

			if let Some(max_val) = max {
				if int_val > *max_val {
					return Err(ValidationError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is greater than maximum {}", int_val, max_val),
					});
				}
			}
		},
		FieldType::Boolean => {
			if !value.is_boolean() {
				return Err(mismatch("boolean"));
			}
		},
		FieldType::Array(inner_type) => {
			let array = value.as_array().ok_or_else(|| mismatch("array"))?;

			for (i, item) in array.iter().enumerate() {
				validate_field_type(&format!("{}[{}]", field_name, i), item, inner_type)?;
			}
		},
		FieldType::Object(schema) => {
			schema.validate(value).map_err(|e| match e {
				ValidationError::MissingField(f) => {
					ValidationError::MissingField(format!("{}.{}", field_name, f))
				},
				ValidationError::UnknownField(f) => {
					ValidationError::UnknownField(format!("{}.{}", field_name, f))
				},
				ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
					field: format!("{}.{}", field_name, field),
					message,
				},
				ValidationError::TypeMismatch {
					field,
					expected,
					actual,
				} => ValidationError::TypeMismatch {
					field: if field == "root" {
						field_name.to_string()
					} else {
						format!("{}.{}", field_name, field)
					},
					expected,
					actual,
				},
				other => other,
			})?;
		},
	}

	Ok(())
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
	match value {
		serde_json::Value::Null => "null",
		serde_json::Value::Bool(_) => "boolean",
		serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
		serde_json::Value::Number(_) => "float",
		serde_json::Value::String(_) => "string",
		serde_json::Value::Array(_) => "array",
		serde_json::Value::Object(_) => "object",
	}
}

/// Converts a TOML implementation table to JSON for schema validation.
pub fn toml_to_json(value: &toml::Value) -> Result<serde_json::Value, ValidationError> {
	serde_json::to_value(value).map_err(|e| ValidationError::DeserializationError(e.to_string()))
}

/// Trait defining a configuration schema for an implementation.
///
/// Gateway and compiler implementations expose one of these so that their
/// TOML tables are checked before the implementation is constructed.
pub trait ConfigSchema: Send + Sync {
	/// Validates a TOML configuration value against this schema.
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn contract_schema() -> Schema {
		Schema::strict(
			vec![
				Field::new(
					"id",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
				Field::new("path", FieldType::String),
			],
			vec![],
		)
	}

	#[test]
	fn test_valid_object() {
		let schema = contract_schema();
		assert!(schema.validate(&json!({"id": 1, "path": "A.sol"})).is_ok());
	}

	#[test]
	fn test_missing_field() {
		let err = contract_schema().validate(&json!({"id": 1})).unwrap_err();
		assert!(matches!(err, ValidationError::MissingField(f) if f == "path"));
	}

	#[test]
	fn test_strict_rejects_unknown_field() {
		let err = contract_schema()
			.validate(&json!({"id": 1, "path": "A.sol", "extra": true}))
			.unwrap_err();
		assert!(matches!(err, ValidationError::UnknownField(f) if f == "extra"));
	}

	#[test]
	fn test_lenient_accepts_unknown_field() {
		let schema = Schema::new(vec![Field::new("path", FieldType::String)], vec![]);
		assert!(schema.validate(&json!({"path": "A.sol", "extra": 1})).is_ok());
	}

	#[test]
	fn test_nested_array_paths() {
		let schema = Schema::new(
			vec![Field::new(
				"contracts",
				FieldType::Array(Box::new(FieldType::Object(contract_schema()))),
			)],
			vec![],
		);

		let err = schema
			.validate(&json!({"contracts": [{"id": 1, "path": "A.sol"}, {"id": "two", "path": "B.sol"}]}))
			.unwrap_err();
		match err {
			ValidationError::TypeMismatch {
				field,
				expected,
				actual,
			} => {
				assert_eq!(field, "contracts[1].id");
				assert_eq!(expected, "integer");
				assert_eq!(actual, "string");
			},
			other => panic!("unexpected error: {other}"),
		}
	}

	#[test]
	fn test_integer_bounds_and_validator() {
		let schema = Schema::new(
			vec![Field::new(
				"max_attempts",
				FieldType::Integer {
					min: Some(1),
					max: Some(100),
				},
			)],
			vec![Field::new("binary", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(s) if !s.is_empty() => Ok(()),
					_ => Err("binary cannot be empty".to_string()),
				}
			})],
		);

		assert!(schema.validate(&json!({"max_attempts": 0})).is_err());
		assert!(schema.validate(&json!({"max_attempts": 101})).is_err());
		assert!(schema
			.validate(&json!({"max_attempts": 5, "binary": ""}))
			.is_err());
		assert!(schema
			.validate(&json!({"max_attempts": 5, "binary": "solc"}))
			.is_ok());
	}

	#[test]
	fn test_toml_to_json() {
		let value: toml::Value = toml::from_str("binary = \"nil_cli\"\nretries = 3").unwrap();
		let json = toml_to_json(&value).unwrap();
		assert_eq!(json, json!({"binary": "nil_cli", "retries": 3}));
	}
}

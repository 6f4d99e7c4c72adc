//! Schema checks for implementation-specific configuration tables.
//!
//! Pluggable implementations (pricing backends, accounts) receive a raw
//! `toml::Value`; each exposes a [`ConfigSchema`] so bad settings fail at
//! startup instead of on the first swap.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: &'static str,
		actual: String,
	},
}

impl ValidationError {
	fn nested(self, parent: &str) -> Self {
		match self {
			ValidationError::MissingField(f) => {
				ValidationError::MissingField(format!("{}.{}", parent, f))
			},
			ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
				field: format!("{}.{}", parent, field),
				message,
			},
			ValidationError::TypeMismatch {
				field,
				expected,
				actual,
			} => ValidationError::TypeMismatch {
				field: format!("{}.{}", parent, field),
				expected,
				actual,
			},
		}
	}
}

#[derive(Debug)]
pub enum FieldType {
	String,
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	Table(Schema),
}

pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

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
			.finish_non_exhaustive()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a check run after the type check passes.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of one TOML table.
#[derive(Debug, Default)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table",
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}
		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}
		Ok(())
	}
}

fn check_type(name: &str, value: &toml::Value, expected: &FieldType) -> Result<(), ValidationError> {
	let mismatch = |expected: &'static str| ValidationError::TypeMismatch {
		field: name.to_string(),
		expected,
		actual: value.type_str().to_string(),
	};

	match expected {
		FieldType::String if !value.is_str() => Err(mismatch("string")),
		FieldType::Boolean if !value.is_bool() => Err(mismatch("boolean")),
		FieldType::Integer { min, max } => {
			let int = value.as_integer().ok_or_else(|| mismatch("integer"))?;
			let out_of_range = |message: String| ValidationError::InvalidValue {
				field: name.to_string(),
				message,
			};
			if let Some(min) = min.filter(|min| int < *min) {
				return Err(out_of_range(format!("Value {} is less than minimum {}", int, min)));
			}
			if let Some(max) = max.filter(|max| int > *max) {
				return Err(out_of_range(format!("Value {} is greater than maximum {}", int, max)));
			}
			Ok(())
		},
		FieldType::Table(schema) => schema.validate(value).map_err(|e| e.nested(name)),
		_ => Ok(()),
	}
}

/// Implemented by every pluggable backend to vet its own config table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

/// Checks that a string field starts with http:// or https://.
pub fn http_url(value: &toml::Value) -> Result<(), String> {
	match value.as_str() {
		Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(()),
		_ => Err("must be an http(s) URL".to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn schema() -> Schema {
		Schema::new(
			vec![Field::new("base_url", FieldType::String).with_validator(http_url)],
			vec![
				Field::new(
					"timeout",
					FieldType::Integer {
						min: Some(1),
						max: Some(60),
					},
				),
				Field::new(
					"auth",
					FieldType::Table(Schema::new(vec![Field::new("key", FieldType::String)], vec![])),
				),
			],
		)
	}

	#[test]
	fn test_accepts_valid_table() {
		let value: toml::Value = toml::from_str(
			r#"
			base_url = "https://api.0x.org"
			timeout = 10
			[auth]
			key = "abc"
			"#,
		)
		.unwrap();
		assert!(schema().validate(&value).is_ok());
	}

	#[test]
	fn test_reports_missing_and_invalid_fields() {
		let missing: toml::Value = toml::from_str("timeout = 10").unwrap();
		assert_eq!(
			schema().validate(&missing),
			Err(ValidationError::MissingField("base_url".to_string()))
		);

		let bad_url: toml::Value = toml::from_str(r#"base_url = "ftp://x""#).unwrap();
		assert!(matches!(
			schema().validate(&bad_url),
			Err(ValidationError::InvalidValue { .. })
		));

		let too_long: toml::Value =
			toml::from_str("base_url = \"http://x\"\ntimeout = 90").unwrap();
		assert!(matches!(
			schema().validate(&too_long),
			Err(ValidationError::InvalidValue { field, .. }) if field == "timeout"
		));
	}

	#[test]
	fn test_nested_errors_carry_the_path() {
		let value: toml::Value =
			toml::from_str("base_url = \"http://x\"\n[auth]\nkey = 5").unwrap();
		assert!(matches!(
			schema().validate(&value),
			Err(ValidationError::TypeMismatch { field, .. }) if field == "auth.key"
		));
	}
}

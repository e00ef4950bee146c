//! Key validation
//!
//! A key is any text without whitespace. The empty string contains no
//! whitespace and is therefore accepted.

use crate::error::{QuickKvError, Result};
use serde_json::Value;
use std::fmt;

/// Check that `key` contains no whitespace character.
pub fn validate_key(key: &str) -> Result<()> {
    if key.chars().any(char::is_whitespace) {
        return Err(QuickKvError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// A validated key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(String);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Key {
    type Error = QuickKvError;

    fn try_from(key: &str) -> Result<Self> {
        validate_key(key)?;
        Ok(Key(key.to_string()))
    }
}

impl TryFrom<String> for Key {
    type Error = QuickKvError;

    fn try_from(key: String) -> Result<Self> {
        validate_key(&key)?;
        Ok(Key(key))
    }
}

/// Keys that arrive as dynamic JSON must be strings.
impl TryFrom<&Value> for Key {
    type Error = QuickKvError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Key::try_from(s.as_str()),
            other => Err(QuickKvError::WrongKeyType {
                found: json_type_name(other),
            }),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

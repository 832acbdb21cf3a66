//! Job Arguments - typed key/value container for job inputs
//!
//! Values are kept in their serialized JSON form and converted lazily on read,
//! so the container can be persisted as a single JSON object. The JSON type of
//! a stored value is its declared [`ArgumentKind`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Declared type of a stored argument value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArgumentKind {
    Null,
    Boolean,
    Number,
    String,
    Sequence,
    Object,
}

impl ArgumentKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ArgumentKind::Null,
            Value::Bool(_) => ArgumentKind::Boolean,
            Value::Number(_) => ArgumentKind::Number,
            Value::String(_) => ArgumentKind::String,
            Value::Array(_) => ArgumentKind::Sequence,
            Value::Object(_) => ArgumentKind::Object,
        }
    }
}

impl std::fmt::Display for ArgumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgumentKind::Null => write!(f, "NULL"),
            ArgumentKind::Boolean => write!(f, "BOOLEAN"),
            ArgumentKind::Number => write!(f, "NUMBER"),
            ArgumentKind::String => write!(f, "STRING"),
            ArgumentKind::Sequence => write!(f, "SEQUENCE"),
            ArgumentKind::Object => write!(f, "OBJECT"),
        }
    }
}

/// Raised when a stored argument cannot be coerced to the requested type
#[derive(Error, Debug)]
pub enum ArgumentConversionError {
    #[error("argument '{name}' is stored as {found} and cannot be read as {expected}")]
    Incompatible {
        name: String,
        expected: &'static str,
        found: ArgumentKind,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("argument '{name}' cannot be serialized: {source}")]
    Unserializable {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ArgumentConversionError {
    /// Name of the offending argument
    pub fn name(&self) -> &str {
        match self {
            ArgumentConversionError::Incompatible { name, .. } => name,
            ArgumentConversionError::Unserializable { name, .. } => name,
        }
    }

    fn incompatible(
        name: &str,
        expected: &'static str,
        stored: &Value,
        source: Option<serde_json::Error>,
    ) -> Self {
        ArgumentConversionError::Incompatible {
            name: name.to_string(),
            expected,
            found: ArgumentKind::of(stored),
            source,
        }
    }
}

type ConversionResult<T> = std::result::Result<T, ArgumentConversionError>;

/// Named job inputs (unique names, insertion order preserved for display)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobArguments(Map<String, Value>);

impl JobArguments {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Store a value, overwriting any prior value for the same name
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Store any serializable value (maps, sets, domain structs)
    pub fn set_serialized<T>(
        &mut self,
        name: impl Into<String>,
        value: &T,
    ) -> ConversionResult<&mut Self>
    where
        T: Serialize + ?Sized,
    {
        let name = name.into();
        let value = serde_json::to_value(value).map_err(|source| {
            ArgumentConversionError::Unserializable {
                name: name.clone(),
                source,
            }
        })?;
        self.0.insert(name, value);
        Ok(self)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Raw stored form (including explicit nulls)
    pub fn get_raw(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn kind(&self, name: &str) -> Option<ArgumentKind> {
        self.0.get(name).map(ArgumentKind::of)
    }

    // Explicit nulls read the same as unset names
    fn present(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|value| !value.is_null())
    }

    pub fn get_as_string(&self, name: &str) -> ConversionResult<Option<String>> {
        match self.present(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(ArgumentConversionError::incompatible(
                name, "string", other, None,
            )),
        }
    }

    pub fn get_as_string_or(
        &self,
        name: &str,
        default: impl Into<String>,
    ) -> ConversionResult<String> {
        Ok(self
            .get_as_string(name)?
            .unwrap_or_else(|| default.into()))
    }

    pub fn get_as_bool(&self, name: &str) -> ConversionResult<Option<bool>> {
        match self.present(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(ArgumentConversionError::incompatible(
                name, "boolean", other, None,
            )),
        }
    }

    pub fn get_as_bool_or(&self, name: &str, default: bool) -> ConversionResult<bool> {
        Ok(self.get_as_bool(name)?.unwrap_or(default))
    }

    /// Deserialize the stored value into `T`
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> ConversionResult<Option<T>> {
        match self.present(name) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| {
                    ArgumentConversionError::incompatible(
                        name,
                        std::any::type_name::<T>(),
                        value,
                        Some(e),
                    )
                }),
        }
    }

    pub fn get_as_or<T: DeserializeOwned>(&self, name: &str, default: T) -> ConversionResult<T> {
        Ok(self.get_as(name)?.unwrap_or(default))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for JobArguments {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

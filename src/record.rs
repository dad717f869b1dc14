use crate::error::{Error, Result};

use aws_sdk_dynamodb::types;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections;

/// Attribute value of a stored record.
///
/// The serialized form uses the DynamoDB type descriptors as tags, so a value
/// written out as JSON reads like DynamoDB's own wire format.
///
/// ```rust
/// use recipe_store::record::Value;
///
/// let id = Value::from("42");
/// let tags = Value::string_set(["vegan", "quick"]);
/// assert_eq!(id.as_str(), Some("42"));
/// ```
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Value {
    /// Explicit null.
    #[serde(rename = "NULL")]
    Null,
    /// Boolean.
    #[serde(rename = "BOOL")]
    Bool(bool),
    /// Number, kept in its decimal text form.
    #[serde(rename = "N")]
    Number(String),
    /// String.
    #[serde(rename = "S")]
    String(String),
    /// Set of strings (no duplicates, no order).
    #[serde(rename = "SS")]
    StringSet(collections::BTreeSet<String>),
    /// Ordered list of values.
    #[serde(rename = "L")]
    List(Vec<Value>),
    /// Nested map of values.
    #[serde(rename = "M")]
    Map(collections::BTreeMap<String, Value>),
}

impl Value {
    /// Build a string set from any iterator of string-like items.
    pub fn string_set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::StringSet(items.into_iter().map(Into::into).collect())
    }

    /// The string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Plain JSON form, without type descriptors.
    ///
    /// Numbers become JSON numbers when their text parses as one, string sets
    /// become arrays.
    ///
    /// ```rust
    /// use recipe_store::record::Value;
    ///
    /// assert_eq!(Value::from("5").to_json(), serde_json::json!("5"));
    /// assert_eq!(Value::from(5_u64).to_json(), serde_json::json!(5));
    /// ```
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(value) => serde_json::Value::Bool(*value),
            Self::Number(text) => match serde_json::from_str::<serde_json::Number>(text) {
                Ok(number) => serde_json::Value::Number(number),
                Err(_) => serde_json::Value::String(text.clone()),
            },
            Self::String(value) => serde_json::Value::String(value.clone()),
            Self::StringSet(items) => {
                items.iter().cloned().map(serde_json::Value::String).collect()
            }
            Self::List(items) => items.iter().map(Value::to_json).collect(),
            Self::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Number(value.to_string())
    }
}

impl From<Value> for types::AttributeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null(true),
            Value::Bool(value) => Self::Bool(value),
            Value::Number(value) => Self::N(value),
            Value::String(value) => Self::S(value),
            Value::StringSet(values) => Self::Ss(values.into_iter().collect()),
            Value::List(values) => Self::L(values.into_iter().map(Into::into).collect()),
            Value::Map(values) => Self::M(
                values
                    .into_iter()
                    .map(|(name, value)| (name, value.into()))
                    .collect(),
            ),
        }
    }
}

impl TryFrom<types::AttributeValue> for Value {
    type Error = Error;

    fn try_from(value: types::AttributeValue) -> Result<Self> {
        let value = match value {
            types::AttributeValue::Null(_) => Self::Null,
            types::AttributeValue::Bool(value) => Self::Bool(value),
            types::AttributeValue::N(value) => Self::Number(value),
            types::AttributeValue::S(value) => Self::String(value),
            types::AttributeValue::Ss(values) => Self::StringSet(values.into_iter().collect()),
            types::AttributeValue::L(values) => {
                let mut list = Vec::with_capacity(values.len());
                for value in values {
                    list.push(value.try_into()?);
                }
                Self::List(list)
            }
            types::AttributeValue::M(values) => {
                let mut map = collections::BTreeMap::new();
                for (name, value) in values {
                    map.insert(name, value.try_into()?);
                }
                Self::Map(map)
            }
            other => return Err(Error::UnsupportedValue(format!("{other:?}"))),
        };
        Ok(value)
    }
}

/// A stored item: attribute name to value.
pub type Record = collections::BTreeMap<String, Value>;

/// The key attributes of a record (partition key and optional sort key).
///
/// Scans resume from a `Key`; it is also the resume point a cursor encodes.
pub type Key = collections::BTreeMap<String, Value>;

/// Key with a single partition attribute.
///
/// ```rust
/// use recipe_store::record;
///
/// let key = record::key("Id", "7");
/// assert_eq!(key["Id"].as_str(), Some("7"));
/// ```
pub fn key(name: &str, value: impl Into<Value>) -> Key {
    Key::from([(name.to_string(), value.into())])
}

/// Key with a partition and a sort attribute.
pub fn composite_key(
    partition: (&str, impl Into<Value>),
    sort: (&str, impl Into<Value>),
) -> Key {
    Key::from([
        (partition.0.to_string(), partition.1.into()),
        (sort.0.to_string(), sort.1.into()),
    ])
}

/// Convert a record into a DynamoDB item.
pub fn to_item(record: Record) -> collections::HashMap<String, types::AttributeValue> {
    record
        .into_iter()
        .map(|(name, value)| (name, value.into()))
        .collect()
}

/// Convert a DynamoDB item into a record.
pub fn from_item(item: collections::HashMap<String, types::AttributeValue>) -> Result<Record> {
    let mut record = Record::new();
    for (name, value) in item {
        record.insert(name, value.try_into()?);
    }
    Ok(record)
}

/// Serialize a typed value into a record.
pub fn to_record<T: Serialize>(value: T) -> Result<Record> {
    let item: collections::HashMap<String, types::AttributeValue> =
        serde_dynamo::to_item(value)?;
    from_item(item)
}

/// Deserialize a record into a typed value.
pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T> {
    let value = serde_dynamo::from_item(to_item(record))?;
    Ok(value)
}

//! Query-related data models.
//!
//! [`ArgValue`] is what callers supply for a named placeholder; [`ParamValue`]
//! is what actually gets bound to the driver after marshalling.

use crate::error::{DbError, DbResult};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A positional parameter value bound to the driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    /// Serializes as its ISO-8601 text. PostgreSQL receives a `timestamptz`,
    /// SQLite the text.
    #[serde(serialize_with = "serialize_iso_8601")]
    Timestamp(DateTime<Utc>),
    /// Passed to the driver as an array (for `= ANY($1)` style predicates)
    TextArray(Vec<String>),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

fn serialize_iso_8601<S: Serializer>(
    value: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&iso_8601(value))
}

/// A value supplied for a named placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Key present but unset. Treated exactly like an absent key.
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    TextArray(Vec<String>),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

impl ArgValue {
    /// Wrap any value through its `Display` representation.
    pub fn display(value: impl std::fmt::Display) -> Self {
        Self::Text(value.to_string())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Convert to the driver-facing parameter.
    ///
    /// Returns `None` for [`ArgValue::Undefined`], which callers report as a
    /// missing argument.
    pub fn to_param(&self) -> Option<ParamValue> {
        let param = match self {
            Self::Undefined => return None,
            Self::Null => ParamValue::Null,
            Self::Bool(v) => ParamValue::Text(v.to_string()),
            Self::Int(v) => ParamValue::Int(*v),
            Self::Float(v) => ParamValue::Float(*v),
            Self::Text(v) => ParamValue::Text(v.clone()),
            Self::Timestamp(v) => ParamValue::Timestamp(*v),
            Self::TextArray(v) => ParamValue::TextArray(v.clone()),
            Self::IntArray(v) => ParamValue::IntArray(v.clone()),
            Self::FloatArray(v) => ParamValue::FloatArray(v.clone()),
        };
        Some(param)
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub(crate) fn iso_8601(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&String> for ArgValue {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ArgValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for ArgValue {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<DateTime<Utc>> for ArgValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

/// Naive timestamps are taken to be UTC.
impl From<NaiveDateTime> for ArgValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v.and_utc())
    }
}

impl From<Vec<String>> for ArgValue {
    fn from(v: Vec<String>) -> Self {
        Self::TextArray(v)
    }
}

impl From<Vec<&str>> for ArgValue {
    fn from(v: Vec<&str>) -> Self {
        Self::TextArray(v.into_iter().map(String::from).collect())
    }
}

impl From<Vec<i64>> for ArgValue {
    fn from(v: Vec<i64>) -> Self {
        Self::IntArray(v)
    }
}

impl From<Vec<i32>> for ArgValue {
    fn from(v: Vec<i32>) -> Self {
        Self::IntArray(v.into_iter().map(i64::from).collect())
    }
}

impl From<Vec<f64>> for ArgValue {
    fn from(v: Vec<f64>) -> Self {
        Self::FloatArray(v)
    }
}

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

impl TryFrom<JsonValue> for ArgValue {
    type Error = DbError;

    fn try_from(value: JsonValue) -> DbResult<Self> {
        match value {
            JsonValue::Null => Ok(Self::Null),
            JsonValue::Bool(v) => Ok(Self::Bool(v)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(v) => Ok(Self::Int(v)),
                None => n
                    .as_f64()
                    .map(Self::Float)
                    .ok_or_else(|| DbError::invalid_input(format!("Unsupported number: {}", n))),
            },
            JsonValue::String(v) => Ok(Self::Text(v)),
            JsonValue::Array(items) => json_array(items),
            JsonValue::Object(_) => Err(DbError::invalid_input(
                "Objects cannot be bound as parameters; serialize them to text first",
            )),
        }
    }
}

fn json_array(items: Vec<JsonValue>) -> DbResult<ArgValue> {
    if items.iter().all(JsonValue::is_string) {
        let values = items
            .into_iter()
            .filter_map(|v| match v {
                JsonValue::String(s) => Some(s),
                _ => None,
            })
            .collect();
        return Ok(ArgValue::TextArray(values));
    }
    if items.iter().all(|v| v.as_i64().is_some()) {
        return Ok(ArgValue::IntArray(
            items.iter().filter_map(JsonValue::as_i64).collect(),
        ));
    }
    if items.iter().all(JsonValue::is_number) {
        return Ok(ArgValue::FloatArray(
            items.iter().filter_map(JsonValue::as_f64).collect(),
        ));
    }
    Err(DbError::invalid_input(
        "Array arguments must contain only strings or only numbers",
    ))
}

/// Named arguments for a SQL template, looked up by placeholder name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedArgs {
    values: HashMap<String, ArgValue>,
}

impl NamedArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ArgValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// Resolve a name, treating [`ArgValue::Undefined`] as absent.
    pub fn resolve(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name).filter(|v| !v.is_undefined())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build arguments from a JSON object, e.g. a request body.
    pub fn from_json(object: serde_json::Map<String, JsonValue>) -> DbResult<Self> {
        let mut args = Self::new();
        for (name, value) in object {
            let value = ArgValue::try_from(value).map_err(|e| {
                DbError::invalid_input(format!("Argument '{}': {}", name, e))
            })?;
            args.insert(name, value);
        }
        Ok(args)
    }
}

impl<K, V> FromIterator<(K, V)> for NamedArgs
where
    K: Into<String>,
    V: Into<ArgValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Self::new();
        for (name, value) in iter {
            args.insert(name, value);
        }
        args
    }
}

/// A template compiled to positional form. `params[i]` binds `$<i+1>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    text: String,
    params: Vec<ParamValue>,
}

impl CompiledQuery {
    pub(crate) fn new(text: String, params: Vec<ParamValue>) -> Self {
        Self { text, params }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[ParamValue] {
        &self.params
    }
}

/// Tabular result of a statement.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// Rows changed by INSERT/UPDATE/DELETE; 0 for plain SELECTs on most drivers
    pub rows_affected: u64,
}

impl RowSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row, if any.
    pub fn first(&self) -> Option<&serde_json::Map<String, JsonValue>> {
        self.rows.first()
    }
}

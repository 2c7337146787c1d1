//! Row decoding.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction

use crate::models::DatabaseType;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Binary,
    Json,
    Timestamp,
    Date,
    Time,
    Interval,
    Uuid,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // PostgreSQL arrays (INT8[], TEXT[]) are decoded element-wise as text fallbacks
    if lower.ends_with("[]") {
        return TypeCategory::Unknown;
    }

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if (lower.starts_with("int") && lower != "interval")
        || lower.ends_with("int")
        || lower.contains("serial")
    {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower == "timestamptz" || lower == "timestamp" {
        return TypeCategory::Timestamp;
    }

    if lower == "date" {
        return TypeCategory::Date;
    }

    if lower == "time" {
        return TypeCategory::Time;
    }

    if lower == "interval" {
        return TypeCategory::Interval;
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    if lower.contains("blob") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    // Text, arrays and everything else
    TypeCategory::Unknown
}

/// ISO-8601 duration as PostgreSQL prints it with `intervalstyle = iso_8601`,
/// e.g. `P1Y2M3DT4H5M6.5S`. Each component keeps its own sign.
pub fn iso_8601_interval(months: i32, days: i32, microseconds: i64) -> String {
    const MINUTE: i64 = 60_000_000;
    const HOUR: i64 = 60 * MINUTE;

    let mut out = String::from("P");
    let (years, months) = (months / 12, months % 12);
    if years != 0 {
        out.push_str(&format!("{}Y", years));
    }
    if months != 0 {
        out.push_str(&format!("{}M", months));
    }
    if days != 0 {
        out.push_str(&format!("{}D", days));
    }

    let hours = microseconds / HOUR;
    let minutes = (microseconds % HOUR) / MINUTE;
    let micros = microseconds % MINUTE;
    if hours != 0 || minutes != 0 || micros != 0 {
        out.push('T');
        if hours != 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes != 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if micros != 0 {
            out.push_str(&seconds(micros));
            out.push('S');
        }
    }

    if out == "P" {
        out.push_str("T0S");
    }
    out
}

/// Seconds with trailing zeros trimmed from the fraction.
fn seconds(micros: i64) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let abs = micros.unsigned_abs();
    let (whole, frac) = (abs / 1_000_000, abs % 1_000_000);
    if frac == 0 {
        return format!("{}{}", sign, whole);
    }
    let frac = format!("{:06}", frac);
    format!("{}{}.{}", sign, whole, frac.trim_end_matches('0'))
}

/// Raw NUMERIC values as strings, preserving the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Binary columns are returned base64-encoded.
pub fn encode_binary(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

/// Conversion of database rows to JSON maps.
pub trait RowToJson {
    fn column_names(&self) -> Vec<String>;
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue>;
}

impl RowToJson for PgRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::PostgreSQL);
                (col.name().to_string(), postgres::decode_column(self, idx, category))
            })
            .collect()
    }
}

impl RowToJson for SqliteRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::SQLite);
                (
                    col.name().to_string(),
                    sqlite::decode_column(self, idx, type_name, category),
                )
            })
            .collect()
    }
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
    use sqlx::ValueRef;
    use sqlx::postgres::PgValueFormat;
    use sqlx::postgres::types::PgInterval;

    type Decoded = Result<JsonValue, sqlx::Error>;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
        let format = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return JsonValue::Null,
            Ok(raw) => raw.format(),
            Err(e) => return decode_failed(row, idx, &e),
        };

        let decoded = match category {
            TypeCategory::Decimal => row.try_get::<RawDecimal, _>(idx).map(|v| JsonValue::String(v.0)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => row.try_get::<bool, _>(idx).map(JsonValue::Bool),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => row.try_get::<Vec<u8>, _>(idx).map(|v| encode_binary(&v)),
            TypeCategory::Json => row.try_get::<JsonValue, _>(idx),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::Date => row
                .try_get::<NaiveDate, _>(idx)
                .map(|v| JsonValue::String(v.to_string())),
            TypeCategory::Time => row
                .try_get::<NaiveTime, _>(idx)
                .map(|v| JsonValue::String(v.to_string())),
            TypeCategory::Interval => decode_interval(row, idx, format),
            TypeCategory::Uuid => row
                .try_get::<uuid::Uuid, _>(idx)
                .map(|v| JsonValue::String(v.to_string())),
            TypeCategory::Unknown => decode_text(row, idx),
        };
        decoded.unwrap_or_else(|e| decode_failed(row, idx, &e))
    }

    /// A non-null value we could not decode. Logged, then returned as null.
    fn decode_failed(row: &PgRow, idx: usize, err: &sqlx::Error) -> JsonValue {
        let column = &row.columns()[idx];
        tracing::error!(
            column = column.name(),
            type_name = column.type_info().name(),
            error = %err,
            "Failed to decode column value"
        );
        JsonValue::Null
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Decoded {
        row.try_get::<i64, _>(idx)
            .or_else(|_| row.try_get::<i32, _>(idx).map(i64::from))
            .or_else(|_| row.try_get::<i16, _>(idx).map(i64::from))
            .map(|v| JsonValue::Number(v.into()))
    }

    fn decode_float(row: &PgRow, idx: usize) -> Decoded {
        row.try_get::<f64, _>(idx)
            .or_else(|_| row.try_get::<f32, _>(idx).map(f64::from))
            .map(float_value)
    }

    fn decode_timestamp(row: &PgRow, idx: usize) -> Decoded {
        row.try_get::<DateTime<Utc>, _>(idx)
            .map(|v| JsonValue::String(v.to_rfc3339_opts(SecondsFormat::Millis, true)))
            .or_else(|_| {
                row.try_get::<NaiveDateTime, _>(idx)
                    .map(|v| JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()))
            })
    }

    fn decode_interval(row: &PgRow, idx: usize, format: PgValueFormat) -> Decoded {
        match format {
            PgValueFormat::Binary => row.try_get::<PgInterval, _>(idx).map(|v| {
                JsonValue::String(iso_8601_interval(v.months, v.days, v.microseconds))
            }),
            // Simple-protocol results; sqlx has no text decoder for INTERVAL
            PgValueFormat::Text => row.try_get_unchecked::<String, _>(idx).map(JsonValue::String),
        }
    }

    fn decode_text(row: &PgRow, idx: usize) -> Decoded {
        row.try_get::<String, _>(idx)
            .map(JsonValue::String)
            .or_else(|_| {
                row.try_get::<Vec<String>, _>(idx)
                    .map(|v| JsonValue::Array(v.into_iter().map(JsonValue::String).collect()))
            })
            .or_else(|_| {
                row.try_get::<Vec<i64>, _>(idx).map(|v| {
                    JsonValue::Array(v.into_iter().map(|n| JsonValue::Number(n.into())).collect())
                })
            })
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> JsonValue {
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float | TypeCategory::Decimal => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            _ => decode_text(row, idx, type_name),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(|v| JsonValue::Number(v.into()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_boolean(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .map(float_value)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_binary(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| encode_binary(&v))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_text(row: &SqliteRow, idx: usize, type_name: &str) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            if type_name.to_lowercase().contains("json") {
                if let Ok(json) = serde_json::from_str::<JsonValue>(&v) {
                    return json;
                }
            }
            return JsonValue::String(v);
        }
        // Expression columns have no declared type; fall back on the value's storage class
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        JsonValue::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT4", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("INTEGER", DatabaseType::SQLite),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("NUMERIC", DatabaseType::PostgreSQL),
            TypeCategory::Decimal
        );
        // SQLite NUMERIC is a float
        assert_eq!(
            categorize_type("numeric", DatabaseType::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_other() {
        assert_eq!(
            categorize_type("jsonb", DatabaseType::PostgreSQL),
            TypeCategory::Json
        );
        assert_eq!(
            categorize_type("TIMESTAMPTZ", DatabaseType::PostgreSQL),
            TypeCategory::Timestamp
        );
        assert_eq!(
            categorize_type("BLOB", DatabaseType::SQLite),
            TypeCategory::Binary
        );
        assert_eq!(
            categorize_type("TEXT", DatabaseType::SQLite),
            TypeCategory::Unknown
        );
        assert_eq!(
            categorize_type("INT8[]", DatabaseType::PostgreSQL),
            TypeCategory::Unknown
        );
        assert_eq!(
            categorize_type("UUID[]", DatabaseType::PostgreSQL),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn test_categorize_type_temporal_and_uuid() {
        assert_eq!(
            categorize_type("DATE", DatabaseType::PostgreSQL),
            TypeCategory::Date
        );
        assert_eq!(
            categorize_type("TIME", DatabaseType::PostgreSQL),
            TypeCategory::Time
        );
        assert_eq!(
            categorize_type("INTERVAL", DatabaseType::PostgreSQL),
            TypeCategory::Interval
        );
        assert_eq!(
            categorize_type("UUID", DatabaseType::PostgreSQL),
            TypeCategory::Uuid
        );
        // TIMETZ has no chrono mapping; decoded as text
        assert_eq!(
            categorize_type("TIMETZ", DatabaseType::PostgreSQL),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn test_iso_8601_interval() {
        assert_eq!(iso_8601_interval(0, 1, 0), "P1D");
        assert_eq!(iso_8601_interval(0, 0, 0), "PT0S");
        let micros = ((4 * 3600 + 5 * 60 + 6) * 1_000_000) + 500_000;
        assert_eq!(iso_8601_interval(14, 3, micros), "P1Y2M3DT4H5M6.5S");
        assert_eq!(iso_8601_interval(0, 0, 90 * 60_000_000), "PT1H30M");
        assert_eq!(iso_8601_interval(-1, 0, -1_500_000), "P-1MT-1.5S");
        assert_eq!(iso_8601_interval(0, 0, -500_000), "PT-0.5S");
        assert_eq!(iso_8601_interval(0, 0, 1_000), "PT0.001S");
    }

    #[test]
    fn test_encode_binary() {
        assert_eq!(
            encode_binary(b"hello world"),
            JsonValue::String("aGVsbG8gd29ybGQ=".to_string())
        );
        assert_eq!(encode_binary(&[]), JsonValue::String(String::new()));
    }
}

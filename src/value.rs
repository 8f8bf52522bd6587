//! Database value normalization.
//!
//! Rows coming back from the data store carry database-native scalars:
//! temporal values, fixed-point decimals, raw bytes, JSON documents. None of
//! those can be dropped into a prompt or a JSON payload as-is. This module
//! defines the native representation ([`DbValue`]) and the interchange-safe
//! one ([`NormalizedValue`]) together with the total conversion between them.
//!
//! | Native | Normalized |
//! |--------|------------|
//! | `NULL` | `null` |
//! | `DATE`, `TIME`, `DATETIME`, `TIMESTAMP` | ISO-8601 string |
//! | `DECIMAL` | floating-point number |
//! | `BINARY`, `BLOB`, `BIT` | lowercase hex string |
//! | `JSON`, anything unrecognized | string representation |
//! | bool, integers, floats, text | unchanged |
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use nl2sql_analyst::value::{DbValue, NormalizedValue, normalize};
//!
//! let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! assert_eq!(
//!     normalize(DbValue::Date(date)),
//!     NormalizedValue::String("2024-03-01".into())
//! );
//! assert_eq!(
//!     normalize(DbValue::Bytes(vec![0xde, 0xad])),
//!     NormalizedValue::String("dead".into())
//! );
//! ```

use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

/// A scalar as produced by the database client.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Fixed-point `DECIMAL`/`NUMERIC`
    Decimal(BigDecimal),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Bytes(Vec<u8>),
    Text(String),
    /// Structured document (`JSON` columns)
    Json(serde_json::Value),
    /// Value the client could only surface as text (`GEOMETRY`, `SET`, ...)
    Other(String)
}

impl DbValue {
    /// Textual content of text-like values.
    ///
    /// Introspection statements on some servers return identifiers as
    /// `VARBINARY`, so bytes are decoded lossily as UTF-8.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) | Self::Other(s) => Some(s.clone()),
            Self::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            _ => None
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// A value restricted to the interchange-safe set
/// `{null, boolean, number, string}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NormalizedValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String)
}

impl NormalizedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::UInt(_) | Self::Float(_))
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::UInt(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::String(s) => f.write_str(s)
        }
    }
}

/// Row as returned by the data store, columns in result order.
pub type Row = IndexMap<String, DbValue>;

/// Row after normalization, columns in result order.
pub type NormalizedRow = IndexMap<String, NormalizedValue>;

/// Convert a database-native value into an interchange-safe one.
///
/// Total: every variant maps to exactly one of `null`, boolean, number or
/// string. Decimal precision loss is accepted.
pub fn normalize(value: DbValue) -> NormalizedValue {
    match value {
        DbValue::Null => NormalizedValue::Null,
        DbValue::Bool(b) => NormalizedValue::Bool(b),
        DbValue::Int(n) => NormalizedValue::Int(n),
        DbValue::UInt(n) => NormalizedValue::UInt(n),
        DbValue::Float(n) => float(n),
        DbValue::Decimal(d) => decimal(&d),
        DbValue::Date(d) => NormalizedValue::String(d.format("%Y-%m-%d").to_string()),
        DbValue::Time(t) => NormalizedValue::String(t.format("%H:%M:%S%.f").to_string()),
        DbValue::DateTime(dt) => {
            NormalizedValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }
        DbValue::Timestamp(ts) => NormalizedValue::String(ts.to_rfc3339()),
        DbValue::Bytes(b) => NormalizedValue::String(hex::encode(b)),
        DbValue::Text(s) => NormalizedValue::String(s),
        DbValue::Json(v) => NormalizedValue::String(v.to_string()),
        DbValue::Other(s) => NormalizedValue::String(s)
    }
}

/// Normalize every value of a row, keeping column order.
pub fn normalize_row(row: Row) -> NormalizedRow {
    row.into_iter()
        .map(|(column, value)| (column, normalize(value)))
        .collect()
}

// NaN and infinities have no JSON number form
fn float(n: f64) -> NormalizedValue {
    if n.is_finite() {
        NormalizedValue::Float(n)
    } else {
        NormalizedValue::String(n.to_string())
    }
}

fn decimal(d: &BigDecimal) -> NormalizedValue {
    let text = d.to_string();
    match text.parse::<f64>() {
        Ok(n) => float(n),
        Err(_) => NormalizedValue::String(text)
    }
}

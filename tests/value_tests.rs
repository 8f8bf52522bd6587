// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, TimeZone, Utc};
use nl2sql_analyst::value::{DbValue, NormalizedValue, normalize, normalize_row};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn is_interchange_safe(value: &NormalizedValue) -> bool {
    match serde_json::to_value(value).unwrap() {
        serde_json::Value::Null
        | serde_json::Value::Bool(_)
        | serde_json::Value::Number(_)
        | serde_json::Value::String(_) => true,
        _ => false
    }
}

#[test]
fn test_null_stays_null() {
    assert_eq!(normalize(DbValue::Null), NormalizedValue::Null);
}

#[test]
fn test_primitives_unchanged() {
    assert_eq!(normalize(DbValue::Bool(true)), NormalizedValue::Bool(true));
    assert_eq!(normalize(DbValue::Int(-7)), NormalizedValue::Int(-7));
    assert_eq!(normalize(DbValue::UInt(u64::MAX)), NormalizedValue::UInt(u64::MAX));
    assert_eq!(normalize(DbValue::Float(1.5)), NormalizedValue::Float(1.5));
    assert_eq!(
        normalize(DbValue::Text("Fiat Uno".into())),
        NormalizedValue::String("Fiat Uno".into())
    );
}

#[test]
fn test_date_is_iso() {
    assert_eq!(
        normalize(DbValue::Date(date(2024, 1, 15))),
        NormalizedValue::String("2024-01-15".into())
    );
}

#[test]
fn test_datetime_is_iso() {
    let dt = date(2024, 1, 15).and_hms_opt(10, 30, 0).unwrap();
    assert_eq!(
        normalize(DbValue::DateTime(dt)),
        NormalizedValue::String("2024-01-15T10:30:00".into())
    );
}

#[test]
fn test_time_is_iso() {
    let t = chrono::NaiveTime::from_hms_opt(8, 5, 9).unwrap();
    assert_eq!(
        normalize(DbValue::Time(t)),
        NormalizedValue::String("08:05:09".into())
    );
}

#[test]
fn test_timestamp_keeps_offset() {
    let ts = Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap();
    assert_eq!(
        normalize(DbValue::Timestamp(ts)),
        NormalizedValue::String("2024-06-30T23:59:59+00:00".into())
    );
}

#[test]
fn test_decimal_becomes_float() {
    let d = BigDecimal::from_str("1999.90").unwrap();
    assert_eq!(normalize(DbValue::Decimal(d)), NormalizedValue::Float(1999.9));
}

#[test]
fn test_bytes_become_hex() {
    assert_eq!(
        normalize(DbValue::Bytes(vec![0x00, 0xff, 0x10])),
        NormalizedValue::String("00ff10".into())
    );
}

#[test]
fn test_json_becomes_string() {
    let doc = serde_json::json!({"cor": "prata"});
    assert_eq!(
        normalize(DbValue::Json(doc)),
        NormalizedValue::String(r#"{"cor":"prata"}"#.into())
    );
}

#[test]
fn test_unknown_becomes_string() {
    assert_eq!(
        normalize(DbValue::Other("POINT(1 2)".into())),
        NormalizedValue::String("POINT(1 2)".into())
    );
}

#[test]
fn test_non_finite_float_is_string() {
    assert!(matches!(
        normalize(DbValue::Float(f64::NAN)),
        NormalizedValue::String(_)
    ));
    assert!(matches!(
        normalize(DbValue::Float(f64::INFINITY)),
        NormalizedValue::String(_)
    ));
}

#[test]
fn test_every_variant_is_interchange_safe() {
    let values = vec![
        DbValue::Null,
        DbValue::Bool(false),
        DbValue::Int(0),
        DbValue::UInt(3),
        DbValue::Float(f64::NEG_INFINITY),
        DbValue::Decimal(BigDecimal::from_str("0.001").unwrap()),
        DbValue::Date(date(1999, 12, 31)),
        DbValue::Time(chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap()),
        DbValue::DateTime(date(2000, 1, 1).and_hms_opt(0, 0, 0).unwrap()),
        DbValue::Timestamp(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()),
        DbValue::Bytes(Vec::new()),
        DbValue::Text(String::new()),
        DbValue::Json(serde_json::json!([1, 2])),
        DbValue::Other("SET('a')".into())
    ];
    for value in values {
        let normalized = normalize(value.clone());
        assert!(is_interchange_safe(&normalized), "{:?}", value);
    }
}

#[test]
fn test_normalize_row_keeps_column_order() {
    let row = [
        ("z_last".to_string(), DbValue::Int(1)),
        ("a_first".to_string(), DbValue::Date(date(2024, 2, 29))),
        ("m_mid".to_string(), DbValue::Null)
    ]
    .into_iter()
    .collect();
    let normalized = normalize_row(row);
    let keys: Vec<&str> = normalized.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["z_last", "a_first", "m_mid"]);
    assert_eq!(normalized["a_first"], NormalizedValue::String("2024-02-29".into()));
}

#[test]
fn test_display_forms() {
    assert_eq!(NormalizedValue::Null.to_string(), "NULL");
    assert_eq!(NormalizedValue::Int(42).to_string(), "42");
    assert_eq!(NormalizedValue::String("x".into()).to_string(), "x");
    assert!(NormalizedValue::Float(2.5).is_number());
    assert!(!NormalizedValue::String("2.5".into()).is_number());
}

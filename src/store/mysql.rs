use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{
    Column, MySqlPool, Row as _, TypeInfo, ValueRef,
    mysql::{MySqlPoolOptions, MySqlRow}
};
use tracing::{debug, info, warn};

use super::{DataStore, RawColumn};
use crate::{
    config::DatabaseConfig,
    error::{AppResult, connection_error, database_error},
    schema::ForeignKeyDescriptor,
    value::{DbValue, Row}
};

const LIST_TABLES_SQL: &str = "SELECT TABLE_NAME AS table_name \
     FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() \
     ORDER BY TABLE_NAME";

const DESCRIBE_SQL: &str = "SELECT COLUMN_NAME AS name, COLUMN_TYPE AS data_type, \
     IS_NULLABLE AS nullable, COLUMN_KEY AS column_key, COLUMN_DEFAULT AS column_default, \
     EXTRA AS extra \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

const FOREIGN_KEYS_SQL: &str = "SELECT CONSTRAINT_NAME AS constraint_name, COLUMN_NAME AS \
     column_name, REFERENCED_TABLE_NAME AS referenced_table, REFERENCED_COLUMN_NAME AS \
     referenced_column \
     FROM information_schema.KEY_COLUMN_USAGE \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
     AND REFERENCED_TABLE_NAME IS NOT NULL \
     ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION";

/// MySQL/MariaDB data store over a single long-lived session.
pub struct MySqlStore {
    pool: MySqlPool
}

impl MySqlStore {
    /// Open the session. Failure here is fatal to the whole run.
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let options = config.connect_options()?;
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| connection_error(e.to_string()))?;
        info!(host = %config.host, port = config.port, "database session established");
        Ok(Self { pool })
    }

    /// Row count per table, for the connection check.
    pub async fn table_counts(&self) -> AppResult<Vec<(String, i64)>> {
        let mut counts = Vec::new();
        for table in self.list_tables().await? {
            let sql = format!("SELECT COUNT(*) AS total FROM {}", super::quote_identifier(&table));
            let total = sqlx::query_scalar::<_, i64>(&sql)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| database_error(e.to_string()))?;
            counts.push((table, total));
        }
        Ok(counts)
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("database session closed");
    }

    async fn fetch_bound(&self, sql: &str, param: &str) -> AppResult<Vec<Row>> {
        let rows = sqlx::query(sql)
            .bind(param)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database_error(e.to_string()))?;
        Ok(rows.iter().map(decode_row).collect())
    }
}

#[async_trait]
impl DataStore for MySqlStore {
    async fn list_tables(&self) -> AppResult<Vec<String>> {
        let rows = self.fetch_rows(LIST_TABLES_SQL).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("table_name").and_then(DbValue::as_text))
            .collect())
    }

    async fn describe_table(&self, table: &str) -> AppResult<Vec<RawColumn>> {
        let rows = self.fetch_bound(DESCRIBE_SQL, table).await?;
        Ok(rows.into_iter().map(raw_column).collect())
    }

    async fn foreign_keys(&self, table: &str) -> AppResult<Vec<ForeignKeyDescriptor>> {
        let rows = self.fetch_bound(FOREIGN_KEYS_SQL, table).await?;
        Ok(rows
            .iter()
            .map(|row| ForeignKeyDescriptor {
                constraint:        text(row, "constraint_name"),
                column:            text(row, "column_name"),
                referenced_table:  text(row, "referenced_table"),
                referenced_column: text(row, "referenced_column")
            })
            .collect())
    }

    async fn fetch_rows(&self, sql: &str) -> AppResult<Vec<Row>> {
        debug!(sql, "executing statement");
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database_error(e.to_string()))?;
        Ok(rows.iter().map(decode_row).collect())
    }
}

fn text(row: &Row, column: &str) -> String {
    row.get(column).and_then(DbValue::as_text).unwrap_or_default()
}

fn raw_column(mut row: Row) -> RawColumn {
    RawColumn {
        name:      text(&row, "name"),
        data_type: text(&row, "data_type"),
        nullable:  text(&row, "nullable").eq_ignore_ascii_case("YES"),
        key:       text(&row, "column_key"),
        default:   row.swap_remove("column_default").unwrap_or(DbValue::Null),
        extra:     text(&row, "extra")
    }
}

fn decode_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), decode_column(row, column.ordinal())))
        .collect()
}

fn decode_column(row: &MySqlRow, idx: usize) -> DbValue {
    let type_name = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return DbValue::Null,
        Ok(raw) => raw.type_info().name().to_ascii_uppercase(),
        Err(e) => {
            warn!(column = idx, error = %e, "column not readable");
            return DbValue::Null;
        }
    };

    let decoded = match type_name.as_str() {
        "BOOLEAN" => row.try_get::<bool, _>(idx).ok().map(DbValue::Bool),
        name if name.ends_with("UNSIGNED") => row.try_get::<u64, _>(idx).ok().map(DbValue::UInt),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<i64, _>(idx).ok().map(DbValue::Int)
        }
        "FLOAT" => row
            .try_get::<f32, _>(idx)
            .ok()
            .map(|n| DbValue::Float(f64::from(n))),
        "DOUBLE" => row.try_get::<f64, _>(idx).ok().map(DbValue::Float),
        "DECIMAL" => row.try_get::<BigDecimal, _>(idx).ok().map(DbValue::Decimal),
        "YEAR" => row
            .try_get_unchecked::<Vec<u8>, _>(idx)
            .ok()
            .and_then(|bytes| year_value(&bytes))
            .map(DbValue::UInt),
        "DATE" => row
            .try_get::<NaiveDate, _>(idx)
            .ok()
            .map(DbValue::Date)
            .or_else(|| raw_temporal(row, idx, &type_name)),
        "TIME" => row
            .try_get::<NaiveTime, _>(idx)
            .ok()
            .map(DbValue::Time)
            .or_else(|| raw_temporal(row, idx, &type_name)),
        "DATETIME" => row
            .try_get::<NaiveDateTime, _>(idx)
            .ok()
            .map(DbValue::DateTime)
            .or_else(|| raw_temporal(row, idx, &type_name)),
        "TIMESTAMP" => row
            .try_get::<DateTime<Utc>, _>(idx)
            .ok()
            .map(DbValue::Timestamp)
            .or_else(|| raw_temporal(row, idx, &type_name)),
        "JSON" => row
            .try_get::<serde_json::Value, _>(idx)
            .ok()
            .map(DbValue::Json),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => {
            row.try_get::<Vec<u8>, _>(idx).ok().map(DbValue::Bytes)
        }
        _ => None
    };

    decoded.unwrap_or_else(|| decode_fallback(row, idx, &type_name))
}

fn decode_fallback(row: &MySqlRow, idx: usize, type_name: &str) -> DbValue {
    if let Ok(s) = row.try_get::<String, _>(idx) {
        return DbValue::Text(s);
    }
    if let Ok(bytes) = row.try_get_unchecked::<Vec<u8>, _>(idx) {
        return DbValue::Bytes(bytes);
    }
    warn!(column = idx, type_name, "unsupported column type, using type name");
    DbValue::Other(format!("<{}>", type_name))
}

/// `YEAR` arrives as a little-endian `u16` in binary results, as digits in text
fn year_value(bytes: &[u8]) -> Option<u64> {
    match bytes {
        [lo, hi] => Some(u64::from(u16::from_le_bytes([*lo, *hi]))),
        _ => std::str::from_utf8(bytes).ok()?.trim().parse().ok()
    }
}

/// Temporal values chrono cannot hold: zero dates and `TIME` beyond one day
fn raw_temporal(row: &MySqlRow, idx: usize, type_name: &str) -> Option<DbValue> {
    let bytes = row.try_get_unchecked::<Vec<u8>, _>(idx).ok()?;
    temporal_text(&bytes, type_name).map(DbValue::Other)
}

/// Render a length-prefixed binary temporal the way the server prints it.
///
/// Input that is not length-prefixed is taken as text protocol output.
fn temporal_text(bytes: &[u8], type_name: &str) -> Option<String> {
    let (&len, body) = bytes.split_first()?;
    if usize::from(len) != body.len() {
        return std::str::from_utf8(bytes).ok().map(str::to_string);
    }
    match type_name {
        "TIME" => time_text(body),
        "DATE" => date_text(body, false),
        _ => date_text(body, true)
    }
}

fn time_text(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return Some(String::from("00:00:00"));
    }
    if body.len() != 8 && body.len() != 12 {
        return None;
    }
    let sign = if body[0] == 1 { "-" } else { "" };
    let days = u32::from_le_bytes([body[1], body[2], body[3], body[4]]);
    let hours = u64::from(days) * 24 + u64::from(body[5]);
    let mut text = format!("{}{:02}:{:02}:{:02}", sign, hours, body[6], body[7]);
    if body.len() == 12 {
        push_micros(&mut text, &body[8..12]);
    }
    Some(text)
}

fn date_text(body: &[u8], with_time: bool) -> Option<String> {
    let (year, month, day) = match body.len() {
        0 => (0, 0, 0),
        4 | 7 | 11 => (u16::from_le_bytes([body[0], body[1]]), body[2], body[3]),
        _ => return None
    };
    let mut text = format!("{:04}-{:02}-{:02}", year, month, day);
    if with_time {
        let (h, m, s) = if body.len() >= 7 {
            (body[4], body[5], body[6])
        } else {
            (0, 0, 0)
        };
        text.push_str(&format!(" {:02}:{:02}:{:02}", h, m, s));
        if body.len() == 11 {
            push_micros(&mut text, &body[7..11]);
        }
    }
    Some(text)
}

fn push_micros(text: &mut String, bytes: &[u8]) {
    let micros = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if micros != 0 {
        text.push_str(&format!(".{:06}", micros));
    }
}

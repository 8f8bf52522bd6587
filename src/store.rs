//! Relational data store seam.
//!
//! The pipeline never talks to a driver directly; it goes through
//! [`DataStore`], which exposes exactly what the question-to-answer flow
//! needs: table listing, column structure, optional relationship metadata,
//! and "run this SQL, give me rows". Connection lifecycle belongs to the
//! implementation. [`MySqlStore`] is the production one.

mod mysql;

use async_trait::async_trait;

pub use self::mysql::MySqlStore;
use crate::{error::AppResult, schema::ForeignKeyDescriptor, value::{DbValue, Row}};

/// Column structure as reported by the database's introspection facility.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name:      String,
    /// Declared type, e.g. `varchar(120)` or `decimal(10,2) unsigned`
    pub data_type: String,
    pub nullable:  bool,
    /// Key role: `PRI`, `UNI`, `MUL` or empty
    pub key:       String,
    pub default:   DbValue,
    /// Extra attributes, e.g. `auto_increment`
    pub extra:     String
}

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Names of all tables visible in the current database, in listing order.
    async fn list_tables(&self) -> AppResult<Vec<String>>;

    /// Column structure of `table`, in declaration order.
    async fn describe_table(&self, table: &str) -> AppResult<Vec<RawColumn>>;

    /// Outgoing relationships of `table`. Stores without constraint
    /// metadata report none.
    async fn foreign_keys(&self, _table: &str) -> AppResult<Vec<ForeignKeyDescriptor>> {
        Ok(Vec::new())
    }

    /// First `limit` rows of `table` in engine order (no `ORDER BY`).
    async fn sample_rows(&self, table: &str, limit: usize) -> AppResult<Vec<Row>> {
        let sql = format!("SELECT * FROM {} LIMIT {}", quote_identifier(table), limit);
        self.fetch_rows(&sql).await
    }

    /// Execute `sql` and collect every row.
    async fn fetch_rows(&self, sql: &str) -> AppResult<Vec<Row>>;
}

/// Backtick-quote an identifier, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

//! Execution of generated SQL against the live database.

use indexmap::IndexSet;
use serde::Serialize;
use tracing::info;

use crate::{
    error::AppResult,
    sql::UnvalidatedSql,
    store::DataStore,
    value::{NormalizedRow, normalize_row}
};

/// Tabular result in database row order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    /// Column names in result order
    pub columns: Vec<String>,
    pub rows:    Vec<NormalizedRow>
}

impl ResultSet {
    /// Build from rows, taking the column order of the first row and
    /// appending columns that only appear later.
    pub fn from_rows(rows: Vec<NormalizedRow>) -> Self {
        let columns: IndexSet<String> = rows
            .iter()
            .flat_map(|row| row.keys().cloned())
            .collect();
        Self {
            columns: columns.into_iter().collect(),
            rows
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Run `sql` once. No retry, no timeout; zero rows is a valid result.
pub async fn execute(store: &dyn DataStore, sql: &UnvalidatedSql) -> AppResult<ResultSet> {
    let rows = store.fetch_rows(sql.as_str()).await?;
    info!(rows = rows.len(), "query executed");
    Ok(ResultSet::from_rows(
        rows.into_iter().map(normalize_row).collect()
    ))
}

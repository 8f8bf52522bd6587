//! Database schema introspection and caching.
//!
//! The SQL generation prompt embeds the whole schema: every table, its
//! columns, its relationships and a couple of sample rows. Building that
//! takes `2 + N` round trips, so the result is memoized in a
//! [`SchemaCache`] owned by the pipeline for the lifetime of the process.
//!
//! Cache population is all-or-nothing. A failed introspection leaves the
//! cache empty and the next question tries again; a successful one is never
//! replaced.
//!
//! # Example
//!
//! ```no_run
//! # async fn demo(store: &dyn nl2sql_analyst::store::DataStore) -> nl2sql_analyst::error::AppResult<()> {
//! use nl2sql_analyst::schema::{IntrospectOptions, SchemaCache};
//!
//! let cache = SchemaCache::new(IntrospectOptions::default());
//! let schema = cache.get_or_load(store).await?;
//! println!("{}", schema.to_summary());
//! # Ok(())
//! # }
//! ```

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::{
    error::{AppError, AppResult},
    store::{DataStore, RawColumn},
    value::{NormalizedRow, NormalizedValue, normalize, normalize_row}
};

/// Sample rows fetched per table
pub const SAMPLE_ROWS: usize = 2;

/// Complete schema, keyed by table name in listing order.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SchemaDescriptor {
    pub tables: IndexMap<String, TableDescriptor>
}

/// Structure and sample content of one table.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TableDescriptor {
    pub columns:      Vec<ColumnDescriptor>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    /// At most [`SAMPLE_ROWS`] rows in engine order
    pub sample_data:  Vec<NormalizedRow>
}

/// Column metadata with every value normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    pub name:      String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable:  bool,
    pub key:       String,
    pub default:   NormalizedValue,
    pub extra:     String
}

impl From<RawColumn> for ColumnDescriptor {
    fn from(raw: RawColumn) -> Self {
        Self {
            name:      raw.name,
            data_type: raw.data_type,
            nullable:  raw.nullable,
            key:       raw.key,
            default:   normalize(raw.default),
            extra:     raw.extra
        }
    }
}

/// Relationship from a column of this table to another table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignKeyDescriptor {
    pub constraint:        String,
    pub column:            String,
    pub referenced_table:  String,
    pub referenced_column: String
}

impl SchemaDescriptor {
    /// Pretty JSON form embedded in the SQL generation prompt
    pub fn to_prompt_json(&self) -> AppResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AppError::internal(format!("Failed to serialize schema: {}", e)))
    }

    /// Get human-readable summary of the schema
    pub fn to_summary(&self) -> String {
        let mut summary = String::from("Database Schema:\n\n");
        for (name, table) in &self.tables {
            summary.push_str(&format!("Table: {}\n", name));
            summary.push_str("Columns:\n");
            for col in &table.columns {
                let nullable = if col.nullable { "NULL" } else { "NOT NULL" };
                let key = match col.key.as_str() {
                    "PRI" => " PRIMARY KEY",
                    "UNI" => " UNIQUE",
                    "MUL" => " INDEX",
                    _ => ""
                };
                summary.push_str(&format!(
                    "  - {name} {data_type} {nullable}{key}\n",
                    name = col.name,
                    data_type = col.data_type,
                    nullable = nullable,
                    key = key
                ));
            }
            if !table.foreign_keys.is_empty() {
                summary.push_str("Foreign keys:\n");
                for fk in &table.foreign_keys {
                    summary.push_str(&format!(
                        "  - {} -> {}.{}\n",
                        fk.column, fk.referenced_table, fk.referenced_column
                    ));
                }
            }
            summary.push_str(&format!("Sample rows: {}\n\n", table.sample_data.len()));
        }
        summary
    }
}

/// Introspection switches
#[derive(Debug, Clone, Copy, Default)]
pub struct IntrospectOptions {
    pub discover_foreign_keys: bool
}

/// Lazily-populated, never-invalidated schema memo.
#[derive(Debug, Default)]
pub struct SchemaCache {
    cell:    OnceCell<SchemaDescriptor>,
    options: IntrospectOptions
}

impl SchemaCache {
    pub fn new(options: IntrospectOptions) -> Self {
        Self {
            cell: OnceCell::new(),
            options
        }
    }

    /// Cached schema, introspecting `store` on first successful use
    pub async fn get_or_load(&self, store: &dyn DataStore) -> AppResult<&SchemaDescriptor> {
        self.cell
            .get_or_try_init(|| introspect(store, self.options))
            .await
    }

    /// Cached schema without touching the store
    pub fn get(&self) -> Option<&SchemaDescriptor> {
        self.cell.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

/// Read tables, columns, relationships and samples from `store`.
///
/// Fails as a whole if any single step fails.
pub async fn introspect(
    store: &dyn DataStore,
    options: IntrospectOptions
) -> AppResult<SchemaDescriptor> {
    let tables = store.list_tables().await?;
    info!(count = tables.len(), "introspecting database schema");

    let mut schema = SchemaDescriptor::default();
    for table in tables {
        debug!(%table, "reading table structure");
        let columns = store
            .describe_table(&table)
            .await?
            .into_iter()
            .map(ColumnDescriptor::from)
            .collect();
        let foreign_keys = if options.discover_foreign_keys {
            store.foreign_keys(&table).await?
        } else {
            Vec::new()
        };
        let sample_data = store
            .sample_rows(&table, SAMPLE_ROWS)
            .await?
            .into_iter()
            .take(SAMPLE_ROWS)
            .map(normalize_row)
            .collect();
        schema.tables.insert(
            table,
            TableDescriptor {
                columns,
                foreign_keys,
                sample_data
            }
        );
    }

    info!(tables = schema.tables.len(), "schema cached");
    Ok(schema)
}

//! SQL generation from a natural-language question.
//!
//! The model's answer is free text. [`extract_sql`] is the only place that
//! turns it into SQL: a leading fenced code block (with or without a language
//! tag) is unwrapped, anything else is taken verbatim after trimming.
//!
//! The result is wrapped in [`UnvalidatedSql`]. Nothing beyond fence
//! stripping is checked: the statement is neither parsed nor restricted and
//! goes to the database exactly as the model wrote it.
//!
//! # Example
//!
//! ```
//! use nl2sql_analyst::sql::extract_sql;
//!
//! let sql = extract_sql("```sql\nSELECT COUNT(*) FROM customers\n```").unwrap();
//! assert_eq!(sql.as_str(), "SELECT COUNT(*) FROM customers");
//!
//! let sql = extract_sql("  SELECT 1 \n").unwrap();
//! assert_eq!(sql.as_str(), "SELECT 1");
//! ```

use std::{error::Error, fmt, sync::LazyLock};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    config::PromptConfig,
    error::{AppResult, llm_api_error},
    llm::TextGenerator,
    prompt::sql_generation_prompt,
    schema::SchemaDescriptor
};

/// Language tags a model puts after the opening fence
const FENCE_TAGS: &[&str] = &[
    "sql",
    "mysql",
    "mariadb",
    "sqlite",
    "postgresql",
    "postgres",
    "psql",
    "pgsql",
    "plsql",
    "tsql"
];

/// Leading fence, optional known tag, body up to the closing fence.
///
/// The tag must be followed by whitespace or the end of text, so SQL that
/// starts on the fence line is kept whole.
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"(?si)\A```(?:(?:{})(?:[ \t]+|[ \t]*\r?\n|\z))?(.*?)(?:```|\z)",
        FENCE_TAGS.join("|")
    );
    Regex::new(&pattern).expect("valid regex")
});

/// SQL text produced by the model, executed without any validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UnvalidatedSql(String);

impl UnvalidatedSql {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for UnvalidatedSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a model response yielded no SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractError {
    /// Response was empty or whitespace
    Empty,
    /// Response was a code fence with nothing inside
    EmptyFence
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("model returned an empty response"),
            Self::EmptyFence => f.write_str("model returned an empty code block")
        }
    }
}

impl Error for ExtractError {}

/// Pull one SQL statement out of a model response.
pub fn extract_sql(response: &str) -> Result<UnvalidatedSql, ExtractError> {
    let text = response.trim();
    if text.is_empty() {
        return Err(ExtractError::Empty);
    }
    let Some(captures) = FENCED_BLOCK.captures(text) else {
        return Ok(UnvalidatedSql::new(text));
    };
    let body = captures.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
    if body.is_empty() {
        return Err(ExtractError::EmptyFence);
    }
    Ok(UnvalidatedSql::new(body))
}

/// Full SQL generation prompt for `question` over `schema`
pub fn build_prompt(
    question: &str,
    schema: &SchemaDescriptor,
    config: &PromptConfig
) -> AppResult<String> {
    let schema_json = schema.to_prompt_json()?;
    Ok(sql_generation_prompt(question, &schema_json, config))
}

/// Ask the model for SQL answering `question`.
///
/// Fails when the model is unreachable or its answer holds no SQL.
pub async fn generate_sql(
    llm: &dyn TextGenerator,
    question: &str,
    schema: &SchemaDescriptor,
    config: &PromptConfig
) -> AppResult<UnvalidatedSql> {
    let prompt = build_prompt(question, schema, config)?;
    debug!(chars = prompt.len(), "SQL generation prompt built");
    let response = llm.generate(&prompt).await?;
    let sql = extract_sql(&response).map_err(|e| llm_api_error(e.to_string()))?;
    info!(%sql, "SQL generated");
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_with_uppercase_tag() {
        let sql = extract_sql("```SQL\nSELECT 1\n```").unwrap();
        assert_eq!(sql.as_str(), "SELECT 1");
    }

    #[test]
    fn test_fence_on_single_line() {
        let sql = extract_sql("```SELECT 1```").unwrap();
        assert_eq!(sql.as_str(), "SELECT 1");
    }

    #[test]
    fn test_fence_with_crlf() {
        let sql = extract_sql("```mysql\r\nSELECT 1;\r\n```\r\n").unwrap();
        assert_eq!(sql.as_str(), "SELECT 1;");
    }

    #[test]
    fn test_fence_followed_by_prose() {
        let sql = extract_sql("```sql\nSELECT 1\n```\nThis counts rows.").unwrap();
        assert_eq!(sql.as_str(), "SELECT 1");
    }

    #[test]
    fn test_unclosed_fence() {
        let sql = extract_sql("```sql\nSELECT name FROM t").unwrap();
        assert_eq!(sql.as_str(), "SELECT name FROM t");
    }

    #[test]
    fn test_tag_on_same_line_as_sql() {
        let sql = extract_sql("```sql SELECT 1```").unwrap();
        assert_eq!(sql.as_str(), "SELECT 1");
    }

    #[test]
    fn test_untagged_fence_keeps_first_keyword() {
        let sql = extract_sql("```SELECT\n  COUNT(*)\nFROM customers\n```").unwrap();
        assert_eq!(sql.as_str(), "SELECT\n  COUNT(*)\nFROM customers");
    }

    #[test]
    fn test_untagged_single_word_statement() {
        let sql = extract_sql("```\nSHOW\n```").unwrap();
        assert_eq!(sql.as_str(), "SHOW");
    }

    #[test]
    fn test_tag_prefix_is_not_a_tag() {
        let sql = extract_sql("```sqlite_master\n```").unwrap();
        assert_eq!(sql.as_str(), "sqlite_master");
    }

    #[test]
    fn test_mariadb_tag() {
        let sql = extract_sql("```MariaDB\nSELECT 2\n```").unwrap();
        assert_eq!(sql.as_str(), "SELECT 2");
    }

    #[test]
    fn test_lone_tag_is_empty_fence() {
        assert_eq!(extract_sql("```sql"), Err(ExtractError::EmptyFence));
    }

    #[test]
    fn test_empty_fence() {
        assert_eq!(extract_sql("```sql\n```"), Err(ExtractError::EmptyFence));
    }

    #[test]
    fn test_whitespace_only() {
        assert_eq!(extract_sql(" \n\t "), Err(ExtractError::Empty));
    }
}

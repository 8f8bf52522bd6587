//! Prompt templates for the two model calls.
//!
//! Both prompts are plain text contracts with the generative capability:
//! the first turns a question plus schema into one SQL statement, the second
//! turns a question plus result table into a narrative.

use crate::config::PromptConfig;

/// Prompt asking for a single SQL statement answering `question`.
///
/// `schema_json` is the complete serialized schema, samples included.
pub fn sql_generation_prompt(question: &str, schema_json: &str, config: &PromptConfig) -> String {
    let mut rules = vec![
        format!("Use only {} syntax.", config.dialect),
        String::from("Return only the SQL, without explanations."),
        String::from("Use LIMIT when appropriate to avoid very heavy queries."),
        String::from("Consider the relationships between tables."),
        String::from("Use the exact table and column names from the schema.")
    ];
    if let Some(table) = &config.fact_table {
        rules.push(format!(
            "For best-selling / most sold products, sum the quantities from the `{}` table.",
            table
        ));
    }
    let rules = rules
        .iter()
        .enumerate()
        .map(|(i, rule)| format!("{}. {}", i + 1, rule))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert in SQL and data analysis. \
         Based on the database schema below, write one SQL query that answers the question.\n\n\
         DATABASE SCHEMA:\n{schema}\n\n\
         QUESTION: {question}\n\n\
         RULES:\n{rules}\n\n\
         Return ONLY the SQL code, nothing else.\n\
         SQL:",
        schema = schema_json,
        question = question,
        rules = rules
    )
}

/// Prompt asking for an explanation of `table` with respect to `question`.
pub fn analysis_prompt(question: &str, table: &str, config: &PromptConfig) -> String {
    format!(
        "ORIGINAL QUESTION: {question}\n\n\
         QUERY RESULTS:\n{table}\n\n\
         Analyze these results and provide:\n\
         1. A clear explanation of what the data shows\n\
         2. Insights relevant to the original question\n\
         3. Important observations or detected patterns\n\
         4. Recommendations, if applicable\n\n\
         Answer in {language}, in a natural and useful way.\n\
         Be concise and straight to the point.",
        question = question,
        table = table,
        language = config.language
    )
}

use colored::Colorize;

use crate::{
    error::{AppResult, config_error},
    executor::ResultSet,
    pipeline::{AnalysisReport, PipelineError},
    schema::SchemaDescriptor,
    value::NormalizedValue
};

/// Output format for results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml
}

/// Output options
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format:   OutputFormat,
    pub colored:  bool,
    /// Include the generated SQL in text output
    pub show_sql: bool
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format:   OutputFormat::Text,
            colored:  true,
            show_sql: true
        }
    }
}

/// Format the composite answer based on output options
pub fn format_report(report: &AnalysisReport, opts: &OutputOptions) -> String {
    match opts.format {
        OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(report).unwrap_or_default(),
        OutputFormat::Text => format_text_report(report, opts)
    }
}

/// Format a failed question; a partial result table is kept when present
pub fn format_failure(error: &PipelineError, opts: &OutputOptions) -> String {
    match opts.format {
        OutputFormat::Json => serde_json::json!({
            "stage": error.stage().to_string(),
            "error": error.to_string(),
            "sql": error.sql(),
            "result": error.partial_result()
        })
        .to_string(),
        OutputFormat::Yaml => {
            let value = serde_json::json!({
                "stage": error.stage().to_string(),
                "error": error.to_string(),
                "sql": error.sql(),
                "result": error.partial_result()
            });
            serde_yaml::to_string(&value).unwrap_or_default()
        }
        OutputFormat::Text => {
            let mut output = heading("Error", opts);
            let message = error.to_string();
            if opts.colored {
                output.push_str(&message.red().to_string());
            } else {
                output.push_str(&message);
            }
            output.push('\n');
            if let Some(result) = error.partial_result() {
                output.push('\n');
                output.push_str(&heading("Results", opts));
                output.push_str(&render_pretty_table(result));
                output.push_str(&format!("\nTotal rows: {}\n", result.len()));
            }
            output
        }
    }
}

/// Format the introspected schema
pub fn format_schema(schema: &SchemaDescriptor, opts: &OutputOptions) -> AppResult<String> {
    match opts.format {
        OutputFormat::Json => schema.to_prompt_json(),
        OutputFormat::Yaml => {
            serde_yaml::to_string(schema).map_err(|e| config_error(format!("YAML error: {}", e)))
        }
        OutputFormat::Text => {
            let mut output = heading("Schema", opts);
            output.push_str(&schema.to_summary());
            Ok(output)
        }
    }
}

/// Format per-table row counts from a connection check
pub fn format_table_counts(counts: &[(String, i64)], opts: &OutputOptions) -> String {
    match opts.format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let map: indexmap::IndexMap<&str, i64> =
                counts.iter().map(|(t, n)| (t.as_str(), *n)).collect();
            if opts.format == OutputFormat::Json {
                serde_json::to_string_pretty(&map).unwrap_or_default()
            } else {
                serde_yaml::to_string(&map).unwrap_or_default()
            }
        }
        OutputFormat::Text => {
            let mut output = heading("Connection OK", opts);
            let width = counts.iter().map(|(t, _)| t.chars().count()).max().unwrap_or(0);
            for (table, rows) in counts {
                output.push_str(&format!("{}  {} rows\n", pad(table, width, false), rows));
            }
            if counts.is_empty() {
                output.push_str("No tables found\n");
            }
            output
        }
    }
}

fn format_text_report(report: &AnalysisReport, opts: &OutputOptions) -> String {
    let mut output = heading("Question", opts);
    output.push_str(&report.question);
    output.push_str("\n\n");

    if opts.show_sql {
        output.push_str(&heading("SQL", opts));
        output.push_str(report.sql.as_str());
        output.push_str("\n\n");
    }

    output.push_str(&heading("Results", opts));
    output.push_str(&report.table);
    output.push('\n');

    output.push_str(&heading("Analysis", opts));
    output.push_str(&report.analysis);
    output.push_str("\n\n");

    let total = format!("Total rows: {}", report.row_count);
    if opts.colored {
        output.push_str(&total.bold().to_string());
    } else {
        output.push_str(&total);
    }
    output.push('\n');
    output
}

fn heading(title: &str, opts: &OutputOptions) -> String {
    let header = format!("=== {} ===", title);
    if opts.colored {
        format!("{}\n", header.cyan().bold())
    } else {
        format!("{}\n", header)
    }
}

/// Plain aligned table: header line, then one line per row.
///
/// This is the form embedded in the analysis prompt.
pub fn render_plain_table(result: &ResultSet) -> String {
    let cells = cell_matrix(result);
    let widths = column_widths(&result.columns, &cells);

    let mut lines = Vec::with_capacity(cells.len() + 1);
    let header: Vec<String> = result
        .columns
        .iter()
        .zip(&widths)
        .map(|(name, width)| pad(name, *width, false))
        .collect();
    lines.push(header.join("  ").trim_end().to_string());
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|((text, numeric), width)| pad(text, *width, *numeric))
            .collect();
        lines.push(line.join("  ").trim_end().to_string());
    }
    lines.join("\n")
}

/// Boxed table for the operator, borders drawn with `+`, `-` and `|`.
pub fn render_pretty_table(result: &ResultSet) -> String {
    let cells = cell_matrix(result);
    let widths = column_widths(&result.columns, &cells);

    let border = {
        let mut line = String::from("+");
        for width in &widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line.push('\n');
        line
    };

    let mut output = border.clone();
    output.push('|');
    for (name, width) in result.columns.iter().zip(&widths) {
        output.push_str(&format!(" {} |", pad(name, *width, false)));
    }
    output.push('\n');
    output.push_str(&border);
    for row in &cells {
        output.push('|');
        for ((text, numeric), width) in row.iter().zip(&widths) {
            output.push_str(&format!(" {} |", pad(text, *width, *numeric)));
        }
        output.push('\n');
    }
    if !cells.is_empty() {
        output.push_str(&border);
    }
    output
}

/// Display text of every cell plus whether it is numeric
fn cell_matrix(result: &ResultSet) -> Vec<Vec<(String, bool)>> {
    result
        .rows
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .map(|column| match row.get(column) {
                    Some(value) => (value.to_string(), value.is_number()),
                    None => (NormalizedValue::Null.to_string(), false)
                })
                .collect()
        })
        .collect()
}

fn column_widths(columns: &[String], cells: &[Vec<(String, bool)>]) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|row| row[i].0.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect()
}

fn pad(text: &str, width: usize, right_align: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(text.chars().count()));
    if right_align {
        format!("{}{}", fill, text)
    } else {
        format!("{}{}", text, fill)
    }
}

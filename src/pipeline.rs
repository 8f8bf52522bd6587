//! Question-to-answer orchestration.
//!
//! One question runs through four stages in a fixed order:
//!
//! ```text
//! Idle -> SchemaFetch -> SqlGeneration -> Execution -> Analysis -> Done
//!              \______________\_______________\___________\______> Failed
//! ```
//!
//! Each stage returns a `Result`; the first failure ends the run as a
//! [`PipelineError`] naming its stage. Nothing is retried. The only state
//! kept between questions is the schema cache and the data store session.

use std::{error::Error, fmt};

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    analyzer::analyze,
    config::PromptConfig,
    error::AppError,
    executor::{ResultSet, execute},
    llm::TextGenerator,
    output::render_pretty_table,
    schema::{IntrospectOptions, SchemaCache, SchemaDescriptor},
    sql::{UnvalidatedSql, build_prompt, generate_sql},
    store::DataStore
};

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    SchemaFetch,
    SqlGeneration,
    Execution,
    Analysis
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SchemaFetch => "schema",
            Self::SqlGeneration => "generation",
            Self::Execution => "execution",
            Self::Analysis => "analysis"
        })
    }
}

/// Failure of a single question, tagged with the stage that failed.
#[derive(Debug)]
pub enum PipelineError {
    /// Introspection failed; nothing was cached
    SchemaUnavailable(AppError),
    /// The model was unreachable or produced no SQL
    GenerationUnavailable(AppError),
    /// The generated SQL failed to run
    ExecutionError {
        sql:    UnvalidatedSql,
        source: AppError
    },
    /// The narrative failed; the result table is still usable
    AnalysisUnavailable {
        sql:    UnvalidatedSql,
        result: ResultSet,
        source: AppError
    }
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::SchemaUnavailable(_) => Stage::SchemaFetch,
            Self::GenerationUnavailable(_) => Stage::SqlGeneration,
            Self::ExecutionError { .. } => Stage::Execution,
            Self::AnalysisUnavailable { .. } => Stage::Analysis
        }
    }

    /// SQL that was generated before the failure, if any
    pub fn sql(&self) -> Option<&UnvalidatedSql> {
        match self {
            Self::ExecutionError { sql, .. } | Self::AnalysisUnavailable { sql, .. } => Some(sql),
            _ => None
        }
    }

    /// Result table that survived a late failure
    pub fn partial_result(&self) -> Option<&ResultSet> {
        match self {
            Self::AnalysisUnavailable { result, .. } => Some(result),
            _ => None
        }
    }

    fn app_error(&self) -> &AppError {
        match self {
            Self::SchemaUnavailable(source)
            | Self::GenerationUnavailable(source)
            | Self::ExecutionError { source, .. }
            | Self::AnalysisUnavailable { source, .. } => source
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaUnavailable(source) => {
                write!(f, "Could not read the database schema: {}", source)
            }
            Self::GenerationUnavailable(source) => {
                write!(f, "Could not generate SQL for this question: {}", source)
            }
            Self::ExecutionError { sql, source } => write!(
                f,
                "The generated SQL failed to execute: {}\nSQL: {}",
                source, sql
            ),
            Self::AnalysisUnavailable { source, .. } => {
                write!(f, "Could not analyze the results: {}", source)
            }
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.app_error())
    }
}

/// Composite answer to one question.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub question:  String,
    pub sql:       UnvalidatedSql,
    #[serde(flatten)]
    pub result:    ResultSet,
    /// Boxed rendering of `result`
    #[serde(skip)]
    pub table:     String,
    pub analysis:  String,
    pub row_count: usize
}

impl AnalysisReport {
    pub fn new(question: &str, sql: UnvalidatedSql, result: ResultSet, analysis: String) -> Self {
        Self {
            question: question.to_string(),
            sql,
            table: render_pretty_table(&result),
            row_count: result.len(),
            result,
            analysis
        }
    }
}

/// Orchestrator holding the session, the model and the schema cache.
pub struct Pipeline<S, G> {
    store:  S,
    llm:    G,
    schema: SchemaCache,
    prompt: PromptConfig
}

impl<S: DataStore, G: TextGenerator> Pipeline<S, G> {
    pub fn new(store: S, llm: G, prompt: PromptConfig, options: IntrospectOptions) -> Self {
        Self {
            store,
            llm,
            schema: SchemaCache::new(options),
            prompt
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn llm(&self) -> &G {
        &self.llm
    }

    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schema
    }

    /// Cached schema, introspected on first use
    pub async fn schema(&self) -> Result<&SchemaDescriptor, PipelineError> {
        self.schema
            .get_or_load(&self.store)
            .await
            .map_err(PipelineError::SchemaUnavailable)
    }

    /// Answer one question end to end.
    pub async fn ask(&self, question: &str) -> Result<AnalysisReport, PipelineError> {
        info!(question, "processing question");
        let result = self.run(question).await;
        match &result {
            Ok(report) => info!(rows = report.row_count, "question answered"),
            Err(e) => warn!(stage = %e.stage(), error = %e, "question failed")
        }
        result
    }

    async fn run(&self, question: &str) -> Result<AnalysisReport, PipelineError> {
        let schema = self.schema().await?;

        let sql = generate_sql(&self.llm, question, schema, &self.prompt)
            .await
            .map_err(PipelineError::GenerationUnavailable)?;

        let result = match execute(&self.store, &sql).await {
            Ok(result) => result,
            Err(source) => return Err(PipelineError::ExecutionError { sql, source })
        };

        match analyze(&self.llm, question, &result, &self.prompt).await {
            Ok(analysis) => Ok(AnalysisReport::new(question, sql, result, analysis)),
            Err(source) => Err(PipelineError::AnalysisUnavailable {
                sql,
                result,
                source
            })
        }
    }

    /// SQL generation prompt that `ask` would send, without calling the model
    pub async fn dry_run(&self, question: &str) -> Result<String, PipelineError> {
        let schema = self.schema().await?;
        build_prompt(question, schema, &self.prompt).map_err(PipelineError::GenerationUnavailable)
    }

    pub fn into_parts(self) -> (S, G) {
        (self.store, self.llm)
    }
}

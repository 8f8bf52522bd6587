//! Application wiring for the nl2sql-analyst CLI.
//!
//! Resolves settings from the command line and configuration, opens the
//! database session, picks a model and drives the question loop. Kept out of
//! `main.rs` so the pieces can be tested.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::{
    cli::{Commands, Format, GlobalOptions, Provider},
    config::Config,
    error::{AppResult, config_error, file_read_error},
    llm::{GEMINI_FALLBACK_MODELS, LlmClient, LlmProvider, TextGenerator},
    output::{OutputFormat, OutputOptions, format_failure, format_report, format_schema},
    pipeline::{Pipeline, PipelineError},
    schema::{IntrospectOptions, introspect},
    sql::build_prompt,
    store::{DataStore, MySqlStore}
};

/// Words that end an interactive session
pub const EXIT_COMMANDS: &[&str] = &["sair", "exit", "quit"];

/// Provider plus the models to try, in order
#[derive(Debug, Clone)]
pub struct LlmSetup {
    pub provider:   LlmProvider,
    pub candidates: Vec<String>
}

/// Convert CLI format to internal OutputFormat
pub fn convert_format(format: Format) -> OutputFormat {
    match format {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
        Format::Yaml => OutputFormat::Yaml
    }
}

pub fn output_options(options: &GlobalOptions) -> OutputOptions {
    OutputOptions {
        format:   convert_format(options.output_format),
        colored:  !options.no_color,
        show_sql: !options.hide_sql
    }
}

/// Whether `input` ends the session (case-insensitive)
pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim();
    EXIT_COMMANDS.iter().any(|cmd| cmd.eq_ignore_ascii_case(input))
}

/// Whether `command` talks to the model; the rest only need the database
pub fn needs_model(command: &Commands) -> bool {
    match command {
        Commands::Ask {
            dry_run, ..
        } => !dry_run,
        Commands::Repl => true,
        Commands::Schema | Commands::Check => false
    }
}

/// Merge CLI flags over configuration into a provider and model list
pub fn resolve_llm(options: &GlobalOptions, config: &Config) -> AppResult<LlmSetup> {
    let provider = match (options.provider, &config.llm.provider) {
        (Some(provider), _) => provider,
        (None, Some(name)) => Provider::from_name(name)
            .ok_or_else(|| config_error(format!("Unknown LLM provider '{}'", name)))?,
        (None, None) => Provider::Gemini
    };

    let models: Vec<String> = if !options.models.is_empty() {
        options.models.clone()
    } else if !config.llm.models.is_empty() {
        config.llm.models.clone()
    } else if provider == Provider::Gemini {
        GEMINI_FALLBACK_MODELS.iter().map(|m| m.to_string()).collect()
    } else {
        vec![provider.default_model().to_string()]
    };
    let model = models[0].clone();

    let api_key = options.api_key.clone().or(config.llm.api_key.clone());
    let require_key = |name: &str| {
        api_key.clone().ok_or_else(|| {
            config_error(format!(
                "API key required for {} (use --api-key, LLM_API_KEY or GEMINI_API_KEY)",
                name
            ))
        })
    };

    let provider = match provider {
        Provider::Gemini => LlmProvider::Gemini {
            api_key: require_key("Gemini")?,
            model
        },
        Provider::OpenAI => LlmProvider::OpenAI {
            api_key: require_key("OpenAI")?,
            model
        },
        Provider::Anthropic => LlmProvider::Anthropic {
            api_key: require_key("Anthropic")?,
            model
        },
        Provider::Ollama => LlmProvider::Ollama {
            base_url: options
                .ollama_url
                .clone()
                .or(config.llm.ollama_url.clone())
                .unwrap_or_else(|| String::from("http://localhost:11434")),
            model
        }
    };

    let candidates = if options.no_probe { Vec::new() } else { models };
    Ok(LlmSetup {
        provider,
        candidates
    })
}

/// Load configuration and apply the CLI database URL on top
pub fn load_config(options: &GlobalOptions) -> AppResult<Config> {
    let mut config = Config::load()?;
    if let Some(url) = &options.database_url {
        config.database.url = Some(url.clone());
    }
    Ok(config)
}

/// Open the database session and select a model
pub async fn build_pipeline(
    options: &GlobalOptions,
    config: &Config
) -> AppResult<Pipeline<MySqlStore, LlmClient>> {
    let setup = resolve_llm(options, config)?;
    let store = MySqlStore::connect(&config.database).await?;
    let spinner = spinner("Selecting model...", options);
    let llm = LlmClient::select_model(setup.provider, &setup.candidates, config.retry.clone()).await;
    spinner.finish_and_clear();
    let llm = match llm {
        Ok(llm) => llm,
        Err(e) => {
            store.close().await;
            return Err(e);
        }
    };
    Ok(Pipeline::new(
        store,
        llm,
        config.prompt.clone(),
        introspect_options(config)
    ))
}

fn introspect_options(config: &Config) -> IntrospectOptions {
    IntrospectOptions {
        discover_foreign_keys: config.schema.discover_foreign_keys
    }
}

/// Schema dump or dry-run prompt, built from the database alone.
///
/// Returns the rendered output and the exit code.
pub async fn run_offline(
    store: &dyn DataStore,
    command: &Commands,
    config: &Config,
    opts: &OutputOptions
) -> AppResult<(String, i32)> {
    let schema = match introspect(store, introspect_options(config)).await {
        Ok(schema) => schema,
        Err(e) => return Ok((format_failure(&PipelineError::SchemaUnavailable(e), opts), 1))
    };
    match command {
        Commands::Ask {
            question, ..
        } => {
            let prompt = build_prompt(question, &schema, &config.prompt)?;
            Ok((format!("=== DRY RUN - Would send to LLM ===\n\n{}", prompt), 0))
        }
        _ => Ok((format_schema(&schema, opts)?, 0))
    }
}

/// Answer one question and render the outcome. Returns the exit code.
pub async fn answer<S: DataStore, G: TextGenerator>(
    pipeline: &Pipeline<S, G>,
    question: &str,
    options: &GlobalOptions
) -> (String, i32) {
    let opts = output_options(options);
    let spinner = spinner("Analyzing your question...", options);
    let outcome = pipeline.ask(question).await;
    spinner.finish_and_clear();
    match outcome {
        Ok(report) => (format_report(&report, &opts), 0),
        Err(e) => (format_failure(&e, &opts), 1)
    }
}

/// Interactive loop until an exit keyword or end of input
pub async fn run_repl<S: DataStore, G: TextGenerator>(
    pipeline: &Pipeline<S, G>,
    options: &GlobalOptions
) -> AppResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout
            .write_all(b"\nAsk a question about the data (or 'exit'): ")
            .await
            .map_err(|e| file_read_error("stdout", e))?;
        stdout
            .flush()
            .await
            .map_err(|e| file_read_error("stdout", e))?;

        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| file_read_error("stdin", e))?
        else {
            break;
        };
        let question = line.trim();
        if is_exit_command(question) {
            break;
        }
        if question.is_empty() {
            continue;
        }
        let (output, _) = answer(pipeline, question, options).await;
        println!("\n{}", output);
    }
    Ok(())
}

fn spinner(message: &'static str, options: &GlobalOptions) -> ProgressBar {
    if options.verbose || options.output_format != Format::Text {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

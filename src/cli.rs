use clap::{Args, Parser, Subcommand, ValueEnum};

/// nl2sql-analyst - Ask your database questions in natural language
#[derive(Parser, Debug)]
#[command(name = "nl2sql-analyst")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub options: GlobalOptions,

    /// Defaults to an interactive session
    #[command(subcommand)]
    pub command: Option<Commands>
}

#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// MySQL/MariaDB connection URL
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    /// LLM provider to use
    #[arg(short, long, value_enum, global = true)]
    pub provider: Option<Provider>,

    /// API key for hosted providers
    #[arg(short, long, global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model name; repeat to give fallbacks in order of preference
    #[arg(short, long = "model", global = true)]
    pub models: Vec<String>,

    /// Ollama base URL
    #[arg(long, global = true)]
    pub ollama_url: Option<String>,

    /// Use the first model without checking it is available
    #[arg(long, global = true)]
    pub no_probe: bool,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "text", global = true)]
    pub output_format: Format,

    /// Hide the generated SQL in text output
    #[arg(long, global = true)]
    pub hide_sql: bool,

    /// Log pipeline stages to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single question and exit
    Ask {
        /// Question in natural language
        question: String,

        /// Print the SQL generation prompt without calling the model
        #[arg(long)]
        dry_run: bool
    },
    /// Ask questions until an exit keyword is entered
    Repl,
    /// Print the introspected schema
    Schema,
    /// Check the database connection and count rows per table
    Check
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Gemini,
    #[value(name = "openai", alias = "open-ai")]
    OpenAI,
    Anthropic,
    Ollama
}

impl Provider {
    /// Get default model for provider
    pub fn default_model(&self) -> &str {
        match self {
            Self::Gemini => "gemini-2.0-flash",
            Self::OpenAI => "gpt-4",
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::Ollama => "llama3.2"
        }
    }

    /// Parse a provider name from config or environment
    pub fn from_name(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml
}

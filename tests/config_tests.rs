// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use std::{collections::HashMap, io::Write};

use nl2sql_analyst::config::{Config, PromptConfig};
use tempfile::NamedTempFile;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert!(config.llm.api_key.is_none());
    assert!(config.llm.provider.is_none());
    assert!(config.llm.models.is_empty());
    assert!(config.database.url.is_none());
    assert_eq!(config.database.host, "localhost");
    assert_eq!(config.database.port, 3306);
    assert!(!config.schema.discover_foreign_keys);
}

#[test]
fn test_default_retry_is_disabled() {
    let config = Config::default();

    assert_eq!(config.retry.max_retries, 0);
    assert_eq!(config.retry.initial_delay_ms, 1000);
    assert_eq!(config.retry.backoff_factor, 2.0);
}

#[test]
fn test_default_prompt_config() {
    let prompt = PromptConfig::default();

    assert_eq!(prompt.dialect, "MySQL/MariaDB");
    assert_eq!(prompt.language, "Portuguese");
    assert_eq!(prompt.fact_table.as_deref(), Some("itens_venda"));
}

#[test]
fn test_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[database]
host = "db.internal"
name = "automotivo_db"
user = "analyst"

[llm]
provider = "gemini"
models = ["gemini-2.0-flash-lite", "gemini-pro-latest"]

[prompt]
language = "English"

[schema]
discover_foreign_keys = true
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.database.host, "db.internal");
    assert_eq!(config.database.port, 3306);
    assert_eq!(config.database.name.as_deref(), Some("automotivo_db"));
    assert_eq!(config.llm.models.len(), 2);
    assert_eq!(config.prompt.language, "English");
    assert_eq!(config.prompt.dialect, "MySQL/MariaDB");
    assert!(config.schema.discover_foreign_keys);
}

#[test]
fn test_from_file_invalid_toml() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[database\nhost = ").unwrap();
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn test_from_missing_file() {
    assert!(Config::from_file(std::path::Path::new("/nonexistent/nl2sql.toml")).is_err());
}

#[test]
fn test_env_overrides_database() {
    let mut config = Config::default();
    config.apply_env(env_of(&[
        ("DB_HOST", "10.0.0.5"),
        ("DB_PORT", "3307"),
        ("DB_NAME", "automotivo_db"),
        ("DB_USER", "root"),
        ("DB_PASSWORD", "secret")
    ]));

    assert_eq!(config.database.host, "10.0.0.5");
    assert_eq!(config.database.port, 3307);
    assert_eq!(config.database.user.as_deref(), Some("root"));
    assert_eq!(config.database.password.as_deref(), Some("secret"));
}

#[test]
fn test_env_bad_port_ignored() {
    let mut config = Config::default();
    config.apply_env(env_of(&[("DB_PORT", "not-a-port")]));
    assert_eq!(config.database.port, 3306);
}

#[test]
fn test_gemini_key_fallback() {
    let mut config = Config::default();
    config.apply_env(env_of(&[("GEMINI_API_KEY", "g-key")]));
    assert_eq!(config.llm.api_key.as_deref(), Some("g-key"));

    let mut config = Config::default();
    config.apply_env(env_of(&[("GEMINI_API_KEY", "g-key"), ("LLM_API_KEY", "l-key")]));
    assert_eq!(config.llm.api_key.as_deref(), Some("l-key"));
}

#[test]
fn test_llm_model_replaces_list() {
    let mut config = Config::default();
    config.llm.models = vec!["a".into(), "b".into()];
    config.apply_env(env_of(&[("LLM_MODEL", "gemini-pro-latest"), ("LLM_PROVIDER", "gemini")]));
    assert_eq!(config.llm.models, vec!["gemini-pro-latest".to_string()]);
    assert_eq!(config.llm.provider.as_deref(), Some("gemini"));
}

#[test]
fn test_connect_options_from_parts() {
    let mut config = Config::default();
    config.database.name = Some("automotivo_db".into());
    assert!(config.database.connect_options().is_ok());
}

#[test]
fn test_connect_options_bad_url() {
    let mut config = Config::default();
    config.database.url = Some("not a url".into());
    assert!(config.database.connect_options().is_err());
}

// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

mod support;

use nl2sql_analyst::{
    analyzer::{NO_RESULTS_MESSAGE, analyze},
    config::PromptConfig,
    executor::ResultSet,
    value::{DbValue, normalize_row}
};
use support::{FakeLlm, row};

fn total(n: i64) -> ResultSet {
    ResultSet::from_rows(vec![normalize_row(row(&[("total", DbValue::Int(n))]))])
}

#[tokio::test]
async fn test_empty_result_skips_model() {
    let llm = FakeLlm::new().reply("should not be used");
    let analysis = analyze(&llm, "q", &ResultSet::default(), &PromptConfig::default())
        .await
        .unwrap();
    assert_eq!(analysis, NO_RESULTS_MESSAGE);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_narrative_returned_verbatim() {
    let narrative = "Existem **42** clientes cadastrados.\n\n- Base estável";
    let llm = FakeLlm::new().reply(narrative);
    let analysis = analyze(&llm, "quantos clientes existem?", &total(42), &PromptConfig::default())
        .await
        .unwrap();
    assert_eq!(analysis, narrative);
}

#[tokio::test]
async fn test_prompt_embeds_table_and_language() {
    let llm = FakeLlm::new().reply("ok");
    analyze(&llm, "quantos clientes existem?", &total(42), &PromptConfig::default())
        .await
        .unwrap();
    let prompt = llm.prompt(0);
    assert!(prompt.contains("quantos clientes existem?"));
    assert!(prompt.contains("total"));
    assert!(prompt.contains("42"));
    assert!(prompt.contains("Portuguese"));
}

#[tokio::test]
async fn test_blank_narrative_is_error() {
    let llm = FakeLlm::new().reply("\n  ");
    let result = analyze(&llm, "q", &total(1), &PromptConfig::default()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_model_failure_propagates() {
    let llm = FakeLlm::new().fail("timeout");
    let result = analyze(&llm, "q", &total(1), &PromptConfig::default()).await;
    assert!(result.is_err());
}

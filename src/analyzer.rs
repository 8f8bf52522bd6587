//! Narrative analysis of query results.

use tracing::{debug, info};

use crate::{
    config::PromptConfig,
    error::{AppResult, llm_api_error},
    executor::ResultSet,
    llm::TextGenerator,
    output::render_plain_table,
    prompt::analysis_prompt
};

/// Substituted for the analysis when the query matched nothing
pub const NO_RESULTS_MESSAGE: &str = "No results found for this query.";

/// Explain `result` in the context of `question`.
///
/// An empty result never reaches the model. The narrative is returned
/// verbatim.
pub async fn analyze(
    llm: &dyn TextGenerator,
    question: &str,
    result: &ResultSet,
    config: &PromptConfig
) -> AppResult<String> {
    if result.is_empty() {
        info!("empty result, analysis skipped");
        return Ok(NO_RESULTS_MESSAGE.to_string());
    }
    let table = render_plain_table(result);
    let prompt = analysis_prompt(question, &table, config);
    debug!(chars = prompt.len(), "analysis prompt built");
    let narrative = llm.generate(&prompt).await?;
    if narrative.trim().is_empty() {
        return Err(llm_api_error("model returned an empty analysis"));
    }
    Ok(narrative)
}

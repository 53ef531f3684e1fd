use std::sync::Arc;
use tracing::info;

use super::AgentCore;
use crate::error::AppResult;
use crate::langbase::LlmClient;
use crate::prompts::visionary_system_prompt;

/// Suggests a far-removed source domain for a target problem.
#[derive(Clone)]
pub struct Visionary {
    core: AgentCore,
}

impl Visionary {
    /// Create a Visionary calling through `llm`.
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            core: AgentCore::new("Visionary", llm, visionary_system_prompt()),
        }
    }

    /// Two-sentence source-domain description for `problem`, or an empty
    /// string for blank input (no model call).
    pub async fn process(&self, problem: &str) -> AppResult<String> {
        let problem = problem.trim();
        if problem.is_empty() {
            return Ok(String::new());
        }

        let message = format!(
            "Suggest a far-removed source domain (nature, history, or another science) that shares the logical structure of this problem. Answer in exactly two sentences.\n\nTarget problem: {}",
            problem
        );
        let suggestion = self.core.complete(&message).await?.trim().to_string();
        info!(chars = suggestion.len(), "Visionary suggested source domain");
        Ok(suggestion)
    }
}

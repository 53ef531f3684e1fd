//! The five LLM-backed agents.
//!
//! | Agent | Input | Output |
//! |-------|-------|--------|
//! | [`Scout`] | domain text | [`LogicalPropertyGraph`](crate::schema::LogicalPropertyGraph) |
//! | [`Matcher`] | two graphs (plus feedback) | [`AnalogyMapping`](crate::schema::AnalogyMapping) |
//! | [`Critic`] | mapping | [`ValidatedHypothesis`](crate::schema::ValidatedHypothesis) |
//! | [`Architect`] | hypothesis | [`ResearchReport`](crate::schema::ResearchReport) |
//! | [`Visionary`] | target problem | source-domain suggestion |
//!
//! Every agent returns a schema-valid fallback when the model's reply cannot
//! be parsed. Only collaborator failures (network, auth) surface as errors.

mod architect;
mod critic;
mod matcher;
mod scout;
mod visionary;

pub use architect::{fallback_report, Architect, ARCHITECT_FALLBACK_RECOMMENDATION};
pub use critic::{fallback_hypothesis, Critic, CRITIC_FALLBACK_ISSUE};
pub use matcher::{
    fallback_mapping, CriticFeedback, Matcher, MatcherInput, MATCHER_FALLBACK_EXPLANATION,
};
pub use scout::{to_pascal_case, Scout};
pub use visionary::Visionary;

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::extraction::{extract_json_object, preview, ExtractError};
use crate::langbase::LlmClient;

/// Dependencies shared by every agent.
///
/// Holds the LLM handle, the agent's name for logging, and its system
/// prompt. Composed into each agent instead of repeating the fields.
#[derive(Clone)]
pub struct AgentCore {
    llm: Arc<dyn LlmClient>,
    name: &'static str,
    system_prompt: String,
}

impl AgentCore {
    /// Create a core for the named agent.
    pub fn new(name: &'static str, llm: Arc<dyn LlmClient>, system_prompt: String) -> Self {
        Self {
            llm,
            name,
            system_prompt,
        }
    }

    /// Agent name used in log fields.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// System prompt sent with every call.
    #[inline]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Send `user_message` to the model and return the raw completion.
    pub async fn complete(&self, user_message: &str) -> AppResult<String> {
        let start = Instant::now();
        let completion = self.llm.invoke(&self.system_prompt, user_message).await?;
        info!(
            agent = self.name,
            latency_ms = start.elapsed().as_millis(),
            completion_len = completion.len(),
            "Agent call completed"
        );
        Ok(completion)
    }

    /// Extract the JSON object from a completion, logging a preview of the
    /// raw text when that fails.
    pub fn parse_object(&self, completion: &str) -> Result<Map<String, Value>, ExtractError> {
        extract_json_object(completion).map_err(|e| {
            warn!(
                agent = self.name,
                error = %e,
                raw = %preview(completion),
                "Failed to extract JSON from completion"
            );
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, LangbaseError};
    use crate::langbase::MockLlmClient;
    use mockall::predicate::eq;

    #[test]
    fn test_agent_core_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AgentCore>();
    }

    #[tokio::test]
    async fn test_complete_sends_system_prompt() {
        let mut llm = MockLlmClient::new();
        llm.expect_invoke()
            .with(eq("system"), eq("hello"))
            .times(1)
            .returning(|_, _| Ok("reply".to_string()));

        let core = AgentCore::new("Test", Arc::new(llm), "system".to_string());
        assert_eq!(core.complete("hello").await.unwrap(), "reply");
    }

    #[tokio::test]
    async fn test_complete_propagates_collaborator_error() {
        let mut llm = MockLlmClient::new();
        llm.expect_invoke().returning(|_, _| {
            Err(LangbaseError::Unavailable {
                message: "down".to_string(),
                retries: 2,
            })
        });

        let core = AgentCore::new("Test", Arc::new(llm), String::new());
        let err = core.complete("hello").await.unwrap_err();
        assert!(matches!(err, AppError::Langbase(_)));
    }

    #[test]
    fn test_parse_object() {
        let core = AgentCore::new("Test", Arc::new(MockLlmClient::new()), String::new());
        assert!(matches!(
            core.parse_object("no json here"),
            Err(ExtractError::NoJsonObject)
        ));
        assert!(matches!(core.parse_object(""), Err(ExtractError::Empty)));
        assert!(core.parse_object("{\"a\": 1}").is_ok());
    }
}
